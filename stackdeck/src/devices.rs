//! Device target assignment review
//!
//! The validator reports facts: cardinality violations, duplicate counts.
//! Whether a duplicate blocks confirmation is decided by the caller against
//! the device's `allow_duplicate` flag, so the review can be recomputed on
//! every selection change while the editor stays open.

use std::collections::{HashMap, HashSet};

/// Outcome of reviewing a proposed target selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetReview {
    /// Human-readable cardinality violations
    pub errors: Vec<String>,

    /// Every address selected more than once, regardless of allow_duplicate
    pub duplicates: HashSet<String>,

    /// Occurrence count per selected address
    pub counts: HashMap<String, u32>,
}

/// Review a proposed set of target addresses against cardinality limits.
///
/// Pure and allocation-light; called on every interactive edit.
pub fn validate_targets(
    selected: &[String],
    min_connections: u32,
    max_connections: Option<u32>,
) -> TargetReview {
    let mut review = TargetReview::default();

    let current = selected.len() as u32;
    if current < min_connections {
        review.errors.push(format!(
            "At least {} IP address(es) must be assigned (currently {}).",
            min_connections, current
        ));
    }
    if let Some(max) = max_connections {
        if current > max {
            review.errors.push(format!(
                "At most {} IP address(es) can be assigned (currently {}).",
                max, current
            ));
        }
    }

    for ip in selected {
        *review.counts.entry(ip.clone()).or_insert(0) += 1;
    }
    review.duplicates = review
        .counts
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(ip, _)| ip.clone())
        .collect();

    review
}

/// Check dotted-quad IPv4 syntax
pub fn is_valid_ipv4(ip: &str) -> bool {
    let parts: Vec<&str> = ip.split('.').collect();
    parts.len() == 4 && parts.iter().all(|part| part.parse::<u8>().is_ok())
}

/// Numeric sort key for a dotted-quad address, zero when malformed
pub fn ipv4_sort_key(ip: &str) -> u32 {
    let mut key: u32 = 0;
    for part in ip.split('.') {
        match part.parse::<u8>() {
            Ok(octet) => key = (key << 8) | u32::from(octet),
            Err(_) => return 0,
        }
    }
    key
}

/// Sort an address pool numerically and drop duplicates
pub fn sort_ip_pool(ips: &mut Vec<String>) {
    ips.sort_by_key(|ip| ipv4_sort_key(ip));
    ips.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_below_minimum_reported() {
        let review = validate_targets(&[], 2, Some(5));
        assert_eq!(review.errors.len(), 1);
        assert!(review.errors[0].contains('2'));
        assert!(review.errors[0].contains('0'));
        assert!(review.duplicates.is_empty());
        assert!(review.counts.is_empty());
    }

    #[test]
    fn test_zero_minimum_accepts_empty() {
        let review = validate_targets(&[], 0, None);
        assert!(review.errors.is_empty());
    }

    #[test]
    fn test_above_maximum_reported() {
        let selected = ips(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let review = validate_targets(&selected, 0, Some(2));
        assert_eq!(review.errors.len(), 1);
        assert!(review.errors[0].contains('2'));
        assert!(review.errors[0].contains('3'));
    }

    #[test]
    fn test_no_maximum_never_fires_upper_bound() {
        let selected = ips(&["10.0.0.1"; 100]);
        let review = validate_targets(&selected, 0, None);
        assert!(review.errors.is_empty());
    }

    #[test]
    fn test_duplicates_reported_without_blocking() {
        let selected = ips(&["10.0.0.1", "10.0.0.1"]);
        let review = validate_targets(&selected, 1, None);
        assert!(review.errors.is_empty());
        assert_eq!(review.duplicates, ips(&["10.0.0.1"]).into_iter().collect());
        assert_eq!(review.counts.get("10.0.0.1"), Some(&2));
    }

    #[test]
    fn test_minimum_check_independent_of_duplicates() {
        let selected = ips(&["10.0.0.1", "10.0.0.1", "10.0.0.1"]);
        let review = validate_targets(&selected, 4, None);
        assert_eq!(review.errors.len(), 1);
        assert_eq!(review.duplicates.len(), 1);
    }

    #[test]
    fn test_is_valid_ipv4() {
        assert!(is_valid_ipv4("192.168.1.100"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(!is_valid_ipv4("192.168.1"));
        assert!(!is_valid_ipv4("192.168.1.256"));
        assert!(!is_valid_ipv4("192.168.1.a"));
        assert!(!is_valid_ipv4(""));
    }

    #[test]
    fn test_pool_sorted_numerically_not_lexically() {
        let mut pool = ips(&["192.168.1.20", "192.168.1.3", "10.0.0.1", "192.168.1.3"]);
        sort_ip_pool(&mut pool);
        assert_eq!(pool, ips(&["10.0.0.1", "192.168.1.3", "192.168.1.20"]));
    }
}
