//! Container-name / service-name resolution
//!
//! Compose names a single-replica container `{project}-{service}-1` where
//! the project name is the build-context directory name. That convention is
//! the only linkage between a live container and a declared service, so both
//! directions live here.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::DeckError;

fn replica_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d+$").expect("valid regex"))
}

/// Derive the service name from a container name.
///
/// Strips the `{project}-` prefix, then the trailing `-<digits>` replica
/// index. Membership in the declared service map is the caller's check.
pub fn extract_service_name(container_name: &str, project_dir: &Path) -> Result<String, DeckError> {
    let project_name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DeckError::NameFormat(format!(
                "Project directory has no name: {}",
                project_dir.display()
            ))
        })?;

    let prefix = format!("{}-", project_name);
    let without_prefix = container_name.strip_prefix(&prefix).ok_or_else(|| {
        DeckError::NameFormat(format!("Invalid container name format: {}", container_name))
    })?;

    Ok(replica_suffix().replace(without_prefix, "").into_owned())
}

/// Container name of a declared service, replica index fixed at 1
pub fn service_container_name(project_dir: &Path, service_name: &str) -> String {
    let project_name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}-{}-1", project_name, service_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_name() {
        let name = extract_service_name("myproj-web-1", Path::new("/any/myproj")).unwrap();
        assert_eq!(name, "web");
    }

    #[test]
    fn test_extract_rejects_prefix_mismatch() {
        assert!(extract_service_name("other-web-1", Path::new("/any/myproj")).is_err());
    }

    #[test]
    fn test_extract_strips_only_last_digit_run() {
        let name = extract_service_name("myproj-web-v2-1", Path::new("/any/myproj")).unwrap();
        assert_eq!(name, "web-v2");
    }

    #[test]
    fn test_extract_without_replica_suffix() {
        let name = extract_service_name("myproj-web", Path::new("/any/myproj")).unwrap();
        assert_eq!(name, "web");
    }

    #[test]
    fn test_round_trip() {
        let dir = Path::new("/work/bench-rig");
        let container = service_container_name(dir, "fg-pg");
        assert_eq!(container, "bench-rig-fg-pg-1");
        assert_eq!(extract_service_name(&container, dir).unwrap(), "fg-pg");
    }
}
