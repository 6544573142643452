//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the stackdeck binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Normalize a config-supplied path to forward slashes.
///
/// `project_info.json` files written on Windows carry backslash paths; every
/// derived artifact (compose volumes, generated scripts, symlink names) uses
/// forward slashes.
pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Last path component of a config-supplied path, slash direction agnostic.
pub fn path_file_name(path: &str) -> String {
    let normalized = to_forward_slashes(path);
    normalized
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Last path component with its extension removed.
pub fn path_file_stem(path: &str) -> String {
    let name = path_file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

/// Name of the directory containing the last path component.
pub fn path_parent_name(path: &str) -> String {
    let normalized = to_forward_slashes(path);
    let trimmed = normalized.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) => parent.rsplit('/').next().unwrap_or("").to_string(),
        None => String::new(),
    }
}
