//! Error types for the stackdeck core

use thiserror::Error;

/// Main error type for the stackdeck core
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config format error: {0}")]
    ConfigFormat(String),

    #[error("Name format error: {0}")]
    NameFormat(String),

    #[error("Runtime query failed: {0}")]
    RuntimeQuery(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Deploy error: {0}")]
    Deploy(String),

    #[error("Symlink error: {0}")]
    Symlink(String),
}
