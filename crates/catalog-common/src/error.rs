//! Error types shared across the catalog crates

use thiserror::Error;

/// Result type alias for common catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type for the shared catalog utilities
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl CatalogError {
    /// Create a configuration error for an environment variable holding an unusable value
    pub fn invalid_env(name: &str, value: &str) -> Self {
        Self::Config(format!("{} has an invalid value: '{}'", name, value))
    }
}
