use thiserror::Error;

/// Top-level error type for the cmdrelay runtime.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid permission level: {0}")]
    InvalidPermission(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(String),
}
