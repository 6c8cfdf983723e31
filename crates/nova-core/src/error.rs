use thiserror::Error;

/// Top-level error type for the Nova engine.
///
/// Subsystem crates define their own error types and convert into
/// `NovaError` at crate boundaries so the `?` operator composes across the
/// workspace.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NovaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Language service error: {0}")]
    Language(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for NovaError {
    fn from(err: toml::de::Error) -> Self {
        NovaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NovaError {
    fn from(err: toml::ser::Error) -> Self {
        NovaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NovaError {
    fn from(err: serde_json::Error) -> Self {
        NovaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Nova operations.
pub type Result<T> = std::result::Result<T, NovaError>;
