//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// The `Download`/`Extraction`/`Transcription`/`Processing` variants mirror
/// the persisted job error taxonomy; `Validation`/`NotFound` are HTTP-layer
/// only and are never written to a job row.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("a job with id '{0}' already exists")]
    Duplicate(String),

    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("io error performing '{op}' on {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn io_path(op: &'static str, path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
