use std::path::PathBuf;
use thiserror::Error;

/// Failures that reject an import before any network activity.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV parse error: {0}")]
    Parse(String),

    #[error("Failed to read history file {path:?}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Session slot failures. Callers downgrade these to warnings.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session storage is full")]
    QuotaExceeded,

    #[error("Session database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Session payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Catalog lookup failures. Never leave the metadata client.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for MetadataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MetadataError::Timeout
        } else if e.is_decode() {
            MetadataError::InvalidResponse(e.to_string())
        } else {
            MetadataError::Connection(e.to_string())
        }
    }
}
