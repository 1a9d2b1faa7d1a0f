//! Error types for catalog loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading translation catalogs.
#[derive(Debug, Error)]
pub enum I18nError {
    /// The bytes are not a valid `.mo` catalog.
    #[error("Malformed catalog: {0}")]
    Malformed(String),

    /// Reading a catalog or locale directory failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl I18nError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, I18nError>;
