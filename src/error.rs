use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the translation-memory document layer
#[derive(Debug, Error)]
pub enum TmxError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a well-formed TMX document: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Invalid translation unit: {0}")]
    InvalidUnit(String),

    #[error("Failed to serialize TMX document for {}: {reason}", path.display())]
    Serialize { path: PathBuf, reason: String },
}

impl TmxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
