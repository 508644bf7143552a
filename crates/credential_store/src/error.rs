use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize credential record: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl CredentialStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Rejection of authorization callback parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("Missing authentication parameters: {}", missing.join(", "))]
    MissingParameters { missing: Vec<&'static str> },

    #[error("invalid expires_in value '{value}': expected a positive number of seconds")]
    InvalidExpiresIn { value: String },
}
