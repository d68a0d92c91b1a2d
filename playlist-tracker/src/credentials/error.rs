//! Credential error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving or refreshing credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// None of the candidate credential files exist.
    #[error("No credential source found (no token file and no client secret)")]
    NoCredentialSource,

    /// Reading or writing a credential file failed.
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credential file exists but is not a valid document.
    #[error("Invalid credential file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    /// The interactive consent flow failed or was denied.
    #[error("Consent flow failed: {0}")]
    Consent(String),

    /// Nobody completed the consent flow in time.
    #[error("Consent flow timed out")]
    ConsentTimeout,

    /// Missing refresh token - consent required again.
    #[error("Missing refresh token - consent required")]
    MissingRefreshToken,

    /// Refresh failed.
    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CredentialError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error requires running the consent flow again.
    pub fn requires_consent(&self) -> bool {
        matches!(self, Self::MissingRefreshToken | Self::NoCredentialSource)
    }

    /// Check if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
