//! Backend error types

use std::path::PathBuf;

use contracts::ContractError;
use reqwest::StatusCode;
use thiserror::Error;

/// Backend-specific errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with an unexpected status
    #[error("unexpected status {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid backend URL
    #[error("invalid backend url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Fixtures file could not be loaded
    #[error("failed to load fixtures from {path:?}: {message}")]
    Fixtures { path: PathBuf, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn status(endpoint: impl Into<String>, status: StatusCode, body: impl Into<String>) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn fixtures(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Fixtures {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convert into the repository-facing contract error
    pub fn into_repository(self) -> ContractError {
        ContractError::repository(self.to_string())
    }

    /// Convert into the search-facing contract error
    pub fn into_search(self) -> ContractError {
        ContractError::search(self.to_string())
    }
}
