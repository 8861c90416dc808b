//! Connector error types

use thiserror::Error;

/// Connector-specific errors
///
/// Only construction can fail; delivery failures are absorbed by the
/// connectors and surface as counts in a `SendReport`.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// HTTP client construction error
    #[error("failed to build http client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// Provider type without a built-in connector
    #[error("no built-in connector for webhook type '{hook_type}'")]
    UnknownProvider { hook_type: String },

    /// Wrapped contract error
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl ConnectorError {
    pub fn unknown_provider(hook_type: impl Into<String>) -> Self {
        Self::UnknownProvider {
            hook_type: hook_type.into(),
        }
    }
}
