//! Dispatch error types

use thiserror::Error;

/// Errors that abort a whole run
///
/// Everything else (fetch, send, commit failures) is isolated per unit and
/// reported in the `RunReport`.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Feeds or webhooks could not be loaded
    #[error("failed to load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: contracts::ContractError,
    },

    /// Other contract error
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl DispatchError {
    pub fn load(what: &'static str, source: contracts::ContractError) -> Self {
        Self::Load { what, source }
    }
}
