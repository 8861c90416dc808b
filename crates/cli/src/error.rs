//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration validation error (after CLI overrides)
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Run exceeded `--timeout`
    #[error("Dispatch run timed out after {secs}s")]
    Timeout { secs: u64 },

    /// No connector for the requested hook type
    #[error("Unsupported webhook type '{hook_type}'")]
    UnsupportedHookType { hook_type: String },

    /// Provider did not accept the initialisation message
    #[error("Webhook rejected by {hook_type}")]
    WebhookRejected { hook_type: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn timeout(secs: u64) -> Self {
        Self::Timeout { secs }
    }

    pub fn unsupported_hook_type(hook_type: impl Into<String>) -> Self {
        Self::UnsupportedHookType {
            hook_type: hook_type.into(),
        }
    }

    pub fn webhook_rejected(hook_type: impl Into<String>) -> Self {
        Self::WebhookRejected {
            hook_type: hook_type.into(),
        }
    }
}
