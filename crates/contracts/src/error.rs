//! Layered error definitions
//!
//! Categorized by source: config / repository / search / connector

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Repository Errors =====
    /// Repository unreachable or returned an unexpected status
    #[error("repository error: {message}")]
    Repository { message: String },

    /// Document could not be decoded into the expected shape
    #[error("malformed {kind} document '{id}': {message}")]
    MalformedDocument {
        kind: &'static str,
        id: String,
        message: String,
    },

    // ===== Search Errors =====
    /// Article search failed
    #[error("article search error: {message}")]
    Search { message: String },

    // ===== Connector Errors =====
    /// No connector registered for a hook type
    #[error("unsupported webhook type '{hook_type}'")]
    UnsupportedHookType { hook_type: String },

    /// Connector-level delivery failure
    #[error("connector '{connector}' error: {message}")]
    Connector { connector: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create repository error
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Create search error
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search {
            message: message.into(),
        }
    }

    /// Create connector error
    pub fn connector(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connector {
            connector: connector.into(),
            message: message.into(),
        }
    }
}
