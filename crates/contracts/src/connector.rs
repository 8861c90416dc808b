//! Connector trait - per-provider delivery capability
//!
//! The orchestrator only sees this trait; adding a provider means
//! implementing it and registering the implementation under its
//! [`HookType`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Article, HookType, SecretUrl};

/// Provider-native messages produced by [`Connector::format`]
///
/// Each entry is one provider message unit, in the order it must be sent.
/// For most providers that is a complete request body; connectors that
/// combine units at send time (Teams cards) document it themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderPayload {
    pub messages: Vec<serde_json::Value>,
}

impl ProviderPayload {
    pub fn new(messages: Vec<serde_json::Value>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Outcome of a best-effort send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    /// Requests accepted by the provider
    pub delivered: u32,
    /// Requests given up on (after provider-specific retries)
    pub failed: u32,
    /// Destinations skipped because their URL is malformed
    pub skipped_urls: u32,
}

impl SendReport {
    pub fn merge(&mut self, other: SendReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.skipped_urls += other.skipped_urls;
    }

    /// True if nothing failed or was skipped
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped_urls == 0
    }
}

/// Webhook provider adapter
#[async_trait]
pub trait Connector: Send + Sync {
    /// Provider type this connector serves
    fn hook_type(&self) -> HookType;

    /// Format articles (oldest first) into provider messages
    ///
    /// Pure and synchronous.
    fn format(&self, articles: &[Article], feed_name: &str) -> ProviderPayload;

    /// Deliver a payload to every destination independently
    ///
    /// Never fails as a whole: per-destination failures are logged and
    /// counted in the returned report.
    async fn send(&self, urls: &[SecretUrl], payload: &ProviderPayload) -> SendReport;

    /// Check URL shape and reachability by sending an initialisation message
    async fn validate(&self, url: &str) -> bool;
}
