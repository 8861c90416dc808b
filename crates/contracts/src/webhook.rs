//! Webhook - an outbound notification destination

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::{Document, DocumentKind, FeedId, Revision};

/// Webhook identity
pub type WebhookId = Uuid;

/// Webhook provider type
///
/// Unknown provider strings are kept as [`HookType::Other`] so that a single
/// misconfigured webhook never fails the decoding of the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HookType {
    Discord,
    Slack,
    Teams,
    Other(String),
}

impl HookType {
    /// All provider types with a built-in connector
    pub const BUILTIN: [HookType; 3] = [HookType::Discord, HookType::Slack, HookType::Teams];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Discord => "discord",
            Self::Slack => "slack",
            Self::Teams => "teams",
            Self::Other(other) => other,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for HookType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "discord" => Self::Discord,
            "slack" => Self::Slack,
            "teams" => Self::Teams,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for HookType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<HookType> for String {
    fn from(value: HookType) -> Self {
        match value {
            HookType::Other(other) => other,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret destination URL
///
/// The URL embeds the destination token, so `Debug` and `Display` redact it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretUrl(String);

impl SecretUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Reveal the URL for an outbound request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretUrl(**********)")
    }
}

impl fmt::Display for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("**********")
    }
}

/// Webhook document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(rename = "_id")]
    pub id: WebhookId,

    #[serde(rename = "_rev", default, skip_serializing_if = "Revision::is_empty")]
    pub rev: Revision,

    pub name: String,

    pub owner: Uuid,

    pub url: SecretUrl,

    pub hook_type: HookType,

    /// Feeds this webhook is attached to (inverse of `Feed.webhooks.hooks`)
    #[serde(default)]
    pub attached_feeds: BTreeSet<FeedId>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Webhook {
    pub fn new(
        name: impl Into<String>,
        owner: Uuid,
        url: impl Into<String>,
        hook_type: HookType,
    ) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert("type".into(), Self::KIND.as_str().into());

        Self {
            id: Uuid::new_v4(),
            rev: Revision::default(),
            name: name.into(),
            owner,
            url: SecretUrl::new(url),
            hook_type,
            attached_feeds: BTreeSet::new(),
            extra,
        }
    }
}

impl Document for Webhook {
    const KIND: DocumentKind = DocumentKind::Webhook;

    fn id(&self) -> Uuid {
        self.id
    }

    fn revision(&self) -> &Revision {
        &self.rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hook_type_parsing() {
        assert_eq!(HookType::from("discord"), HookType::Discord);
        assert_eq!(HookType::from("teams"), HookType::Teams);
        assert_eq!(
            HookType::from("mattermost"),
            HookType::Other("mattermost".into())
        );
        assert_eq!(String::from(HookType::Slack), "slack");
    }

    #[test]
    fn test_unknown_hook_type_deserializes() {
        let doc = json!({
            "_id": "0b6f0b8e-1b7a-4d53-8f0e-3f1f7bb0c9a2",
            "name": "ops",
            "owner": "8a1d5a1e-36a4-4a8b-a3a1-66e2c6cbd0a4",
            "url": "https://chat.example.com/hook",
            "hook_type": "mattermost",
            "type": "webhook"
        });

        let webhook: Webhook = serde_json::from_value(doc).unwrap();
        assert_eq!(webhook.hook_type.as_str(), "mattermost");
        assert!(webhook.attached_feeds.is_empty());
    }

    #[test]
    fn test_secret_url_is_redacted() {
        let webhook = Webhook::new(
            "alerts",
            Uuid::new_v4(),
            "https://hooks.slack.com/services/T1/B2/secret",
            HookType::Slack,
        );

        let debug = format!("{:?}", webhook);
        assert!(!debug.contains("secret"));
        assert_eq!(
            webhook.url.expose(),
            "https://hooks.slack.com/services/T1/B2/secret"
        );
    }
}
