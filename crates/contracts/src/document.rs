//! Repository documents and revision tokens
//!
//! Documents are stored with an identity (`_id`) and an opaque revision
//! (`_rev`). The engine never interprets a revision beyond equality.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Document kind, stored in the `type` discriminator field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Feed,
    Webhook,
}

impl DocumentKind {
    /// Value of the `type` field for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque per-document version token
///
/// An empty revision means the document has never been stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed document stored in the feed/webhook repository
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Discriminator of this document type
    const KIND: DocumentKind;

    /// Document identity
    fn id(&self) -> Uuid;

    /// Current revision token
    fn revision(&self) -> &Revision;
}

/// Per-document outcome of a bulk update
///
/// `id` is reported verbatim by the store and is not guaranteed to be a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub success: bool,
    pub id: String,
    /// Failure reason (e.g. "conflict"), if any
    #[serde(default)]
    pub reason: Option<String>,
    /// New revision on success
    #[serde(default)]
    pub revision: Option<Revision>,
}

impl WriteResult {
    /// Successful write
    pub fn ok(id: impl Into<String>, revision: Revision) -> Self {
        Self {
            success: true,
            id: id.into(),
            reason: None,
            revision: Some(revision),
        }
    }

    /// Rejected write
    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            id: id.into(),
            reason: Some(reason.into()),
            revision: None,
        }
    }

    /// True if the store rejected the write because of a stale revision
    pub fn is_conflict(&self) -> bool {
        !self.success && self.reason.as_deref() == Some("conflict")
    }
}
