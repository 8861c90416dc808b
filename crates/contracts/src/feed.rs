//! Feed - a saved article search with attached webhooks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::{Document, DocumentKind, Revision};

/// Feed identity
pub type FeedId = Uuid;

/// Article sort field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    PublishDate,
    InsertedAt,
    ReadTimes,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Notification state of a feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedWebhooks {
    /// Attached webhook IDs
    #[serde(default)]
    pub hooks: Vec<Uuid>,

    /// Cursor: ID of the last dispatched article, empty if none
    #[serde(default)]
    pub last_article: String,
}

/// Feed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    #[serde(rename = "_id")]
    pub id: FeedId,

    #[serde(rename = "_rev", default, skip_serializing_if = "Revision::is_empty")]
    pub rev: Revision,

    pub name: String,

    #[serde(default)]
    pub owner: Option<Uuid>,

    /// Maximum number of articles matched by the feed
    #[serde(default = "default_limit")]
    pub limit: Option<u32>,

    #[serde(default)]
    pub sort_by: Option<SortBy>,

    #[serde(default)]
    pub sort_order: SortOrder,

    #[serde(default)]
    pub search_term: Option<String>,

    #[serde(default)]
    pub semantic_search: Option<String>,

    #[serde(default)]
    pub highlight: Option<bool>,

    #[serde(default, deserialize_with = "crate::datetime::deserialize_option")]
    pub first_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "crate::datetime::deserialize_option")]
    pub last_date: Option<DateTime<Utc>>,

    /// Source profiles the feed is restricted to (empty = all)
    #[serde(default)]
    pub sources: BTreeSet<String>,

    #[serde(default)]
    pub webhooks: FeedWebhooks,

    /// Fields owned by other writers, preserved on write-back
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_limit() -> Option<u32> {
    Some(100)
}

impl Feed {
    /// Create a feed with default query parameters
    pub fn new(name: impl Into<String>) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert("type".into(), Self::KIND.as_str().into());

        Self {
            id: Uuid::new_v4(),
            rev: Revision::default(),
            name: name.into(),
            owner: None,
            limit: default_limit(),
            sort_by: Some(SortBy::PublishDate),
            sort_order: SortOrder::Desc,
            search_term: None,
            semantic_search: None,
            highlight: Some(false),
            first_date: None,
            last_date: None,
            sources: BTreeSet::new(),
            webhooks: FeedWebhooks::default(),
            extra,
        }
    }

    /// Stored cursor, `None` when empty
    pub fn cursor(&self) -> Option<&str> {
        let cursor = self.webhooks.last_article.as_str();
        (!cursor.is_empty()).then_some(cursor)
    }

    /// Whether the feed has any webhook attached
    pub fn has_webhooks(&self) -> bool {
        !self.webhooks.hooks.is_empty()
    }

    /// Whether the stored sort matches the "newest first" requirement
    pub fn sorted_newest_first(&self) -> bool {
        matches!(self.sort_by, None | Some(SortBy::PublishDate))
            && self.sort_order == SortOrder::Desc
    }
}

impl Document for Feed {
    const KIND: DocumentKind = DocumentKind::Feed;

    fn id(&self) -> Uuid {
        self.id
    }

    fn revision(&self) -> &Revision {
        &self.rev
    }
}
