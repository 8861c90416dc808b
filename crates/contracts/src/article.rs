//! Article and article query
//!
//! Articles are produced by the ingestion pipeline and are read-only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Feed, SortBy, SortOrder};

/// Article identity (search backend document ID)
pub type ArticleId = String;

/// Article as returned by the search backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,

    #[serde(deserialize_with = "crate::datetime::deserialize")]
    pub publish_date: DateTime<Utc>,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub image_url: String,

    /// Original article URL
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub author: Option<String>,

    /// Source profile the article was scraped from
    #[serde(default)]
    pub profile: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Article search filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleQuery {
    pub search_term: Option<String>,

    pub semantic_search: Option<String>,

    /// Source profiles (empty = all)
    pub sources: Vec<String>,

    /// Source categories (empty = all)
    pub source_category: Vec<String>,

    /// Restrict to these article IDs
    pub ids: Option<Vec<ArticleId>>,

    pub first_date: Option<DateTime<Utc>>,

    pub last_date: Option<DateTime<Utc>>,

    pub sort_by: SortBy,

    pub sort_order: SortOrder,

    pub limit: u32,

    pub highlight: bool,
}

impl ArticleQuery {
    /// Build a query from a feed's stored parameters
    ///
    /// Sort and limit are taken from the feed as-is; callers that need a
    /// specific window override them.
    pub fn from_feed(feed: &Feed) -> Self {
        Self {
            search_term: feed.search_term.clone(),
            semantic_search: feed.semantic_search.clone(),
            sources: feed.sources.iter().cloned().collect(),
            source_category: Vec::new(),
            ids: None,
            first_date: feed.first_date,
            last_date: feed.last_date,
            sort_by: feed.sort_by.unwrap_or_default(),
            sort_order: feed.sort_order,
            limit: feed.limit.unwrap_or(100),
            highlight: feed.highlight.unwrap_or(false),
        }
    }
}
