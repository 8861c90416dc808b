//! Article Fetcher - newest-first article window per feed

use std::sync::Arc;

use contracts::{Article, ArticleQuery, ArticleSearch, ContractError, Feed, SortBy, SortOrder};
use tracing::{debug, instrument, warn};

/// Fetches the candidate window of a feed
pub struct ArticleFetcher<S> {
    search: Arc<S>,
    max_window: u32,
}

impl<S: ArticleSearch> ArticleFetcher<S> {
    pub fn new(search: Arc<S>, max_window: u32) -> Self {
        Self { search, max_window }
    }

    /// Query for the newest `min(feed.limit, max_window)` articles of a feed
    pub fn build_query(&self, feed: &Feed) -> ArticleQuery {
        let mut query = ArticleQuery::from_feed(feed);
        query.limit = query.limit.min(self.max_window);
        query.sort_by = SortBy::PublishDate;
        query.sort_order = SortOrder::Desc;
        query.highlight = false;
        query
    }

    /// Candidate articles, oldest first
    #[instrument(
        name = "fetch_candidates",
        skip(self, feed),
        fields(feed_id = %feed.id, feed = %feed.name)
    )]
    pub async fn fetch_candidates(&self, feed: &Feed) -> Result<Vec<Article>, ContractError> {
        if !feed.sorted_newest_first() {
            warn!(
                sort_by = ?feed.sort_by,
                sort_order = ?feed.sort_order,
                "Feed with webhooks is not sorted by newest publish date, overriding"
            );
        }

        let query = self.build_query(feed);
        let mut articles = self.search.query(&query).await?;
        articles.reverse();

        debug!(candidates = articles.len(), limit = query.limit, "Fetched candidates");
        Ok(articles)
    }
}
