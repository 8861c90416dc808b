//! Cursor Resolver - articles after a feed's cursor

use contracts::{Article, Feed};
use tracing::warn;

/// New articles of a feed, oldest first
///
/// `candidates` must be ascending. Returns `None` when nothing is new.
///
/// A cursor that is not in the window (scrolled out, or the article was
/// removed) does not trim anything: the whole window is treated as new.
pub fn resolve_new(feed: &Feed, candidates: Vec<Article>) -> Option<Vec<Article>> {
    let new_articles = match feed.cursor() {
        Some(cursor) => match candidates.iter().position(|article| article.id == cursor) {
            Some(index) => candidates.into_iter().skip(index + 1).collect(),
            None => {
                warn!(
                    feed_id = %feed.id,
                    cursor,
                    window = candidates.len(),
                    "Cursor not found in article window, dispatching the whole window"
                );
                candidates
            }
        },
        None => candidates,
    };

    (!new_articles.is_empty()).then_some(new_articles)
}
