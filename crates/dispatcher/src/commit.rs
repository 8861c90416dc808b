//! Commit Manager - advance feed cursors under optimistic concurrency
//!
//! Each attempt re-reads the feeds, keeps only those whose cursor is still
//! the one the run started from, and bulk-writes the new cursors. Conflicting
//! writes are retried with the next attempt; after the last attempt the
//! cursor stays where it was and the articles will be sent again next run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use contracts::{CommitSummary, Feed, FeedId, FeedRepository};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Cursor to write for one feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCursor {
    pub feed_id: FeedId,
    /// Cursor the run started from (empty if none)
    pub original: String,
    /// ID of the newest dispatched article
    pub new_cursor: String,
}

impl PendingCursor {
    pub fn new(feed: &Feed, new_cursor: impl Into<String>) -> Self {
        Self {
            feed_id: feed.id,
            original: feed.webhooks.last_article.clone(),
            new_cursor: new_cursor.into(),
        }
    }
}

/// Writes cursors with a bounded number of attempts
pub struct CommitManager<R> {
    repository: Arc<R>,
    max_attempts: u32,
}

impl<R: FeedRepository> CommitManager<R> {
    pub fn new(repository: Arc<R>, max_attempts: u32) -> Self {
        Self {
            repository,
            max_attempts: max_attempts.max(1),
        }
    }

    #[instrument(name = "commit_cursors", skip(self, pending), fields(pending = pending.len()))]
    pub async fn commit(&self, pending: Vec<PendingCursor>) -> CommitSummary {
        let mut remaining: BTreeMap<FeedId, PendingCursor> = pending
            .into_iter()
            .map(|entry| (entry.feed_id, entry))
            .collect();
        let mut summary = CommitSummary::default();

        for attempt in 1..=self.max_attempts {
            if remaining.is_empty() {
                break;
            }
            summary.attempts = attempt;

            if let Err(e) = self.attempt(&mut remaining, &mut summary).await {
                warn!(attempt, error = %e, "Commit attempt failed");
            }

            if !remaining.is_empty() && attempt < self.max_attempts {
                debug!(attempt, retrying = remaining.len(), "Retrying cursor commit");
            }
        }

        if !remaining.is_empty() {
            let feed_ids: Vec<String> = remaining.keys().map(Uuid::to_string).collect();
            error!(
                attempts = summary.attempts,
                feeds = ?feed_ids,
                "Giving up on cursor commit, articles will be dispatched again"
            );
            summary.failed = remaining.into_keys().collect();
        }

        info!(
            committed = summary.committed,
            skipped = summary.skipped_concurrent,
            failed = summary.failed.len(),
            "Cursor commit finished"
        );
        summary
    }

    /// One read-compare-write round; entries still in `remaining` afterwards
    /// are retried
    async fn attempt(
        &self,
        remaining: &mut BTreeMap<FeedId, PendingCursor>,
        summary: &mut CommitSummary,
    ) -> Result<(), contracts::ContractError> {
        let ids: Vec<FeedId> = remaining.keys().copied().collect();
        let fresh: HashMap<FeedId, Feed> = self
            .repository
            .get_by_keys::<Feed>(&ids)
            .await?
            .into_iter()
            .map(|feed| (feed.id, feed))
            .collect();

        let mut writes = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(entry) = remaining.get(&id) else {
                continue;
            };

            let Some(mut feed) = fresh.get(&id).cloned() else {
                error!(feed_id = %id, "Feed disappeared before its cursor was committed");
                summary.missing += 1;
                remaining.remove(&id);
                continue;
            };

            if feed.webhooks.last_article != entry.original {
                warn!(
                    feed_id = %id,
                    expected = %entry.original,
                    found = %feed.webhooks.last_article,
                    "Cursor changed by another writer, not overwriting"
                );
                summary.skipped_concurrent += 1;
                remaining.remove(&id);
                continue;
            }

            feed.webhooks.last_article = entry.new_cursor.clone();
            writes.push(feed);
        }

        if writes.is_empty() {
            return Ok(());
        }

        for result in self.repository.bulk_update(writes).await? {
            let id = match Uuid::parse_str(&result.id) {
                Ok(id) if remaining.contains_key(&id) => id,
                Ok(_) => {
                    error!(id = %result.id, "Write result for a feed that was not written");
                    continue;
                }
                Err(_) => {
                    error!(id = %result.id, "Write result with unparsable feed ID");
                    continue;
                }
            };

            if result.success {
                summary.committed += 1;
                remaining.remove(&id);
            } else {
                debug!(feed_id = %id, reason = ?result.reason, "Cursor write rejected");
            }
        }

        Ok(())
    }
}
