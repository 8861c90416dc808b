//! RunReport - Dispatch Orchestrator output
//!
//! Summary of one dispatch run, consumed by the CLI and by metrics recording.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{FeedId, HookType, SendReport, WebhookId};

/// Summary of one dispatch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Nothing was sent or committed
    pub dry_run: bool,

    /// Feeds with at least one attached webhook
    pub feeds_considered: usize,

    /// Feeds left with a usable webhook after binding
    pub feeds_bound: usize,

    /// Feeds with articles after their cursor
    pub feeds_with_new_articles: usize,

    /// New articles across all feeds
    pub articles: usize,

    /// Feeds whose article fetch failed
    pub fetch_failures: Vec<FetchFailure>,

    /// One outcome per (feed, webhook)
    pub sends: Vec<SendOutcome>,

    /// Planned (feed, webhook) sends in a dry run
    pub planned_sends: usize,

    /// Cursor commit summary, absent if nothing was committed
    pub commit: Option<CommitSummary>,

    /// Wall-clock duration (milliseconds)
    pub elapsed_ms: u64,
}

impl RunReport {
    /// All send reports merged
    pub fn send_totals(&self) -> SendReport {
        let mut total = SendReport::default();
        for outcome in &self.sends {
            total.merge(outcome.report);
        }
        total
    }

    /// True if no fetch, send or commit failed
    pub fn is_clean(&self) -> bool {
        self.fetch_failures.is_empty()
            && self.send_totals().is_clean()
            && self.commit.as_ref().is_none_or(|c| c.failed.is_empty())
    }
}

/// Article fetch failure for one feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub feed_id: FeedId,
    pub message: String,
}

/// Send outcome for one (feed, webhook) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub feed_id: FeedId,
    pub webhook_id: WebhookId,
    pub hook_type: HookType,
    pub report: SendReport,
    /// The send task panicked; counted as one failure
    #[serde(default)]
    pub panicked: bool,
}

/// Commit Manager outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Attempts used
    pub attempts: u32,

    /// Cursors written
    pub committed: usize,

    /// Feeds whose cursor was changed by a concurrent writer (not overwritten)
    pub skipped_concurrent: usize,

    /// Feeds gone from the repository
    pub missing: usize,

    /// Feeds whose cursor could not be written within the attempt bound
    pub failed: Vec<Uuid>,
}
