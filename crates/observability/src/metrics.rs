//! 分发运行指标
//!
//! 基于 RunReport 记录 Prometheus 指标，并生成人类可读的运行摘要。

use std::fmt;

use contracts::{CommitSummary, RunReport, SendOutcome};
use metrics::{counter, gauge, histogram};

/// 从 RunReport 记录一次运行的指标
///
/// 每次运行结束（含 dry run）调用一次。
pub fn record_run_metrics(report: &RunReport) {
    let mode = if report.dry_run { "dry_run" } else { "run" };
    counter!("feed_dispatch_runs_total", "mode" => mode).increment(1);

    gauge!("feed_dispatch_feeds_considered").set(report.feeds_considered as f64);
    gauge!("feed_dispatch_feeds_bound").set(report.feeds_bound as f64);
    gauge!("feed_dispatch_feeds_with_new_articles").set(report.feeds_with_new_articles as f64);

    counter!("feed_dispatch_articles_total").increment(report.articles as u64);
    histogram!("feed_dispatch_run_duration_ms").record(report.elapsed_ms as f64);

    if !report.fetch_failures.is_empty() {
        counter!("feed_dispatch_fetch_failures_total")
            .increment(report.fetch_failures.len() as u64);
    }

    for outcome in &report.sends {
        record_send_outcome(outcome);
    }

    if let Some(commit) = &report.commit {
        record_commit_summary(commit);
    }
}

/// 记录单个 (feed, webhook) 的发送结果
pub fn record_send_outcome(outcome: &SendOutcome) {
    let hook_type = outcome.hook_type.to_string();

    if outcome.report.delivered > 0 {
        counter!(
            "feed_dispatch_requests_total",
            "hook_type" => hook_type.clone(),
            "status" => "delivered"
        )
        .increment(outcome.report.delivered as u64);
    }
    if outcome.report.failed > 0 {
        counter!(
            "feed_dispatch_requests_total",
            "hook_type" => hook_type.clone(),
            "status" => "failed"
        )
        .increment(outcome.report.failed as u64);
    }
    if outcome.report.skipped_urls > 0 {
        counter!(
            "feed_dispatch_skipped_urls_total",
            "hook_type" => hook_type.clone()
        )
        .increment(outcome.report.skipped_urls as u64);
    }
    if outcome.panicked {
        counter!("feed_dispatch_send_panics_total", "hook_type" => hook_type).increment(1);
    }
}

/// 记录游标提交结果
pub fn record_commit_summary(commit: &CommitSummary) {
    histogram!("feed_dispatch_commit_attempts").record(commit.attempts as f64);
    counter!("feed_dispatch_cursors_committed_total").increment(commit.committed as u64);
    counter!("feed_dispatch_cursors_skipped_total").increment(commit.skipped_concurrent as u64);

    if !commit.failed.is_empty() {
        counter!("feed_dispatch_cursor_commit_failures_total")
            .increment(commit.failed.len() as u64);
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dry_run: bool,
    pub feeds_considered: usize,
    pub feeds_bound: usize,
    pub feeds_with_new_articles: usize,
    pub articles: usize,
    pub fetch_failures: usize,
    pub sends: usize,
    pub planned_sends: usize,
    pub delivered: u32,
    pub failed: u32,
    pub skipped_urls: u32,
    pub committed: usize,
    pub commit_skipped: usize,
    pub commit_failed: usize,
    pub elapsed_ms: u64,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        let totals = report.send_totals();
        let commit = report.commit.clone().unwrap_or_default();

        Self {
            dry_run: report.dry_run,
            feeds_considered: report.feeds_considered,
            feeds_bound: report.feeds_bound,
            feeds_with_new_articles: report.feeds_with_new_articles,
            articles: report.articles,
            fetch_failures: report.fetch_failures.len(),
            sends: report.sends.len(),
            planned_sends: report.planned_sends,
            delivered: totals.delivered,
            failed: totals.failed,
            skipped_urls: totals.skipped_urls,
            committed: commit.committed,
            commit_skipped: commit.skipped_concurrent,
            commit_failed: commit.failed.len(),
            elapsed_ms: report.elapsed_ms,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "=== Dispatch Dry Run ===")?;
        } else {
            writeln!(f, "=== Dispatch Run Summary ===")?;
        }
        writeln!(
            f,
            "Feeds: {} with webhooks, {} bound, {} with new articles",
            self.feeds_considered, self.feeds_bound, self.feeds_with_new_articles
        )?;
        writeln!(f, "New articles: {}", self.articles)?;

        if self.fetch_failures > 0 {
            writeln!(f, "Fetch failures: {}", self.fetch_failures)?;
        }

        if self.dry_run {
            writeln!(f, "Planned sends: {}", self.planned_sends)?;
        } else {
            writeln!(
                f,
                "Sends: {} (delivered {}, failed {}, skipped urls {})",
                self.sends, self.delivered, self.failed, self.skipped_urls
            )?;
            writeln!(
                f,
                "Cursors: {} committed, {} changed concurrently, {} failed",
                self.committed, self.commit_skipped, self.commit_failed
            )?;
        }
        writeln!(f, "Elapsed: {} ms", self.elapsed_ms)
    }
}
