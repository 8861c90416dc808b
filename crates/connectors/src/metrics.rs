//! Connector metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single connector
#[derive(Debug, Default)]
pub struct ConnectorMetrics {
    /// Deliveries accepted by the provider
    delivered_count: AtomicU64,
    /// Deliveries given up on
    failure_count: AtomicU64,
    /// Extra attempts (rate limit, image fallback, non-2xx retry)
    retry_count: AtomicU64,
    /// Destinations skipped because of a malformed URL
    skipped_count: AtomicU64,
}

impl ConnectorMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    pub fn inc_skipped_count(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            retry_count: self.retry_count(),
            skipped_count: self.skipped_count(),
        }
    }
}

/// Snapshot of connector metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub delivered_count: u64,
    pub failure_count: u64,
    pub retry_count: u64,
    pub skipped_count: u64,
}
