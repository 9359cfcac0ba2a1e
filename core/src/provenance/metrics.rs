//! Lifecycle counters
//!
//! Shared across concurrent invocations; every counter is a relaxed atomic.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    invocations: AtomicU64,
    inline_results: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    transport_errors: AtomicU64,
    rejected: AtomicU64,
    cleanups_issued: AtomicU64,
    cleanup_failures: AtomicU64,
    events_emitted: AtomicU64,
    records_skipped: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub invocations: u64,
    pub inline_results: u64,
    pub finished: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub transport_errors: u64,
    /// Invalid criteria or failed submissions
    pub rejected: u64,
    pub cleanups_issued: u64,
    pub cleanup_failures: u64,
    pub events_emitted: u64,
    pub records_skipped: u64,
    pub last_updated: DateTime<Utc>,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inline(&self) {
        self.inline_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finished(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup(&self, succeeded: bool) {
        self.cleanups_issued.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_normalized(&self, emitted: usize, skipped: usize) {
        self.events_emitted.fetch_add(emitted as u64, Ordering::Relaxed);
        self.records_skipped.fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            inline_results: self.inline_results.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            cleanups_issued: self.cleanups_issued.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            last_updated: Utc::now(),
        }
    }
}
