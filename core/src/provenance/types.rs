//! Provenance query value types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::NormalizedEvent;

/// Opaque identifier of an in-flight remote query.
///
/// Deliberately not `Clone`: exactly one `QueryLease` owns it until the
/// remote resource is deleted.
#[derive(Debug, PartialEq, Eq)]
pub struct QueryHandle(String);

impl QueryHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote event record exactly as the event store returned it
pub type RawEventRecord = Value;

/// Ordered records from one query, plus the remote total when reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub records: Vec<RawEventRecord>,
    pub total: Option<u64>,
}

impl RawResultSet {
    pub fn new(records: Vec<RawEventRecord>) -> Self {
        Self {
            records,
            total: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Classified status of a remote query
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still running; the only state that leads to another attempt
    Pending,
    Finished(RawResultSet),
    /// Remote reported failure with this reason
    Failed(String),
    /// Attempt budget or external deadline ran out while pending
    TimedOut { attempts: u32, elapsed: Duration },
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollOutcome::Pending)
    }
}

/// States one lifecycle invocation moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Submitted,
    InlineDone,
    Polling,
    Finished,
    Failed,
    TimedOut,
    TransportError,
    CleanupDone,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Submitted => "submitted",
            LifecycleState::InlineDone => "inline_done",
            LifecycleState::Polling => "polling",
            LifecycleState::Finished => "finished",
            LifecycleState::Failed => "failed",
            LifecycleState::TimedOut => "timed_out",
            LifecycleState::TransportError => "transport_error",
            LifecycleState::CleanupDone => "cleanup_done",
        };
        f.write_str(name)
    }
}

/// Output of one lifecycle invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Events in the order the event store returned them
    pub events: Vec<NormalizedEvent>,
    /// Records dropped by the normalizer
    pub skipped: usize,
    /// Matching events the event store reported, which may exceed `events`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    pub executed_at: DateTime<Utc>,
}
