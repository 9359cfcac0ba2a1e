//! Remote provenance query lifecycle
//!
//! The event store answers provenance searches asynchronously: a submission
//! returns a handle, the handle is polled until the query finishes, and the
//! server-side query must be deleted afterwards. This module owns that whole
//! sequence.

pub mod criteria;
pub mod error;
pub mod lease;
pub mod lifecycle;
pub mod metrics;
pub mod normalize;
pub mod poll;
pub mod submit;
pub mod types;

pub use criteria::{CriteriaError, QueryCriteria, DEFAULT_MAX_RESULTS, MAX_RESULTS_CEILING};
pub use error::LifecycleError;
pub use lease::{CleanupOutcome, QueryLease};
pub use lifecycle::LifecycleManager;
pub use metrics::{LifecycleMetrics, MetricsSnapshot};
pub use normalize::{normalize_all, normalize_record, NormalizedEvent, RecordOutcome, SkipReason};
pub use poll::{classify_status, poll_until_terminal, PollPolicy, RemoteStatus};
pub use submit::{classify_acceptance, extract_result_set, submit, Submission};
pub use types::{
    LifecycleState, PollOutcome, QueryHandle, QueryResult, RawEventRecord, RawResultSet,
};
