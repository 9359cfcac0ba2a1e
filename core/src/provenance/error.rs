//! Lifecycle errors

use std::time::Duration;

use super::criteria::CriteriaError;
use super::types::LifecycleState;
use crate::transport::TransportError;

/// Why a lifecycle invocation produced no result
///
/// Cleanup failures never appear here; they are logged and counted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid criteria: {0}")]
    Criteria(#[from] CriteriaError),

    #[error("Query submission failed: {0}")]
    Submission(TransportError),

    #[error("Polling query '{handle}' failed on attempt {attempt}: {source}")]
    PollTransport {
        handle: String,
        attempt: u32,
        source: TransportError,
    },

    #[error("Remote query '{handle}' failed: {reason}")]
    RemoteQueryFailed { handle: String, reason: String },

    #[error("Query '{handle}' still running after {attempts} attempts ({elapsed:?})")]
    TimedOut {
        handle: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Fetching results of query '{handle}' failed: {source}")]
    ResultFetch {
        handle: String,
        source: TransportError,
    },
}

impl LifecycleError {
    /// Terminal state the invocation was in when this error was produced
    pub fn terminal_state(&self) -> LifecycleState {
        match self {
            LifecycleError::Criteria(_) | LifecycleError::Submission(_) => {
                LifecycleState::Submitted
            }
            LifecycleError::PollTransport { .. } | LifecycleError::ResultFetch { .. } => {
                LifecycleState::TransportError
            }
            LifecycleError::RemoteQueryFailed { .. } => LifecycleState::Failed,
            LifecycleError::TimedOut { .. } => LifecycleState::TimedOut,
        }
    }

    /// Whether the event store ever held server-side state for this invocation
    pub fn had_handle(&self) -> bool {
        !matches!(
            self,
            LifecycleError::Criteria(_) | LifecycleError::Submission(_)
        )
    }
}
