//! Poll loop
//!
//! Strictly sequential status checks for one handle under a fixed interval
//! and an attempt ceiling. No sleep follows the final attempt, so the worst
//! case wall time is `interval * (max_attempts - 1)` plus request latency.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::LifecycleError;
use super::submit::{envelope, extract_result_set};
use super::types::{PollOutcome, QueryHandle, RawResultSet};
use crate::nifi::NifiClient;
use crate::transport::TransportError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Interval and attempt ceiling for one poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    /// Total sleep time when every attempt comes back pending
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Status of a remote query as reported by one status body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Finished,
    Failed(String),
}

/// Classify a status body; first matching rule wins
pub fn classify_status(body: &Value) -> RemoteStatus {
    let query = envelope(body);

    if let Some(state) = ["status", "state"]
        .iter()
        .find_map(|key| query.get(*key).and_then(Value::as_str))
    {
        return match state.trim().to_ascii_lowercase().as_str() {
            "failed" | "failure" | "error" => RemoteStatus::Failed(
                failure_reason(query).unwrap_or_else(|| format!("remote status '{}'", state)),
            ),
            "finished" | "complete" | "completed" | "done" => RemoteStatus::Finished,
            _ => RemoteStatus::Pending,
        };
    }

    if let Some(reason) = failure_reason(query) {
        return RemoteStatus::Failed(reason);
    }

    if let Some(errors) = query
        .get("results")
        .and_then(|results| results.get("errors"))
        .and_then(Value::as_array)
        .filter(|errors| !errors.is_empty())
    {
        let reasons: Vec<String> = errors
            .iter()
            .map(|error| match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return RemoteStatus::Failed(reasons.join("; "));
    }

    let finished = ["finished", "is_finished"]
        .iter()
        .any(|key| query.get(*key).and_then(Value::as_bool) == Some(true));
    if finished {
        RemoteStatus::Finished
    } else {
        RemoteStatus::Pending
    }
}

fn failure_reason(query: &Value) -> Option<String> {
    ["failureReason", "failure_reason"]
        .iter()
        .filter_map(|key| query.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|reason| !reason.is_empty())
        .map(str::to_string)
}

/// Poll `handle` until it reaches a terminal state
///
/// Transport failures end the loop immediately. Cancelling `cancel` turns the
/// remaining budget into `TimedOut`. On `Finished` the full result payload is
/// fetched with a separate request.
pub async fn poll_until_terminal(
    client: &NifiClient,
    handle: &QueryHandle,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<PollOutcome, LifecycleError> {
    let started = Instant::now();
    let max_attempts = policy.attempts();

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Ok(cancelled(handle, attempt - 1, started));
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(cancelled(handle, attempt, started)),
            status = client.provenance_status(handle) => status,
        };

        let body = status.map_err(|source| LifecycleError::PollTransport {
            handle: handle.to_string(),
            attempt,
            source,
        })?;

        match classify_status(&body) {
            RemoteStatus::Finished => {
                info!(handle = %handle, attempt, "query finished");
                let results = fetch_results(client, handle).await?;
                return Ok(PollOutcome::Finished(results));
            }
            RemoteStatus::Failed(reason) => {
                warn!(handle = %handle, attempt, reason = %reason, "remote query failed");
                return Ok(PollOutcome::Failed(reason));
            }
            RemoteStatus::Pending => {
                debug!(handle = %handle, attempt, max_attempts, "query pending");
            }
        }

        if attempt < max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(cancelled(handle, attempt, started)),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    let elapsed = started.elapsed();
    warn!(handle = %handle, attempts = max_attempts, ?elapsed, "poll budget exhausted");
    Ok(PollOutcome::TimedOut {
        attempts: max_attempts,
        elapsed,
    })
}

async fn fetch_results(
    client: &NifiClient,
    handle: &QueryHandle,
) -> Result<RawResultSet, LifecycleError> {
    let fetch_error = |source: TransportError| LifecycleError::ResultFetch {
        handle: handle.to_string(),
        source,
    };

    let body = client.provenance_result(handle).await.map_err(fetch_error)?;
    extract_result_set(&body).ok_or_else(|| {
        fetch_error(TransportError::InvalidResponse(
            "finished query carries no event list".to_string(),
        ))
    })
}

fn cancelled(handle: &QueryHandle, attempts: u32, started: Instant) -> PollOutcome {
    let elapsed = started.elapsed();
    info!(handle = %handle, attempts, ?elapsed, "polling cancelled");
    PollOutcome::TimedOut { attempts, elapsed }
}
