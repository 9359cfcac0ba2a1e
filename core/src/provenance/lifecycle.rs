//! Lifecycle manager
//!
//! submit -> (poll) -> normalize -> cleanup -> return, for one query at a
//! time. Every path that obtained a handle passes through `QueryLease`, so
//! the remote query is deleted whatever the outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::criteria::QueryCriteria;
use super::error::LifecycleError;
use super::lease::{CleanupOutcome, QueryLease};
use super::metrics::{LifecycleMetrics, MetricsSnapshot};
use super::normalize::into_query_result;
use super::poll::{poll_until_terminal, PollPolicy};
use super::submit::{submit, Submission};
use super::types::{LifecycleState, PollOutcome, QueryHandle, QueryResult, RawResultSet};
use crate::nifi::NifiClient;

/// Runs provenance queries against one event store
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    client: NifiClient,
    policy: PollPolicy,
    deadline: Option<Duration>,
    metrics: Arc<LifecycleMetrics>,
}

impl LifecycleManager {
    pub fn new(client: NifiClient, policy: PollPolicy) -> Self {
        Self {
            client,
            policy,
            deadline: None,
            metrics: Arc::new(LifecycleMetrics::new()),
        }
    }

    /// Overall polling deadline on top of the attempt ceiling
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn client(&self) -> &NifiClient {
        &self.client
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn run_event_query(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<QueryResult, LifecycleError> {
        self.run_event_query_with_cancel(criteria, &CancellationToken::new())
            .await
    }

    /// Run one query; cancelling `cancel` ends polling as `TimedOut`
    pub async fn run_event_query_with_cancel(
        &self,
        criteria: &QueryCriteria,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, LifecycleError> {
        self.metrics.record_invocation();

        if let Err(e) = criteria.validate() {
            self.metrics.record_rejected();
            return Err(e.into());
        }

        info!(
            entity = criteria.entity(),
            state = %LifecycleState::Submitted,
            "starting provenance query"
        );

        let submission = match submit(&self.client, criteria).await {
            Ok(submission) => submission,
            Err(e) => {
                self.metrics.record_rejected();
                error!(entity = criteria.entity(), error = %e, "query submission failed");
                return Err(LifecycleError::Submission(e));
            }
        };

        match submission {
            Submission::Inline(results) => {
                self.metrics.record_inline();
                let result = self.normalize(results);
                info!(
                    entity = criteria.entity(),
                    state = %LifecycleState::InlineDone,
                    events = result.events.len(),
                    skipped = result.skipped,
                    "query answered inline"
                );
                Ok(result)
            }
            Submission::Accepted(handle) => {
                let lease =
                    QueryLease::acquire(handle, self.client.clone(), Arc::clone(&self.metrics));

                let outcome = AssertUnwindSafe(self.drive(lease.handle(), cancel))
                    .catch_unwind()
                    .await;

                let handle_text = lease.handle().to_string();
                let cleanup = lease.release().await;
                info!(
                    handle = %handle_text,
                    state = %LifecycleState::CleanupDone,
                    deleted = cleanup == CleanupOutcome::Deleted,
                    "query lifecycle complete"
                );

                match outcome {
                    Ok(result) => {
                        self.record_outcome(&result);
                        result
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        }
    }

    async fn drive(
        &self,
        handle: &QueryHandle,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, LifecycleError> {
        info!(handle = %handle, state = %LifecycleState::Polling, "polling query");

        let token = cancel.child_token();
        // Cancels the deadline timer once polling ends.
        let _stop_timer = token.clone().drop_guard();
        if let Some(deadline) = self.deadline {
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => timer.cancel(),
                    _ = timer.cancelled() => {}
                }
            });
        }

        let outcome = poll_until_terminal(&self.client, handle, &self.policy, &token)
            .await
            .map_err(|e| {
                error!(handle = %handle, state = %e.terminal_state(), error = %e, "polling failed");
                e
            })?;

        match outcome {
            PollOutcome::Finished(results) => {
                let result = self.normalize(results);
                info!(
                    handle = %handle,
                    state = %LifecycleState::Finished,
                    events = result.events.len(),
                    skipped = result.skipped,
                    "query finished"
                );
                Ok(result)
            }
            PollOutcome::Failed(reason) => {
                error!(
                    handle = %handle,
                    state = %LifecycleState::Failed,
                    reason = %reason,
                    "remote query failed"
                );
                Err(LifecycleError::RemoteQueryFailed {
                    handle: handle.to_string(),
                    reason,
                })
            }
            PollOutcome::TimedOut { attempts, elapsed } => {
                error!(
                    handle = %handle,
                    state = %LifecycleState::TimedOut,
                    attempts,
                    ?elapsed,
                    "query timed out"
                );
                Err(LifecycleError::TimedOut {
                    handle: handle.to_string(),
                    attempts,
                    elapsed,
                })
            }
            // The poll loop only returns terminal outcomes.
            PollOutcome::Pending => Err(LifecycleError::TimedOut {
                handle: handle.to_string(),
                attempts: self.policy.max_attempts,
                elapsed: Duration::ZERO,
            }),
        }
    }

    fn normalize(&self, results: RawResultSet) -> QueryResult {
        let result = into_query_result(results);
        self.metrics
            .record_normalized(result.events.len(), result.skipped);
        result
    }

    fn record_outcome(&self, result: &Result<QueryResult, LifecycleError>) {
        match result {
            Ok(_) => self.metrics.record_finished(),
            Err(LifecycleError::RemoteQueryFailed { .. }) => self.metrics.record_failed(),
            Err(LifecycleError::TimedOut { .. }) => self.metrics.record_timed_out(),
            Err(LifecycleError::PollTransport { .. }) | Err(LifecycleError::ResultFetch { .. }) => {
                self.metrics.record_transport_error()
            }
            Err(LifecycleError::Criteria(_)) | Err(LifecycleError::Submission(_)) => {
                self.metrics.record_rejected()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialStore;
    use crate::transport::{FakeTransport, HttpMethod, TransportError};

    fn manager(fake: &FakeTransport, max_attempts: u32) -> LifecycleManager {
        let client = NifiClient::new(
            "http://nifi/nifi-api",
            fake.clone(),
            CredentialStore::default(),
        );
        LifecycleManager::new(
            client,
            PollPolicy {
                interval: Duration::from_millis(5),
                max_attempts,
            },
        )
    }

    #[tokio::test]
    async fn test_invalid_criteria_makes_no_calls() {
        let fake = FakeTransport::new();
        let result = manager(&fake, 3)
            .run_event_query(&QueryCriteria::for_flow_file(""))
            .await;
        assert!(matches!(result, Err(LifecycleError::Criteria(_))));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure_has_no_cleanup() {
        let fake = FakeTransport::new();
        fake.fail(
            HttpMethod::Post,
            "/provenance",
            TransportError::Authentication("401".to_string()),
        );
        let manager = manager(&fake, 3);

        let result = manager
            .run_event_query(&QueryCriteria::for_flow_file("ff"))
            .await;

        assert!(matches!(result, Err(LifecycleError::Submission(_))));
        assert_eq!(fake.count(HttpMethod::Delete, "/provenance"), 0);
        assert_eq!(manager.metrics().rejected, 1);
    }

    #[tokio::test]
    async fn test_finished_records_metrics() {
        let fake = FakeTransport::new();
        fake.respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"id":"q1"}}"#)
            .respond(HttpMethod::Get, "/provenance/q1", r#"{"provenance":{"finished":true}}"#)
            .respond(
                HttpMethod::Get,
                "/provenance/q1",
                r#"{"provenance":{"results":{"provenanceEvents":[{"eventId":1,"eventType":"SEND"},{"eventId":2}]}}}"#,
            )
            .respond(HttpMethod::Delete, "/provenance/q1", "{}");
        let manager = manager(&fake, 3);

        let result = manager
            .run_event_query(&QueryCriteria::for_flow_file("ff"))
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.skipped, 1);
        let metrics = manager.metrics();
        assert_eq!(metrics.finished, 1);
        assert_eq!(metrics.cleanups_issued, 1);
        assert_eq!(metrics.records_skipped, 1);
    }

    #[tokio::test]
    async fn test_panic_while_polling_releases_then_resumes() {
        let fake = FakeTransport::new();
        fake.respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"id":"q1"}}"#)
            .panic_on(HttpMethod::Get, "/provenance/q1")
            .respond(HttpMethod::Delete, "/provenance/q1", "{}");
        let manager = manager(&fake, 3);

        let criteria = QueryCriteria::for_flow_file("ff");
        let outcome = AssertUnwindSafe(manager.run_event_query(&criteria))
            .catch_unwind()
            .await;

        assert!(outcome.is_err());
        assert_eq!(fake.count(HttpMethod::Get, "/provenance/q1"), 1);
        assert_eq!(fake.count(HttpMethod::Delete, "/provenance/q1"), 1);
        let metrics = manager.metrics();
        assert_eq!(metrics.cleanups_issued, 1);
        assert_eq!(metrics.finished, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out_and_cleans_up() {
        let fake = FakeTransport::new();
        fake.respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"id":"q1"}}"#)
            .always(
                HttpMethod::Get,
                "/provenance/q1",
                Ok(r#"{"provenance":{"finished":false}}"#.to_string()),
            )
            .respond(HttpMethod::Delete, "/provenance/q1", "{}");
        let client = NifiClient::new(
            "http://nifi/nifi-api",
            fake.clone(),
            CredentialStore::default(),
        );
        let manager = LifecycleManager::new(client, PollPolicy::default())
            .with_deadline(Duration::from_millis(3500));

        let result = manager
            .run_event_query(&QueryCriteria::for_flow_file("ff"))
            .await;

        match result {
            Err(LifecycleError::TimedOut { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(fake.count(HttpMethod::Delete, "/provenance/q1"), 1);
        assert_eq!(manager.metrics().timed_out, 1);
    }
}
