//! Scoped ownership of a remote query handle
//!
//! A `QueryLease` is the only owner of a `QueryHandle` once the event store
//! has accepted a query. The delete request goes out exactly once: either
//! through `release`, or from `Drop` when the owning future was dropped
//! before it could release.
//!
//! The `Drop` path can only spawn the delete onto the current runtime. If
//! that runtime shuts down before the task completes, the remote query is
//! left to NiFi's own expiry; the abandoned task logs an error and counts a
//! cleanup failure.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::metrics::LifecycleMetrics;
use super::types::QueryHandle;
use crate::nifi::NifiClient;
use crate::transport::TransportError;

/// Result of the single delete request for a handle
#[derive(Debug, Clone, PartialEq)]
pub enum CleanupOutcome {
    Deleted,
    /// Logged and counted; never surfaced to the caller of the lifecycle
    Failed(TransportError),
}

#[derive(Debug)]
pub struct QueryLease {
    handle: QueryHandle,
    client: NifiClient,
    metrics: Arc<LifecycleMetrics>,
    released: bool,
}

impl QueryLease {
    pub fn acquire(
        handle: QueryHandle,
        client: NifiClient,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        debug!(handle = %handle, "lease acquired");
        Self {
            handle,
            client,
            metrics,
            released: false,
        }
    }

    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    /// Delete the remote query and end the lease
    pub async fn release(mut self) -> CleanupOutcome {
        // Marked first: a release interrupted mid-request must not be retried from Drop.
        self.released = true;
        delete_query(&self.client, &self.handle, &self.metrics).await
    }
}

impl Drop for QueryLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let handle = std::mem::replace(&mut self.handle, QueryHandle::new(String::new()));
        let client = self.client.clone();
        let metrics = Arc::clone(&self.metrics);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(handle = %handle, "lease dropped before release, deleting in background");
                let pending = PendingDelete::new(&handle, Arc::clone(&metrics));
                runtime.spawn(async move {
                    delete_query(&client, &handle, &metrics).await;
                    pending.finish();
                });
            }
            Err(_) => {
                error!(
                    handle = %handle,
                    "lease dropped outside a tokio runtime, remote query not deleted"
                );
                metrics.record_cleanup(false);
            }
        }
    }
}

/// Background delete that has not completed yet
struct PendingDelete {
    handle: String,
    metrics: Arc<LifecycleMetrics>,
    finished: bool,
}

impl PendingDelete {
    fn new(handle: &QueryHandle, metrics: Arc<LifecycleMetrics>) -> Self {
        Self {
            handle: handle.to_string(),
            metrics,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for PendingDelete {
    fn drop(&mut self) {
        if !self.finished {
            error!(
                handle = %self.handle,
                "background delete abandoned by runtime shutdown, remote query not deleted"
            );
            self.metrics.record_cleanup(false);
        }
    }
}

async fn delete_query(
    client: &NifiClient,
    handle: &QueryHandle,
    metrics: &LifecycleMetrics,
) -> CleanupOutcome {
    match client.delete_provenance(handle).await {
        Ok(()) => {
            metrics.record_cleanup(true);
            info!(handle = %handle, "remote query deleted");
            CleanupOutcome::Deleted
        }
        Err(e) => {
            metrics.record_cleanup(false);
            warn!(handle = %handle, error = %e, "failed to delete remote query");
            CleanupOutcome::Failed(e)
        }
    }
}
