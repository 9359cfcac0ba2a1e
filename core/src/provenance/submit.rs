//! Query submission
//!
//! One POST per invocation. The acceptance body either carries the whole
//! answer (no handle, events present) or a handle for a query the event store
//! is still running. A handle always wins: any acceptance with an `id` holds
//! server-side state that must be deleted later.

use serde_json::Value;
use tracing::{debug, info};

use super::criteria::QueryCriteria;
use super::types::{QueryHandle, RawResultSet};
use crate::nifi::NifiClient;
use crate::transport::TransportError;

/// What the event store did with a submission
#[derive(Debug, PartialEq)]
pub enum Submission {
    /// Answered synchronously; nothing to clean up
    Inline(RawResultSet),
    /// Still running under this handle
    Accepted(QueryHandle),
}

/// Submit `criteria` and classify the acceptance
pub async fn submit(
    client: &NifiClient,
    criteria: &QueryCriteria,
) -> Result<Submission, TransportError> {
    let body = criteria.to_request_body();
    debug!(
        entity = criteria.entity(),
        max_results = criteria.max_results(),
        "submitting query"
    );
    let acceptance = client.submit_provenance(&body).await?;
    let submission = classify_acceptance(&acceptance)?;

    match &submission {
        Submission::Inline(results) => {
            info!(records = results.len(), "query answered inline")
        }
        Submission::Accepted(handle) => info!(handle = %handle, "query accepted"),
    }
    Ok(submission)
}

/// Classify an acceptance body
pub fn classify_acceptance(acceptance: &Value) -> Result<Submission, TransportError> {
    let query = envelope(acceptance);

    if let Some(id) = query.get("id").and_then(handle_text) {
        return Ok(Submission::Accepted(QueryHandle::new(id)));
    }

    extract_result_set(acceptance).map(Submission::Inline).ok_or_else(|| {
        TransportError::InvalidResponse(
            "acceptance carries neither a query id nor inline results".to_string(),
        )
    })
}

/// Pull the ordered event list (and total, if reported) out of a query body
///
/// Accepts both the enveloped form (`{"provenance": {"results": ...}}`) and a
/// bare query object.
pub fn extract_result_set(body: &Value) -> Option<RawResultSet> {
    let query = envelope(body);
    let results = query.get("results").unwrap_or(query);

    let records = ["provenanceEvents", "provenance_events", "events"]
        .iter()
        .find_map(|key| results.get(*key).and_then(Value::as_array))?;

    let total = ["totalCount", "total_count", "total"]
        .iter()
        .find_map(|key| results.get(*key).and_then(Value::as_u64));

    Some(RawResultSet {
        records: records.clone(),
        total,
    })
}

/// Unwrap the `provenance` envelope when present
pub(crate) fn envelope(body: &Value) -> &Value {
    body.get("provenance")
        .filter(|inner| inner.is_object())
        .unwrap_or(body)
}

fn handle_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
