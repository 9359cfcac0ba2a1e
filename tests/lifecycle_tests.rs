//! Provenance query lifecycle tests
//!
//! Every test scripts the NiFi provenance endpoints on a `FakeTransport` and
//! checks both the returned outcome and the delete calls the fake observed.

use std::sync::Arc;
use std::time::Duration;

use flowlens_core::credential::CredentialStore;
use flowlens_core::nifi::NifiClient;
use flowlens_core::provenance::{
    LifecycleError, LifecycleManager, LifecycleMetrics, PollPolicy, QueryCriteria, QueryHandle,
    QueryLease,
};
use flowlens_core::transport::{FakeTransport, HttpMethod, TransportError};
use tokio_util::sync::CancellationToken;

const ACCEPTED: &str = r#"{"provenance":{"id":"q1","finished":false}}"#;
const PENDING: &str = r#"{"provenance":{"id":"q1","finished":false,"percentCompleted":40}}"#;
const FINISHED: &str = r#"{"provenance":{"id":"q1","finished":true,"percentCompleted":100}}"#;
const RESULTS: &str = r#"{
    "provenance": {
        "id": "q1",
        "finished": true,
        "results": {
            "provenanceEvents": [
                {"eventId": 3, "eventType": "RECEIVE", "componentName": "ListenHTTP", "flowFileUuid": "ff-1"},
                {"event_id": 4, "event_type": "ROUTE", "component_name": "RouteOnAttribute", "relationship": "matched"},
                {"eventId": 5, "eventType": "SEND", "transitUri": "s3://bucket/key"}
            ],
            "totalCount": 3
        }
    }
}"#;

const STATUS: &str = "/provenance/q1";

fn client(fake: &FakeTransport) -> NifiClient {
    NifiClient::new(
        "https://nifi.local:8443/nifi-api/",
        fake.clone(),
        CredentialStore::default(),
    )
}

fn manager(fake: &FakeTransport) -> LifecycleManager {
    LifecycleManager::new(client(fake), PollPolicy::default())
}

fn criteria() -> QueryCriteria {
    QueryCriteria::for_flow_file("ff-1").with_max_results(10)
}

fn deletes(fake: &FakeTransport) -> usize {
    fake.count(HttpMethod::Delete, STATUS)
}

fn accept(fake: &FakeTransport) {
    fake.respond(HttpMethod::Post, "/provenance", ACCEPTED)
        .respond(HttpMethod::Delete, STATUS, "{}");
}

#[tokio::test(start_paused = true)]
async fn test_delayed_finish_returns_events_and_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.respond_times(HttpMethod::Get, STATUS, PENDING, 3)
        .respond(HttpMethod::Get, STATUS, FINISHED)
        .respond(HttpMethod::Get, STATUS, RESULTS);

    let result = manager(&fake).run_event_query(&criteria()).await.unwrap();

    let ids: Vec<&str> = result.events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["3", "4", "5"]);
    assert_eq!(result.events[1].component_name.as_deref(), Some("RouteOnAttribute"));
    assert_eq!(result.skipped, 0);
    assert_eq!(result.total_count, Some(3));
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test]
async fn test_submission_body_matches_criteria() {
    let fake = FakeTransport::new();
    fake.respond(
        HttpMethod::Post,
        "/provenance",
        r#"{"provenance":{"results":{"provenanceEvents":[]}}}"#,
    );

    manager(&fake)
        .run_event_query(&criteria().with_summarize(true))
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    let body: serde_json::Value = serde_json::from_str(calls[0].body.as_deref().unwrap()).unwrap();
    let request = &body["provenance"]["request"];
    assert_eq!(request["maxResults"], 10);
    assert_eq!(request["summarize"], true);
    assert_eq!(request["searchTerms"]["FlowFileUUID"]["value"], "ff-1");
}

#[tokio::test]
async fn test_inline_results_skip_polling_and_cleanup() {
    let fake = FakeTransport::new();
    fake.respond(
        HttpMethod::Post,
        "/provenance",
        r#"{"provenance":{"finished":true,"results":{"provenanceEvents":[
            {"eventId": 1, "eventType": "CREATE"},
            {"eventId": 2, "eventType": "ATTRIBUTES_MODIFIED"},
            {"eventId": 9},
            {"event_id": 3, "event_type": "DROP"}
        ]}}}"#,
    );

    let result = manager(&fake).run_event_query(&criteria()).await.unwrap();

    assert_eq!(result.events.len(), 3);
    assert_eq!(result.skipped, 1);
    assert_eq!(fake.count(HttpMethod::Get, "/provenance"), 0);
    assert_eq!(fake.count(HttpMethod::Delete, "/provenance"), 0);
}

#[tokio::test]
async fn test_handle_with_inline_events_is_polled_and_deleted() {
    let fake = FakeTransport::new();
    fake.respond(
        HttpMethod::Post,
        "/provenance",
        r#"{"provenance":{"id":"q1","results":{"provenanceEvents":[{"eventId":1,"eventType":"CREATE"}]}}}"#,
    )
    .respond(HttpMethod::Delete, STATUS, "{}")
    .respond(HttpMethod::Get, STATUS, FINISHED)
    .respond(HttpMethod::Get, STATUS, RESULTS);

    let result = manager(&fake).run_event_query(&criteria()).await.unwrap();

    assert_eq!(result.events.len(), 3);
    assert_eq!(fake.count(HttpMethod::Get, STATUS), 2);
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finish_on_last_attempt() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.respond_times(HttpMethod::Get, STATUS, PENDING, 119)
        .respond(HttpMethod::Get, STATUS, FINISHED)
        .respond(HttpMethod::Get, STATUS, RESULTS);

    let result = manager(&fake).run_event_query(&criteria()).await;

    assert!(result.is_ok());
    // 120 status checks and one result fetch
    assert_eq!(fake.count(HttpMethod::Get, STATUS), 121);
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhausted_times_out_and_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.always(HttpMethod::Get, STATUS, Ok(PENDING.to_string()));

    let manager = manager(&fake);
    let result = manager.run_event_query(&criteria()).await;

    match result {
        Err(LifecycleError::TimedOut {
            handle, attempts, ..
        }) => {
            assert_eq!(handle, "q1");
            assert_eq!(attempts, 120);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(fake.count(HttpMethod::Get, STATUS), 120);
    assert_eq!(deletes(&fake), 1);
    assert_eq!(manager.metrics().timed_out, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.respond(HttpMethod::Get, STATUS, PENDING).respond(
        HttpMethod::Get,
        STATUS,
        r#"{"provenance":{"id":"q1","finished":false,"results":{"errors":["Unable to search index"]}}}"#,
    );

    let result = manager(&fake).run_event_query(&criteria()).await;

    assert_eq!(
        result,
        Err(LifecycleError::RemoteQueryFailed {
            handle: "q1".to_string(),
            reason: "Unable to search index".to_string(),
        })
    );
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_transport_error_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.respond(HttpMethod::Get, STATUS, PENDING).fail(
        HttpMethod::Get,
        STATUS,
        TransportError::Http {
            status: 503,
            message: "unavailable".to_string(),
        },
    );

    let result = manager(&fake).run_event_query(&criteria()).await;

    assert!(matches!(
        result,
        Err(LifecycleError::PollTransport { attempt: 2, .. })
    ));
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test]
async fn test_result_fetch_error_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.respond(HttpMethod::Get, STATUS, FINISHED).fail(
        HttpMethod::Get,
        STATUS,
        TransportError::Network("connection reset".to_string()),
    );

    let result = manager(&fake).run_event_query(&criteria()).await;

    assert!(matches!(result, Err(LifecycleError::ResultFetch { .. })));
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test]
async fn test_cleanup_failure_keeps_finished_result() {
    let fake = FakeTransport::new();
    fake.respond(HttpMethod::Post, "/provenance", ACCEPTED)
        .respond(HttpMethod::Get, STATUS, FINISHED)
        .respond(HttpMethod::Get, STATUS, RESULTS)
        .fail(
            HttpMethod::Delete,
            STATUS,
            TransportError::Http {
                status: 409,
                message: "conflict".to_string(),
            },
        );

    let manager = manager(&fake);
    let result = manager.run_event_query(&criteria()).await.unwrap();

    assert_eq!(result.events.len(), 3);
    assert_eq!(deletes(&fake), 1);
    let metrics = manager.metrics();
    assert_eq!(metrics.cleanup_failures, 1);
    assert_eq!(metrics.finished, 1);
}

#[tokio::test]
async fn test_submission_failure_issues_no_delete() {
    let fake = FakeTransport::with_error("connection refused");

    let result = manager(&fake).run_event_query(&criteria()).await;

    assert!(matches!(result, Err(LifecycleError::Submission(_))));
    assert_eq!(fake.count(HttpMethod::Delete, "/provenance"), 0);
}

#[tokio::test]
async fn test_malformed_acceptance_is_submission_error() {
    let fake = FakeTransport::new();
    fake.respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"finished":false}}"#);

    let result = manager(&fake).run_event_query(&criteria()).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Submission(TransportError::InvalidResponse(_)))
    ));
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_times_out_and_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.always(HttpMethod::Get, STATUS, Ok(PENDING.to_string()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(4500)).await;
        trigger.cancel();
    });

    let result = manager(&fake)
        .run_event_query_with_cancel(&criteria(), &cancel)
        .await;

    assert!(matches!(
        result,
        Err(LifecycleError::TimedOut { attempts: 5, .. })
    ));
    assert_eq!(fake.count(HttpMethod::Get, STATUS), 5);
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_invocation_still_deletes_once() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.always(HttpMethod::Get, STATUS, Ok(PENDING.to_string()));

    let manager = manager(&fake);
    let task = tokio::spawn(async move { manager.run_event_query(&criteria()).await });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fake.count(HttpMethod::Get, STATUS), 3);
    assert_eq!(deletes(&fake), 1);
}

#[tokio::test]
async fn test_panic_while_holding_lease_still_deletes_once() {
    let fake = FakeTransport::new();
    fake.respond(HttpMethod::Delete, STATUS, "{}");
    let metrics = Arc::new(LifecycleMetrics::new());

    let lease_client = client(&fake);
    let lease_metrics = Arc::clone(&metrics);
    let task = tokio::spawn(async move {
        let lease = QueryLease::acquire(QueryHandle::new("q1"), lease_client, lease_metrics);
        assert_eq!(lease.handle().as_str(), "q1");
        panic!("normalizer blew up");
    });

    assert!(task.await.unwrap_err().is_panic());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(deletes(&fake), 1);
    assert_eq!(metrics.snapshot().cleanups_issued, 1);
}

#[tokio::test]
async fn test_panic_inside_manager_deletes_once_and_propagates() {
    let fake = FakeTransport::new();
    accept(&fake);
    fake.panic_on(HttpMethod::Get, STATUS);

    let manager = manager(&fake);
    let observer = manager.clone();
    let task = tokio::spawn(async move { manager.run_event_query(&criteria()).await });

    assert!(task.await.unwrap_err().is_panic());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fake.count(HttpMethod::Get, STATUS), 1);
    assert_eq!(deletes(&fake), 1);
    assert_eq!(observer.metrics().cleanups_issued, 1);
}

#[tokio::test]
async fn test_concurrent_invocations_clean_up_their_own_handles() {
    let fake = FakeTransport::new();
    fake.respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"id":"a"}}"#)
        .respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"id":"b"}}"#)
        .always(HttpMethod::Get, "/provenance/a", Ok(RESULTS.to_string()))
        .always(HttpMethod::Get, "/provenance/b", Ok(RESULTS.to_string()))
        .respond(HttpMethod::Delete, "/provenance/a", "{}")
        .respond(HttpMethod::Delete, "/provenance/b", "{}");

    let manager = manager(&fake);
    let criteria = criteria();
    let (first, second) = tokio::join!(
        manager.run_event_query(&criteria),
        manager.run_event_query(&criteria)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(fake.count(HttpMethod::Delete, "/provenance/a"), 1);
    assert_eq!(fake.count(HttpMethod::Delete, "/provenance/b"), 1);
    assert_eq!(manager.metrics().invocations, 2);
}

#[test]
fn test_default_policy_is_one_second_by_120() {
    let policy = PollPolicy::default();
    assert_eq!(policy.interval, Duration::from_secs(1));
    assert_eq!(policy.max_attempts, 120);
}
