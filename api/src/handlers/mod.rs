//! API Handlers Module
//!
//! Request handlers for the browser client.

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use flowlens_core::logs::{LogQueryError, LokiClient, ProcessorLogEntry, DEFAULT_LOG_LIMIT};
use flowlens_core::nifi::{FlowStatus, HealthProbe, NifiClient};
use flowlens_core::provenance::{
    LifecycleError, LifecycleManager, MetricsSnapshot, QueryCriteria, QueryResult,
};

use crate::models::{ErrorBody, HealthResponse, LineageParams, LogParams};

/// Handler result carrying a `{"detail": ...}` body on failure
pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

/// Represents the state of the API server
pub struct ApiState {
    /// NiFi REST client
    pub nifi: NifiClient,
    /// Provenance query lifecycle
    pub lifecycle: LifecycleManager,
    /// Loki log client
    pub logs: LokiClient,
}

fn failure(status: StatusCode, detail: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

fn health_response(
    nifi: &NifiClient,
    probe: HealthProbe,
    unhealthy: &str,
    ok: &str,
) -> HealthResponse {
    let (status, nifi_available, message) = match probe {
        HealthProbe::Available(_) => ("healthy", true, ok.to_string()),
        HealthProbe::Unavailable(reason) => (unhealthy, false, reason),
    };
    HealthResponse {
        status: status.to_string(),
        nifi_api_url: nifi.base_url().to_string(),
        nifi_available,
        message: Some(message),
    }
}

/// Root endpoint - health check
#[debug_handler]
pub async fn root(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let probe = state.nifi.health_check().await;
    Json(health_response(&state.nifi, probe, "degraded", "NiFi API is accessible"))
}

/// Detailed health check
#[debug_handler]
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let probe = state.nifi.health_check().await;
    Json(health_response(&state.nifi, probe, "unhealthy", "All systems operational"))
}

/// Controller status; zeros when NiFi cannot be reached
#[debug_handler]
pub async fn flow_status(State(state): State<Arc<ApiState>>) -> Json<FlowStatus> {
    info!("Fetching flow status");
    match state.nifi.flow_status().await {
        Ok(status) => Json(status),
        Err(e) => {
            error!("Failed to get flow status: {}", e);
            Json(FlowStatus::default())
        }
    }
}

/// Provenance events of one FlowFile
#[debug_handler]
pub async fn lineage(
    State(state): State<Arc<ApiState>>,
    Path(flow_file_uuid): Path<String>,
    Query(params): Query<LineageParams>,
) -> ApiResult<QueryResult> {
    let mut criteria = QueryCriteria::for_flow_file(flow_file_uuid)
        .with_window(params.start, params.end)
        .with_summarize(params.summarize.unwrap_or(false));
    if let Some(max_results) = params.max_results {
        criteria = criteria.with_max_results(max_results);
    }

    match state.lifecycle.run_event_query(&criteria).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            let status = lifecycle_status(&e);
            if status.is_server_error() {
                error!(
                    entity = criteria.entity(),
                    state = %e.terminal_state(),
                    "Lineage query failed: {}",
                    e
                );
            } else {
                warn!(entity = criteria.entity(), "Rejected lineage query: {}", e);
            }
            Err(failure(status, e.to_string()))
        }
    }
}

/// HTTP status for a lifecycle error
pub fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::Criteria(_) => StatusCode::BAD_REQUEST,
        LifecycleError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        LifecycleError::Submission(_)
        | LifecycleError::PollTransport { .. }
        | LifecycleError::RemoteQueryFailed { .. }
        | LifecycleError::ResultFetch { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// Recent log entries of one processor
#[debug_handler]
pub async fn processor_logs(
    State(state): State<Arc<ApiState>>,
    Path(processor_id): Path<String>,
    Query(params): Query<LogParams>,
) -> ApiResult<Vec<ProcessorLogEntry>> {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT).max(1);
    match state.logs.processor_logs(&processor_id, None, None, limit).await {
        Ok(entries) => Ok(Json(entries)),
        Err(e) => {
            error!("Failed to get processor logs for {}: {}", processor_id, e);
            Err(failure(StatusCode::BAD_GATEWAY, log_error_detail(&e)))
        }
    }
}

fn log_error_detail(err: &LogQueryError) -> String {
    format!("Log store error: {}", err)
}

/// Lifecycle counters
#[debug_handler]
pub async fn metrics(State(state): State<Arc<ApiState>>) -> Json<MetricsSnapshot> {
    Json(state.lifecycle.metrics())
}
