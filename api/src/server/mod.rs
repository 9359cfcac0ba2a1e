//! API Server Module
//!
//! Router construction and the listening loop.

use anyhow::{Context, Result};
use axum::{http::HeaderValue, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use flowlens_core::{LifecycleManager, LokiClient, NifiClient, Settings};

use crate::handlers::{flow_status, health_check, lineage, metrics, processor_logs, root, ApiState};
use crate::models::ApiConfig;

/// Main API server
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: ApiState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Server wired to the remote stores named in `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        let nifi = NifiClient::from_settings(settings);
        let lifecycle = LifecycleManager::new(nifi.clone(), settings.poll_policy());
        let logs = LokiClient::from_settings(settings);
        Self::new(
            ApiConfig::from_settings(settings),
            ApiState {
                nifi,
                lifecycle,
                logs,
            },
        )
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.config.cors_origins)
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        info!("NiFi API URL: {}", self.state.nifi.base_url());
        let probe = self.state.nifi.health_check().await;
        if probe.is_available() {
            info!("Successfully connected to NiFi API");
        } else {
            warn!("Could not connect to NiFi API: {:?}", probe);
        }

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| {
                format!("Invalid listen address {}:{}", self.config.host, self.config.port)
            })?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("FlowLens API server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

        info!("Shutting down FlowLens API server");
        Ok(())
    }
}

/// Build the application router
pub fn router(state: Arc<ApiState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .route("/api/flow/status", get(flow_status))
        .route("/api/lineage/:flow_file_uuid", get(lineage))
        .route("/api/processors/:processor_id/logs", get(processor_logs))
        .route("/api/metrics", get(metrics))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
