//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowlens_core::Settings;

/// API server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl ApiConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.api_host.clone(),
            port: settings.api_port,
            cors_origins: settings.cors_origins.clone(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub nifi_api_url: String,
    pub nifi_available: bool,
    pub message: Option<String>,
}

/// Query string of the lineage endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineageParams {
    pub max_results: Option<u32>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub summarize: Option<bool>,
}

/// Query string of the processor log endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogParams {
    pub limit: Option<u32>,
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
