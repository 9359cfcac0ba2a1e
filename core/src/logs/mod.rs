//! Processor log queries against Loki
//!
//! Loki is reached directly, or through a Grafana datasource proxy whose UID
//! is configured or discovered from Grafana's datasource list.

pub mod models;

pub use models::{LogLine, ProcessorLogEntry};

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::credential::CredentialStore;
use crate::transport::{AsyncTransport, Credential, ReqwestTransport, Transport, TransportError};

/// Datasource UID preferred during discovery
pub const PREFERRED_DATASOURCE_UID: &str = "grafanacloud-logs";
pub const DEFAULT_LOG_LIMIT: u32 = 100;
const QUERY_RANGE_PATH: &str = "loki/api/v1/query_range";

/// Log query errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LogQueryError {
    #[error("Log store authentication failed: {0}")]
    Authentication(String),

    #[error("Loki datasource '{0}' not found")]
    DatasourceNotFound(String),

    #[error("No Loki datasource found in Grafana")]
    NoLokiDatasource,

    #[error("Invalid log store URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid log store response: {0}")]
    InvalidResponse(String),

    #[error("Log store request failed: {0}")]
    Transport(TransportError),
}

impl From<TransportError> for LogQueryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Authentication(msg) => LogQueryError::Authentication(msg),
            TransportError::Json(msg) | TransportError::InvalidResponse(msg) => {
                LogQueryError::InvalidResponse(msg)
            }
            other => LogQueryError::Transport(other),
        }
    }
}

/// Where query_range requests go
#[derive(Debug, Clone, PartialEq, Eq)]
enum LokiRoute {
    Direct(String),
    Datasource(String),
    Discover,
}

/// Client for one Loki instance
#[derive(Debug, Clone)]
pub struct LokiClient {
    grafana_url: String,
    route: LokiRoute,
    service_name: String,
    transport: Transport,
    credentials: CredentialStore,
}

impl LokiClient {
    /// Direct Loki URL wins over a datasource UID; with neither, the UID is discovered
    pub fn new(
        grafana_url: impl Into<String>,
        loki_direct_url: Option<String>,
        datasource_uid: Option<String>,
        service_name: impl Into<String>,
        transport: impl Into<Transport>,
        credentials: CredentialStore,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let route = match (non_empty(loki_direct_url), non_empty(datasource_uid)) {
            (Some(url), _) => LokiRoute::Direct(url.trim_end_matches('/').to_string()),
            (None, Some(uid)) => LokiRoute::Datasource(uid),
            (None, None) => LokiRoute::Discover,
        };

        Self {
            grafana_url: grafana_url.into().trim_end_matches('/').to_string(),
            route,
            service_name: service_name.into(),
            transport: transport.into(),
            credentials,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let credential = settings.grafana_credential();
        if credential == Credential::Anonymous && settings.loki_direct_url.is_none() {
            warn!("No Grafana/Loki credentials configured");
        }
        Self::new(
            settings.grafana_url.clone(),
            settings.loki_direct_url.clone(),
            settings.loki_datasource_uid.clone(),
            settings.loki_service_name.clone(),
            ReqwestTransport::with_timeout(settings.request_timeout_secs),
            CredentialStore::new(credential),
        )
    }

    /// LogQL selecting one processor's lines
    pub fn processor_query(&self, processor_id: &str) -> String {
        format!(
            r#"{{service_name="{}"}} | json | attributes_processor_id="{}""#,
            escape_label(&self.service_name),
            escape_label(processor_id)
        )
    }

    /// Parsed log entries of one processor, newest first
    ///
    /// The window defaults to the hour before `end` (or before now).
    pub async fn processor_logs(
        &self,
        processor_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ProcessorLogEntry>, LogQueryError> {
        let logql = self.processor_query(processor_id);
        info!(processor_id, logql = %logql, "querying processor logs");

        let lines = self.query_range(&logql, start, end, limit).await?;
        debug!(processor_id, lines = lines.len(), "log lines returned");
        Ok(lines.into_iter().map(ProcessorLogEntry::from_line).collect())
    }

    /// Run a LogQL range query; lines come back newest first
    pub async fn query_range(
        &self,
        logql: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<LogLine>, LogQueryError> {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or(end - Duration::hours(1));
        let (start_ns, end_ns) = (nanos(start), nanos(end));

        let (base, credential) = self.query_base().await?;
        let url = Url::parse_with_params(
            &format!("{}/{}", base, QUERY_RANGE_PATH),
            &[
                ("query", logql.to_string()),
                ("start", start_ns.to_string()),
                ("end", end_ns.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .map_err(|e| LogQueryError::InvalidUrl(e.to_string()))?;

        debug!(url = %url, "querying Loki");
        let body = self
            .transport
            .get(url.as_str(), &credential)
            .await
            .map_err(|e| self.route_error(e))?;
        let response: Value = serde_json::from_str(&body).map_err(TransportError::from)?;

        let mut lines = parse_streams(&response);
        lines.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(lines)
    }

    /// Base URL and credential for query_range
    async fn query_base(&self) -> Result<(String, Credential), LogQueryError> {
        match &self.route {
            LokiRoute::Direct(url) => Ok((url.clone(), Credential::Anonymous)),
            LokiRoute::Datasource(uid) => Ok((self.proxy_base(uid), self.grafana_credential())),
            LokiRoute::Discover => {
                let uid = self.discover_datasource().await?;
                Ok((self.proxy_base(&uid), self.grafana_credential()))
            }
        }
    }

    /// Find a Loki datasource UID, preferring `grafanacloud-logs`
    pub async fn discover_datasource(&self) -> Result<String, LogQueryError> {
        let url = format!("{}/api/datasources", self.grafana_url);
        let body = self.transport.get(&url, &self.grafana_credential()).await?;
        let datasources: Value = serde_json::from_str(&body).map_err(TransportError::from)?;
        let datasources = datasources.as_array().ok_or_else(|| {
            LogQueryError::InvalidResponse("datasource list is not an array".to_string())
        })?;

        let loki: Vec<&Value> = datasources
            .iter()
            .filter(|ds| ds.get("type").and_then(Value::as_str) == Some("loki"))
            .collect();
        let chosen = loki
            .iter()
            .find(|ds| ds.get("uid").and_then(Value::as_str) == Some(PREFERRED_DATASOURCE_UID))
            .or_else(|| loki.first())
            .ok_or(LogQueryError::NoLokiDatasource)?;

        let uid = chosen
            .get("uid")
            .and_then(Value::as_str)
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| {
                LogQueryError::InvalidResponse("Loki datasource has no UID".to_string())
            })?;

        let name = chosen.get("name").and_then(Value::as_str).unwrap_or("");
        info!(name, uid, "using Loki datasource");
        Ok(uid.to_string())
    }

    fn proxy_base(&self, uid: &str) -> String {
        format!("{}/api/datasources/proxy/uid/{}", self.grafana_url, uid)
    }

    fn grafana_credential(&self) -> Credential {
        self.credentials.current().as_ref().clone()
    }

    fn route_error(&self, err: TransportError) -> LogQueryError {
        match (&err, &self.route) {
            (TransportError::Http { status: 404, .. }, LokiRoute::Datasource(uid)) => {
                LogQueryError::DatasourceNotFound(uid.clone())
            }
            _ => err.into(),
        }
    }
}

/// Flatten Loki's `data.result[].values[[ts_ns, line]]`
///
/// Malformed streams and entries are skipped.
pub fn parse_streams(response: &Value) -> Vec<LogLine> {
    let Some(streams) = response
        .get("data")
        .and_then(|data| data.get("result"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for stream in streams {
        let labels: BTreeMap<String, String> = stream
            .get("stream")
            .and_then(Value::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let Some(values) = stream.get("values").and_then(Value::as_array) else {
            continue;
        };
        for entry in values {
            let (Some(ts), Some(message)) = (
                entry.get(0).and_then(Value::as_str),
                entry.get(1).and_then(Value::as_str),
            ) else {
                warn!("skipping malformed Loki entry");
                continue;
            };
            let Ok(ts) = ts.parse::<i64>() else {
                warn!(timestamp = ts, "skipping Loki entry with bad timestamp");
                continue;
            };
            lines.push(LogLine {
                timestamp: Utc.timestamp_nanos(ts),
                message: message.to_string(),
                stream: labels.clone(),
            });
        }
    }
    lines
}

fn nanos(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt()
        .unwrap_or_else(|| time.timestamp().saturating_mul(1_000_000_000))
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
