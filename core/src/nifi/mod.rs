//! NiFi REST client
//!
//! Thin typed layer over the transport: health probe, controller status and
//! the four provenance query calls the lifecycle manager drives.

pub mod models;

pub use models::{FlowStatus, HealthProbe};

use serde_json::Value;
use tracing::{debug, error};

use crate::config::Settings;
use crate::credential::CredentialStore;
use crate::provenance::QueryHandle;
use crate::transport::{AsyncTransport, ReqwestTransport, Transport, TransportError};

use models::FlowStatusEnvelope;

/// Client for one NiFi instance
#[derive(Debug, Clone)]
pub struct NifiClient {
    base_url: String,
    transport: Transport,
    credentials: CredentialStore,
}

impl NifiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: impl Into<Transport>,
        credentials: CredentialStore,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport: transport.into(),
            credentials,
        }
    }

    /// Client using reqwest with the configured timeout and credential
    pub fn from_settings(settings: &Settings) -> Self {
        let transport = ReqwestTransport::with_timeout(settings.request_timeout_secs);
        Self::new(
            settings.nifi_api_url.clone(),
            transport,
            CredentialStore::new(settings.nifi_credential()),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Probe `/flow/about`; failures become `Unavailable`, never an error
    pub async fn health_check(&self) -> HealthProbe {
        match self.get_json("flow/about").await {
            Ok(about) => HealthProbe::Available(about),
            Err(e) => {
                error!("Health check failed: {}", e);
                HealthProbe::Unavailable(e.to_string())
            }
        }
    }

    pub async fn flow_status(&self) -> Result<FlowStatus, TransportError> {
        let body = self.get_json("flow/status").await?;
        let envelope: FlowStatusEnvelope = serde_json::from_value(body)?;
        Ok(envelope.controller_status)
    }

    /// Submit a provenance query; returns the acceptance body
    pub async fn submit_provenance(&self, request: &Value) -> Result<Value, TransportError> {
        let url = self.url("provenance");
        let body = serde_json::to_string(request)?;
        debug!(url = %url, "submitting provenance query");
        let response = self
            .transport
            .post_json(&url, &self.credentials.current(), &body)
            .await?;
        parse_json(&response)
    }

    /// Current status of a provenance query
    pub async fn provenance_status(&self, handle: &QueryHandle) -> Result<Value, TransportError> {
        self.get_json(&provenance_path(handle)).await
    }

    /// Full result payload of a finished provenance query
    pub async fn provenance_result(&self, handle: &QueryHandle) -> Result<Value, TransportError> {
        self.get_json(&provenance_path(handle)).await
    }

    /// Delete the server-side query resource
    pub async fn delete_provenance(&self, handle: &QueryHandle) -> Result<(), TransportError> {
        let url = self.url(&provenance_path(handle));
        self.transport
            .delete(&url, &self.credentials.current())
            .await
            .map(|_| ())
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        let response = self.transport.get(&url, &self.credentials.current()).await?;
        parse_json(&response)
    }
}

fn provenance_path(handle: &QueryHandle) -> String {
    format!("provenance/{}", handle.as_str())
}

fn parse_json(body: &str) -> Result<Value, TransportError> {
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FakeTransport, HttpMethod};

    fn client(fake: &FakeTransport) -> NifiClient {
        NifiClient::new(
            "https://nifi.local:8443/nifi-api/",
            fake.clone(),
            CredentialStore::default(),
        )
    }

    #[test]
    fn test_url_joining() {
        let client = client(&FakeTransport::new());
        assert_eq!(client.base_url(), "https://nifi.local:8443/nifi-api");
        assert_eq!(
            client.url("/flow/about"),
            "https://nifi.local:8443/nifi-api/flow/about"
        );
    }

    #[tokio::test]
    async fn test_health_check_available() {
        let fake = FakeTransport::new();
        fake.respond(HttpMethod::Get, "/flow/about", r#"{"about":{"title":"NiFi"}}"#);
        let probe = client(&fake).health_check().await;
        assert!(probe.is_available());
    }

    #[tokio::test]
    async fn test_health_check_unavailable_is_not_an_error() {
        let fake = FakeTransport::with_error("connection refused");
        let probe = client(&fake).health_check().await;
        assert_eq!(
            probe,
            HealthProbe::Unavailable("Network error: connection refused".to_string())
        );
    }

    #[tokio::test]
    async fn test_flow_status_parses_controller_status() {
        let fake = FakeTransport::new();
        fake.respond(
            HttpMethod::Get,
            "/flow/status",
            r#"{"controllerStatus":{"activeThreadCount":2,"bytesSent":10}}"#,
        );
        let status = client(&fake).flow_status().await.unwrap();
        assert_eq!(status.active_thread_count, 2);
        assert_eq!(status.bytes_sent, 10);
    }

    #[tokio::test]
    async fn test_provenance_calls_hit_expected_urls() {
        let fake = FakeTransport::new();
        fake.respond(HttpMethod::Post, "/provenance", r#"{"provenance":{"id":"q1"}}"#)
            .respond(HttpMethod::Delete, "/provenance/q1", "{}");
        let client = client(&fake);

        let accepted = client
            .submit_provenance(&serde_json::json!({"provenance": {}}))
            .await
            .unwrap();
        assert_eq!(accepted["provenance"]["id"], "q1");
        client
            .delete_provenance(&QueryHandle::new("q1"))
            .await
            .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].url, "https://nifi.local:8443/nifi-api/provenance");
        assert_eq!(calls[0].body.as_deref(), Some(r#"{"provenance":{}}"#));
        assert_eq!(calls[1].url, "https://nifi.local:8443/nifi-api/provenance/q1");
    }

    #[tokio::test]
    async fn test_non_json_body_is_json_error() {
        let fake = FakeTransport::new();
        fake.respond(HttpMethod::Get, "/provenance/q1", "<html>oops</html>");
        let result = client(&fake)
            .provenance_status(&QueryHandle::new("q1"))
            .await;
        assert!(matches!(result, Err(TransportError::Json(_))));
    }
}
