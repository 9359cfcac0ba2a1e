//! Real HTTP transport using reqwest
//!
//! One `reqwest::Client` per transport; clones share the connection pool.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

use crate::transport_types::{AsyncTransport, Credential, HttpMethod, TransportError};

/// Real HTTP transport using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create new transport with default timeout (30s)
    pub fn new() -> Self {
        Self::with_timeout(30)
    }

    /// Create transport with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Timeout applied to every request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, method: HttpMethod, url: &str, credential: &Credential) -> RequestBuilder {
        let builder = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Delete => self.client.delete(url),
        }
        .timeout(self.timeout)
        .header("Accept", "application/json");

        match credential {
            Credential::Anonymous => builder,
            Credential::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            Credential::Bearer(token) => builder.bearer_auth(token),
        }
    }

    async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<String, TransportError> {
        debug!(%method, url, "sending request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Authentication(format!(
                "{} {} returned {}",
                method, url, status
            )));
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }
        Ok(body)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncTransport for ReqwestTransport {
    async fn get(&self, url: &str, credential: &Credential) -> Result<String, TransportError> {
        let builder = self.request(HttpMethod::Get, url, credential);
        self.execute(HttpMethod::Get, url, builder).await
    }

    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &str,
    ) -> Result<String, TransportError> {
        let builder = self
            .request(HttpMethod::Post, url, credential)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        self.execute(HttpMethod::Post, url, builder).await
    }

    async fn delete(&self, url: &str, credential: &Credential) -> Result<String, TransportError> {
        let builder = self.request(HttpMethod::Delete, url, credential);
        self.execute(HttpMethod::Delete, url, builder).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
