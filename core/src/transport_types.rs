//! Transport types
//!
//! Common types shared across transport implementations.

use std::fmt;

use async_trait::async_trait;

/// HTTP verbs used against the remote stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// Credential presented to a remote store.
///
/// Acquired and refreshed elsewhere; transports only read it.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    #[default]
    Anonymous,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}

// Keep secrets out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Anonymous => write!(f, "Anonymous"),
            Credential::Basic { username, .. } => {
                write!(f, "Basic {{ username: {:?}, password: \"***\" }}", username)
            }
            Credential::Bearer(_) => write!(f, "Bearer(\"***\")"),
        }
    }
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Network error (connection refused, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP error (non-2xx status)
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => TransportError::Json(err.to_string()),
            None => TransportError::Network(err.to_string()),
        }
    }
}

/// Asynchronous HTTP transport
///
/// Abstraction over the HTTP client so remote stores can be replaced by
/// `FakeTransport` in tests. Every method returns the raw response body.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    /// GET a resource
    async fn get(&self, url: &str, credential: &Credential) -> Result<String, TransportError>;

    /// POST a JSON body
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &str,
    ) -> Result<String, TransportError>;

    /// DELETE a resource
    async fn delete(&self, url: &str, credential: &Credential) -> Result<String, TransportError>;
}
