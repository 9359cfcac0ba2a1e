//! HTTP transport for the remote stores
//!
//! Provides the asynchronous HTTP seam used by the event-store and log-store
//! clients. Real requests go through reqwest; tests use scripted fixtures.

pub use crate::transport_fake::{FakeTransport, RecordedCall};
pub use crate::transport_reqwest::ReqwestTransport;
pub use crate::transport_types::{AsyncTransport, Credential, HttpMethod, TransportError};

use async_trait::async_trait;

/// Concrete transport enum
///
/// Wraps all transport types so clients stay concrete and cheaply cloneable
/// (a pending cleanup may need to own a clone past its caller's scope).
#[derive(Debug, Clone)]
pub enum Transport {
    Real(ReqwestTransport),
    Fake(FakeTransport),
}

#[async_trait]
impl AsyncTransport for Transport {
    async fn get(&self, url: &str, credential: &Credential) -> Result<String, TransportError> {
        match self {
            Transport::Real(t) => t.get(url, credential).await,
            Transport::Fake(t) => t.get(url, credential).await,
        }
    }

    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &str,
    ) -> Result<String, TransportError> {
        match self {
            Transport::Real(t) => t.post_json(url, credential, body).await,
            Transport::Fake(t) => t.post_json(url, credential, body).await,
        }
    }

    async fn delete(&self, url: &str, credential: &Credential) -> Result<String, TransportError> {
        match self {
            Transport::Real(t) => t.delete(url, credential).await,
            Transport::Fake(t) => t.delete(url, credential).await,
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Real(ReqwestTransport::new())
    }
}

impl From<FakeTransport> for Transport {
    fn from(fake: FakeTransport) -> Self {
        Transport::Fake(fake)
    }
}

impl From<ReqwestTransport> for Transport {
    fn from(real: ReqwestTransport) -> Self {
        Transport::Real(real)
    }
}
