//! FlowLens Core
//!
//! Clients for the NiFi event store and the Loki log store, plus the
//! provenance query lifecycle that sits on top of them.

pub mod config;
pub mod credential;
pub mod logs;
pub mod nifi;
pub mod provenance;
pub mod transport;
mod transport_fake;
mod transport_reqwest;
mod transport_types;

pub use config::Settings;
pub use credential::CredentialStore;
pub use logs::{LogQueryError, LokiClient};
pub use nifi::NifiClient;
pub use provenance::{
    LifecycleError, LifecycleManager, NormalizedEvent, PollPolicy, QueryCriteria, QueryResult,
};
pub use transport::{AsyncTransport, Credential, Transport, TransportError};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
