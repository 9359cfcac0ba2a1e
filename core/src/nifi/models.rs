//! NiFi REST payloads served back to the browser client

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Controller-wide flow status
///
/// Deserializes from NiFi's camelCase `controllerStatus`; serializes with
/// snake_case keys. Every counter defaults to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowStatus {
    #[serde(alias = "activeThreadCount")]
    pub active_thread_count: u64,
    #[serde(alias = "queued")]
    pub queued_count: String,
    #[serde(alias = "queuedSize")]
    pub queued_size: String,
    #[serde(alias = "bytesQueued")]
    pub bytes_queued: u64,
    #[serde(alias = "flowFilesQueued")]
    pub flowfiles_queued: u64,
    #[serde(alias = "bytesRead")]
    pub bytes_read: u64,
    #[serde(alias = "bytesWritten")]
    pub bytes_written: u64,
    #[serde(alias = "bytesReceived")]
    pub bytes_received: u64,
    #[serde(alias = "bytesSent")]
    pub bytes_sent: u64,
    #[serde(alias = "flowFilesReceived")]
    pub flowfiles_received: u64,
    #[serde(alias = "flowFilesSent")]
    pub flowfiles_sent: u64,
    #[serde(alias = "flowFilesTransferred")]
    pub flowfiles_transferred: u64,
    #[serde(alias = "bytesTransferred")]
    pub bytes_transferred: u64,
}

impl Default for FlowStatus {
    fn default() -> Self {
        Self {
            active_thread_count: 0,
            queued_count: "0".to_string(),
            queued_size: "0 bytes".to_string(),
            bytes_queued: 0,
            flowfiles_queued: 0,
            bytes_read: 0,
            bytes_written: 0,
            bytes_received: 0,
            bytes_sent: 0,
            flowfiles_received: 0,
            flowfiles_sent: 0,
            flowfiles_transferred: 0,
            bytes_transferred: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlowStatusEnvelope {
    #[serde(default, rename = "controllerStatus")]
    pub controller_status: FlowStatus,
}

/// Reachability of the event store
#[derive(Debug, Clone, PartialEq)]
pub enum HealthProbe {
    Available(Value),
    Unavailable(String),
}

impl HealthProbe {
    pub fn is_available(&self) -> bool {
        matches!(self, HealthProbe::Available(_))
    }
}
