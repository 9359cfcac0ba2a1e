use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw line from a Loki stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub stream: BTreeMap<String, String>,
}

/// Log line as served to the browser client
///
/// JSON lines are split into `body`, `attributes` and `resources`; any other
/// line becomes the body as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorLogEntry {
    pub timestamp: String,
    pub raw_message: String,
    pub stream: BTreeMap<String, String>,
    pub body: String,
    pub attributes: Value,
    pub resources: Value,
}

impl ProcessorLogEntry {
    pub fn from_line(line: LogLine) -> Self {
        let parsed = if line.message.trim_start().starts_with('{') {
            serde_json::from_str::<Map<String, Value>>(&line.message).ok()
        } else {
            None
        };

        let (body, attributes, resources) = match parsed {
            Some(mut fields) => {
                let body = match fields.remove("body") {
                    Some(Value::String(body)) => body,
                    Some(Value::Null) | None => line.message.clone(),
                    Some(other) => other.to_string(),
                };
                (
                    body,
                    fields.remove("attributes").unwrap_or_else(empty_object),
                    fields.remove("resources").unwrap_or_else(empty_object),
                )
            }
            None => (line.message.clone(), empty_object(), empty_object()),
        };

        Self {
            timestamp: line.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            raw_message: line.message,
            stream: line.stream,
            body,
            attributes,
            resources,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
