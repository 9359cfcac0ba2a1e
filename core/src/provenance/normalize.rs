//! Provenance event normalization
//!
//! Converts loosely-typed event store records into `NormalizedEvent`.
//!
//! Each canonical field has an ordered list of candidate keys. snake_case
//! (our own wire format) is tried before the event store's camelCase, and a
//! key holding null or an empty string counts as absent. Only the identifier
//! and the event type are required; a record missing either is skipped, never
//! an error for the whole batch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::types::{QueryResult, RawEventRecord, RawResultSet};

pub const EVENT_ID_KEYS: &[&str] = &["event_id", "eventId", "id"];
pub const EVENT_TIME_KEYS: &[&str] = &["event_time", "eventTime"];
pub const EVENT_TYPE_KEYS: &[&str] = &["event_type", "eventType"];
pub const FLOW_FILE_UUID_KEYS: &[&str] = &["flow_file_uuid", "flowFileUuid"];
pub const COMPONENT_ID_KEYS: &[&str] = &["component_id", "componentId"];
pub const COMPONENT_TYPE_KEYS: &[&str] = &["component_type", "componentType"];
pub const COMPONENT_NAME_KEYS: &[&str] = &["component_name", "componentName"];
pub const RELATIONSHIP_KEYS: &[&str] = &["relationship"];
pub const TRANSIT_URI_KEYS: &[&str] = &["transit_uri", "transitUri"];
pub const PREVIOUS_ATTRIBUTES_KEYS: &[&str] = &["previous_attributes", "previousAttributes"];
pub const UPDATED_ATTRIBUTES_KEYS: &[&str] = &["updated_attributes", "updatedAttributes"];
pub const CONTENT_CLAIM_KEYS: &[&str] = &[
    "content_claim_identifier",
    "contentClaimIdentifier",
    "output_content_claim_identifier",
    "outputContentClaimIdentifier",
];
pub const DETAILS_KEYS: &[&str] = &["details", "detail"];

/// NiFi's combined attribute list: `[{name, value, previousValue}]`
const ATTRIBUTE_LIST_KEYS: &[&str] = &["attributes"];
const ATTRIBUTE_NAME_KEYS: &[&str] = &["name"];
const ATTRIBUTE_VALUE_KEYS: &[&str] = &["value"];
const ATTRIBUTE_PREVIOUS_VALUE_KEYS: &[&str] = &["previous_value", "previousValue"];

/// Canonical provenance event served to the browser client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_id: String,
    pub event_time: Option<String>,
    pub event_type: String,
    pub flow_file_uuid: Option<String>,
    pub component_id: Option<String>,
    pub component_type: Option<String>,
    pub component_name: Option<String>,
    pub relationship: Option<String>,
    pub transit_uri: Option<String>,
    pub previous_attributes: BTreeMap<String, String>,
    pub updated_attributes: BTreeMap<String, String>,
    pub content_claim: Option<String>,
    pub details: Option<String>,
}

/// Why a record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingIdentifier,
    MissingEventType,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "record is not a JSON object"),
            SkipReason::MissingIdentifier => write!(f, "no event identifier under any known key"),
            SkipReason::MissingEventType => write!(f, "no event type under any known key"),
        }
    }
}

/// Per-record normalization outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Emitted(NormalizedEvent),
    Skipped(SkipReason),
}

/// Normalize one record
pub fn normalize_record(record: &RawEventRecord) -> RecordOutcome {
    let Some(fields) = record.as_object() else {
        return RecordOutcome::Skipped(SkipReason::NotAnObject);
    };

    let Some(event_id) = text_field(fields, EVENT_ID_KEYS) else {
        return RecordOutcome::Skipped(SkipReason::MissingIdentifier);
    };
    let Some(event_type) = text_field(fields, EVENT_TYPE_KEYS) else {
        return RecordOutcome::Skipped(SkipReason::MissingEventType);
    };

    let attribute_list = lookup(fields, ATTRIBUTE_LIST_KEYS).and_then(Value::as_array);

    let previous_attributes = match lookup(fields, PREVIOUS_ATTRIBUTES_KEYS) {
        Some(value) => attribute_map(value, ATTRIBUTE_PREVIOUS_VALUE_KEYS),
        None => attribute_list
            .map(|list| attributes_from_list(list, ATTRIBUTE_PREVIOUS_VALUE_KEYS))
            .unwrap_or_default(),
    };
    let updated_attributes = match lookup(fields, UPDATED_ATTRIBUTES_KEYS) {
        Some(value) => attribute_map(value, ATTRIBUTE_VALUE_KEYS),
        None => attribute_list
            .map(|list| attributes_from_list(list, ATTRIBUTE_VALUE_KEYS))
            .unwrap_or_default(),
    };

    RecordOutcome::Emitted(NormalizedEvent {
        event_id,
        event_time: text_field(fields, EVENT_TIME_KEYS),
        event_type,
        flow_file_uuid: text_field(fields, FLOW_FILE_UUID_KEYS),
        component_id: text_field(fields, COMPONENT_ID_KEYS),
        component_type: text_field(fields, COMPONENT_TYPE_KEYS),
        component_name: text_field(fields, COMPONENT_NAME_KEYS),
        relationship: text_field(fields, RELATIONSHIP_KEYS),
        transit_uri: text_field(fields, TRANSIT_URI_KEYS),
        previous_attributes,
        updated_attributes,
        content_claim: text_field(fields, CONTENT_CLAIM_KEYS),
        details: text_field(fields, DETAILS_KEYS),
    })
}

/// Normalize a whole result set, keeping remote order
///
/// Returns the emitted events and the number of skipped records.
pub fn normalize_all(records: &[RawEventRecord]) -> (Vec<NormalizedEvent>, usize) {
    let mut events = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for (index, record) in records.iter().enumerate() {
        match normalize_record(record) {
            RecordOutcome::Emitted(event) => events.push(event),
            RecordOutcome::Skipped(reason) => {
                skipped += 1;
                warn!(index, %reason, "skipping provenance record");
            }
        }
    }

    (events, skipped)
}

/// Build the invocation output from a raw result set
pub fn into_query_result(results: RawResultSet) -> QueryResult {
    let (events, skipped) = normalize_all(&results.records);
    QueryResult {
        events,
        skipped,
        total_count: results.total,
        executed_at: chrono::Utc::now(),
    }
}

/// First candidate key holding something other than null
fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

/// First candidate key that renders to non-empty text
fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(as_text)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn attribute_map(value: &Value, list_value_keys: &[&str]) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(name, value)| as_text(value).map(|text| (name.clone(), text)))
            .collect(),
        Value::Array(list) => attributes_from_list(list, list_value_keys),
        _ => BTreeMap::new(),
    }
}

fn attributes_from_list(list: &[Value], value_keys: &[&str]) -> BTreeMap<String, String> {
    list.iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let name = text_field(entry, ATTRIBUTE_NAME_KEYS)?;
            let value = text_field(entry, value_keys)?;
            Some((name, value))
        })
        .collect()
}
