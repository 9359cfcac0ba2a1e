//! Provenance search criteria and the event store's request body

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Result cap used when the caller does not ask for one
pub const DEFAULT_MAX_RESULTS: u32 = 100;
/// Hard ceiling the event store is never asked to exceed
pub const MAX_RESULTS_CEILING: u32 = 1000;

/// Date layout the event store expects in search requests
const REQUEST_DATE_FORMAT: &str = "%m/%d/%Y %H:%M:%S UTC";

/// Invalid criteria, rejected before any remote call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("entity identifier must not be empty")]
    EmptyEntity,

    #[error("time window start {start} is after end {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Immutable description of one provenance search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCriteria {
    entity: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    max_results: u32,
    summarize: bool,
}

impl QueryCriteria {
    /// Criteria for every event of one FlowFile
    pub fn for_flow_file(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into().trim().to_string(),
            start: None,
            end: None,
            max_results: DEFAULT_MAX_RESULTS,
            summarize: false,
        }
    }

    /// Cap the result count, clamped to `1..=1000`
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_CEILING);
        self
    }

    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Ask the event store for a fast, possibly inline answer
    pub fn with_summarize(mut self, summarize: bool) -> Self {
        self.summarize = summarize;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    pub fn summarize(&self) -> bool {
        self.summarize
    }

    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.entity.is_empty() {
            return Err(CriteriaError::EmptyEntity);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(CriteriaError::InvertedWindow { start, end });
            }
        }
        Ok(())
    }

    /// Submission body in the event store's wire format
    pub fn to_request_body(&self) -> Value {
        let mut request = Map::new();
        request.insert("maxResults".to_string(), json!(self.max_results));
        request.insert("summarize".to_string(), json!(self.summarize));
        request.insert("incrementalResults".to_string(), json!(false));
        request.insert(
            "searchTerms".to_string(),
            json!({
                "FlowFileUUID": {
                    "value": self.entity,
                    "inverse": false
                }
            }),
        );
        if let Some(start) = self.start {
            request.insert(
                "startDate".to_string(),
                json!(start.format(REQUEST_DATE_FORMAT).to_string()),
            );
        }
        if let Some(end) = self.end {
            request.insert(
                "endDate".to_string(),
                json!(end.format(REQUEST_DATE_FORMAT).to_string()),
            );
        }

        json!({ "provenance": { "request": Value::Object(request) } })
    }
}
