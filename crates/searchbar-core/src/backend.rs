//! Interfaces to the search backend.
//!
//! The engine never talks to the network itself: field capabilities, value
//! lookups and query execution are supplied by whoever embeds it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The request was cancelled, usually because a newer keystroke superseded it.
    #[error("request aborted")]
    Aborted,

    #[error("request failed: {0}")]
    Request(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Which datasource/index a request is scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceParams {
    pub index: String,

    #[serde(default)]
    pub datasource_id: Option<u64>,
}

impl DatasourceParams {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            datasource_id: None,
        }
    }
}

/// Inclusive time window on a timestamp field, in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub field: String,
    pub gte: i64,
    pub lte: i64,
}

impl TimeRange {
    pub fn new(field: impl Into<String>, gte: i64, lte: i64) -> Self {
        Self {
            field: field.into(),
            gte,
            lte,
        }
    }

    /// The window of length `span` ending at `now`.
    pub fn last(field: impl Into<String>, span: Duration, now: DateTime<Utc>) -> Self {
        let lte = now.timestamp_millis();
        Self::new(field, lte - span.num_milliseconds(), lte)
    }

    pub fn to_range_filter(&self) -> Value {
        json!({
            "range": {
                self.field.as_str(): {
                    "gte": self.gte,
                    "lte": self.lte,
                    "format": "epoch_millis"
                }
            }
        })
    }
}

/// A value lookup for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsRequest {
    pub field: String,
    // what the user typed so far, possibly empty
    pub query: String,
    pub time_range: Option<TimeRange>,
    pub size: u32,
}

#[async_trait]
pub trait FieldCapsSource: Send + Sync {
    /// Raw `_field_caps` style response for the datasource.
    async fn field_caps(&self, params: &DatasourceParams) -> Result<Value, BackendError>;
}

#[async_trait]
pub trait TermsSource: Send + Sync {
    /// Candidate values for a field; strings or numbers.
    async fn terms(
        &self,
        params: &DatasourceParams,
        request: &TermsRequest,
    ) -> Result<Vec<Value>, BackendError>;
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute a query-DSL payload and return the raw response body.
    async fn search(&self, params: &DatasourceParams, body: &Value) -> Result<Value, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_last_window() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let range = TimeRange::last("@timestamp", Duration::minutes(5), now);
        assert_eq!(range.lte - range.gte, 300_000);
        assert_eq!(
            range.to_range_filter()["range"]["@timestamp"]["format"],
            "epoch_millis"
        );
    }
}
