//! Chart and log-list request bodies

use crate::DslError;
use crate::interval::parse_interval;
use searchbar_core::TimeRange;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const HISTOGRAM_AGG: &str = "histogram";

pub fn group_agg_name(level: usize) -> String {
    format!("group_{level}")
}

pub fn metric_agg_name(index: usize) -> String {
    format!("metric_{index}")
}

// Metric functions that can be charted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricKind {
    // bucket doc_count, no sub-aggregation
    Count,
    Avg { field: String },
    Sum { field: String },
    Max { field: String },
    Min { field: String },
    UniqueCount { field: String },
    Percentiles { field: String, percents: Vec<f64> },
}

impl MetricKind {
    pub fn p90(field: impl Into<String>) -> Self {
        MetricKind::Percentiles {
            field: field.into(),
            percents: vec![90.0],
        }
    }

    pub fn p95(field: impl Into<String>) -> Self {
        MetricKind::Percentiles {
            field: field.into(),
            percents: vec![95.0],
        }
    }

    pub fn p99(field: impl Into<String>) -> Self {
        MetricKind::Percentiles {
            field: field.into(),
            percents: vec![99.0],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Avg { .. } => "avg",
            MetricKind::Sum { .. } => "sum",
            MetricKind::Max { .. } => "max",
            MetricKind::Min { .. } => "min",
            MetricKind::UniqueCount { .. } => "unique_count",
            MetricKind::Percentiles { .. } => "percentiles",
        }
    }

    /// Sub-aggregation body; `None` for metrics read off the bucket itself.
    pub fn aggregation(&self) -> Option<Value> {
        Some(match self {
            MetricKind::Count => return None,
            MetricKind::Avg { field } => json!({ "avg": { "field": field } }),
            MetricKind::Sum { field } => json!({ "sum": { "field": field } }),
            MetricKind::Max { field } => json!({ "max": { "field": field } }),
            MetricKind::Min { field } => json!({ "min": { "field": field } }),
            MetricKind::UniqueCount { field } => json!({ "cardinality": { "field": field } }),
            MetricKind::Percentiles { field, percents } => {
                json!({ "percentiles": { "field": field, "percents": percents } })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(flatten)]
    pub kind: MetricKind,

    // replaces the field in the series label
    #[serde(default)]
    pub alias: Option<String>,
}

impl From<MetricKind> for Metric {
    fn from(kind: MetricKind) -> Self {
        Self { kind, alias: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

// One group-by dimension (terms aggregation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    pub field: String,

    #[serde(default = "default_group_size")]
    pub size: u32,

    #[serde(default = "default_min_doc_count")]
    pub min_doc_count: u64,

    #[serde(default = "default_group_order")]
    pub order: SortOrder,
}

impl GroupBy {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            size: default_group_size(),
            min_doc_count: default_min_doc_count(),
            order: default_group_order(),
        }
    }
}

fn default_group_size() -> u32 {
    10
}

fn default_min_doc_count() -> u64 {
    1
}

fn default_group_order() -> SortOrder {
    SortOrder::Desc
}

/// A time series chart request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTarget {
    pub date_field: String,

    /// Fixed histogram interval, e.g. `1m`.
    pub interval: String,

    #[serde(default)]
    pub group_by: Vec<GroupBy>,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<Metric>,
}

fn default_metrics() -> Vec<Metric> {
    vec![MetricKind::Count.into()]
}

/// A raw log list request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsTarget {
    pub date_field: String,

    #[serde(default = "default_logs_size")]
    pub size: u32,

    #[serde(default)]
    pub from: u32,

    #[serde(default = "default_logs_sort")]
    pub sort: SortOrder,
}

fn default_logs_size() -> u32 {
    500
}

fn default_logs_sort() -> SortOrder {
    SortOrder::Desc
}

fn filtered_query(range: &TimeRange, query: Option<Value>) -> Value {
    let mut filter = vec![range.to_range_filter()];
    filter.extend(query);
    json!({ "bool": { "filter": filter } })
}

/// Nested `terms` aggregations per group-by around a terminal date histogram
/// that carries the metric sub-aggregations.
pub fn build_series_query(
    target: &SeriesTarget,
    range: &TimeRange,
    query: Option<Value>,
) -> Result<Value, DslError> {
    let interval = parse_interval(&target.interval)?;

    let mut metric_aggs = Map::new();
    for (index, metric) in target.metrics.iter().enumerate() {
        if let Some(agg) = metric.kind.aggregation() {
            metric_aggs.insert(metric_agg_name(index), agg);
        }
    }

    let mut histogram = json!({
        "date_histogram": {
            "field": target.date_field,
            "fixed_interval": interval.to_string(),
            "min_doc_count": 0,
            "extended_bounds": { "min": range.gte, "max": range.lte },
            "format": "epoch_millis"
        }
    });
    if !metric_aggs.is_empty() {
        histogram["aggs"] = Value::Object(metric_aggs);
    }

    let mut aggs = json!({ HISTOGRAM_AGG: histogram });
    for (level, group) in target.group_by.iter().enumerate().rev() {
        aggs = json!({
            group_agg_name(level): {
                "terms": {
                    "field": group.field,
                    "size": group.size,
                    "min_doc_count": group.min_doc_count,
                    "order": { "_count": group.order.as_str() }
                },
                "aggs": aggs
            }
        });
    }

    Ok(json!({
        "size": 0,
        "query": filtered_query(range, query),
        "aggs": aggs
    }))
}

/// Sorted, paged hits with exact total tracking.
pub fn build_logs_query(target: &LogsTarget, range: &TimeRange, query: Option<Value>) -> Value {
    json!({
        "size": target.size,
        "from": target.from,
        "track_total_hits": true,
        "query": filtered_query(range, query),
        "sort": [
            { target.date_field.as_str(): { "order": target.sort.as_str(), "unmapped_type": "boolean" } }
        ]
    })
}
