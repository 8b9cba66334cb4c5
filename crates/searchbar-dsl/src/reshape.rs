//! Aggregation responses back into flat series points

use crate::series::{HISTOGRAM_AGG, MetricKind, SeriesTarget, group_agg_name, metric_agg_name};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

// TYPED AGGREGATION TREE //

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBucket {
    pub key: String,
    pub doc_count: u64,
    pub child: AggregationTree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    pub timestamp: i64,
    pub doc_count: u64,
    // metric sub-aggregation results by name
    pub metrics: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationTree {
    Group(Vec<GroupBucket>),
    Histogram(Vec<HistogramBucket>),
}

fn buckets(agg: Option<&Value>) -> &[Value] {
    agg.and_then(|a| a.get("buckets"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn doc_count(bucket: &Value) -> u64 {
    bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0)
}

fn group_key(bucket: &Value) -> Option<String> {
    if let Some(s) = bucket.get("key_as_string").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    match bucket.get("key")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn histogram_timestamp(bucket: &Value) -> Option<i64> {
    let key = bucket.get("key")?;
    key.as_i64()
        .or_else(|| key.as_f64().map(|f| f as i64))
        .or_else(|| bucket.get("key_as_string")?.as_str()?.parse().ok())
}

impl AggregationTree {
    /// Build the tree for `depth` group-by levels starting at `level`.
    fn from_level(aggs: &Value, level: usize, depth: usize) -> Self {
        if level == depth {
            let buckets = buckets(aggs.get(HISTOGRAM_AGG))
                .iter()
                .filter_map(|bucket| {
                    let Some(timestamp) = histogram_timestamp(bucket) else {
                        debug!("Skipping histogram bucket without a numeric key");
                        return None;
                    };
                    let mut metrics = bucket.as_object().cloned().unwrap_or_default();
                    metrics.retain(|name, _| name.starts_with("metric_"));
                    Some(HistogramBucket {
                        timestamp,
                        doc_count: doc_count(bucket),
                        metrics,
                    })
                })
                .collect();
            return AggregationTree::Histogram(buckets);
        }

        let buckets = buckets(aggs.get(group_agg_name(level)))
            .iter()
            .filter_map(|bucket| {
                Some(GroupBucket {
                    key: group_key(bucket)?,
                    doc_count: doc_count(bucket),
                    child: Self::from_level(bucket, level + 1, depth),
                })
            })
            .collect();
        AggregationTree::Group(buckets)
    }

    /// Typed view over the `aggregations` of a series response.
    pub fn from_response(raw: &Value, target: &SeriesTarget) -> Option<Self> {
        let aggs = raw.get("aggregations")?;
        Some(Self::from_level(aggs, 0, target.group_by.len()))
    }

    pub fn walk<V: BucketVisitor>(&self, visitor: &mut V) {
        match self {
            AggregationTree::Group(buckets) => {
                for bucket in buckets {
                    visitor.enter_group(bucket);
                    bucket.child.walk(visitor);
                    visitor.leave_group(bucket);
                }
            }
            AggregationTree::Histogram(buckets) => {
                for bucket in buckets {
                    visitor.visit_histogram(bucket);
                }
            }
        }
    }
}

pub trait BucketVisitor {
    fn enter_group(&mut self, bucket: &GroupBucket);
    fn leave_group(&mut self, bucket: &GroupBucket);
    fn visit_histogram(&mut self, bucket: &HistogramBucket);
}

// SERIES POINTS //

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    // null when the metric had no data in the bucket
    pub value: Option<f64>,
    pub series_key: String,
    pub dimensions: Vec<String>,
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: String,
    pub points: Vec<SeriesPoint>,
}

/// `p` followed by the percentile key, `.0` dropped: `95.0` is `p95`,
/// `99.9` stays `p99.9`.
pub fn percentile_label(key: &str) -> String {
    let trimmed = key.strip_suffix(".0").unwrap_or(key);
    format!("p{trimmed}")
}

fn series_key(dimensions: &[String], metric: &str) -> String {
    let mut parts: Vec<&str> = dimensions.iter().map(String::as_str).collect();
    parts.push(metric);
    parts.join(" ")
}

fn metric_label(kind: &MetricKind, alias: Option<&str>) -> String {
    if let Some(alias) = alias {
        return alias.to_string();
    }
    match kind {
        MetricKind::Count => "count".to_string(),
        MetricKind::Avg { field }
        | MetricKind::Sum { field }
        | MetricKind::Max { field }
        | MetricKind::Min { field }
        | MetricKind::UniqueCount { field }
        | MetricKind::Percentiles { field, .. } => format!("{} {field}", kind.label()),
    }
}

// (label, value) pairs of a percentiles result, keyed or array form
fn percentile_values(result: &Value) -> Vec<(String, Option<f64>)> {
    match result.get("values") {
        Some(Value::Object(values)) => values
            .iter()
            .map(|(key, value)| (percentile_label(key), value.as_f64()))
            .collect(),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|entry| {
                let key = entry.get("key")?.as_f64()?;
                Some((percentile_label(&key.to_string()), entry.get("value")?.as_f64()))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Collects one point per metric (per percentile for percentiles) for every
/// histogram bucket, labelled with the enclosing group keys.
pub struct SeriesCollector<'a> {
    target: &'a SeriesTarget,
    dimensions: Vec<String>,
    points: Vec<SeriesPoint>,
}

impl<'a> SeriesCollector<'a> {
    pub fn new(target: &'a SeriesTarget) -> Self {
        Self {
            target,
            dimensions: Vec::new(),
            points: Vec::new(),
        }
    }

    pub fn into_points(self) -> Vec<SeriesPoint> {
        self.points
    }

    fn push(&mut self, timestamp: i64, metric: String, value: Option<f64>) {
        self.points.push(SeriesPoint {
            timestamp,
            value,
            series_key: series_key(&self.dimensions, &metric),
            dimensions: self.dimensions.clone(),
            metric,
        });
    }
}

impl BucketVisitor for SeriesCollector<'_> {
    fn enter_group(&mut self, bucket: &GroupBucket) {
        self.dimensions.push(bucket.key.clone());
    }

    fn leave_group(&mut self, _bucket: &GroupBucket) {
        self.dimensions.pop();
    }

    fn visit_histogram(&mut self, bucket: &HistogramBucket) {
        let target = self.target;
        for (index, metric) in target.metrics.iter().enumerate() {
            let result = bucket.metrics.get(&metric_agg_name(index));
            match &metric.kind {
                MetricKind::Count => {
                    let label = metric_label(&metric.kind, metric.alias.as_deref());
                    self.push(bucket.timestamp, label, Some(bucket.doc_count as f64));
                }
                MetricKind::Percentiles { field, .. } => {
                    // one series per percentile, named after the alias or field
                    let subject = metric.alias.as_deref().unwrap_or(field);
                    for (label, value) in result.map(percentile_values).unwrap_or_default() {
                        self.push(bucket.timestamp, format!("{label} {subject}"), value);
                    }
                }
                _ => {
                    let label = metric_label(&metric.kind, metric.alias.as_deref());
                    let value = result.and_then(|r| r.get("value")).and_then(Value::as_f64);
                    self.push(bucket.timestamp, label, value);
                }
            }
        }
    }
}

/// Flatten a series response. A response without `aggregations` yields no
/// points.
pub fn reshape_aggregation_response(raw: &Value, target: &SeriesTarget) -> Vec<SeriesPoint> {
    let Some(tree) = AggregationTree::from_response(raw, target) else {
        debug!("Series response has no aggregations");
        return Vec::new();
    };
    let mut collector = SeriesCollector::new(target);
    tree.walk(&mut collector);
    collector.into_points()
}

/// Group points by series key, keeping first-seen order.
pub fn group_series(points: Vec<SeriesPoint>) -> Vec<Series> {
    let mut series: Vec<Series> = Vec::new();
    for point in points {
        match series.iter_mut().find(|s| s.key == point.series_key) {
            Some(existing) => existing.points.push(point),
            None => series.push(Series {
                key: point.series_key.clone(),
                points: vec![point],
            }),
        }
    }
    series
}
