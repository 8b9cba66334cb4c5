//! Criteria to query-DSL filter clauses

use crate::DslError;
use crate::config::{Comparator, Criterion};
use crate::interval::Interval;
use chrono::{DateTime, Utc};
use searchbar_core::TimeRange;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

/// Filters for a rule evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSet {
    pub range_filter: Value,
    // the window padded by one interval on each side, for grouped queries
    pub grouped_range_filter: Value,
    pub must_filters: Vec<Value>,
    pub must_not_filters: Vec<Value>,
}

/// The single clause a criterion maps to, or `None` for comparators
/// without a mapping.
pub fn build_criterion_query(criterion: &Criterion) -> Option<Value> {
    let field = criterion.field.as_str();
    let value = &criterion.value;

    let query = match criterion.comparator {
        Comparator::Eq | Comparator::Neq => json!({ "term": { field: { "value": value } } }),
        Comparator::Match | Comparator::NotMatch => json!({ "match": { field: value } }),
        Comparator::MatchPhrase | Comparator::NotMatchPhrase => {
            let phrase = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({ "match_phrase": { field: phrase } })
        }
        Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte => {
            let bound = range_bound(criterion.comparator)?;
            json!({ "range": { field: { bound: value } } })
        }
        Comparator::Unsupported => {
            debug!(field = %field, "Dropping criterion with unsupported comparator");
            return None;
        }
    };
    Some(query)
}

fn range_bound(comparator: Comparator) -> Option<&'static str> {
    match comparator {
        Comparator::Gt => Some("gt"),
        Comparator::Gte => Some("gte"),
        Comparator::Lt => Some("lt"),
        Comparator::Lte => Some("lte"),
        _ => None,
    }
}

fn range_clause(field: &str, gte: i64, lte: i64) -> Value {
    TimeRange::new(field, gte, lte).to_range_filter()
}

/// Build the filters for `criteria` over the evaluation window.
///
/// An explicit `execution_range` wins; otherwise the window is the last
/// `interval` before `now`.
pub fn build_filters(
    criteria: &[Criterion],
    interval: &Interval,
    timestamp_field: &str,
    execution_range: Option<&TimeRange>,
    now: DateTime<Utc>,
) -> Result<FilterSet, DslError> {
    let interval_ms = interval.as_millis();
    let (gte, lte) = match execution_range {
        Some(range) => (range.gte, range.lte),
        None => {
            let lte = now.timestamp_millis();
            (lte.saturating_sub(interval_ms), lte)
        }
    };
    if gte > lte {
        return Err(DslError::InvalidTimeRange { gte, lte });
    }

    let mut must_filters = Vec::new();
    let mut must_not_filters = Vec::new();
    for criterion in criteria {
        let Some(query) = build_criterion_query(criterion) else {
            continue;
        };
        if criterion.comparator.is_positive() {
            must_filters.push(query);
        } else if criterion.comparator.is_negative() {
            must_not_filters.push(query);
        }
    }

    Ok(FilterSet {
        range_filter: range_clause(timestamp_field, gte, lte),
        grouped_range_filter: range_clause(
            timestamp_field,
            gte.saturating_sub(interval_ms),
            lte.saturating_add(interval_ms),
        ),
        must_filters,
        must_not_filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::TimeUnit;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_clause_shapes() {
        assert_eq!(
            build_criterion_query(&Criterion::new("host", Comparator::Eq, "web-1")),
            Some(json!({ "term": { "host": { "value": "web-1" } } }))
        );
        assert_eq!(
            build_criterion_query(&Criterion::new("message", Comparator::NotMatch, "timeout")),
            Some(json!({ "match": { "message": "timeout" } }))
        );
        assert_eq!(
            build_criterion_query(&Criterion::new("code", Comparator::MatchPhrase, 503)),
            Some(json!({ "match_phrase": { "code": "503" } }))
        );
        assert_eq!(
            build_criterion_query(&Criterion::new("bytes", Comparator::Lte, 10)),
            Some(json!({ "range": { "bytes": { "lte": 10 } } }))
        );
        assert_eq!(
            build_criterion_query(&Criterion::new("x", Comparator::Unsupported, 1)),
            None
        );
    }

    #[test]
    fn test_partition_and_window() {
        let criteria = vec![
            Criterion::new("level", Comparator::Eq, "error"),
            Criterion::new("host", Comparator::Neq, "canary"),
            Criterion::new("bytes", Comparator::Gt, 0),
            Criterion::new("odd", Comparator::Unsupported, "x"),
        ];
        let interval = Interval::new(5, TimeUnit::Minutes);
        let filters = build_filters(&criteria, &interval, "@timestamp", None, now()).unwrap();

        assert_eq!(filters.must_filters.len(), 2);
        assert_eq!(filters.must_not_filters.len(), 1);

        let range = &filters.range_filter["range"]["@timestamp"];
        assert_eq!(range["lte"], 1_700_000_000_000i64);
        assert_eq!(range["gte"], 1_700_000_000_000i64 - 300_000);

        let grouped = &filters.grouped_range_filter["range"]["@timestamp"];
        assert_eq!(grouped["gte"], 1_700_000_000_000i64 - 600_000);
        assert_eq!(grouped["lte"], 1_700_000_000_000i64 + 300_000);
    }

    #[test]
    fn test_execution_range_wins() {
        let interval = Interval::new(1, TimeUnit::Hours);
        let range = TimeRange::new("@timestamp", 1_000, 2_000);
        let filters = build_filters(&[], &interval, "ts", Some(&range), now()).unwrap();
        assert_eq!(filters.range_filter["range"]["ts"]["gte"], 1_000);
        assert_eq!(filters.range_filter["range"]["ts"]["lte"], 2_000);

        let inverted = TimeRange::new("ts", 5, 1);
        assert!(matches!(
            build_filters(&[], &interval, "ts", Some(&inverted), now()),
            Err(DslError::InvalidTimeRange { .. })
        ));
    }
}
