//! Grouped rule queries and composite aggregation paging

use crate::DslError;
use crate::config::RuleConfig;
use crate::filters::FilterSet;
use searchbar_core::{DatasourceParams, SearchBackend};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub const COMPOSITE_AGG: &str = "groups";
pub const COMPOSITE_PAGE_SIZE: usize = 40;
// 250 pages of 40 is 10,000 groups
pub const MAX_COMPOSITE_PAGES: usize = 250;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredResults {
    pub doc_count: u64,
}

/// One group of a composite aggregation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeBucket {
    pub key: Map<String, Value>,
    pub doc_count: u64,
    #[serde(default)]
    pub filtered_results: FilteredResults,
}

impl CompositeBucket {
    // group values joined in source order
    pub fn group_name(&self) -> String {
        self.key
            .values()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn source_name(index: usize, field: &str) -> String {
    format!("group-{index}-{field}")
}

fn bool_query(filter: Value, filters: &FilterSet) -> Value {
    json!({
        "bool": {
            "filter": [filter],
            "must": filters.must_filters,
            "must_not": filters.must_not_filters
        }
    })
}

/// Rule query without grouping: the hit count over the window.
pub fn build_ungrouped_query(filters: &FilterSet) -> Value {
    json!({
        "size": 0,
        "track_total_hits": true,
        "query": bool_query(filters.range_filter.clone(), filters)
    })
}

/// Rule query with one composite source per `group_by` field. The outer
/// query covers the padded window; `filtered_results` counts the exact one.
pub fn build_grouped_query(rule: &RuleConfig, filters: &FilterSet) -> Value {
    let sources: Vec<Value> = rule
        .group_by
        .iter()
        .enumerate()
        .map(|(i, field)| json!({ source_name(i, field): { "terms": { "field": field } } }))
        .collect();

    json!({
        "size": 0,
        "query": bool_query(filters.grouped_range_filter.clone(), filters),
        "aggs": {
            COMPOSITE_AGG: {
                "composite": { "size": COMPOSITE_PAGE_SIZE, "sources": sources },
                "aggs": {
                    "filtered_results": { "filter": filters.range_filter }
                }
            }
        }
    })
}

/// Page through the `groups` composite aggregation of `query` with
/// `after_key` until a short page comes back.
pub async fn get_grouped_results(
    backend: &dyn SearchBackend,
    params: &DatasourceParams,
    query: Value,
) -> Result<Vec<CompositeBucket>, DslError> {
    let mut body = query;
    if body
        .pointer(&format!("/aggs/{COMPOSITE_AGG}/composite"))
        .is_none_or(|c| !c.is_object())
    {
        return Err(DslError::InvalidQuery(format!(
            "missing composite aggregation `{COMPOSITE_AGG}`"
        )));
    }
    body["aggs"][COMPOSITE_AGG]["composite"]["size"] = json!(COMPOSITE_PAGE_SIZE);

    let mut results = Vec::new();
    for page in 1..=MAX_COMPOSITE_PAGES {
        let response = backend.search(params, &body).await?;
        let groups = response
            .pointer(&format!("/aggregations/{COMPOSITE_AGG}"))
            .cloned()
            .unwrap_or(Value::Null);

        let buckets: Vec<CompositeBucket> = match groups.get("buckets") {
            Some(buckets) => serde_json::from_value(buckets.clone())?,
            None => Vec::new(),
        };
        let count = buckets.len();
        results.extend(buckets);
        debug!(page, count, total = results.len(), "Fetched composite page");

        if count < COMPOSITE_PAGE_SIZE {
            return Ok(results);
        }
        match groups.get("after_key") {
            Some(after_key) => {
                body["aggs"][COMPOSITE_AGG]["composite"]["after"] = after_key.clone();
            }
            None => {
                warn!(page, "Full composite page without after_key, stopping");
                return Ok(results);
            }
        }
    }

    Err(DslError::PaginationLimit {
        pages: MAX_COMPOSITE_PAGES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Comparator, Criterion};
    use crate::filters::build_filters;
    use chrono::{TimeZone, Utc};

    fn rule() -> RuleConfig {
        RuleConfig {
            group_by: vec!["host.name".to_string(), "service.name".to_string()],
            criteria: vec![
                Criterion::new("log.level", Comparator::Eq, "error"),
                Criterion::new("host.name", Comparator::Neq, "canary"),
            ],
            ..RuleConfig::default()
        }
    }

    fn filters(rule: &RuleConfig) -> FilterSet {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        build_filters(&rule.criteria, &rule.interval(), &rule.timestamp_field, None, now).unwrap()
    }

    #[test]
    fn test_grouped_query_shape() {
        let rule = rule();
        let filters = filters(&rule);
        let body = build_grouped_query(&rule, &filters);

        let composite = &body["aggs"]["groups"]["composite"];
        assert_eq!(composite["size"], 40);
        assert_eq!(
            composite["sources"][1]["group-1-service.name"]["terms"]["field"],
            "service.name"
        );
        assert_eq!(
            body["aggs"]["groups"]["aggs"]["filtered_results"]["filter"],
            filters.range_filter
        );
        assert_eq!(body["query"]["bool"]["filter"][0], filters.grouped_range_filter);
        assert_eq!(body["query"]["bool"]["must"].as_array().unwrap().len(), 1);
        assert_eq!(body["query"]["bool"]["must_not"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_ungrouped_query_shape() {
        let rule = rule();
        let filters = filters(&rule);
        let body = build_ungrouped_query(&filters);
        assert_eq!(body["track_total_hits"], true);
        assert_eq!(body["query"]["bool"]["filter"][0], filters.range_filter);
        assert!(body.get("aggs").is_none());
    }

    #[test]
    fn test_group_name() {
        let bucket: CompositeBucket = serde_json::from_value(json!({
            "key": { "group-0-host": "web-1", "group-1-status": 500 },
            "doc_count": 3
        }))
        .unwrap();
        assert_eq!(bucket.group_name(), "web-1, 500");
        assert_eq!(bucket.filtered_results.doc_count, 0);
    }
}
