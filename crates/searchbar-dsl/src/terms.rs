//! Value lookup request bodies: `_terms_enum` and the terms aggregation
//! fallback.

use searchbar_core::TermsRequest;
use serde_json::{Value, json};

pub const TERMS_AGG: &str = "suggestions";
const SHARD_SIZE: u32 = 10;

// lucene regex operators
const REGEX_RESERVED: &[char] = &[
    '.', '?', '+', '*', '|', '{', '}', '[', ']', '(', ')', '"', '\\', '#', '@', '&', '<', '>',
    '~',
];

fn escape_regex(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if REGEX_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `_terms_enum` body; the time range becomes an `index_filter`.
pub fn build_terms_enum_body(request: &TermsRequest) -> Value {
    let mut body = json!({
        "field": request.field,
        "string": request.query,
        "size": request.size
    });
    if let Some(range) = &request.time_range {
        body["index_filter"] = range.to_range_filter();
    }
    body
}

/// Search body with a `terms` aggregation whose `include` pattern is a
/// prefix match on what was typed.
pub fn build_terms_agg_body(request: &TermsRequest) -> Value {
    let mut terms = json!({
        "field": request.field,
        "size": request.size,
        "shard_size": SHARD_SIZE.max(request.size),
        "execution_hint": "map"
    });
    if !request.query.is_empty() {
        terms["include"] = json!(format!("{}.*", escape_regex(&request.query)));
    }

    let filter: Vec<Value> = request
        .time_range
        .iter()
        .map(|range| range.to_range_filter())
        .collect();

    json!({
        "size": 0,
        "query": { "bool": { "filter": filter } },
        "aggs": { TERMS_AGG: { "terms": terms } }
    })
}

pub fn parse_terms_enum_response(raw: &Value) -> Vec<Value> {
    raw.get("terms")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub fn parse_terms_agg_response(raw: &Value) -> Vec<Value> {
    raw.pointer(&format!("/aggregations/{TERMS_AGG}/buckets"))
        .and_then(Value::as_array)
        .map(|buckets| buckets.iter().filter_map(|b| b.get("key").cloned()).collect())
        .unwrap_or_default()
}
