//! Submitted KQL to query DSL.

use crate::DslError;
use searchbar_core::parser::{KqlNode, KqlValue, parse_expression};
use searchbar_core::{CanonicalField, FieldType};
use serde_json::{Value, json};

// characters with meaning in a `query_string` query
const QUERY_STRING_RESERVED: &[char] = &[
    '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', ':',
    '\\', '/', ' ', '*', '?',
];

// only the stars the user left unescaped stay wildcards
fn query_string_pattern(value: &KqlValue) -> String {
    let mut out = String::with_capacity(value.text.len());
    for (offset, c) in value.text.char_indices() {
        let wildcard = c == '*' && value.wildcards.contains(&offset);
        if !wildcard && QUERY_STRING_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

struct Converter<'a> {
    fields: &'a [CanonicalField],
}

impl Converter<'_> {
    fn field(&self, name: &str) -> Option<&CanonicalField> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn qualify(nested: Option<&str>, field: &str) -> String {
        match nested {
            Some(path) => format!("{path}.{field}"),
            None => field.to_string(),
        }
    }

    // a nested field referenced outside its `path:{ }` block gets wrapped
    fn wrap_nested(&self, field: &str, nested: Option<&str>, query: Value) -> Value {
        if nested.is_some() {
            return query;
        }
        match self.field(field).and_then(|f| f.nested_path()) {
            Some(path) => json!({
                "nested": { "path": path, "query": query, "score_mode": "none" }
            }),
            None => query,
        }
    }

    fn convert(&self, node: &KqlNode, nested: Option<&str>) -> Value {
        match node {
            KqlNode::MatchAll => json!({ "match_all": {} }),
            KqlNode::Or(children) => json!({
                "bool": {
                    "should": children.iter().map(|c| self.convert(c, nested)).collect::<Vec<_>>(),
                    "minimum_should_match": 1
                }
            }),
            KqlNode::And(children) => json!({
                "bool": {
                    "filter": children.iter().map(|c| self.convert(c, nested)).collect::<Vec<_>>()
                }
            }),
            KqlNode::Not(child) => json!({
                "bool": { "must_not": [self.convert(child, nested)] }
            }),
            KqlNode::Is { field: None, value } => free_text(value),
            KqlNode::Is {
                field: Some(field),
                value,
            } => {
                let field = Self::qualify(nested, field);
                let query = self.field_query(&field, value);
                self.wrap_nested(&field, nested, query)
            }
            KqlNode::Range { field, op, value } => {
                let field = Self::qualify(nested, field);
                let query = json!({ "range": { field.as_str(): { op.as_str(): value } } });
                self.wrap_nested(&field, nested, query)
            }
            KqlNode::Exists { field } => {
                let field = Self::qualify(nested, field);
                let query = json!({ "exists": { "field": field.as_str() } });
                self.wrap_nested(&field, nested, query)
            }
            KqlNode::Nested { path, query } => {
                let path = Self::qualify(nested, path);
                json!({
                    "nested": {
                        "path": path.as_str(),
                        "query": self.convert(query, Some(&path)),
                        "score_mode": "none"
                    }
                })
            }
        }
    }

    fn field_query(&self, field: &str, value: &KqlValue) -> Value {
        if value.is_wildcard() {
            return json!({
                "query_string": {
                    "fields": [field],
                    "query": query_string_pattern(value)
                }
            });
        }
        if value.quoted {
            return json!({ "match_phrase": { field: value.text.as_str() } });
        }
        // dates match the whole period the value names
        if self.field(field).is_some_and(|f| f.field_type == FieldType::Date) {
            return json!({
                "range": { field: { "gte": value.text.as_str(), "lte": value.text.as_str() } }
            });
        }
        json!({ "match": { field: value.text.as_str() } })
    }
}

fn free_text(value: &KqlValue) -> Value {
    if value.is_wildcard() {
        return json!({
            "query_string": { "query": query_string_pattern(value) }
        });
    }
    let kind = if value.quoted { "phrase" } else { "best_fields" };
    json!({
        "multi_match": { "type": kind, "query": value.text.as_str(), "lenient": true }
    })
}

/// Convert a parsed query into query DSL. `fields` is used to find nested
/// and date fields and may be empty.
pub fn kql_to_query(node: &KqlNode, fields: &[CanonicalField]) -> Value {
    Converter { fields }.convert(node, None)
}

/// Parse and convert a submitted query.
pub fn build_query_from_kql(text: &str, fields: &[CanonicalField]) -> Result<Value, DslError> {
    let node = parse_expression(text)?;
    Ok(kql_to_query(&node, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchbar_core::FieldSubType;

    fn fields() -> Vec<CanonicalField> {
        vec![
            CanonicalField::new("@timestamp", "date"),
            CanonicalField::new("user.first", "keyword")
                .with_sub_type(FieldSubType::Nested { path: "user".to_string() }),
        ]
    }

    #[test]
    fn test_boolean_structure() {
        let query = build_query_from_kql("a:1 or not b:2", &[]).unwrap();
        assert_eq!(
            query,
            json!({
                "bool": {
                    "should": [
                        { "match": { "a": "1" } },
                        { "bool": { "must_not": [ { "match": { "b": "2" } } ] } }
                    ],
                    "minimum_should_match": 1
                }
            })
        );
    }

    #[test]
    fn test_leaf_shapes() {
        assert_eq!(
            build_query_from_kql(r#"msg:"disk full""#, &[]).unwrap(),
            json!({ "match_phrase": { "msg": "disk full" } })
        );
        assert_eq!(
            build_query_from_kql("bytes > 10", &[]).unwrap(),
            json!({ "range": { "bytes": { "gt": "10" } } })
        );
        assert_eq!(
            build_query_from_kql("host:*", &[]).unwrap(),
            json!({ "exists": { "field": "host" } })
        );
        assert_eq!(
            build_query_from_kql("host:web-*", &[]).unwrap(),
            json!({ "query_string": { "fields": ["host"], "query": "web\\-*" } })
        );
        assert_eq!(
            build_query_from_kql("", &[]).unwrap(),
            json!({ "match_all": {} })
        );
    }

    #[test]
    fn test_escaped_star_stays_literal_in_wildcard() {
        assert_eq!(
            build_query_from_kql(r"path:a\**", &[]).unwrap(),
            json!({ "query_string": { "fields": ["path"], "query": r"a\**" } })
        );
        assert_eq!(
            build_query_from_kql(r"why\?* tmp\\*", &[]).unwrap(),
            json!({ "query_string": { "query": r"why\?*\ tmp\\*" } })
        );
        // no real wildcard left, so a plain match on the literal star
        assert_eq!(
            build_query_from_kql(r"path:a\*", &[]).unwrap(),
            json!({ "match": { "path": "a*" } })
        );
    }

    #[test]
    fn test_free_text() {
        assert_eq!(
            build_query_from_kql("connection refused", &[]).unwrap(),
            json!({ "multi_match": { "type": "best_fields", "query": "connection refused", "lenient": true } })
        );
    }

    #[test]
    fn test_date_field_is_range() {
        let query = build_query_from_kql("@timestamp:2024-01-01", &fields()).unwrap();
        assert_eq!(query["range"]["@timestamp"]["gte"], "2024-01-01");
    }

    #[test]
    fn test_nested() {
        let explicit = build_query_from_kql("user:{ first:jo }", &fields()).unwrap();
        assert_eq!(explicit["nested"]["path"], "user");
        assert_eq!(explicit["nested"]["query"], json!({ "match": { "user.first": "jo" } }));

        // implicit nesting for a bare nested field
        let implicit = build_query_from_kql("user.first:jo", &fields()).unwrap();
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn test_parse_error_propagates() {
        assert!(matches!(
            build_query_from_kql("a:(b", &[]),
            Err(DslError::Parse(_))
        ));
    }
}
