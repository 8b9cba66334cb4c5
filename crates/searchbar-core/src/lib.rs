//! Core types for the search bar query engine.
//! This crate contains the shared data structures used across all components:
//! the canonical field model, the cursor node produced by the KQL parser and
//! the suggestions handed back to the UI.
pub mod abstraction;
pub mod backend;
pub mod escape;
pub mod field_caps;
pub mod parser;

pub use abstraction::{FieldAbstraction, FieldAbstractionMap};
pub use backend::{
    BackendError, DatasourceParams, FieldCapsSource, SearchBackend, TermsRequest, TermsSource,
    TimeRange,
};
pub use field_caps::{normalize_field_caps, normalize_field_caps_value, RawFieldCapsResponse};
pub use parser::{parse_cursor, parse_cursor_at, parse_expression, KqlNode, ParseError};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// FIELD TYPE //

/// Canonical field type, independent of backend-specific type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    NumberRange,
    Date,
    DateRange,
    Ip,
    IpRange,
    Boolean,
    GeoPoint,
    GeoShape,
    Object,
    Nested,
    Attachment,
    Murmur3,
    Histogram,
    #[serde(rename = "_source")]
    Source,
    Unknown,
    Conflict,
}

impl FieldType {
    /// Map a raw backend type string onto its canonical type.
    /// Unmapped types resolve to `Unknown`.
    pub fn from_es_type(es_type: &str) -> Self {
        match es_type {
            "string" | "text" | "match_only_text" | "keyword" | "version" | "constant_keyword"
            | "wildcard" | "_type" | "_id" | "_index" => Self::String,
            "float" | "half_float" | "scaled_float" | "double" | "integer" | "long"
            | "unsigned_long" | "short" | "byte" | "token_count" => Self::Number,
            "integer_range" | "float_range" | "long_range" | "double_range" => Self::NumberRange,
            "date" | "date_nanos" => Self::Date,
            "date_range" => Self::DateRange,
            "ip" => Self::Ip,
            "ip_range" => Self::IpRange,
            "boolean" => Self::Boolean,
            "geo_point" => Self::GeoPoint,
            "geo_shape" => Self::GeoShape,
            "object" => Self::Object,
            "nested" => Self::Nested,
            "attachment" => Self::Attachment,
            "murmur3" => Self::Murmur3,
            "histogram" => Self::Histogram,
            "_source" => Self::Source,
            "conflict" => Self::Conflict,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::NumberRange => "number_range",
            Self::Date => "date",
            Self::DateRange => "date_range",
            Self::Ip => "ip",
            Self::IpRange => "ip_range",
            Self::Boolean => "boolean",
            Self::GeoPoint => "geo_point",
            Self::GeoShape => "geo_shape",
            Self::Object => "object",
            Self::Nested => "nested",
            Self::Attachment => "attachment",
            Self::Murmur3 => "murmur3",
            Self::Histogram => "histogram",
            Self::Source => "_source",
            Self::Unknown => "unknown",
            Self::Conflict => "conflict",
        }
    }

    /// Structural container types that never appear as queryable leaves.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Object | Self::Nested)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// CANONICAL FIELD //

/// How a field relates to the field it lives under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSubType {
    /// Alternate indexing of `parent`, e.g. `message.keyword`.
    Multi { parent: String },
    /// Lives inside the nested document at `path`.
    Nested { path: String },
}

/// A field after capability normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalField {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub es_types: BTreeSet<String>,

    #[serde(default)]
    pub aggregatable: bool,

    #[serde(default)]
    pub searchable: bool,

    #[serde(default)]
    pub metadata_field: bool,

    #[serde(default)]
    pub sub_type: Option<FieldSubType>,

    // es type -> indices it was seen in, only set for conflicts
    #[serde(default)]
    pub conflict_descriptions: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default)]
    pub time_series_metric: Option<String>,

    #[serde(default)]
    pub time_series_dimension: bool,

    #[serde(default)]
    pub fixed_interval: Option<Vec<String>>,

    #[serde(default)]
    pub time_zone: Option<Vec<String>>,
}

impl CanonicalField {
    /// Build a plain searchable field from a single raw type.
    pub fn new(name: impl Into<String>, es_type: &str) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::from_es_type(es_type),
            es_types: BTreeSet::from([es_type.to_string()]),
            aggregatable: false,
            searchable: true,
            metadata_field: false,
            sub_type: None,
            conflict_descriptions: None,
            time_series_metric: None,
            time_series_dimension: false,
            fixed_interval: None,
            time_zone: None,
        }
    }

    pub fn with_aggregatable(mut self, aggregatable: bool) -> Self {
        self.aggregatable = aggregatable;
        self
    }

    pub fn with_sub_type(mut self, sub_type: FieldSubType) -> Self {
        self.sub_type = Some(sub_type);
        self
    }

    /// Path of the nested document this field belongs to, if any.
    pub fn nested_path(&self) -> Option<&str> {
        match &self.sub_type {
            Some(FieldSubType::Nested { path }) => Some(path),
            _ => None,
        }
    }

    pub fn is_version(&self) -> bool {
        self.es_types.contains("version")
    }
}

// CURSOR NODE (parser output) //

/// Token category that is syntactically valid at the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Field,
    Operator,
    Value,
    Conjunction,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Operator => "operator",
            Self::Value => "value",
            Self::Conjunction => "conjunction",
        }
    }
}

/// What the user is in the middle of typing at the caret.
///
/// Offsets are byte offsets into the marker-free query text and always
/// satisfy `start <= end <= text.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorNode {
    pub field_name: Option<String>,
    pub nested_path: Option<String>,
    pub suggestion_types: Vec<TokenKind>,
    pub start: usize,
    pub end: usize,
    pub prefix: String,
    pub suffix: String,
    pub text: String,
}

impl CursorNode {
    /// A node that expects nothing; returned for input the parser gave up on.
    pub fn degraded(caret: usize) -> Self {
        Self {
            start: caret,
            end: caret,
            ..Default::default()
        }
    }

    pub fn expects(&self, kind: TokenKind) -> bool {
        self.suggestion_types.contains(&kind)
    }

    pub fn is_degraded(&self) -> bool {
        self.suggestion_types.is_empty()
    }

    /// Field name qualified with the enclosing nested path.
    pub fn full_field_name(&self) -> Option<String> {
        let field = self.field_name.as_deref()?;
        Some(match self.nested_path.as_deref() {
            Some(path) if !path.is_empty() => format!("{path}.{field}"),
            _ => field.to_string(),
        })
    }

    /// The literal text typed so far for this token, both sides of the caret.
    pub fn search_text(&self) -> String {
        format!("{}{}", self.prefix, self.suffix).trim().to_string()
    }
}

// SUGGESTION //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionType {
    Field,
    Value,
    Operator,
    Conjunction,
    RecentSearch,
}

impl From<TokenKind> for SuggestionType {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Field => Self::Field,
            TokenKind::Operator => Self::Operator,
            TokenKind::Value => Self::Value,
            TokenKind::Conjunction => Self::Conjunction,
        }
    }
}

/// A candidate completion, spliced into the query over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub text: String,
    pub start: usize,
    pub end: usize,

    // caret position after insertion, relative to `start`
    #[serde(default)]
    pub cursor_index: Option<usize>,

    #[serde(default)]
    pub description: Option<String>,
}

impl Suggestion {
    pub fn new(kind: SuggestionType, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
            cursor_index: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_cursor_index(mut self, cursor_index: usize) -> Self {
        self.cursor_index = Some(cursor_index);
        self
    }

    /// Splice this suggestion into `query`, returning the new text and caret.
    pub fn apply(&self, query: &str) -> (String, usize) {
        let end = self.end.min(query.len());
        let start = self.start.min(end);
        let head = query.get(..start).unwrap_or(query);
        let tail = query.get(end..).unwrap_or("");

        let caret = head.len() + self.cursor_index.unwrap_or(self.text.len()).min(self.text.len());
        (format!("{head}{}{tail}", self.text), caret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_es_type_mapping() {
        assert_eq!(FieldType::from_es_type("keyword"), FieldType::String);
        assert_eq!(FieldType::from_es_type("scaled_float"), FieldType::Number);
        assert_eq!(FieldType::from_es_type("date_nanos"), FieldType::Date);
        assert_eq!(FieldType::from_es_type("long_range"), FieldType::NumberRange);
        assert_eq!(FieldType::from_es_type("dense_vector"), FieldType::Unknown);
        assert_eq!(FieldType::from_es_type(""), FieldType::Unknown);
    }

    #[test]
    fn test_full_field_name() {
        let node = CursorNode {
            field_name: Some("first".to_string()),
            nested_path: Some("user".to_string()),
            ..Default::default()
        };
        assert_eq!(node.full_field_name().as_deref(), Some("user.first"));
        assert_eq!(CursorNode::degraded(0).full_field_name(), None);
    }

    #[test]
    fn test_apply_suggestion() {
        let suggestion = Suggestion::new(SuggestionType::Field, "status ", 0, 3);
        assert_eq!(suggestion.apply("sta"), ("status ".to_string(), 7));

        let nested = Suggestion::new(SuggestionType::Field, "user:{ first }", 5, 5).with_cursor_index(12);
        let (text, caret) = nested.apply("a or ");
        assert_eq!(text, "a or user:{ first }");
        assert_eq!(caret, 17);
        assert_eq!(&text[..caret], "a or user:{ first");
    }
}
