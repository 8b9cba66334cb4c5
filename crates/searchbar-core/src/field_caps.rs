//! Field capabilities normalizer.
//!
//! Reconciles a `_field_caps` response, where one field name may map to
//! several raw types across indices, into the canonical field model.

use crate::{CanonicalField, FieldSubType, FieldType};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// `_field_caps` response body: field name -> raw type -> capability.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFieldCapsResponse {
    #[serde(default)]
    pub indices: Vec<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, BTreeMap<String, FieldCapability>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldCapability {
    #[serde(rename = "type")]
    pub es_type: String,
    pub searchable: bool,
    pub aggregatable: bool,
    pub indices: Option<Vec<String>>,
    pub non_searchable_indices: Option<Vec<String>>,
    pub non_aggregatable_indices: Option<Vec<String>>,
    pub metadata_field: bool,
    pub time_series_metric: Option<String>,
    pub time_series_dimension: bool,
    pub meta: BTreeMap<String, Vec<String>>,
}

impl RawFieldCapsResponse {
    /// Lenient decoding: malformed capability entries keep their raw type
    /// but lose their flags instead of failing the whole response.
    pub fn from_value(value: &Value) -> Self {
        let indices = value
            .get("indices")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut fields = BTreeMap::new();
        if let Some(by_name) = value.get("fields").and_then(Value::as_object) {
            for (name, by_type) in by_name {
                let mut caps = BTreeMap::new();
                if let Some(by_type) = by_type.as_object() {
                    for (es_type, cap) in by_type {
                        let cap = serde_json::from_value::<FieldCapability>(cap.clone())
                            .unwrap_or_else(|e| {
                                debug!(field = %name, es_type = %es_type, error = %e, "Malformed field capability");
                                FieldCapability::default()
                            });
                        caps.insert(es_type.clone(), cap);
                    }
                }
                fields.insert(name.clone(), caps);
            }
        }

        Self { indices, fields }
    }
}

/// Normalize a raw JSON field-caps body. Never fails.
pub fn normalize_field_caps_value(value: &Value) -> Vec<CanonicalField> {
    normalize_field_caps(&RawFieldCapsResponse::from_value(value))
}

/// Normalize field capabilities into canonical fields, sorted by name.
/// Container (`object`/`nested`) fields are used for sub-type detection and
/// then dropped from the output.
pub fn normalize_field_caps(raw: &RawFieldCapsResponse) -> Vec<CanonicalField> {
    let mut fields: Vec<CanonicalField> = raw
        .fields
        .iter()
        .map(|(name, caps_by_type)| normalize_field(name, caps_by_type))
        .collect();

    assign_sub_types(&mut fields);

    fields.retain(|field| !field.field_type.is_container());
    debug!(fields = fields.len(), "Normalized field capabilities");
    fields
}

fn normalize_field(name: &str, caps_by_type: &BTreeMap<String, FieldCapability>) -> CanonicalField {
    // a single searchable/aggregatable type makes the whole field usable
    let searchable = caps_by_type.values().any(|cap| {
        cap.searchable || cap.non_searchable_indices.as_ref().is_some_and(|i| !i.is_empty())
    });
    let aggregatable = caps_by_type.values().any(|cap| {
        cap.aggregatable || cap.non_aggregatable_indices.as_ref().is_some_and(|i| !i.is_empty())
    });

    let es_types: BTreeSet<String> = caps_by_type.keys().cloned().collect();
    let canonical_types: BTreeSet<FieldType> =
        es_types.iter().map(|t| FieldType::from_es_type(t)).collect();
    let first = caps_by_type.values().next();
    let metadata_field = first.is_some_and(|cap| cap.metadata_field);

    let mut field = CanonicalField {
        name: name.to_string(),
        field_type: FieldType::Unknown,
        es_types,
        aggregatable,
        searchable,
        metadata_field,
        sub_type: None,
        conflict_descriptions: None,
        time_series_metric: None,
        time_series_dimension: false,
        fixed_interval: None,
        time_zone: None,
    };

    if canonical_types.len() > 1 {
        debug!(field = %name, types = ?field.es_types, "Conflicting field types");
        field.field_type = FieldType::Conflict;
        field.conflict_descriptions = Some(
            caps_by_type
                .iter()
                .map(|(es_type, cap)| (es_type.clone(), cap.indices.clone().unwrap_or_default()))
                .collect(),
        );
        return field;
    }

    field.field_type = canonical_types.into_iter().next().unwrap_or(FieldType::Unknown);
    if let Some(cap) = first {
        field.time_series_metric = cap.time_series_metric.clone();
        field.time_series_dimension = cap.time_series_dimension;
        field.fixed_interval = cap.meta.get("fixed_interval").cloned();
        field.time_zone = cap.meta.get("time_zone").cloned();
    }
    field
}

fn assign_sub_types(fields: &mut [CanonicalField]) {
    let types: HashMap<String, FieldType> = fields
        .iter()
        .map(|field| (field.name.clone(), field.field_type))
        .collect();

    for field in fields.iter_mut() {
        field.sub_type = detect_sub_type(&field.name, &types);
    }
}

// ancestor paths of a dotted name, nearest first: "a.b.c" -> ["a.b", "a"]
fn ancestor_paths(name: &str) -> impl Iterator<Item = &str> {
    name.rmatch_indices('.').map(move |(idx, _)| &name[..idx])
}

fn detect_sub_type(name: &str, types: &HashMap<String, FieldType>) -> Option<FieldSubType> {
    if let Some(path) =
        ancestor_paths(name).find(|path| types.get(*path) == Some(&FieldType::Nested))
    {
        return Some(FieldSubType::Nested {
            path: path.to_string(),
        });
    }

    let parent = ancestor_paths(name).find(|path| types.contains_key(*path))?;
    match types.get(parent) {
        Some(parent_type) if !parent_type.is_container() => Some(FieldSubType::Multi {
            parent: parent.to_string(),
        }),
        _ => None,
    }
}
