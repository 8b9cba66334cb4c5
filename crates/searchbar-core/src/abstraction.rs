//! Field abstraction: logical field names mapped onto physical ones.
//!
//! Users type a friendly name (e.g. `host`), queries must hit the physical
//! field (e.g. `resource.attributes.host.name`), possibly inside a nested
//! document.

use crate::CursorNode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAbstraction {
    /// Logical name shown to and typed by the user.
    pub field: String,

    #[serde(alias = "fieldToQuery")]
    pub field_to_query: String,

    #[serde(default, alias = "displayField")]
    pub display_field: Option<String>,

    // leaf name inside the nested document, when the physical field is nested
    #[serde(default, alias = "nestedField")]
    pub nested_field: Option<String>,

    #[serde(default, alias = "nestedPath")]
    pub nested_path: Option<String>,

    #[serde(default, alias = "nestedDisplayField")]
    pub nested_display_field: Option<String>,

    #[serde(default)]
    pub hidden: bool,
}

impl FieldAbstraction {
    pub fn new(field: impl Into<String>, field_to_query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            field_to_query: field_to_query.into(),
            display_field: None,
            nested_field: None,
            nested_path: None,
            nested_display_field: None,
            hidden: false,
        }
    }

    pub fn nested(mut self, path: impl Into<String>, leaf: impl Into<String>) -> Self {
        self.nested_path = Some(path.into());
        self.nested_field = Some(leaf.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Name to show in suggestion lists.
    pub fn label(&self) -> &str {
        self.display_field.as_deref().unwrap_or(&self.field)
    }
}

/// Logical-name keyed abstraction table with a reverse physical index.
#[derive(Debug, Clone, Default)]
pub struct FieldAbstractionMap {
    by_logical: BTreeMap<String, FieldAbstraction>,
    by_physical: HashMap<String, String>,
}

impl FieldAbstractionMap {
    pub fn new(abstractions: impl IntoIterator<Item = FieldAbstraction>) -> Self {
        let mut map = Self::default();
        for abstraction in abstractions {
            map.insert(abstraction);
        }
        map
    }

    pub fn insert(&mut self, abstraction: FieldAbstraction) {
        self.by_physical
            .insert(abstraction.field_to_query.clone(), abstraction.field.clone());
        self.by_logical.insert(abstraction.field.clone(), abstraction);
    }

    pub fn is_empty(&self) -> bool {
        self.by_logical.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_logical.len()
    }

    pub fn get(&self, logical: &str) -> Option<&FieldAbstraction> {
        self.by_logical.get(logical)
    }

    /// Abstraction whose physical field is `physical`.
    pub fn for_physical(&self, physical: &str) -> Option<&FieldAbstraction> {
        self.by_physical
            .get(physical)
            .and_then(|logical| self.by_logical.get(logical))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldAbstraction> {
        self.by_logical.values()
    }

    /// Resolve a logical name to the physical field to query.
    /// Unknown names pass through unchanged.
    pub fn resolve<'a>(&'a self, logical: &'a str) -> &'a str {
        self.get(logical)
            .map(|a| a.field_to_query.as_str())
            .unwrap_or(logical)
    }

    /// Rewrite the field of a cursor node from logical to physical names.
    /// Offsets and typed text are left untouched.
    pub fn rewrite_cursor(&self, mut node: CursorNode) -> CursorNode {
        let Some(field) = node.field_name.as_deref() else {
            return node;
        };
        let key = match node.nested_path.as_deref() {
            Some(path) if !path.is_empty() => format!("{path}.{field}"),
            _ => field.to_string(),
        };
        let Some(abstraction) = self.get(&key).or_else(|| self.get(field)) else {
            return node;
        };

        node.field_name = Some(
            abstraction
                .nested_field
                .clone()
                .unwrap_or_else(|| abstraction.field_to_query.clone()),
        );
        node.nested_path = abstraction.nested_path.clone();
        node
    }
}
