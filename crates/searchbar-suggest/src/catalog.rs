//! Shared field snapshot.
//!
//! The field list is replaced wholesale on refresh, so a reader holding a
//! snapshot never sees a half-updated schema.

use crate::providers::SuggestError;
use searchbar_core::{normalize_field_caps_value, CanonicalField, DatasourceParams, FieldCapsSource};
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Debug)]
pub struct FieldCatalog {
    fields: RwLock<Arc<[CanonicalField]>>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FieldCatalog {
    pub fn new(fields: Vec<CanonicalField>) -> Self {
        Self {
            fields: RwLock::new(Arc::from(fields)),
        }
    }

    pub fn snapshot(&self) -> Arc<[CanonicalField]> {
        let guard = self.fields.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, fields: Vec<CanonicalField>) {
        let fields: Arc<[CanonicalField]> = Arc::from(fields);
        let mut guard = self.fields.write().unwrap_or_else(|e| e.into_inner());
        *guard = fields;
    }

    /// Fetch and normalize capabilities, then swap them in.
    /// Returns the number of fields now in the catalog.
    pub async fn refresh(
        &self,
        source: &dyn FieldCapsSource,
        params: &DatasourceParams,
    ) -> Result<usize, SuggestError> {
        let raw = source.field_caps(params).await?;
        let fields = normalize_field_caps_value(&raw);
        let count = fields.len();
        self.replace(fields);
        info!(index = %params.index, fields = count, "Field catalog refreshed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use searchbar_core::BackendError;
    use serde_json::{json, Value};

    struct StaticCaps(Value);

    #[async_trait]
    impl FieldCapsSource for StaticCaps {
        async fn field_caps(&self, _params: &DatasourceParams) -> Result<Value, BackendError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl FieldCapsSource for Failing {
        async fn field_caps(&self, _params: &DatasourceParams) -> Result<Value, BackendError> {
            Err(BackendError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let catalog = FieldCatalog::new(vec![CanonicalField::new("old", "keyword")]);
        let before = catalog.snapshot();

        let source = StaticCaps(json!({
            "fields": { "new": { "keyword": { "type": "keyword", "searchable": true } } }
        }));
        let count = catalog
            .refresh(&source, &DatasourceParams::new("logs"))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(before[0].name, "old");
        assert_eq!(catalog.snapshot()[0].name, "new");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_old_fields() {
        let catalog = FieldCatalog::new(vec![CanonicalField::new("old", "keyword")]);
        let result = catalog.refresh(&Failing, &DatasourceParams::new("logs")).await;
        assert!(matches!(result, Err(SuggestError::Backend(_))));
        assert_eq!(catalog.snapshot().len(), 1);
    }
}
