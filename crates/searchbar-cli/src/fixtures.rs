// Offline stand-ins for the cluster, read from JSON files

use async_trait::async_trait;
use searchbar_core::{BackendError, DatasourceParams, TermsRequest, TermsSource};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

/// Field values from a `{ "field": [values...] }` file.
pub struct StaticTerms {
    values: Map<String, Value>,
}

impl StaticTerms {
    pub fn from_value(value: Value) -> Self {
        let values = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { values }
    }
}

#[async_trait]
impl TermsSource for StaticTerms {
    async fn terms(
        &self,
        _params: &DatasourceParams,
        request: &TermsRequest,
    ) -> Result<Vec<Value>, BackendError> {
        let needle = request.query.to_lowercase();
        let values = self
            .values
            .get(&request.field)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter(|v| match v {
                        Value::String(s) => s.to_lowercase().starts_with(&needle),
                        other => other.to_string().starts_with(&needle),
                    })
                    .take(request.size as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_terms_prefix() {
        let terms = StaticTerms::from_value(json!({ "host": ["web-1", "Web-2", "db-1", 42] }));
        let request = TermsRequest {
            field: "host".to_string(),
            query: "we".to_string(),
            time_range: None,
            size: 10,
        };
        let values = terms
            .terms(&DatasourceParams::new("logs"), &request)
            .await
            .unwrap();
        assert_eq!(values, vec![json!("web-1"), json!("Web-2")]);
    }
}
