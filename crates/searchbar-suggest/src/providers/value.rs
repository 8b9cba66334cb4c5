use super::{SuggestError, SuggestionContext, SuggestionProvider};
use crate::engine::SuggestConfig;
use async_trait::async_trait;
use searchbar_core::escape::escape_quotes;
use searchbar_core::{
    BackendError, CursorNode, FieldType, Suggestion, SuggestionType, TermsRequest, TokenKind,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Suggests values for the field before the caret, looked up in the backend.
pub struct ValueProvider {
    timeout: Duration,
    size: u32,
}

impl ValueProvider {
    pub fn new(config: &SuggestConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.value_lookup_timeout_ms),
            size: config.terms_size,
        }
    }
}

// (raw value used for matching, text inserted into the query)
fn render(value: &Value) -> Option<(String, String)> {
    match value {
        Value::String(s) => Some((s.clone(), format!("\"{}\"", escape_quotes(s)))),
        Value::Number(n) => Some((n.to_string(), n.to_string())),
        Value::Bool(b) => Some((b.to_string(), b.to_string())),
        _ => None,
    }
}

fn suggestions(values: &[Value], search: &str, node: &CursorNode) -> Vec<Suggestion> {
    let search = search.to_lowercase();
    let mut seen = std::collections::HashSet::new();

    values
        .iter()
        .filter_map(render)
        .filter(|(raw, _)| raw.to_lowercase().contains(&search))
        .filter(|(_, text)| seen.insert(text.clone()))
        .map(|(_, text)| {
            Suggestion::new(SuggestionType::Value, format!("{text} "), node.start, node.end)
        })
        .collect()
}

#[async_trait]
impl SuggestionProvider for ValueProvider {
    fn kind(&self) -> TokenKind {
        TokenKind::Value
    }

    async fn suggest(
        &self,
        ctx: &SuggestionContext,
        node: &CursorNode,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let Some(field) = ctx.field_for(node) else {
            return Ok(Vec::new());
        };
        let search = node.search_text();

        if field.field_type == FieldType::Boolean {
            let values = [Value::Bool(true), Value::Bool(false)];
            return Ok(suggestions(&values, &search, node));
        }

        if !field.aggregatable || field.field_type != FieldType::String || field.is_version() {
            return Ok(Vec::new());
        }
        let Some(terms) = ctx.terms.as_ref() else {
            return Ok(Vec::new());
        };

        let request = TermsRequest {
            field: field.name.clone(),
            query: search.clone(),
            time_range: ctx.time_range.clone(),
            size: self.size,
        };

        let values = match tokio::time::timeout(self.timeout, terms.terms(&ctx.datasource, &request)).await {
            Ok(Ok(values)) => values,
            Ok(Err(BackendError::Aborted)) => {
                debug!(field = %field.name, "Value lookup aborted");
                return Ok(Vec::new());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    field = %field.name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Value lookup timed out"
                );
                return Ok(Vec::new());
            }
        };

        debug!(field = %field.name, count = values.len(), "Value lookup finished");
        Ok(suggestions(&values, &search, node))
    }
}
