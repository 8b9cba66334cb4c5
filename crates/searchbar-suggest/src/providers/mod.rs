//! Suggestion providers - one per token kind the parser can ask for

pub mod conjunction;
pub mod field;
pub mod operator;
pub mod value;

pub use conjunction::ConjunctionProvider;
pub use field::FieldProvider;
pub use operator::OperatorProvider;
pub use value::ValueProvider;

use async_trait::async_trait;
use searchbar_core::{
    BackendError, CanonicalField, CursorNode, DatasourceParams, FieldAbstractionMap, Suggestion,
    TermsSource, TimeRange, TokenKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::engine::SuggestConfig;

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("No provider registered for {0}")]
    NoProvider(&'static str),
}

/// Everything a provider may consult for one keystroke.
#[derive(Clone)]
pub struct SuggestionContext {
    pub fields: Arc<[CanonicalField]>,
    pub abstraction: Option<Arc<FieldAbstractionMap>>,
    pub datasource: DatasourceParams,
    pub time_range: Option<TimeRange>,
    pub terms: Option<Arc<dyn TermsSource>>,
    // most recent first
    pub recent_searches: Vec<String>,
}

impl SuggestionContext {
    pub fn new(fields: Arc<[CanonicalField]>, datasource: DatasourceParams) -> Self {
        Self {
            fields,
            abstraction: None,
            datasource,
            time_range: None,
            terms: None,
            recent_searches: Vec::new(),
        }
    }

    pub fn with_abstraction(mut self, abstraction: Arc<FieldAbstractionMap>) -> Self {
        self.abstraction = Some(abstraction);
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn with_terms(mut self, terms: Arc<dyn TermsSource>) -> Self {
        self.terms = Some(terms);
        self
    }

    pub fn with_recent_searches(mut self, recent: Vec<String>) -> Self {
        self.recent_searches = recent;
        self
    }

    /// The field a cursor node refers to, qualified by its nested path.
    pub fn field_for(&self, node: &CursorNode) -> Option<&CanonicalField> {
        let name = node.full_field_name()?;
        self.fields.iter().find(|field| field.name == name)
    }
}

// Provider trait - every token kind gets one

#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    fn kind(&self) -> TokenKind;

    /// Expected inputs never error; malformed inputs give an empty list.
    async fn suggest(
        &self,
        ctx: &SuggestionContext,
        node: &CursorNode,
    ) -> Result<Vec<Suggestion>, SuggestError>;
}

// Table to hold providers, keyed by the token kind they complete

#[derive(Default)]
pub struct ProviderTable {
    providers: HashMap<TokenKind, Arc<dyn SuggestionProvider>>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in providers.
    pub fn with_defaults(config: &SuggestConfig) -> Self {
        let mut table = Self::new();
        table.register(Arc::new(FieldProvider::new()));
        table.register(Arc::new(OperatorProvider::new()));
        table.register(Arc::new(ValueProvider::new(config)));
        table.register(Arc::new(ConjunctionProvider::new()));
        table
    }

    // register a provider, replacing any previous one for the same kind
    pub fn register(&mut self, provider: Arc<dyn SuggestionProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: TokenKind) -> Option<&dyn SuggestionProvider> {
        self.providers.get(&kind).map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_every_kind() {
        let table = ProviderTable::with_defaults(&SuggestConfig::default());
        for kind in [
            TokenKind::Field,
            TokenKind::Operator,
            TokenKind::Value,
            TokenKind::Conjunction,
        ] {
            assert_eq!(table.get(kind).map(|p| p.kind()), Some(kind));
        }
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_field_for_uses_nested_path() {
        let fields: Arc<[CanonicalField]> =
            Arc::from(vec![CanonicalField::new("user.first", "keyword")]);
        let ctx = SuggestionContext::new(fields, DatasourceParams::new("logs"));
        let node = CursorNode {
            field_name: Some("first".to_string()),
            nested_path: Some("user".to_string()),
            ..Default::default()
        };
        assert_eq!(ctx.field_for(&node).map(|f| f.name.as_str()), Some("user.first"));
    }
}
