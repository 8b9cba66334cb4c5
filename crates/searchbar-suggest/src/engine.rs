// Suggestion engine
// Orchestrates: caret marker -> cursor parse -> field aliasing -> provider fan-out -> dedupe

use crate::debounce::Debouncer;
use crate::providers::{ProviderTable, SuggestError, SuggestionContext};
use futures::future::join_all;
use searchbar_core::parser::{new_cursor_marker, parse_cursor};
use searchbar_core::{CursorNode, Suggestion, SuggestionType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

// Suggestion engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub debounce_ms: u64,
    pub value_lookup_timeout_ms: u64,
    pub terms_size: u32,
    pub recent_searches_limit: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            value_lookup_timeout_ms: 1000,
            terms_size: 10,
            recent_searches_limit: 10,
        }
    }
}

// main suggestion engine
pub struct SuggestionEngine {
    config: SuggestConfig,
    marker: String,
    providers: OnceLock<ProviderTable>,
    debouncer: Debouncer,
}

impl SuggestionEngine {
    pub fn new(config: SuggestConfig) -> Self {
        let debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms));
        Self {
            config,
            marker: new_cursor_marker(),
            providers: OnceLock::new(),
            debouncer,
        }
    }

    /// Use a custom provider table instead of the built-in one.
    pub fn with_providers(config: SuggestConfig, providers: ProviderTable) -> Self {
        let engine = Self::new(config);
        // a fresh OnceLock is always empty
        let _ = engine.providers.set(providers);
        engine
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    fn providers(&self) -> &ProviderTable {
        self.providers
            .get_or_init(|| ProviderTable::with_defaults(&self.config))
    }

    /// Work out what belongs at the caret. A selection is treated as a caret
    /// at its end; the selected text stays in place.
    pub fn cursor_node(
        &self,
        query: &str,
        selection_end: usize,
        ctx: &SuggestionContext,
    ) -> CursorNode {
        let mut caret = selection_end.min(query.len());
        while !query.is_char_boundary(caret) {
            caret -= 1;
        }
        let marked = format!("{}{}{}", &query[..caret], self.marker, &query[caret..]);
        let node = parse_cursor(&marked, &self.marker);

        match &ctx.abstraction {
            Some(map) => map.rewrite_cursor(node),
            None => node,
        }
    }

    /// Suggestions for the caret position, deduplicated, followed by matching
    /// recent searches. Never fails: provider errors are logged and dropped.
    pub async fn get_suggestions(
        &self,
        query: &str,
        selection_start: usize,
        selection_end: usize,
        ctx: &SuggestionContext,
    ) -> Vec<Suggestion> {
        let node = self.cursor_node(query, selection_end.max(selection_start), ctx);
        debug!(
            kinds = ?node.suggestion_types,
            field = ?node.field_name,
            start = node.start,
            end = node.end,
            "Resolved cursor"
        );

        let providers = self.providers();
        let calls = node.suggestion_types.iter().map(|kind| {
            let node = &node;
            async move {
                let result = match providers.get(*kind) {
                    Some(provider) => provider.suggest(ctx, node).await,
                    None => Err(SuggestError::NoProvider(kind.as_str())),
                };
                result.unwrap_or_else(|e| {
                    warn!(kind = kind.as_str(), error = %e, "Suggestion provider failed");
                    Vec::new()
                })
            }
        });

        let mut seen = HashSet::new();
        let mut suggestions: Vec<Suggestion> = join_all(calls)
            .await
            .into_iter()
            .flatten()
            .filter(|s| seen.insert((s.kind, s.text.clone(), s.start, s.end)))
            .collect();

        let recent = recent_suggestions(query, &ctx.recent_searches);
        for recent in recent.into_iter().take(self.config.recent_searches_limit) {
            if seen.insert((recent.kind, recent.text.clone(), recent.start, recent.end)) {
                suggestions.push(recent);
            }
        }

        debug!(count = suggestions.len(), "Suggestions ready");
        suggestions
    }

    /// Debounced variant: returns `None` when a newer call superseded this one
    /// before or while it ran.
    pub async fn get_suggestions_debounced(
        &self,
        query: &str,
        selection_start: usize,
        selection_end: usize,
        ctx: &SuggestionContext,
    ) -> Option<Vec<Suggestion>> {
        self.debouncer
            .run(|| self.get_suggestions(query, selection_start, selection_end, ctx))
            .await
    }
}

fn recent_suggestions(query: &str, recent: &[String]) -> Vec<Suggestion> {
    let needle = query.trim().to_lowercase();
    recent
        .iter()
        .filter(|search| !search.trim().is_empty())
        .filter(|search| search.to_lowercase().contains(&needle))
        .map(|search| Suggestion::new(SuggestionType::RecentSearch, search.clone(), 0, query.len()))
        .collect()
}
