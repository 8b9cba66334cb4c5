use super::{SuggestError, SuggestionContext, SuggestionProvider};
use async_trait::async_trait;
use searchbar_core::escape::escape_kuery;
use searchbar_core::{CanonicalField, CursorNode, Suggestion, SuggestionType, TokenKind};
use std::cmp::Ordering;

// multi-field suffixes that should sort right after their base field
const KEYWORD_SUFFIXES: [&str; 2] = [".keyword", ".raw"];

/// Suggests field names matching what has been typed so far.
pub struct FieldProvider;

impl FieldProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FieldProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn is_filterable(field: &CanonicalField) -> bool {
    let internal = field.metadata_field || field.name.starts_with('_');
    let allowed_internal = matches!(field.name.as_str(), "_id" | "_index");
    field.searchable && (!internal || allowed_internal)
}

// (label shown and matched on, name inserted into the query)
struct Candidate<'a> {
    field: &'a CanonicalField,
    insert: String,
    label: String,
    prefix_match: bool,
}

fn base_name(name: &str) -> (&str, bool) {
    KEYWORD_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .map(|base| (base, true))
        .unwrap_or((name, false))
}

fn compare(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    let (a_base, a_suffix) = base_name(&a.insert);
    let (b_base, b_suffix) = base_name(&b.insert);
    b.prefix_match
        .cmp(&a.prefix_match)
        .then_with(|| a_base.to_lowercase().cmp(&b_base.to_lowercase()))
        .then_with(|| a_base.cmp(b_base))
        .then(a_suffix.cmp(&b_suffix))
        .then_with(|| a.insert.cmp(&b.insert))
}

#[async_trait]
impl SuggestionProvider for FieldProvider {
    fn kind(&self) -> TokenKind {
        TokenKind::Field
    }

    async fn suggest(
        &self,
        ctx: &SuggestionContext,
        node: &CursorNode,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let search = node.search_text().to_lowercase();
        let scope = node.nested_path.as_deref().filter(|path| !path.is_empty());

        let mut candidates: Vec<Candidate<'_>> = ctx
            .fields
            .iter()
            .filter(|field| is_filterable(field))
            .filter(|field| match scope {
                Some(path) => field
                    .nested_path()
                    .is_some_and(|nested| nested == path || nested.starts_with(&format!("{path}."))),
                None => true,
            })
            .filter_map(|field| {
                let abstraction = ctx
                    .abstraction
                    .as_ref()
                    .and_then(|map| map.for_physical(&field.name));
                if abstraction.is_some_and(|a| a.hidden) {
                    return None;
                }

                let insert = abstraction
                    .map(|a| a.field.clone())
                    .unwrap_or_else(|| field.name.clone());
                let label = abstraction
                    .map(|a| a.label().to_string())
                    .unwrap_or_else(|| insert.clone());

                let label_lower = label.to_lowercase();
                let insert_lower = insert.to_lowercase();
                if !label_lower.contains(&search) && !insert_lower.contains(&search) {
                    return None;
                }
                let prefix_match =
                    label_lower.starts_with(&search) || insert_lower.starts_with(&search);

                Some(Candidate {
                    field,
                    insert,
                    label,
                    prefix_match,
                })
            })
            .collect();

        candidates.sort_by(compare);

        Ok(candidates
            .into_iter()
            .map(|candidate| {
                let (text, cursor_index) = insert_text(&candidate, scope);
                let suggestion = Suggestion::new(SuggestionType::Field, text, node.start, node.end)
                    .with_description(describe(&candidate));
                match cursor_index {
                    Some(idx) => suggestion.with_cursor_index(idx),
                    None => suggestion,
                }
            })
            .collect())
    }
}

fn describe(candidate: &Candidate<'_>) -> String {
    if candidate.label != candidate.insert {
        format!("{} ({})", candidate.label, candidate.field.field_type)
    } else {
        candidate.field.field_type.to_string()
    }
}

// nested fields outside their scope open a `path:{ }` block with the caret inside
fn insert_text(candidate: &Candidate<'_>, scope: Option<&str>) -> (String, Option<usize>) {
    let name = candidate.insert.as_str();
    if let Some(path) = scope {
        let relative = name
            .strip_prefix(path)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name);
        return (format!("{} ", escape_kuery(relative)), None);
    }

    match candidate.field.nested_path() {
        Some(path) if name.starts_with(&format!("{path}.")) => {
            let rest = escape_kuery(&name[path.len() + 1..]);
            let text = format!("{}:{{ {rest} }}", escape_kuery(path));
            let cursor = text.len() - 2;
            (text, Some(cursor))
        }
        _ => (format!("{} ", escape_kuery(name)), None),
    }
}
