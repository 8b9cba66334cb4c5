use super::{SuggestError, SuggestionContext, SuggestionProvider};
use async_trait::async_trait;
use searchbar_core::{CursorNode, Suggestion, SuggestionType, TokenKind};

const CONJUNCTIONS: [(&str, &str); 2] = [
    ("and", "requires both arguments to be true"),
    ("or", "requires one or more arguments to be true"),
];

/// Offers `and` / `or` once the user has finished a clause.
pub struct ConjunctionProvider;

impl ConjunctionProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConjunctionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SuggestionProvider for ConjunctionProvider {
    fn kind(&self) -> TokenKind {
        TokenKind::Conjunction
    }

    async fn suggest(
        &self,
        _ctx: &SuggestionContext,
        node: &CursorNode,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        // never mid-token
        if !node.prefix.ends_with(char::is_whitespace) {
            return Ok(Vec::new());
        }

        Ok(CONJUNCTIONS
            .iter()
            .map(|(keyword, description)| {
                Suggestion::new(
                    SuggestionType::Conjunction,
                    format!("{keyword} "),
                    node.end,
                    node.end,
                )
                .with_description(*description)
            })
            .collect())
    }
}
