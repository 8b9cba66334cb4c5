use super::{SuggestError, SuggestionContext, SuggestionProvider};
use async_trait::async_trait;
use searchbar_core::{CursorNode, FieldType, Suggestion, SuggestionType, TokenKind};

const EQUALITY_TYPES: &[FieldType] = &[
    FieldType::String,
    FieldType::Number,
    FieldType::NumberRange,
    FieldType::Date,
    FieldType::DateRange,
    FieldType::Ip,
    FieldType::IpRange,
    FieldType::GeoPoint,
    FieldType::GeoShape,
    FieldType::Boolean,
];

const RANGE_TYPES: &[FieldType] = &[
    FieldType::Number,
    FieldType::NumberRange,
    FieldType::Date,
    FieldType::DateRange,
    FieldType::Ip,
    FieldType::IpRange,
];

struct Operator {
    text: &'static str,
    description: &'static str,
    // None applies to every type
    field_types: Option<&'static [FieldType]>,
}

const OPERATORS: [Operator; 6] = [
    Operator {
        text: ":",
        description: "equals some value",
        field_types: Some(EQUALITY_TYPES),
    },
    Operator {
        text: "<=",
        description: "is less than or equal to some value",
        field_types: Some(RANGE_TYPES),
    },
    Operator {
        text: ">=",
        description: "is greater than or equal to some value",
        field_types: Some(RANGE_TYPES),
    },
    Operator {
        text: "<",
        description: "is less than some value",
        field_types: Some(RANGE_TYPES),
    },
    Operator {
        text: ">",
        description: "is greater than some value",
        field_types: Some(RANGE_TYPES),
    },
    Operator {
        text: ": *",
        description: "exists in any form",
        field_types: None,
    },
];

/// Suggests the operators that make sense for the field before the caret.
pub struct OperatorProvider;

impl OperatorProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OperatorProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SuggestionProvider for OperatorProvider {
    fn kind(&self) -> TokenKind {
        TokenKind::Operator
    }

    async fn suggest(
        &self,
        ctx: &SuggestionContext,
        node: &CursorNode,
    ) -> Result<Vec<Suggestion>, SuggestError> {
        let Some(field) = ctx.field_for(node) else {
            return Ok(Vec::new());
        };

        Ok(OPERATORS
            .iter()
            .filter(|op| {
                op.field_types
                    .is_none_or(|types| types.contains(&field.field_type))
            })
            .map(|op| {
                Suggestion::new(
                    SuggestionType::Operator,
                    format!("{} ", op.text),
                    node.end,
                    node.end,
                )
                .with_description(op.description)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchbar_core::{parse_cursor_at, CanonicalField, DatasourceParams};
    use std::sync::Arc;

    fn ctx() -> SuggestionContext {
        SuggestionContext::new(
            Arc::from(vec![
                CanonicalField::new("bytes", "long"),
                CanonicalField::new("message", "text"),
                CanonicalField::new("location", "geo_point"),
                CanonicalField::new("blob", "binary"),
            ]),
            DatasourceParams::new("logs"),
        )
    }

    async fn operators(query: &str) -> Vec<String> {
        let node = parse_cursor_at(query, query.len());
        OperatorProvider::new()
            .suggest(&ctx(), &node)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    #[tokio::test]
    async fn test_number_gets_ranges() {
        assert_eq!(
            operators("bytes ").await,
            vec![": ", "<= ", ">= ", "< ", "> ", ": * "]
        );
    }

    #[tokio::test]
    async fn test_string_and_unknown() {
        assert_eq!(operators("message ").await, vec![": ", ": * "]);
        assert_eq!(operators("location ").await, vec![": ", ": * "]);
        assert_eq!(operators("blob ").await, vec![": * "]);
    }

    #[tokio::test]
    async fn test_unknown_field() {
        assert!(operators("nope ").await.is_empty());
    }
}
