//! Cursor-aware parsing: works out what kind of token belongs at the caret.
//!
//! Only the tokens before the caret are interpreted, so anything typed after
//! it (complete or not) cannot make the node worse.

use super::lexer::{tokenize, Keyword, Lexeme, Token};
use crate::{CursorNode, TokenKind};
use tracing::trace;

/// Marker used when the caller does not bring its own.
pub const DEFAULT_CURSOR_MARKER: &str = "@kuery-cursor@";

/// A marker that cannot collide with anything a user types.
pub fn new_cursor_marker() -> String {
    format!("@kuery-cursor-{}@", uuid::Uuid::new_v4().simple())
}

/// Parse `text` containing `marker` at the caret. The first occurrence of the
/// marker is removed; without one the caret sits at the end of the text.
pub fn parse_cursor(text: &str, marker: &str) -> CursorNode {
    if !marker.is_empty() {
        if let Some(caret) = text.find(marker) {
            let clean = format!("{}{}", &text[..caret], &text[caret + marker.len()..]);
            return parse_cursor_at(&clean, caret);
        }
    }
    parse_cursor_at(text, text.len())
}

/// Parse `text` with the caret at byte offset `caret`.
/// The caret is clamped into the text and onto a char boundary.
pub fn parse_cursor_at(text: &str, caret: usize) -> CursorNode {
    let mut caret = caret.min(text.len());
    while !text.is_char_boundary(caret) {
        caret -= 1;
    }

    let tokens = tokenize(text);
    let current = tokens
        .iter()
        .position(|t| t.is_literal() && t.start <= caret && caret <= t.end);
    let processed = match current {
        Some(idx) => &tokens[..idx],
        None => {
            let upto = tokens.iter().take_while(|t| t.end <= caret).count();
            &tokens[..upto]
        }
    };

    let mut walker = Walker::default();
    for (idx, token) in processed.iter().enumerate() {
        let followed_by_space = tokens.get(idx + 1).is_some_and(Token::is_space);
        if !walker.step(token, followed_by_space) {
            trace!(position = token.start, "Cursor parse gave up");
            return CursorNode::degraded(caret);
        }
    }

    let node = match current {
        Some(idx) => walker.classify_token(text, &tokens[idx], caret),
        None => walker.classify_gap(text, caret),
    };
    node.unwrap_or_else(|| CursorNode::degraded(caret))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    // start of input, after a conjunction, `not`, `(` or `{`
    ExpectClause,
    // bare word(s) that may still turn into a field name
    AfterTerm { term: String },
    AfterOperator { field: String, range: bool },
    AfterValue {
        field: Option<String>,
        phrase_start: usize,
        quoted: bool,
    },
    // after `)` or `}`
    AfterClause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Group,
    ValueList { field: String },
    Nested { path: String },
}

#[derive(Debug)]
struct Walker {
    state: State,
    frames: Vec<Frame>,
}

impl Default for Walker {
    fn default() -> Self {
        Self {
            state: State::ExpectClause,
            frames: Vec::new(),
        }
    }
}

impl Walker {
    fn value_list_field(&self) -> Option<&str> {
        match self.frames.last() {
            Some(Frame::ValueList { field }) => Some(field),
            _ => None,
        }
    }

    fn nested_path(&self) -> Option<String> {
        let paths: Vec<&str> = self
            .frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Nested { path } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        (!paths.is_empty()).then(|| paths.join("."))
    }

    fn close(&mut self, brace: bool) -> bool {
        let matches = match self.frames.last() {
            Some(Frame::Nested { .. }) => brace,
            Some(Frame::Group | Frame::ValueList { .. }) => !brace,
            None => false,
        };
        if matches {
            self.frames.pop();
            self.state = State::AfterClause;
        }
        matches
    }

    /// Advance over one token before the caret. Returns false when the input
    /// stops making sense.
    fn step(&mut self, token: &Token, followed_by_space: bool) -> bool {
        if token.is_space() {
            return true;
        }
        let conjunction = followed_by_space
            && matches!(token.keyword(), Some(Keyword::And | Keyword::Or));
        let negation = followed_by_space && token.keyword() == Some(Keyword::Not);

        let next = match (&self.state, &token.lexeme) {
            (State::ExpectClause, _) if negation => State::ExpectClause,
            (State::ExpectClause, Lexeme::LParen) => {
                let frame = match self.value_list_field() {
                    Some(field) => Frame::ValueList {
                        field: field.to_string(),
                    },
                    None => Frame::Group,
                };
                self.frames.push(frame);
                State::ExpectClause
            }
            (State::ExpectClause, Lexeme::Word { value, .. }) => match self.value_list_field() {
                Some(field) => State::AfterValue {
                    field: Some(field.to_string()),
                    phrase_start: token.start,
                    quoted: false,
                },
                None => State::AfterTerm {
                    term: value.clone(),
                },
            },
            (State::ExpectClause, Lexeme::Quoted { .. }) => State::AfterValue {
                field: self.value_list_field().map(str::to_string),
                phrase_start: token.start,
                quoted: true,
            },

            (State::AfterTerm { .. }, _) if conjunction => State::ExpectClause,
            (State::AfterTerm { term }, Lexeme::Colon) => State::AfterOperator {
                field: term.clone(),
                range: false,
            },
            (State::AfterTerm { term }, Lexeme::Range(_)) => State::AfterOperator {
                field: term.clone(),
                range: true,
            },
            (State::AfterTerm { term }, Lexeme::Word { value, .. }) => State::AfterTerm {
                term: format!("{term} {value}"),
            },

            (State::AfterOperator { field, .. }, Lexeme::Word { .. }) => State::AfterValue {
                field: Some(field.clone()),
                phrase_start: token.start,
                quoted: false,
            },
            (State::AfterOperator { field, .. }, Lexeme::Quoted { .. }) => State::AfterValue {
                field: Some(field.clone()),
                phrase_start: token.start,
                quoted: true,
            },
            (State::AfterOperator { field, range: false }, Lexeme::LParen) => {
                self.frames.push(Frame::ValueList {
                    field: field.clone(),
                });
                State::ExpectClause
            }
            (State::AfterOperator { field, range: false }, Lexeme::LBrace) => {
                self.frames.push(Frame::Nested {
                    path: field.clone(),
                });
                State::ExpectClause
            }

            (State::AfterValue { .. } | State::AfterClause, _) if conjunction => {
                State::ExpectClause
            }
            (
                State::AfterValue {
                    field: Some(field),
                    phrase_start,
                    quoted: false,
                },
                Lexeme::Word { .. },
            ) => State::AfterValue {
                field: Some(field.clone()),
                phrase_start: *phrase_start,
                quoted: false,
            },

            (State::AfterTerm { .. } | State::AfterValue { .. } | State::AfterClause, Lexeme::RParen) => {
                return self.close(false);
            }
            (State::AfterTerm { .. } | State::AfterValue { .. } | State::AfterClause, Lexeme::RBrace) => {
                return self.close(true);
            }

            _ => return false,
        };

        self.state = next;
        true
    }

    fn classify_token(&self, text: &str, token: &Token, caret: usize) -> Option<CursorNode> {
        let nested_path = self.nested_path();
        let value_list = self.value_list_field().map(str::to_string);

        match &token.lexeme {
            Lexeme::Word { .. } => {
                let (kinds, field_name, start) = match &self.state {
                    State::ExpectClause => match value_list {
                        Some(field) => (vec![TokenKind::Value], Some(field), token.start),
                        None => (vec![TokenKind::Field], None, token.start),
                    },
                    State::AfterTerm { .. } => (vec![TokenKind::Field], None, token.start),
                    State::AfterOperator { field, .. } => {
                        (vec![TokenKind::Value], Some(field.clone()), token.start)
                    }
                    State::AfterValue {
                        field: Some(field),
                        phrase_start,
                        quoted: false,
                    } => (vec![TokenKind::Value], Some(field.clone()), *phrase_start),
                    _ => return None,
                };
                Some(CursorNode {
                    field_name,
                    nested_path,
                    suggestion_types: kinds,
                    start,
                    end: token.end,
                    prefix: text[start..caret].to_string(),
                    suffix: text[caret..token.end].to_string(),
                    text: text[start..token.end].to_string(),
                })
            }
            Lexeme::Quoted { terminated, .. } => {
                let field = match &self.state {
                    State::AfterOperator { field, .. } => field.clone(),
                    State::ExpectClause => value_list?,
                    _ => return None,
                };
                // quote characters are not part of what the user typed
                let content_start = token.start + 1;
                let content_end = if *terminated { token.end - 1 } else { token.end };
                let before = caret.clamp(content_start, content_end.max(content_start));
                Some(CursorNode {
                    field_name: Some(field),
                    nested_path,
                    suggestion_types: vec![TokenKind::Value],
                    start: token.start,
                    end: token.end,
                    prefix: text[content_start..before].to_string(),
                    suffix: text[before..content_end.max(before)].to_string(),
                    text: text[token.start..token.end].to_string(),
                })
            }
            _ => None,
        }
    }

    fn classify_gap(&self, text: &str, caret: usize) -> Option<CursorNode> {
        let (kinds, field_name) = match &self.state {
            State::ExpectClause => match self.value_list_field() {
                Some(field) => (vec![TokenKind::Value], Some(field.to_string())),
                None => (vec![TokenKind::Field], None),
            },
            State::AfterTerm { term } => (
                vec![TokenKind::Operator, TokenKind::Conjunction],
                Some(term.clone()),
            ),
            State::AfterOperator { field, .. } => (vec![TokenKind::Value], Some(field.clone())),
            State::AfterValue { .. } | State::AfterClause => (vec![TokenKind::Conjunction], None),
        };

        let before = &text[..caret];
        let after = &text[caret..];
        let prefix = &before[before.trim_end().len()..];
        let suffix = &after[..after.len() - after.trim_start().len()];

        Some(CursorNode {
            field_name,
            nested_path: self.nested_path(),
            suggestion_types: kinds,
            start: caret,
            end: caret,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            text: format!("{prefix}{suffix}"),
        })
    }
}
