//! Strict KQL parser used when a query is submitted.

use super::lexer::{tokenize, Keyword, Lexeme, RangeOperator, Token};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KqlValue {
    pub text: String,
    pub quoted: bool,
    // byte offsets of the `*` in `text` that are wildcards, not literals
    #[serde(default)]
    pub wildcards: Vec<usize>,
}

impl KqlValue {
    pub fn is_wildcard(&self) -> bool {
        !self.quoted && !self.wildcards.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KqlNode {
    MatchAll,
    Or(Vec<KqlNode>),
    And(Vec<KqlNode>),
    Not(Box<KqlNode>),
    /// `field: value`, or free text when `field` is `None`.
    Is {
        field: Option<String>,
        value: KqlValue,
    },
    Range {
        field: String,
        op: RangeOperator,
        value: String,
    },
    Exists {
        field: String,
    },
    Nested {
        path: String,
        query: Box<KqlNode>,
    },
}

/// Parse a complete query. Blank input matches everything.
pub fn parse_expression(text: &str) -> Result<KqlNode, ParseError> {
    let mut parser = Parser::new(text);
    if parser.at_end() {
        return Ok(KqlNode::MatchAll);
    }
    let node = parser.or_expression(None)?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(ParseError::new(
            "Expected AND, OR or end of input",
            token.start,
        )),
    }
}

// significant token plus whether whitespace followed it
struct Significant {
    token: Token,
    spaced: bool,
}

struct Parser {
    tokens: Vec<Significant>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        let all = tokenize(text);
        let tokens = all
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_space())
            .map(|(idx, t)| Significant {
                token: t.clone(),
                spaced: all.get(idx + 1).is_some_and(Token::is_space),
            })
            .collect();
        Self {
            tokens,
            pos: 0,
            len: text.len(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.start).unwrap_or(self.len)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|s| s.spaced && s.token.keyword() == Some(keyword))
    }

    fn expect(&mut self, lexeme: Lexeme, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) if token.lexeme == lexeme => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(ParseError::new(format!("Expected {what}"), self.position())),
        }
    }

    // `value_field` is set inside a value list: `field:(a or b)`
    fn or_expression(&mut self, value_field: Option<&str>) -> Result<KqlNode, ParseError> {
        let mut nodes = vec![self.and_expression(value_field)?];
        while self.at_keyword(Keyword::Or) {
            self.pos += 1;
            nodes.push(self.and_expression(value_field)?);
        }
        Ok(flatten(nodes, KqlNode::Or))
    }

    fn and_expression(&mut self, value_field: Option<&str>) -> Result<KqlNode, ParseError> {
        let mut nodes = vec![self.not_expression(value_field)?];
        while self.at_keyword(Keyword::And) {
            self.pos += 1;
            nodes.push(self.not_expression(value_field)?);
        }
        Ok(flatten(nodes, KqlNode::And))
    }

    fn not_expression(&mut self, value_field: Option<&str>) -> Result<KqlNode, ParseError> {
        if self.at_keyword(Keyword::Not) {
            self.pos += 1;
            return Ok(KqlNode::Not(Box::new(self.not_expression(value_field)?)));
        }
        if self.peek().is_some_and(|t| t.lexeme == Lexeme::LParen) {
            self.pos += 1;
            let inner = self.or_expression(value_field)?;
            self.expect(Lexeme::RParen, "\")\"")?;
            return Ok(inner);
        }
        match value_field {
            Some(field) => {
                let value = self.value()?;
                Ok(is_node(Some(field.to_string()), value))
            }
            None => self.clause(),
        }
    }

    fn clause(&mut self) -> Result<KqlNode, ParseError> {
        let term = self.value()?;
        let Some(next) = self.peek() else {
            return Ok(KqlNode::Is { field: None, value: term });
        };

        match next.lexeme.clone() {
            Lexeme::Colon => {
                self.pos += 1;
                let field = term.text;
                match self.peek().map(|t| t.lexeme.clone()) {
                    Some(Lexeme::LParen) => {
                        self.pos += 1;
                        let node = self.or_expression(Some(&field))?;
                        self.expect(Lexeme::RParen, "\")\"")?;
                        Ok(node)
                    }
                    Some(Lexeme::LBrace) => {
                        self.pos += 1;
                        let query = if self.peek().is_some_and(|t| t.lexeme == Lexeme::RBrace) {
                            KqlNode::MatchAll
                        } else {
                            self.or_expression(None)?
                        };
                        self.expect(Lexeme::RBrace, "\"}\"")?;
                        Ok(KqlNode::Nested {
                            path: field,
                            query: Box::new(query),
                        })
                    }
                    _ => {
                        let value = self.value()?;
                        Ok(is_node(Some(field), value))
                    }
                }
            }
            Lexeme::Range(op) => {
                self.pos += 1;
                let value = self.value()?;
                Ok(KqlNode::Range {
                    field: term.text,
                    op,
                    value: value.text,
                })
            }
            _ => Ok(KqlNode::Is {
                field: None,
                value: term,
            }),
        }
    }

    // a quoted string or a run of unquoted words
    fn value(&mut self) -> Result<KqlValue, ParseError> {
        let position = self.position();
        match self.peek().map(|t| t.lexeme.clone()) {
            Some(Lexeme::Quoted {
                value,
                terminated: true,
            }) => {
                self.pos += 1;
                Ok(KqlValue {
                    text: value,
                    quoted: true,
                    wildcards: Vec::new(),
                })
            }
            Some(Lexeme::Quoted {
                terminated: false, ..
            }) => Err(ParseError::new("Unterminated quoted string", position)),
            Some(Lexeme::Word { .. }) => {
                let mut text = String::new();
                let mut wildcards = Vec::new();
                let mut words = 0;
                while !self.at_keyword(Keyword::And) && !self.at_keyword(Keyword::Or) {
                    let Some(Lexeme::Word {
                        value,
                        wildcards: stars,
                        ..
                    }) = self.peek().map(|t| t.lexeme.clone())
                    else {
                        break;
                    };
                    // a phrase never swallows the keyword that starts the next clause
                    if words > 0 && self.at_keyword(Keyword::Not) {
                        break;
                    }
                    self.advance();
                    if words > 0 {
                        text.push(' ');
                    }
                    wildcards.extend(stars.iter().map(|offset| offset + text.len()));
                    text.push_str(&value);
                    words += 1;
                }
                if words == 0 {
                    return Err(ParseError::new("Expected a value", position));
                }
                Ok(KqlValue {
                    text,
                    quoted: false,
                    wildcards,
                })
            }
            _ => Err(ParseError::new("Expected a field name or value", position)),
        }
    }
}

fn is_node(field: Option<String>, value: KqlValue) -> KqlNode {
    match field {
        Some(field) if value.is_wildcard() && value.text == "*" => KqlNode::Exists { field },
        field => KqlNode::Is { field, value },
    }
}

fn flatten(mut nodes: Vec<KqlNode>, wrap: fn(Vec<KqlNode>) -> KqlNode) -> KqlNode {
    if nodes.len() == 1 {
        nodes.remove(0)
    } else {
        wrap(nodes)
    }
}
