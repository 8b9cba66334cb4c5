//! KQL lexer shared by the cursor-aware and the strict parser.
//!
//! Never fails: unknown characters end up in words and an unterminated
//! quote runs to the end of the input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeOperator {
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "gte")]
    Gte,
}

impl RangeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    Space,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Colon,
    Range(RangeOperator),
    /// Unquoted literal with escapes resolved. `wildcards` holds the byte
    /// offsets of unescaped `*` in `value`.
    Word {
        value: String,
        wildcards: Vec<usize>,
        escaped: bool,
    },
    Quoted {
        value: String,
        terminated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub lexeme: Lexeme,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Keyword spelled by this token, ignoring whether it is followed by
    /// whitespace. Escaped words are never keywords.
    pub fn keyword(&self) -> Option<Keyword> {
        match &self.lexeme {
            Lexeme::Word {
                value,
                escaped: false,
                ..
            } => {
                if value.eq_ignore_ascii_case("and") {
                    Some(Keyword::And)
                } else if value.eq_ignore_ascii_case("or") {
                    Some(Keyword::Or)
                } else if value.eq_ignore_ascii_case("not") {
                    Some(Keyword::Not)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn is_space(&self) -> bool {
        self.lexeme == Lexeme::Space
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.lexeme, Lexeme::Word { .. } | Lexeme::Quoted { .. })
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '(' | ')' | '{' | '}' | ':' | '<' | '>' | '"')
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let lexeme = match c {
            c if c.is_whitespace() => {
                while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
                Lexeme::Space
            }
            '(' | ')' | '{' | '}' | ':' => {
                chars.next();
                match c {
                    '(' => Lexeme::LParen,
                    ')' => Lexeme::RParen,
                    '{' => Lexeme::LBrace,
                    '}' => Lexeme::RBrace,
                    _ => Lexeme::Colon,
                }
            }
            '<' | '>' => {
                chars.next();
                let inclusive = chars.next_if(|(_, c)| *c == '=').is_some();
                Lexeme::Range(match (c, inclusive) {
                    ('<', false) => RangeOperator::Lt,
                    ('<', true) => RangeOperator::Lte,
                    ('>', false) => RangeOperator::Gt,
                    _ => RangeOperator::Gte,
                })
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut terminated = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, next @ ('"' | '\\'))) => value.push(next),
                            Some((_, next)) => {
                                value.push('\\');
                                value.push(next);
                            }
                            None => value.push('\\'),
                        },
                        other => value.push(other),
                    }
                }
                Lexeme::Quoted { value, terminated }
            }
            _ => {
                let mut value = String::new();
                let mut wildcards = Vec::new();
                let mut escaped = false;
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || is_special(c) {
                        break;
                    }
                    chars.next();
                    match c {
                        '\\' => {
                            escaped = true;
                            match chars.next() {
                                Some((_, 't')) => value.push('\t'),
                                Some((_, 'r')) => value.push('\r'),
                                Some((_, 'n')) => value.push('\n'),
                                Some((_, next)) => value.push(next),
                                None => value.push('\\'),
                            }
                        }
                        '*' => {
                            wildcards.push(value.len());
                            value.push('*');
                        }
                        other => value.push(other),
                    }
                }
                Lexeme::Word {
                    value,
                    wildcards,
                    escaped,
                }
            }
        };

        let end = chars.peek().map(|(idx, _)| *idx).unwrap_or(input.len());
        tokens.push(Token { lexeme, start, end });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexemes(input: &str) -> Vec<Lexeme> {
        tokenize(input).into_iter().map(|t| t.lexeme).collect()
    }

    fn word(value: &str) -> Lexeme {
        Lexeme::Word {
            value: value.to_string(),
            wildcards: Vec::new(),
            escaped: false,
        }
    }

    #[test]
    fn test_clause() {
        assert_eq!(
            lexemes("status:200 and"),
            vec![
                word("status"),
                Lexeme::Colon,
                word("200"),
                Lexeme::Space,
                word("and"),
            ]
        );
    }

    #[test]
    fn test_range_operators() {
        assert_eq!(
            lexemes("a>=1 b<2"),
            vec![
                word("a"),
                Lexeme::Range(RangeOperator::Gte),
                word("1"),
                Lexeme::Space,
                word("b"),
                Lexeme::Range(RangeOperator::Lt),
                word("2"),
            ]
        );
    }

    #[test]
    fn test_escapes_and_offsets() {
        let tokens = tokenize(r"a\:b c");
        assert_eq!(
            tokens[0].lexeme,
            Lexeme::Word {
                value: "a:b".to_string(),
                wildcards: Vec::new(),
                escaped: true,
            }
        );
        assert_eq!((tokens[0].start, tokens[0].end), (0, 4));
        assert_eq!((tokens[2].start, tokens[2].end), (5, 6));
    }

    #[test]
    fn test_escaped_star_is_not_a_wildcard() {
        assert_eq!(
            lexemes(r"a\**b*"),
            vec![Lexeme::Word {
                value: "a**b*".to_string(),
                wildcards: vec![2, 4],
                escaped: true,
            }]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let tokens = tokenize(r#"msg:"hello \"wor"#);
        assert_eq!(
            tokens[2].lexeme,
            Lexeme::Quoted {
                value: r#"hello "wor"#.to_string(),
                terminated: false,
            }
        );
        assert_eq!(tokens[2].end, 16);
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize(r"OR Not \and");
        assert_eq!(tokens[0].keyword(), Some(Keyword::Or));
        assert_eq!(tokens[2].keyword(), Some(Keyword::Not));
        assert_eq!(tokens[4].keyword(), None);
    }

    #[test]
    fn test_multibyte_offsets() {
        let tokens = tokenize("città:é");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 6));
        assert_eq!(tokens[2].end, "città:é".len());
    }
}
