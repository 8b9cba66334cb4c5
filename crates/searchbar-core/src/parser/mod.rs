//! KQL parsing: a never-failing cursor-aware parser for autocomplete and a
//! strict parser for submitted queries. Both share one lexer.

pub mod cursor;
pub mod expression;
pub mod lexer;

pub use cursor::{new_cursor_marker, parse_cursor, parse_cursor_at, DEFAULT_CURSOR_MARKER};
pub use expression::{parse_expression, KqlNode, KqlValue, ParseError};
pub use lexer::{tokenize, Keyword, Lexeme, RangeOperator, Token};
