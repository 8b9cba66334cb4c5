//! Escaping of user values before they are spliced into a KQL query.

use regex::Regex;
use std::sync::LazyLock;

static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\():<>"*{}]"#).expect("valid special char pattern"));
static KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\s+)(and|or)(\s+)").expect("valid keyword pattern"));
static NOT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(not)(\s+)").expect("valid not pattern"));

/// Escape a value so the KQL parser reads it back as a single literal.
pub fn escape_kuery(value: &str) -> String {
    let escaped = SPECIAL_CHARS.replace_all(value, r"\$0");
    let escaped = KEYWORDS.replace_all(&escaped, r"$1\$2$3");
    let escaped = NOT_KEYWORD.replace_all(&escaped, r"\$1$2");
    escape_whitespace(&escaped)
}

/// Escape a value for use inside a quoted KQL phrase.
pub fn escape_quotes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\t' => out.push_str(r"\t"),
            '\r' => out.push_str(r"\r"),
            '\n' => out.push_str(r"\n"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_chars() {
        assert_eq!(escape_kuery("a:b"), r"a\:b");
        assert_eq!(escape_kuery(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_kuery("(x*)"), r"\(x\*\)");
    }

    #[test]
    fn test_escape_keywords() {
        assert_eq!(escape_kuery("this and that"), r"this \and that");
        assert_eq!(escape_kuery("black OR white"), r"black \OR white");
        assert_eq!(escape_kuery("not found"), r"\not found");
        // keywords glued to words are left alone
        assert_eq!(escape_kuery("android"), "android");
    }

    #[test]
    fn test_escape_whitespace() {
        assert_eq!(escape_kuery("a\tb\nc"), r"a\tb\nc");
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes(r#"He said "no""#), r#"He said \"no\""#);
        assert_eq!(escape_quotes(r"C:\tmp"), r"C:\\tmp");
    }
}
