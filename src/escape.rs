//! Backslash escaping for query special characters
//!
//! The query language reserves a small set of punctuation characters plus
//! whitespace; any of them can be embedded in a term by prefixing it with a
//! backslash. The lexer uses [`unescape`] to produce the logical term text
//! and the renderer uses [`escape`] to emit parseable output again.

/// Characters that carry syntactic meaning and must be escaped inside terms
pub const SPECIAL_CHARS: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '/', '\\',
];

/// Check whether a character needs escaping inside a term
pub fn is_special(ch: char) -> bool {
    SPECIAL_CHARS.contains(&ch) || ch.is_whitespace()
}

/// Escape every special character and whitespace character in `input`
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if is_special(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Resolve backslash escapes in `input`
///
/// A backslash makes the following character literal, whatever it is. A
/// trailing backslash with nothing after it is kept as-is.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Escape a field name for rendering
///
/// Identical to [`escape`]; field names use the same reserved set as terms.
pub fn escape_field(field: &str) -> String {
    escape(field)
}

/// Escape phrase content for rendering inside double quotes
///
/// Only the quote and the backslash need escaping inside a phrase; every
/// other character is literal there.
pub fn escape_phrase(phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len());
    for ch in phrase.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
