//! Token types for query string parsing

use serde::{Deserialize, Serialize};

use crate::ast::Span;

/// Terminal categories produced by the lexer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// A plain word
    Term,
    /// A term whose only wildcard is a single trailing `*`
    Prefix,
    /// A term containing any other unescaped `*` or `?`
    Wildcard,
    /// A double-quoted string
    Phrase,
    /// A `/regex/` literal
    Regex,

    /// `AND` keyword
    And,
    /// `OR` keyword
    Or,
    /// `NOT` keyword
    Not,
    /// `TO` keyword inside ranges
    To,

    /// `+` at a clause boundary
    Plus,
    /// `-` at a clause boundary
    Minus,
    /// `!` at a clause boundary
    Bang,
    /// `:` field separator
    Colon,
    /// `^` with its boost number
    Caret,
    /// `~` with an optional distance
    Tilde,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    /// `>` shorthand comparison
    Gt,
    /// `>=` shorthand comparison
    Gte,
    /// `<` shorthand comparison
    Lt,
    /// `<=` shorthand comparison
    Lte,

    /// A lone `*`
    Star,

    /// Unrecognizable input
    Invalid,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Whether this token can be a field name or term value
    pub fn is_term_like(&self) -> bool {
        matches!(self, TokenKind::Term | TokenKind::Prefix | TokenKind::Wildcard)
    }

    /// Short human-readable name used in diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Term => "term",
            TokenKind::Prefix => "prefix term",
            TokenKind::Wildcard => "wildcard term",
            TokenKind::Phrase => "phrase",
            TokenKind::Regex => "regex",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::To => "TO",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Bang => "'!'",
            TokenKind::Colon => "':'",
            TokenKind::Caret => "'^'",
            TokenKind::Tilde => "'~'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::Gt => "'>'",
            TokenKind::Gte => "'>='",
            TokenKind::Lt => "'<'",
            TokenKind::Lte => "'<='",
            TokenKind::Star => "'*'",
            TokenKind::Invalid => "invalid input",
            TokenKind::Eof => "end of input",
        }
    }
}

/// One lexed token with its raw source text and location
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// The source text of the token, escapes preserved
    pub raw: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, raw: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            raw: raw.into(),
            span,
        }
    }

    /// Number of characters this token covers
    pub fn len(&self) -> usize {
        self.span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// The boost value carried by a `Caret` token (`^2.5` → `2.5`)
    pub fn boost_value(&self) -> Option<f32> {
        match self.kind {
            TokenKind::Caret => self.raw.strip_prefix('^')?.parse().ok(),
            _ => None,
        }
    }
}
