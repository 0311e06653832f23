use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::visitors::validate::ValidationException;

/// Main error type for query operations
///
/// Malformed query text is never an error: the parser always returns a
/// best-effort document together with its diagnostics. `QueryError` is
/// reserved for contract violations, resolver failures surfaced during a
/// rewrite, and the explicit validate-and-throw path.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Include resolver failed for '{name}': {message}")]
    IncludeResolver { name: String, message: String },

    #[error("Field resolver failed for '{field}': {message}")]
    FieldResolver { field: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationException),
}

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// A lexical or syntactic diagnostic attached to a `ParseResult`
///
/// Parse errors are strictly informational. The parser records one for every
/// problem it recovers from and keeps going; the returned document is always
/// well-formed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// Human-readable description of the problem
    pub message: String,
    /// Character offset of the offending input
    pub position: usize,
    /// Number of characters covered by the diagnostic
    pub length: usize,
    /// 1-based line of the offending input
    pub line: u32,
    /// 1-based column of the offending input
    pub column: u32,
}

impl ParseError {
    pub fn new(
        message: impl Into<String>,
        position: usize,
        length: usize,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            message: message.into(),
            position,
            length,
            line,
            column,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.column)
    }
}
