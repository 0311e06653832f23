//! Lucene-style query parsing, rewriting, and rendering
//!
//! The pipeline is a straight line from text to text:
//!
//! ```text
//! source text ──► lexer ──► parser ──► AST ──► visitor chain ──► AST ──► renderer ──► text
//! ```
//!
//! [`parse`] turns a query string into a typed AST together with recovered
//! diagnostics — it never fails on malformed input. The AST can be rewritten
//! through composable async [`Visitor`]s (include expansion, field
//! resolution, validation ship with the crate) and rendered back to a
//! canonical query string that re-parses to an equivalent tree.
//!
//! # Example
//!
//! ```rust
//! use lucerne::parse;
//!
//! let result = parse("title:\"hello world\" AND price:[100 TO 500]");
//! assert!(result.is_success());
//! assert_eq!(
//!     result.document.render(),
//!     "title:\"hello world\" AND price:[100 TO 500]"
//! );
//! ```

pub mod ast;
pub mod error;
pub mod escape;
pub mod syntax;
pub mod visit;
pub mod visitors;

pub use ast::{
    BooleanNode, Clause, ClauseOperator, DefaultOperator, DocumentNode, ExistsNode, FieldNode,
    GroupNode, MatchAllNode, MissingNode, MultiTermNode, Node, NotNode, Occur, PhraseNode,
    RangeNode, RangeOp, RegexNode, Span, TermNode,
};
pub use error::{ParseError, QueryError, Result};
pub use syntax::{ParseResult, Parser};
pub use visit::{ChainedVisitor, Visitor, VisitorContext};
pub use visitors::{
    FieldResolutionVisitor, FieldResolver, HierarchicalFieldResolver, IncludeExpansionVisitor,
    IncludeResolver, MapIncludeResolver, Operation, ValidationError, ValidationException,
    ValidationOptions, ValidationResult, ValidationVisitor,
};

/// Parse a query string with the default operator ([`DefaultOperator::Or`])
pub fn parse(query: &str) -> ParseResult {
    Parser::new(query).parse()
}

/// Parse a query string with an explicit default operator
pub fn parse_with_operator(query: &str, default_operator: DefaultOperator) -> ParseResult {
    Parser::new(query)
        .with_default_operator(default_operator)
        .parse()
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
