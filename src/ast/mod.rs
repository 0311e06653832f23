//! Abstract syntax tree for parsed queries
//!
//! Query text parses into a tree of [`Node`] values. The variant set is
//! closed: downstream consumers can match exhaustively and rely on the
//! invariants documented on each variant. Nodes own their children (the AST
//! is a tree, never a DAG), and every node carries the [`Span`] of the
//! source text it came from.

mod render;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::visit::{ChainedVisitor, Visitor, VisitorContext};
use crate::visitors::include::{IncludeExpansionVisitor, IncludeResolver};
use crate::visitors::validate::{ValidationOptions, ValidationResult, ValidationVisitor};

/// Source location of a token or node
///
/// Offsets are character offsets into the original input; `start_line` and
/// `start_column` are 1-based. Spans survive every rewrite that preserves a
/// node, so diagnostics produced late in a visitor chain still point at the
/// original text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_offset: usize,
    pub end_offset: usize,
    pub start_line: u32,
    pub start_column: u32,
}

impl Span {
    pub fn new(start_offset: usize, end_offset: usize, start_line: u32, start_column: u32) -> Self {
        Self {
            start_offset,
            end_offset,
            start_line,
            start_column,
        }
    }

    /// Number of characters covered by this span
    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`
    pub fn cover(&self, other: Span) -> Span {
        let (start_offset, start_line, start_column) = if other.start_offset < self.start_offset {
            (other.start_offset, other.start_line, other.start_column)
        } else {
            (self.start_offset, self.start_line, self.start_column)
        };
        Span {
            start_offset,
            end_offset: self.end_offset.max(other.end_offset),
            start_line,
            start_column,
        }
    }
}

/// Whether a clause must, may, or must not match
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occur {
    Must,
    #[default]
    Should,
    MustNot,
}

/// Connector between a clause and the clause before it
///
/// `Implicit` records that the source had no explicit `AND`/`OR`; evaluators
/// interpret it through the default operator the query was parsed with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseOperator {
    And,
    Or,
    #[default]
    Implicit,
}

/// Comparison operator for shorthand ranges (`field:>value` and friends)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => ">",
            RangeOp::Gte => ">=",
            RangeOp::Lt => "<",
            RangeOp::Lte => "<=",
        }
    }
}

/// Operator implied between juxtaposed clauses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOperator {
    And,
    #[default]
    Or,
}

/// One element of a [`BooleanNode`]
///
/// The clause owns its occurrence marker and the connector used to combine
/// it with the previous clause. `query` is `None` only when the parser had
/// to synthesize a placeholder during error recovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub query: Option<Box<Node>>,
    pub occur: Occur,
    pub operator: ClauseOperator,
}

impl Clause {
    pub fn new(query: Node, occur: Occur, operator: ClauseOperator) -> Self {
        Self {
            query: Some(Box::new(query)),
            occur,
            operator,
        }
    }
}

/// Root node holding one optional top-level expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub span: Span,
    pub query: Option<Box<Node>>,
}

/// Parenthesized subexpression with an optional `^boost`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub span: Span,
    pub query: Option<Box<Node>>,
    pub boost: Option<f32>,
}

/// Flat list of clauses combined per clause operator
///
/// The parser never nests a boolean directly inside another boolean; nesting
/// is always explicit through a [`GroupNode`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanNode {
    pub span: Span,
    pub clauses: Vec<Clause>,
}

/// Binds a field name to an inner expression
///
/// The inner expression is leaf-ish: a term, phrase, regex, multi-term, or a
/// group. A boolean inside a field value is always wrapped in a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    pub span: Span,
    pub field: String,
    pub query: Option<Box<Node>>,
}

/// Bare or wildcard word
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermNode {
    pub span: Span,
    /// The term exactly as written, escapes preserved
    pub raw_term: String,
    /// The term with backslash escapes resolved
    pub unescaped_term: String,
    /// True when the only wildcard is a single trailing `*`
    pub is_prefix: bool,
    /// True when the term contains any other unescaped `*` or `?`
    pub is_wildcard: bool,
    pub boost: Option<f32>,
}

/// Double-quoted sequence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhraseNode {
    pub span: Span,
    pub phrase: String,
    pub boost: Option<f32>,
}

/// Bracketed or shorthand range
///
/// Bracketed ranges populate `min`/`max` with the inclusivity flags;
/// shorthand comparisons (`field:>5`) set `op` and exactly one endpoint.
/// Endpoint values are kept as written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeNode {
    pub span: Span,
    pub field: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
    pub op: Option<RangeOp>,
}

/// `/regex/` literal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegexNode {
    pub span: Span,
    pub pattern: String,
}

/// Prefix `NOT`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotNode {
    pub span: Span,
    pub query: Option<Box<Node>>,
}

/// Presence check (`field:*`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExistsNode {
    pub span: Span,
    pub field: String,
}

/// Negated presence check (`_missing_:field`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissingNode {
    pub span: Span,
    pub field: String,
}

/// Single `*` at the query root
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchAllNode {
    pub span: Span,
}

/// Adjacent unquoted terms inside a field value, e.g. `tags:(a b c)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiTermNode {
    pub span: Span,
    pub terms: Vec<String>,
}

/// A node in the query AST
///
/// The variant set is closed. Each variant wraps its own struct so that
/// visitors can take a variant by value, rework it, and hand back any
/// `Node`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Document(DocumentNode),
    Group(GroupNode),
    Boolean(BooleanNode),
    Field(FieldNode),
    Term(TermNode),
    Phrase(PhraseNode),
    Range(RangeNode),
    Regex(RegexNode),
    Not(NotNode),
    Exists(ExistsNode),
    Missing(MissingNode),
    MatchAll(MatchAllNode),
    MultiTerm(MultiTermNode),
}

impl Node {
    /// Source span of this node
    pub fn span(&self) -> Span {
        match self {
            Node::Document(n) => n.span,
            Node::Group(n) => n.span,
            Node::Boolean(n) => n.span,
            Node::Field(n) => n.span,
            Node::Term(n) => n.span,
            Node::Phrase(n) => n.span,
            Node::Range(n) => n.span,
            Node::Regex(n) => n.span,
            Node::Not(n) => n.span,
            Node::Exists(n) => n.span,
            Node::Missing(n) => n.span,
            Node::MatchAll(n) => n.span,
            Node::MultiTerm(n) => n.span,
        }
    }

    /// Variant name for logging and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Document(_) => "document",
            Node::Group(_) => "group",
            Node::Boolean(_) => "boolean",
            Node::Field(_) => "field",
            Node::Term(_) => "term",
            Node::Phrase(_) => "phrase",
            Node::Range(_) => "range",
            Node::Regex(_) => "regex",
            Node::Not(_) => "not",
            Node::Exists(_) => "exists",
            Node::Missing(_) => "missing",
            Node::MatchAll(_) => "match_all",
            Node::MultiTerm(_) => "multi_term",
        }
    }

    pub fn as_document(&self) -> Option<&DocumentNode> {
        match self {
            Node::Document(n) => Some(n),
            _ => None,
        }
    }

    /// The field name carried by this node, if the variant has one
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Node::Field(n) => Some(&n.field),
            Node::Exists(n) => Some(&n.field),
            Node::Missing(n) => Some(&n.field),
            Node::Range(n) => n.field.as_deref(),
            _ => None,
        }
    }

    /// Structural equality ignoring source spans
    ///
    /// Terms compare by their unescaped text and flags, so two parses of
    /// equivalent input (for example the original and its rendered form)
    /// compare equal even when whitespace moved everything around.
    pub fn equivalent(&self, other: &Node) -> bool {
        fn opt_eq(a: &Option<Box<Node>>, b: &Option<Box<Node>>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.equivalent(b),
                _ => false,
            }
        }

        match (self, other) {
            (Node::Document(a), Node::Document(b)) => opt_eq(&a.query, &b.query),
            (Node::Group(a), Node::Group(b)) => a.boost == b.boost && opt_eq(&a.query, &b.query),
            (Node::Boolean(a), Node::Boolean(b)) => {
                a.clauses.len() == b.clauses.len()
                    && a.clauses.iter().zip(&b.clauses).all(|(x, y)| {
                        x.occur == y.occur
                            && x.operator == y.operator
                            && opt_eq(&x.query, &y.query)
                    })
            }
            (Node::Field(a), Node::Field(b)) => a.field == b.field && opt_eq(&a.query, &b.query),
            (Node::Term(a), Node::Term(b)) => {
                a.unescaped_term == b.unescaped_term
                    && a.is_prefix == b.is_prefix
                    && a.is_wildcard == b.is_wildcard
                    && a.boost == b.boost
            }
            (Node::Phrase(a), Node::Phrase(b)) => a.phrase == b.phrase && a.boost == b.boost,
            (Node::Range(a), Node::Range(b)) => {
                a.field == b.field
                    && a.min == b.min
                    && a.max == b.max
                    && a.min_inclusive == b.min_inclusive
                    && a.max_inclusive == b.max_inclusive
                    && a.op == b.op
            }
            (Node::Regex(a), Node::Regex(b)) => a.pattern == b.pattern,
            (Node::Not(a), Node::Not(b)) => opt_eq(&a.query, &b.query),
            (Node::Exists(a), Node::Exists(b)) => a.field == b.field,
            (Node::Missing(a), Node::Missing(b)) => a.field == b.field,
            (Node::MatchAll(_), Node::MatchAll(_)) => true,
            (Node::MultiTerm(a), Node::MultiTerm(b)) => a.terms == b.terms,
            _ => false,
        }
    }

    /// Run this node through a visitor chain, returning the rewritten tree
    pub async fn run_visitors(self, chain: &ChainedVisitor, ctx: &mut VisitorContext) -> Result<Node> {
        chain.run(self, ctx).await
    }

    /// Expand `@include:name` references using `resolver`
    ///
    /// Convenience wrapper around [`IncludeExpansionVisitor`] with the
    /// default operator. Expansion bookkeeping (referenced, unresolved and
    /// circular includes) lands on the context's validation result.
    pub async fn expand_includes<R>(self, resolver: R, ctx: &mut VisitorContext) -> Result<Node>
    where
        R: IncludeResolver + 'static,
    {
        let visitor = IncludeExpansionVisitor::new(resolver);
        visitor.visit(self, ctx).await
    }

    /// Validate this tree against `options`
    ///
    /// Returns the populated [`ValidationResult`]. When
    /// `options.should_throw` is set and violations were found, the result
    /// is raised as a [`crate::QueryError::Validation`] instead.
    pub async fn validate(&self, options: &ValidationOptions) -> Result<ValidationResult> {
        let visitor = ValidationVisitor::new(options.clone());
        let mut ctx = VisitorContext::new();
        visitor.visit(self.clone(), &mut ctx).await?;
        let result = ctx.take_validation_result();
        if options.should_throw && !result.is_valid() {
            return Err(result.into_exception().into());
        }
        Ok(result)
    }

    /// Validate this tree, raising on any violation
    pub async fn validate_and_throw(&self, options: &ValidationOptions) -> Result<ValidationResult> {
        let mut options = options.clone();
        options.should_throw = true;
        self.validate(&options).await
    }
}
