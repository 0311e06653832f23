//! Recursive descent parser for query strings
//!
//! # Grammar
//!
//! ```text
//! document  := query? EOF
//! query     := clause ((AND | OR)? clause)*
//! clause    := ('+' | '-' | '!')? unary
//! unary     := NOT unary | primary
//! primary   := grouped | field_expr | range | phrase | regex | term | '*'
//! field_expr:= TERM ':' field_value
//! field_value := range | shorthand | phrase | regex | grouped | term | '*'
//! range     := ('[' | '{') endpoint TO endpoint (']' | '}')
//! shorthand := ('>' | '>=' | '<' | '<=') endpoint
//! grouped   := '(' query ')' boost?
//! boost     := '^' NUMBER
//! ```
//!
//! The parser never fails. Unexpected input is recorded as a [`ParseError`]
//! at the offending token, a placeholder is synthesized where the grammar
//! requires a node, and parsing resumes at the next clause boundary or the
//! closing delimiter of the enclosing group. The returned document is always
//! well-formed.

use serde::{Deserialize, Serialize};

use crate::ast::{
    BooleanNode, Clause, ClauseOperator, DefaultOperator, DocumentNode, ExistsNode, FieldNode,
    GroupNode, MatchAllNode, MissingNode, MultiTermNode, Node, NotNode, Occur, PhraseNode,
    RangeNode, RangeOp, RegexNode, Span, TermNode,
};
use crate::error::ParseError;
use crate::escape;

use super::lexer::Lexer;
use super::token::{Token, TokenKind};

/// Field name that marks the Elasticsearch 1.x negated-presence form
const MISSING_FIELD: &str = "_missing_";
/// Field name that marks the Elasticsearch 1.x presence form
const EXISTS_FIELD: &str = "_exists_";

/// Outcome of a parse: a best-effort document plus its diagnostics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParseResult {
    /// The parsed document; always present, even for malformed input
    pub document: Node,
    /// Lexical and syntactic diagnostics, ordered by source position
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// True when no diagnostics were recorded
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parser for Lucene-style query strings
pub struct Parser {
    lexer: Lexer,
    current: Token,
    errors: Vec<ParseError>,
    default_operator: DefaultOperator,
}

impl Parser {
    /// Create a new parser for the given query string
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            errors: Vec::new(),
            default_operator: DefaultOperator::default(),
        }
    }

    /// Set the operator implied between juxtaposed clauses
    ///
    /// The parser records juxtaposition as [`ClauseOperator::Implicit`];
    /// the default operator travels with the parse so that rewriters (and
    /// re-parses during include expansion) interpret it consistently.
    pub fn with_default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn default_operator(&self) -> DefaultOperator {
        self.default_operator
    }

    /// Parse the query string into a document plus diagnostics
    pub fn parse(mut self) -> ParseResult {
        let input_len = self.lexer.input_len();
        let query = if self.current.kind == TokenKind::Eof {
            None
        } else {
            Some(Box::new(self.parse_query(None)))
        };
        let span = Span::new(0, input_len, 1, 1);
        let document = Node::Document(DocumentNode { span, query });

        let mut errors = self.lexer.take_errors();
        errors.append(&mut self.errors);
        errors.sort_by_key(|e| e.position);
        ParseResult { document, errors }
    }

    /// query := clause ((AND | OR)? clause)*
    ///
    /// Clauses are collected into one flat boolean; nesting only happens
    /// through explicit groups. A single optional clause collapses to its
    /// inner expression.
    fn parse_query(&mut self, terminator: Option<TokenKind>) -> Node {
        let mut clauses: Vec<Clause> = Vec::new();
        let mut span = self.current.span;

        loop {
            if self.current.kind == TokenKind::Eof || Some(self.current.kind) == terminator {
                break;
            }
            // A stray closer at the top level is consumed so scanning
            // resumes at the next clause.
            if terminator.is_none() && self.current.kind == TokenKind::RightParen {
                self.error_here("Unexpected token ')'");
                self.advance();
                continue;
            }

            let mut operator = match self.current.kind {
                TokenKind::And => {
                    self.advance();
                    ClauseOperator::And
                }
                TokenKind::Or => {
                    self.advance();
                    ClauseOperator::Or
                }
                _ => ClauseOperator::Implicit,
            };
            if operator != ClauseOperator::Implicit && clauses.is_empty() {
                self.error_here("Operator without a preceding clause");
                operator = ClauseOperator::Implicit;
            }
            if self.current.kind == TokenKind::Eof || Some(self.current.kind) == terminator {
                if operator != ClauseOperator::Implicit {
                    self.error_here("Expected clause after operator");
                    clauses.push(Clause {
                        query: None,
                        occur: Occur::Should,
                        operator,
                    });
                }
                break;
            }

            let occur = match self.current.kind {
                TokenKind::Plus => {
                    self.advance();
                    Occur::Must
                }
                TokenKind::Minus | TokenKind::Bang => {
                    self.advance();
                    Occur::MustNot
                }
                _ => Occur::Should,
            };
            // A prohibited clause wrapping another negation would
            // double-negate; keep the single negation.
            if occur == Occur::MustNot && self.current.kind == TokenKind::Not {
                self.error_here("Redundant NOT on a prohibited clause");
                self.advance();
            }

            let query = self.parse_unary(terminator);
            if let Some(node) = &query {
                span = span.cover(node.span());
            }
            clauses.push(Clause {
                query: query.map(Box::new),
                occur,
                operator,
            });
        }

        if clauses.len() == 1
            && clauses[0].occur == Occur::Should
            && clauses[0].query.is_some()
        {
            return *clauses.into_iter().next().unwrap().query.unwrap();
        }
        Node::Boolean(BooleanNode { span, clauses })
    }

    /// unary := NOT unary | primary
    fn parse_unary(&mut self, terminator: Option<TokenKind>) -> Option<Node> {
        if self.current.kind != TokenKind::Not {
            return self.parse_primary(terminator);
        }
        let start = self.current.span;
        self.advance();
        if self.current.kind == TokenKind::Eof || Some(self.current.kind) == terminator {
            self.error_here("Expected expression after NOT");
            return Some(Node::Not(NotNode {
                span: start,
                query: None,
            }));
        }
        let inner = self.parse_unary(terminator);
        let span = inner.as_ref().map_or(start, |n| start.cover(n.span()));
        Some(Node::Not(NotNode {
            span,
            query: inner.map(Box::new),
        }))
    }

    /// primary := grouped | field_expr | range | phrase | regex | term | '*'
    fn parse_primary(&mut self, terminator: Option<TokenKind>) -> Option<Node> {
        match self.current.kind {
            TokenKind::LeftParen => Some(self.parse_group()),
            TokenKind::Term | TokenKind::Prefix | TokenKind::Wildcard => {
                let token = self.take_token();
                if self.current.kind == TokenKind::Colon {
                    self.advance();
                    Some(self.parse_field_value(token))
                } else {
                    Some(self.finish_term(token))
                }
            }
            TokenKind::Phrase => {
                let token = self.take_token();
                Some(self.finish_phrase(token))
            }
            TokenKind::Regex => {
                let token = self.take_token();
                Some(Node::Regex(RegexNode {
                    span: token.span,
                    pattern: regex_pattern(&token.raw),
                }))
            }
            TokenKind::Star => {
                let token = self.take_token();
                Some(Node::MatchAll(MatchAllNode { span: token.span }))
            }
            TokenKind::LeftBracket | TokenKind::LeftBrace => Some(self.parse_bracket_range(None)),
            TokenKind::Gt | TokenKind::Gte | TokenKind::Lt | TokenKind::Lte => {
                Some(self.parse_shorthand_range(None))
            }
            TokenKind::Eof => {
                self.error_here("Unexpected end of input");
                None
            }
            kind if Some(kind) == terminator => {
                self.error_here("Expected expression");
                None
            }
            kind => {
                self.error_here(format!("Unexpected token {}", kind.describe()));
                self.advance();
                None
            }
        }
    }

    /// grouped := '(' query ')' boost?
    fn parse_group(&mut self) -> Node {
        let open = self.take_token();
        let query = if self.current.kind == TokenKind::RightParen {
            None
        } else {
            Some(Box::new(self.parse_query(Some(TokenKind::RightParen))))
        };
        let mut span = query.as_deref().map_or(open.span, |q| open.span.cover(q.span()));
        if self.current.kind == TokenKind::RightParen {
            span = span.cover(self.current.span);
            self.advance();
        } else {
            self.error_here("Missing closing parenthesis");
        }
        let boost = self.try_parse_boost();
        Node::Group(GroupNode { span, query, boost })
    }

    /// field_value := range | shorthand | phrase | regex | grouped | term | '*'
    fn parse_field_value(&mut self, name: Token) -> Node {
        let field = escape::unescape(&name.raw);
        let field_span = name.span;

        match self.current.kind {
            TokenKind::Star => {
                let star = self.take_token();
                Node::Exists(ExistsNode {
                    span: field_span.cover(star.span),
                    field,
                })
            }
            TokenKind::Term | TokenKind::Prefix | TokenKind::Wildcard => {
                let value = self.take_token();
                if field == MISSING_FIELD {
                    return Node::Missing(MissingNode {
                        span: field_span.cover(value.span),
                        field: escape::unescape(&value.raw),
                    });
                }
                if field == EXISTS_FIELD {
                    return Node::Exists(ExistsNode {
                        span: field_span.cover(value.span),
                        field: escape::unescape(&value.raw),
                    });
                }
                let term = self.finish_term(value);
                Node::Field(FieldNode {
                    span: field_span.cover(term.span()),
                    field,
                    query: Some(Box::new(term)),
                })
            }
            TokenKind::Phrase => {
                let token = self.take_token();
                let phrase = self.finish_phrase(token);
                Node::Field(FieldNode {
                    span: field_span.cover(phrase.span()),
                    field,
                    query: Some(Box::new(phrase)),
                })
            }
            TokenKind::Regex => {
                let token = self.take_token();
                let regex = Node::Regex(RegexNode {
                    span: token.span,
                    pattern: regex_pattern(&token.raw),
                });
                Node::Field(FieldNode {
                    span: field_span.cover(regex.span()),
                    field,
                    query: Some(Box::new(regex)),
                })
            }
            TokenKind::LeftBracket | TokenKind::LeftBrace => {
                self.parse_bracket_range(Some((field, field_span)))
            }
            TokenKind::Gt | TokenKind::Gte | TokenKind::Lt | TokenKind::Lte => {
                self.parse_shorthand_range(Some((field, field_span)))
            }
            TokenKind::LeftParen => {
                let group = self.parse_group();
                let value = collapse_multi_term(group);
                Node::Field(FieldNode {
                    span: field_span.cover(value.span()),
                    field,
                    query: Some(Box::new(value)),
                })
            }
            _ => {
                self.error_here(format!("Expected value after '{}:'", field));
                Node::Field(FieldNode {
                    span: field_span,
                    field,
                    query: None,
                })
            }
        }
    }

    /// range := ('[' | '{') endpoint TO endpoint (']' | '}')
    fn parse_bracket_range(&mut self, field: Option<(String, Span)>) -> Node {
        let open = self.take_token();
        let min_inclusive = open.kind == TokenKind::LeftBracket;
        let start_span = field.as_ref().map_or(open.span, |(_, s)| *s);

        let min = self.parse_range_endpoint();
        if self.current.kind == TokenKind::To {
            self.advance();
        } else {
            self.error_here("Expected TO in range");
            self.skip_until(&[
                TokenKind::To,
                TokenKind::RightBracket,
                TokenKind::RightBrace,
            ]);
            if self.current.kind == TokenKind::To {
                self.advance();
            }
        }
        let max = self.parse_range_endpoint();

        let mut span = start_span.cover(open.span);
        let max_inclusive = match self.current.kind {
            TokenKind::RightBracket => {
                span = span.cover(self.current.span);
                self.advance();
                true
            }
            TokenKind::RightBrace => {
                span = span.cover(self.current.span);
                self.advance();
                false
            }
            _ => {
                self.error_here("Expected ']' or '}' at end of range");
                min_inclusive
            }
        };

        Node::Range(RangeNode {
            span,
            field: field.map(|(name, _)| name),
            min,
            max,
            min_inclusive,
            max_inclusive,
            op: None,
        })
    }

    /// shorthand := ('>' | '>=' | '<' | '<=') endpoint
    fn parse_shorthand_range(&mut self, field: Option<(String, Span)>) -> Node {
        let op_token = self.take_token();
        let op = match op_token.kind {
            TokenKind::Gt => RangeOp::Gt,
            TokenKind::Gte => RangeOp::Gte,
            TokenKind::Lt => RangeOp::Lt,
            _ => RangeOp::Lte,
        };
        let start_span = field.as_ref().map_or(op_token.span, |(_, s)| *s);

        let mut span = start_span.cover(op_token.span);
        let endpoint = match self.current.kind {
            TokenKind::Term | TokenKind::Prefix | TokenKind::Wildcard | TokenKind::Phrase => {
                let token = self.take_token();
                span = span.cover(token.span);
                Some(token.raw)
            }
            _ => {
                self.error_here(format!("Expected value after {}", op_token.kind.describe()));
                None
            }
        };

        let (min, max, min_inclusive, max_inclusive) = match op {
            RangeOp::Gt => (endpoint, None, false, false),
            RangeOp::Gte => (endpoint, None, true, false),
            RangeOp::Lt => (None, endpoint, false, false),
            RangeOp::Lte => (None, endpoint, false, true),
        };

        Node::Range(RangeNode {
            span,
            field: field.map(|(name, _)| name),
            min,
            max,
            min_inclusive,
            max_inclusive,
            op: Some(op),
        })
    }

    /// endpoint := TERM | PHRASE | '*'
    fn parse_range_endpoint(&mut self) -> Option<String> {
        match self.current.kind {
            TokenKind::Star => {
                self.advance();
                None
            }
            TokenKind::Term | TokenKind::Prefix | TokenKind::Wildcard | TokenKind::Phrase => {
                let token = self.take_token();
                Some(token.raw)
            }
            _ => {
                self.error_here("Expected range endpoint");
                None
            }
        }
    }

    /// Build a term node from its token, consuming trailing modifiers
    fn finish_term(&mut self, token: Token) -> Node {
        let mut span = token.span;
        let boost = self.try_parse_boost_covering(&mut span);
        Node::Term(TermNode {
            span,
            unescaped_term: escape::unescape(&token.raw),
            is_prefix: token.kind == TokenKind::Prefix,
            is_wildcard: token.kind == TokenKind::Wildcard,
            raw_term: token.raw,
            boost,
        })
    }

    /// Build a phrase node from its token, consuming trailing modifiers
    fn finish_phrase(&mut self, token: Token) -> Node {
        let mut span = token.span;
        let boost = self.try_parse_boost_covering(&mut span);
        Node::Phrase(PhraseNode {
            span,
            phrase: phrase_content(&token.raw),
            boost,
        })
    }

    fn try_parse_boost(&mut self) -> Option<f32> {
        let mut span = self.current.span;
        self.try_parse_boost_covering(&mut span)
    }

    /// Consume `~`/`^` modifiers; fuzziness has no AST slot and is rejected
    fn try_parse_boost_covering(&mut self, span: &mut Span) -> Option<f32> {
        if self.current.kind == TokenKind::Tilde {
            self.error_here("Fuzzy and proximity modifiers are not supported");
            self.advance();
        }
        if self.current.kind != TokenKind::Caret {
            return None;
        }
        let boost = self.current.boost_value();
        if boost.is_none() {
            self.error_here("Expected a number after '^'");
        }
        *span = span.cover(self.current.span);
        self.advance();
        boost
    }

    fn skip_until(&mut self, kinds: &[TokenKind]) {
        while self.current.kind != TokenKind::Eof && !kinds.contains(&self.current.kind) {
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn take_token(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.current.span;
        self.errors.push(ParseError::new(
            message,
            span.start_offset,
            span.len().max(1),
            span.start_line,
            span.start_column,
        ));
    }
}

/// Extract phrase content from its raw token text, resolving escapes
fn phrase_content(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 1; // opening quote
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if ch == '"' && i == chars.len() - 1 {
            break; // closing quote
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// Extract a regex pattern from its raw token text
///
/// Only the delimiter escape `\/` is resolved; every other backslash is
/// part of the pattern itself.
fn regex_pattern(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 1; // opening slash
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' && i + 1 < chars.len() {
            if chars[i + 1] == '/' {
                out.push('/');
            } else {
                out.push('\\');
                out.push(chars[i + 1]);
            }
            i += 2;
            continue;
        }
        if ch == '/' && i == chars.len() - 1 {
            break; // closing slash
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// Collapse `field:(a b c)` — a group of bare, implicitly combined terms —
/// into a multi-term value. Any operator, occurrence, boost or non-term
/// child keeps the group as-is.
fn collapse_multi_term(node: Node) -> Node {
    let group = match &node {
        Node::Group(group) if group.boost.is_none() => group,
        _ => return node,
    };
    let boolean = match group.query.as_deref() {
        Some(Node::Boolean(b)) if b.clauses.len() >= 2 => b,
        _ => return node,
    };
    let all_bare_terms = boolean.clauses.iter().all(|clause| {
        clause.occur == Occur::Should
            && clause.operator == ClauseOperator::Implicit
            && matches!(
                clause.query.as_deref(),
                Some(Node::Term(t)) if !t.is_prefix && !t.is_wildcard && t.boost.is_none()
            )
    });
    if !all_bare_terms {
        return node;
    }
    let terms = boolean
        .clauses
        .iter()
        .filter_map(|clause| match clause.query.as_deref() {
            Some(Node::Term(t)) => Some(t.unescaped_term.clone()),
            _ => None,
        })
        .collect();
    Node::MultiTerm(MultiTermNode {
        span: group.span,
        terms,
    })
}
