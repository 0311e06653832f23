//! Canonical query-string rendering
//!
//! Rendering produces text that re-parses to a tree equivalent to its
//! input (modulo spans and whitespace). Terms prefer their raw written form
//! so user escapes survive the round trip; everything else is re-escaped
//! from its logical value.

use super::{Clause, ClauseOperator, Node, Occur};
use crate::escape;

impl Node {
    /// Render this node back to canonical query-string form
    pub fn render(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Document(n) => {
            if let Some(query) = &n.query {
                write_node(query, out);
            }
        }
        Node::Group(n) => {
            out.push('(');
            if let Some(query) = &n.query {
                write_node(query, out);
            }
            out.push(')');
            write_boost(n.boost, out);
        }
        Node::Boolean(n) => write_clauses(&n.clauses, out),
        Node::Field(n) => {
            out.push_str(&escape::escape_field(&n.field));
            out.push(':');
            if let Some(query) = &n.query {
                write_node(query, out);
            }
        }
        Node::Term(n) => {
            if n.raw_term.is_empty() {
                out.push_str(&escape::escape(&n.unescaped_term));
            } else {
                out.push_str(&n.raw_term);
            }
            write_boost(n.boost, out);
        }
        Node::Phrase(n) => {
            out.push('"');
            out.push_str(&escape::escape_phrase(&n.phrase));
            out.push('"');
            write_boost(n.boost, out);
        }
        Node::Range(n) => write_range(n, out),
        Node::Regex(n) => {
            out.push('/');
            out.push_str(&n.pattern.replace('/', "\\/"));
            out.push('/');
        }
        Node::Not(n) => {
            out.push_str("NOT ");
            if let Some(query) = &n.query {
                write_node(query, out);
            }
        }
        Node::Exists(n) => {
            out.push_str(&escape::escape_field(&n.field));
            out.push_str(":*");
        }
        Node::Missing(n) => {
            out.push_str("_missing_:");
            out.push_str(&escape::escape_field(&n.field));
        }
        Node::MatchAll(_) => out.push('*'),
        Node::MultiTerm(n) => {
            out.push('(');
            for (i, term) in n.terms.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&escape::escape(term));
            }
            out.push(')');
        }
    }
}

fn write_clauses(clauses: &[Clause], out: &mut String) {
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            match clause.operator {
                ClauseOperator::And => out.push_str(" AND "),
                ClauseOperator::Or => out.push_str(" OR "),
                ClauseOperator::Implicit => out.push(' '),
            }
        }
        match clause.occur {
            Occur::Must => out.push('+'),
            Occur::MustNot => out.push('-'),
            Occur::Should => {}
        }
        if let Some(query) = &clause.query {
            write_node(query, out);
        }
    }
}

fn write_range(range: &super::RangeNode, out: &mut String) {
    if let Some(field) = &range.field {
        out.push_str(&escape::escape_field(field));
        out.push(':');
    }
    if let Some(op) = range.op {
        out.push_str(op.as_str());
        // Shorthand ranges have exactly one endpoint.
        if let Some(value) = range.min.as_deref().or(range.max.as_deref()) {
            out.push_str(value);
        }
        return;
    }
    out.push(if range.min_inclusive { '[' } else { '{' });
    out.push_str(range.min.as_deref().unwrap_or("*"));
    out.push_str(" TO ");
    out.push_str(range.max.as_deref().unwrap_or("*"));
    out.push(if range.max_inclusive { ']' } else { '}' });
}

fn write_boost(boost: Option<f32>, out: &mut String) {
    if let Some(boost) = boost {
        out.push('^');
        out.push_str(&format_boost(boost));
    }
}

fn format_boost(boost: f32) -> String {
    if boost.fract() == 0.0 {
        format!("{}", boost as i64)
    } else {
        format!("{}", boost)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{
        BooleanNode, Clause, ClauseOperator, ExistsNode, GroupNode, MissingNode, Node, Occur,
        PhraseNode, RangeNode, RangeOp, Span, TermNode,
    };

    fn term(text: &str) -> Node {
        Node::Term(TermNode {
            span: Span::default(),
            raw_term: text.to_string(),
            unescaped_term: crate::escape::unescape(text),
            is_prefix: false,
            is_wildcard: false,
            boost: None,
        })
    }

    #[test]
    fn test_render_term_prefers_raw_form() {
        assert_eq!(term("a\\:b").render(), "a\\:b");
    }

    #[test]
    fn test_render_term_reescapes_without_raw() {
        let node = Node::Term(TermNode {
            span: Span::default(),
            raw_term: String::new(),
            unescaped_term: "a:b".into(),
            is_prefix: false,
            is_wildcard: false,
            boost: None,
        });
        assert_eq!(node.render(), "a\\:b");
    }

    #[test]
    fn test_render_phrase_with_boost() {
        let node = Node::Phrase(PhraseNode {
            span: Span::default(),
            phrase: "hello \"world\"".into(),
            boost: Some(2.5),
        });
        assert_eq!(node.render(), "\"hello \\\"world\\\"\"^2.5");
    }

    #[test]
    fn test_render_integral_boost_without_fraction() {
        let node = Node::Group(GroupNode {
            span: Span::default(),
            query: Some(Box::new(term("a"))),
            boost: Some(3.0),
        });
        assert_eq!(node.render(), "(a)^3");
    }

    #[test]
    fn test_render_boolean_connectors() {
        let node = Node::Boolean(BooleanNode {
            span: Span::default(),
            clauses: vec![
                Clause::new(term("a"), Occur::Must, ClauseOperator::Implicit),
                Clause::new(term("b"), Occur::MustNot, ClauseOperator::Implicit),
                Clause::new(term("c"), Occur::Should, ClauseOperator::And),
                Clause::new(term("d"), Occur::Should, ClauseOperator::Or),
            ],
        });
        assert_eq!(node.render(), "+a -b AND c OR d");
    }

    #[test]
    fn test_render_ranges() {
        let bracketed = Node::Range(RangeNode {
            span: Span::default(),
            field: Some("price".into()),
            min: Some("100".into()),
            max: None,
            min_inclusive: true,
            max_inclusive: false,
            op: None,
        });
        assert_eq!(bracketed.render(), "price:[100 TO *}");

        let shorthand = Node::Range(RangeNode {
            span: Span::default(),
            field: Some("age".into()),
            min: Some("30".into()),
            max: None,
            min_inclusive: false,
            max_inclusive: false,
            op: Some(RangeOp::Gte),
        });
        assert_eq!(shorthand.render(), "age:>=30");
    }

    #[test]
    fn test_render_presence_forms() {
        let exists = Node::Exists(ExistsNode {
            span: Span::default(),
            field: "status".into(),
        });
        assert_eq!(exists.render(), "status:*");

        let missing = Node::Missing(MissingNode {
            span: Span::default(),
            field: "deleted".into(),
        });
        assert_eq!(missing.render(), "_missing_:deleted");
    }
}
