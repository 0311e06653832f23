//! Visitor framework for AST rewriting
//!
//! A [`Visitor`] is a set of per-variant handlers with a single dispatch
//! entry, [`Visitor::visit`]. Handlers take their node by value and return a
//! `Node`; returning a different node replaces the subtree, and the default
//! handlers rebuild each node around its recursively visited children, so
//! parent links never dangle.
//!
//! Traversal is depth-first and left-to-right: sibling clauses are visited
//! in source order, so side effects such as validation error lists are
//! deterministic. The protocol is async so that resolvers can perform I/O;
//! purely synchronous visitors simply return ready values.

mod chain;
mod context;

pub use chain::ChainedVisitor;
pub use context::VisitorContext;

use async_trait::async_trait;

use crate::ast::{
    BooleanNode, DocumentNode, ExistsNode, FieldNode, GroupNode, MatchAllNode, MissingNode,
    MultiTermNode, Node, NotNode, PhraseNode, RangeNode, RegexNode, TermNode,
};
use crate::error::Result;

/// A tree-rewriting pass over the query AST
///
/// Implementations override the handlers they care about; every other
/// variant flows through unchanged (children still visited).
#[async_trait]
pub trait Visitor: Send + Sync {
    /// Dispatch `node` to its per-variant handler
    async fn visit(&self, node: Node, ctx: &mut VisitorContext) -> Result<Node> {
        match node {
            Node::Document(n) => self.visit_document(n, ctx).await,
            Node::Group(n) => self.visit_group(n, ctx).await,
            Node::Boolean(n) => self.visit_boolean(n, ctx).await,
            Node::Field(n) => self.visit_field(n, ctx).await,
            Node::Term(n) => self.visit_term(n, ctx).await,
            Node::Phrase(n) => self.visit_phrase(n, ctx).await,
            Node::Range(n) => self.visit_range(n, ctx).await,
            Node::Regex(n) => self.visit_regex(n, ctx).await,
            Node::Not(n) => self.visit_not(n, ctx).await,
            Node::Exists(n) => self.visit_exists(n, ctx).await,
            Node::Missing(n) => self.visit_missing(n, ctx).await,
            Node::MatchAll(n) => self.visit_match_all(n, ctx).await,
            Node::MultiTerm(n) => self.visit_multi_term(n, ctx).await,
        }
    }

    async fn visit_document(&self, mut node: DocumentNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(query) = node.query.take() {
            node.query = Some(Box::new(self.visit(*query, ctx).await?));
        }
        Ok(Node::Document(node))
    }

    async fn visit_group(&self, mut node: GroupNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(query) = node.query.take() {
            node.query = Some(Box::new(self.visit(*query, ctx).await?));
        }
        Ok(Node::Group(node))
    }

    async fn visit_boolean(&self, mut node: BooleanNode, ctx: &mut VisitorContext) -> Result<Node> {
        for clause in &mut node.clauses {
            if let Some(query) = clause.query.take() {
                clause.query = Some(Box::new(self.visit(*query, ctx).await?));
            }
        }
        Ok(Node::Boolean(node))
    }

    async fn visit_field(&self, mut node: FieldNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(query) = node.query.take() {
            node.query = Some(Box::new(self.visit(*query, ctx).await?));
        }
        Ok(Node::Field(node))
    }

    async fn visit_not(&self, mut node: NotNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(query) = node.query.take() {
            node.query = Some(Box::new(self.visit(*query, ctx).await?));
        }
        Ok(Node::Not(node))
    }

    async fn visit_term(&self, node: TermNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::Term(node))
    }

    async fn visit_phrase(&self, node: PhraseNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::Phrase(node))
    }

    async fn visit_range(&self, node: RangeNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::Range(node))
    }

    async fn visit_regex(&self, node: RegexNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::Regex(node))
    }

    async fn visit_exists(&self, node: ExistsNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::Exists(node))
    }

    async fn visit_missing(&self, node: MissingNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::Missing(node))
    }

    async fn visit_match_all(&self, node: MatchAllNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::MatchAll(node))
    }

    async fn visit_multi_term(&self, node: MultiTermNode, _ctx: &mut VisitorContext) -> Result<Node> {
        Ok(Node::MultiTerm(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::Parser;

    /// Upper-cases every term; used to observe traversal.
    struct UppercaseTerms;

    #[async_trait]
    impl Visitor for UppercaseTerms {
        async fn visit_term(&self, mut node: TermNode, _ctx: &mut VisitorContext) -> Result<Node> {
            node.raw_term = node.raw_term.to_uppercase();
            node.unescaped_term = node.unescaped_term.to_uppercase();
            Ok(Node::Term(node))
        }
    }

    /// Replaces terms with a group wrapping them; exercises subtree
    /// replacement through the default handlers.
    struct WrapTermsInGroups;

    #[async_trait]
    impl Visitor for WrapTermsInGroups {
        async fn visit_term(&self, node: TermNode, _ctx: &mut VisitorContext) -> Result<Node> {
            let span = node.span;
            Ok(Node::Group(crate::ast::GroupNode {
                span,
                query: Some(Box::new(Node::Term(node))),
                boost: None,
            }))
        }
    }

    fn parse(input: &str) -> Node {
        Parser::new(input).parse().document
    }

    #[tokio::test]
    async fn test_default_traversal_reaches_nested_terms() {
        let mut ctx = VisitorContext::new();
        let doc = parse("title:(rust OR tokio) AND stable");
        let rewritten = UppercaseTerms.visit(doc, &mut ctx).await.unwrap();
        let rendered = rewritten.render();
        assert_eq!(rendered, "title:(RUST OR TOKIO) AND STABLE");
    }

    #[tokio::test]
    async fn test_replacement_updates_parent() {
        let mut ctx = VisitorContext::new();
        let doc = parse("a AND b");
        let rewritten = WrapTermsInGroups.visit(doc, &mut ctx).await.unwrap();
        assert_eq!(rewritten.render(), "(a) AND (b)");
    }

    #[tokio::test]
    async fn test_leaves_pass_through_unchanged() {
        let mut ctx = VisitorContext::new();
        let doc = parse("price:[1 TO 10] OR name:/jo?n/ OR deleted:*");
        let before = doc.clone();
        let after = UppercaseTerms.visit(doc, &mut ctx).await.unwrap();
        // Range, regex and exists nodes have no terms to rewrite.
        assert!(after.equivalent(&before));
    }
}
