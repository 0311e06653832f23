//! Ordered composition of visitors

use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::Node;
use crate::error::Result;

use super::context::VisitorContext;
use super::Visitor;

struct ChainEntry {
    priority: i32,
    seq: u64,
    type_id: TypeId,
    visitor: Arc<dyn Visitor>,
}

/// Composes visitors into one ordered pass
///
/// Visitors run in ascending priority; entries with equal priority keep
/// their insertion order. Each visitor observes the full tree produced by
/// all visitors before it.
#[derive(Default)]
pub struct ChainedVisitor {
    entries: Vec<ChainEntry>,
    next_seq: u64,
}

impl ChainedVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a visitor with the given priority
    pub fn add<V: Visitor + 'static>(&mut self, visitor: V, priority: i32) -> &mut Self {
        self.push_entry(TypeId::of::<V>(), Arc::new(visitor), priority);
        self
    }

    /// Remove the visitor of type `V`; returns whether one was present
    pub fn remove<V: Visitor + 'static>(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.type_id != TypeId::of::<V>());
        self.entries.len() != before
    }

    /// Swap the visitor of type `V` for `new`, keeping `V`'s priority
    /// unless an explicit one is given
    pub fn replace<V: Visitor + 'static, N: Visitor + 'static>(
        &mut self,
        new: N,
        priority: Option<i32>,
    ) -> bool {
        let Some(existing) = self.priority_of::<V>() else {
            return false;
        };
        self.remove::<V>();
        self.push_entry(TypeId::of::<N>(), Arc::new(new), priority.unwrap_or(existing));
        true
    }

    /// Insert `new` so it runs just before the visitor of type `V`
    pub fn before<V: Visitor + 'static, N: Visitor + 'static>(&mut self, new: N) -> bool {
        let Some(reference) = self.priority_of::<V>() else {
            return false;
        };
        self.push_entry(TypeId::of::<N>(), Arc::new(new), reference - 1);
        true
    }

    /// Insert `new` so it runs just after the visitor of type `V`
    pub fn after<V: Visitor + 'static, N: Visitor + 'static>(&mut self, new: N) -> bool {
        let Some(reference) = self.priority_of::<V>() else {
            return false;
        };
        self.push_entry(TypeId::of::<N>(), Arc::new(new), reference + 1);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every visitor in order, threading the root node through
    pub async fn run(&self, node: Node, ctx: &mut VisitorContext) -> Result<Node> {
        let mut current = node;
        for entry in &self.entries {
            current = entry.visitor.visit(current, ctx).await?;
        }
        Ok(current)
    }

    fn priority_of<V: Visitor + 'static>(&self) -> Option<i32> {
        self.entries
            .iter()
            .find(|e| e.type_id == TypeId::of::<V>())
            .map(|e| e.priority)
    }

    fn push_entry(&mut self, type_id: TypeId, visitor: Arc<dyn Visitor>, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(ChainEntry {
            priority,
            seq,
            type_id,
            visitor,
        });
        self.entries.sort_by_key(|e| (e.priority, e.seq));
    }
}

#[async_trait]
impl Visitor for ChainedVisitor {
    async fn visit(&self, node: Node, ctx: &mut VisitorContext) -> Result<Node> {
        self.run(node, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node, TermNode};

    /// Appends its tag to every term so test assertions can observe the
    /// order visitors ran in.
    struct Tag<const C: char>;

    #[async_trait]
    impl<const C: char> Visitor for Tag<C> {
        async fn visit_term(&self, mut node: TermNode, _ctx: &mut VisitorContext) -> Result<Node> {
            node.raw_term.push(C);
            node.unescaped_term.push(C);
            Ok(Node::Term(node))
        }
    }

    fn term_doc() -> Node {
        crate::syntax::parser::Parser::new("x").parse().document
    }

    async fn run_chain(chain: &ChainedVisitor) -> String {
        let mut ctx = VisitorContext::new();
        chain.run(term_doc(), &mut ctx).await.unwrap().render()
    }

    #[tokio::test]
    async fn test_runs_in_ascending_priority() {
        let mut chain = ChainedVisitor::new();
        chain.add(Tag::<'b'>, 20);
        chain.add(Tag::<'a'>, 10);
        chain.add(Tag::<'c'>, 30);
        assert_eq!(run_chain(&chain).await, "xabc");
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_insertion_order() {
        let mut chain = ChainedVisitor::new();
        chain.add(Tag::<'a'>, 10);
        chain.add(Tag::<'b'>, 10);
        chain.add(Tag::<'c'>, 10);
        assert_eq!(run_chain(&chain).await, "xabc");
    }

    #[tokio::test]
    async fn test_remove_by_type() {
        let mut chain = ChainedVisitor::new();
        chain.add(Tag::<'a'>, 10);
        chain.add(Tag::<'b'>, 20);
        assert!(chain.remove::<Tag<'a'>>());
        assert!(!chain.remove::<Tag<'a'>>());
        assert_eq!(chain.len(), 1);
        assert_eq!(run_chain(&chain).await, "xb");
    }

    #[tokio::test]
    async fn test_replace_keeps_slot() {
        let mut chain = ChainedVisitor::new();
        chain.add(Tag::<'a'>, 10);
        chain.add(Tag::<'c'>, 20);
        assert!(chain.replace::<Tag<'a'>, Tag<'b'>>(Tag::<'b'>, None));
        assert_eq!(run_chain(&chain).await, "xbc");
    }

    #[tokio::test]
    async fn test_before_and_after_anchor_on_reference() {
        let mut chain = ChainedVisitor::new();
        chain.add(Tag::<'b'>, 10);
        assert!(chain.before::<Tag<'b'>, Tag<'a'>>(Tag::<'a'>));
        assert!(chain.after::<Tag<'b'>, Tag<'c'>>(Tag::<'c'>));
        assert_eq!(run_chain(&chain).await, "xabc");
    }

    #[tokio::test]
    async fn test_mutating_missing_reference_reports_false() {
        let mut chain = ChainedVisitor::new();
        assert!(!chain.before::<Tag<'z'>, Tag<'a'>>(Tag::<'a'>));
        assert!(!chain.replace::<Tag<'z'>, Tag<'a'>>(Tag::<'a'>, None));
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let chain = ChainedVisitor::new();
        assert_eq!(run_chain(&chain).await, "x");
    }
}
