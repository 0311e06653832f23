//! Field-name resolution
//!
//! Rewrites the field name on every field-carrying node (`field:`,
//! presence checks, ranges) through a [`FieldResolver`], which typically
//! maps user-facing names onto storage names. The pre-resolution name is
//! stashed on the context keyed by the node's span, so later passes and
//! diagnostics can still report the name the user wrote.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ast::{ExistsNode, FieldNode, MissingNode, Node, RangeNode, Span};
use crate::error::Result;
use crate::visit::{Visitor, VisitorContext};

use super::include::INCLUDE_FIELD;

/// Maps a query field name to the name consumers should see
///
/// Returning `None` marks the field as unresolved; the node keeps its
/// original name.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    async fn resolve(&self, field: &str) -> Result<Option<String>>;
}

#[async_trait]
impl FieldResolver for HashMap<String, String> {
    async fn resolve(&self, field: &str) -> Result<Option<String>> {
        Ok(self.get(field).cloned())
    }
}

/// Resolves dotted paths by their longest mapped prefix
///
/// With `{"data" → "resolved"}`, `data.x.y` resolves to `resolved.x.y`:
/// the longest prefix present in the map is swapped and the remaining
/// segments are carried over.
#[derive(Clone, Debug, Default)]
pub struct HierarchicalFieldResolver {
    mappings: HashMap<String, String>,
}

impl HierarchicalFieldResolver {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    fn resolve_path(&self, field: &str) -> Option<String> {
        if let Some(mapped) = self.mappings.get(field) {
            return Some(mapped.clone());
        }
        let mut prefix_end = field.len();
        while let Some(dot) = field[..prefix_end].rfind('.') {
            prefix_end = dot;
            if let Some(mapped) = self.mappings.get(&field[..prefix_end]) {
                return Some(format!("{}{}", mapped, &field[prefix_end..]));
            }
        }
        None
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HierarchicalFieldResolver {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            mappings: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl FieldResolver for HierarchicalFieldResolver {
    async fn resolve(&self, field: &str) -> Result<Option<String>> {
        Ok(self.resolve_path(field))
    }
}

/// Rewrites field names through a [`FieldResolver`]
pub struct FieldResolutionVisitor {
    resolver: Arc<dyn FieldResolver>,
}

impl FieldResolutionVisitor {
    pub fn new<R: FieldResolver + 'static>(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Resolve one field occurrence, returning the replacement name
    async fn resolve_field(
        &self,
        field: &str,
        span: Span,
        ctx: &mut VisitorContext,
    ) -> Option<String> {
        ctx.validation_result_mut()
            .referenced_fields
            .insert(field.to_string());

        match self.resolver.resolve(field).await {
            Ok(Some(resolved)) => {
                debug!(from = %field, to = %resolved, "resolved field");
                ctx.record_original_field(span, field);
                Some(resolved)
            }
            Ok(None) => {
                ctx.validation_result_mut()
                    .unresolved_fields
                    .insert(field.to_string());
                None
            }
            Err(error) => {
                ctx.validation_result_mut().add_error(
                    format!("Error resolving field '{}': {}", field, error),
                    span.start_offset,
                );
                None
            }
        }
    }
}

#[async_trait]
impl Visitor for FieldResolutionVisitor {
    async fn visit_field(&self, mut node: FieldNode, ctx: &mut VisitorContext) -> Result<Node> {
        // Include references name stored queries, not fields.
        if node.field.eq_ignore_ascii_case(INCLUDE_FIELD) {
            return Ok(Node::Field(node));
        }
        if let Some(resolved) = self.resolve_field(&node.field, node.span, ctx).await {
            node.field = resolved;
        }
        if let Some(query) = node.query.take() {
            node.query = Some(Box::new(self.visit(*query, ctx).await?));
        }
        Ok(Node::Field(node))
    }

    async fn visit_exists(&self, mut node: ExistsNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(resolved) = self.resolve_field(&node.field, node.span, ctx).await {
            node.field = resolved;
        }
        Ok(Node::Exists(node))
    }

    async fn visit_missing(&self, mut node: MissingNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(resolved) = self.resolve_field(&node.field, node.span, ctx).await {
            node.field = resolved;
        }
        Ok(Node::Missing(node))
    }

    async fn visit_range(&self, mut node: RangeNode, ctx: &mut VisitorContext) -> Result<Node> {
        if let Some(field) = node.field.clone() {
            if let Some(resolved) = self.resolve_field(&field, node.span, ctx).await {
                node.field = Some(resolved);
            }
        }
        Ok(Node::Range(node))
    }
}
