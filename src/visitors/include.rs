//! `@include:name` expansion
//!
//! An include reference is a field node named `@include` (case-insensitive)
//! whose value names a stored query. Expansion resolves the name to query
//! text, parses it with the same default operator as the surrounding query,
//! recursively expands the result, and replaces the reference with a group
//! wrapping the expanded subtree. Anything that goes wrong — a circular
//! reference, a resolver failure, an unparseable include — leaves the
//! original node in place and records the problem on the run's validation
//! result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ast::{DefaultOperator, FieldNode, GroupNode, Node};
use crate::error::Result;
use crate::syntax::parser::Parser;
use crate::visit::{Visitor, VisitorContext};

/// Field name marking an include reference
pub const INCLUDE_FIELD: &str = "@include";

/// Maps an include name to stored query text
///
/// Returning `None` marks the include as unresolved; errors are recorded on
/// the validation result and leave the reference untouched. Resolution may
/// perform I/O; any caching is the resolver's own business.
#[async_trait]
pub trait IncludeResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Option<String>>;
}

/// In-memory resolver over a name → query-text map
#[derive(Clone, Debug, Default)]
pub struct MapIncludeResolver {
    entries: HashMap<String, String>,
}

impl MapIncludeResolver {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapIncludeResolver {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl IncludeResolver for MapIncludeResolver {
    async fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(self.entries.get(name).cloned())
    }
}

#[async_trait]
impl IncludeResolver for HashMap<String, String> {
    async fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

type SkipPredicate = Arc<dyn Fn(&FieldNode) -> bool + Send + Sync>;

/// Replaces include references with their resolved, recursively expanded
/// subqueries
pub struct IncludeExpansionVisitor {
    resolver: Arc<dyn IncludeResolver>,
    default_operator: DefaultOperator,
    skip: Option<SkipPredicate>,
}

impl IncludeExpansionVisitor {
    pub fn new<R: IncludeResolver + 'static>(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
            default_operator: DefaultOperator::default(),
            skip: None,
        }
    }

    /// Parse resolved include text with this default operator
    pub fn with_default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Leave matching references unexpanded
    pub fn with_skip_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FieldNode) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(predicate));
        self
    }

    /// The include name carried by a reference node, if it is one
    fn include_name(node: &FieldNode) -> Option<String> {
        if !node.field.eq_ignore_ascii_case(INCLUDE_FIELD) {
            return None;
        }
        match node.query.as_deref() {
            Some(Node::Term(term)) => Some(term.unescaped_term.clone()),
            Some(Node::Phrase(phrase)) => Some(phrase.phrase.clone()),
            _ => None,
        }
    }

    async fn expand(&self, node: FieldNode, name: String, ctx: &mut VisitorContext) -> Result<Node> {
        let span = node.span;

        if ctx.include_stack_contains(&name) {
            ctx.validation_result_mut()
                .add_error(format!("Circular include: '{}'", name), span.start_offset);
            return Ok(Node::Field(node));
        }

        let resolved = match self.resolver.resolve(&name).await {
            Ok(resolved) => resolved,
            Err(error) => {
                debug!(include = %name, %error, "include resolver failed");
                ctx.validation_result_mut().add_error(
                    format!("Error resolving include '{}': {}", name, error),
                    span.start_offset,
                );
                return Ok(Node::Field(node));
            }
        };
        let text = match resolved {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                ctx.validation_result_mut()
                    .unresolved_includes
                    .insert(name.clone());
                return Ok(Node::Field(node));
            }
        };

        let parsed = Parser::new(&text)
            .with_default_operator(self.default_operator)
            .parse();
        if !parsed.is_success() {
            ctx.validation_result_mut().add_error(
                format!("Invalid include query for '{}'", name),
                span.start_offset,
            );
            return Ok(Node::Field(node));
        }

        debug!(include = %name, "expanding include");
        ctx.push_include(&name);
        let expanded = match parsed.document {
            Node::Document(doc) => match doc.query {
                Some(query) => self.visit(*query, ctx).await.map(Some),
                None => Ok(None),
            },
            other => self.visit(other, ctx).await.map(Some),
        };
        ctx.pop_include();

        // The expansion is always wrapped so the include keeps its own
        // precedence inside the surrounding query.
        Ok(Node::Group(GroupNode {
            span,
            query: expanded?.map(Box::new),
            boost: None,
        }))
    }
}

#[async_trait]
impl Visitor for IncludeExpansionVisitor {
    async fn visit_field(&self, mut node: FieldNode, ctx: &mut VisitorContext) -> Result<Node> {
        let Some(name) = Self::include_name(&node) else {
            // Not a reference; keep walking into the value.
            if let Some(query) = node.query.take() {
                node.query = Some(Box::new(self.visit(*query, ctx).await?));
            }
            return Ok(Node::Field(node));
        };

        ctx.validation_result_mut()
            .referenced_includes
            .insert(name.clone());

        if let Some(skip) = &self.skip {
            if skip(&node) {
                return Ok(Node::Field(node));
            }
        }

        self.expand(node, name, ctx).await
    }
}
