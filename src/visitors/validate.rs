//! Query validation
//!
//! A single read-only pass that checks a tree against a set of policy
//! options and accumulates everything it saw into a [`ValidationResult`]:
//! referenced fields, the operations used per field, and the maximum group
//! nesting depth. Violations never abort the walk; they are collected, and
//! optionally raised afterwards as a [`ValidationException`].

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{
    BooleanNode, ExistsNode, FieldNode, GroupNode, MissingNode, Node, RangeNode, RegexNode, Span,
    TermNode,
};
use crate::error::Result;
use crate::visit::{Visitor, VisitorContext};

use super::include::INCLUDE_FIELD;

const DEPTH_KEY: &str = "validate.depth";
const FIELD_STACK_KEY: &str = "validate.field_stack";

/// Kinds of operations a query can perform, recorded per field
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Range,
    Wildcard,
    Prefix,
    Regex,
    Boolean,
    Exists,
    Missing,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Range => "range",
            Operation::Wildcard => "wildcard",
            Operation::Prefix => "prefix",
            Operation::Regex => "regex",
            Operation::Boolean => "boolean",
            Operation::Exists => "exists",
            Operation::Missing => "missing",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation violation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    /// Character offset of the node that triggered the violation
    pub index: usize,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, index: usize) -> Self {
        Self {
            message: message.into(),
            index,
        }
    }
}

/// Everything one validation or rewrite run learned about a query
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub referenced_fields: BTreeSet<String>,
    pub referenced_includes: BTreeSet<String>,
    pub unresolved_includes: BTreeSet<String>,
    pub unresolved_fields: BTreeSet<String>,
    /// Deepest group nesting observed
    pub max_node_depth: u32,
    /// Which operations touched which fields; unfielded operations are
    /// recorded under the empty string
    pub operations: BTreeMap<Operation, BTreeSet<String>>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, message: impl Into<String>, index: usize) {
        self.errors.push(ValidationError::new(message, index));
    }

    pub fn record_operation(&mut self, operation: Operation, field: impl Into<String>) {
        self.operations
            .entry(operation)
            .or_default()
            .insert(field.into());
    }

    pub fn into_exception(self) -> ValidationException {
        ValidationException { result: self }
    }
}

/// Raised by the validate-and-throw path; carries the full result
#[derive(Clone, Debug, Error)]
#[error("Query validation failed with {} error(s)", result.errors.len())]
pub struct ValidationException {
    pub result: ValidationResult,
}

fn default_true() -> bool {
    true
}

/// Policy applied by the [`ValidationVisitor`]
///
/// Empty allow-lists permit everything; restriction lists always win.
/// `allowed_max_node_depth` of zero means unlimited.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub allowed_fields: BTreeSet<String>,
    pub restricted_fields: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub allow_leading_wildcards: bool,
    pub allowed_max_node_depth: u32,
    pub allowed_operations: BTreeSet<Operation>,
    pub restricted_operations: BTreeSet<Operation>,
    /// Raise a [`ValidationException`] instead of returning an invalid result
    pub should_throw: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allowed_fields: BTreeSet::new(),
            restricted_fields: BTreeSet::new(),
            allow_leading_wildcards: true,
            allowed_max_node_depth: 0,
            allowed_operations: BTreeSet::new(),
            restricted_operations: BTreeSet::new(),
            should_throw: false,
        }
    }
}

/// Walks the tree once, populating the context's [`ValidationResult`]
pub struct ValidationVisitor {
    options: ValidationOptions,
}

impl ValidationVisitor {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    fn check_field(&self, field: &str, span: Span, ctx: &mut VisitorContext) {
        let result = ctx.validation_result_mut();
        result.referenced_fields.insert(field.to_string());
        if !self.options.allowed_fields.is_empty() && !self.options.allowed_fields.contains(field) {
            result.add_error(
                format!("Field '{}' is not allowed", field),
                span.start_offset,
            );
        }
        if self.options.restricted_fields.contains(field) {
            result.add_error(format!("Field '{}' is restricted", field), span.start_offset);
        }
    }

    fn check_operation(&self, operation: Operation, field: &str, span: Span, ctx: &mut VisitorContext) {
        let allowed = &self.options.allowed_operations;
        let restricted = &self.options.restricted_operations;
        let result = ctx.validation_result_mut();
        result.record_operation(operation, field);
        if !allowed.is_empty() && !allowed.contains(&operation) {
            result.add_error(
                format!("Operation '{}' is not allowed", operation),
                span.start_offset,
            );
        }
        if restricted.contains(&operation) {
            result.add_error(
                format!("Operation '{}' is restricted", operation),
                span.start_offset,
            );
        }
    }

    fn current_field(ctx: &VisitorContext) -> String {
        ctx.get::<Vec<String>>(FIELD_STACK_KEY)
            .and_then(|stack| stack.last().cloned())
            .unwrap_or_default()
    }

    fn push_field(ctx: &mut VisitorContext, field: &str) {
        match ctx.get_mut::<Vec<String>>(FIELD_STACK_KEY) {
            Some(stack) => stack.push(field.to_string()),
            None => ctx.insert(FIELD_STACK_KEY, vec![field.to_string()]),
        }
    }

    fn pop_field(ctx: &mut VisitorContext) {
        if let Some(stack) = ctx.get_mut::<Vec<String>>(FIELD_STACK_KEY) {
            stack.pop();
        }
    }
}

#[async_trait]
impl Visitor for ValidationVisitor {
    async fn visit_group(&self, mut node: GroupNode, ctx: &mut VisitorContext) -> Result<Node> {
        let depth = ctx.get::<u32>(DEPTH_KEY).copied().unwrap_or(0) + 1;
        ctx.insert(DEPTH_KEY, depth);

        let result = ctx.validation_result_mut();
        if depth > result.max_node_depth {
            result.max_node_depth = depth;
        }
        let limit = self.options.allowed_max_node_depth;
        if limit > 0 && depth > limit {
            result.add_error(
                format!("Query exceeds the maximum node depth of {}", limit),
                node.span.start_offset,
            );
        }

        if let Some(query) = node.query.take() {
            node.query = Some(Box::new(self.visit(*query, ctx).await?));
        }
        ctx.insert(DEPTH_KEY, depth - 1);
        Ok(Node::Group(node))
    }

    async fn visit_field(&self, mut node: FieldNode, ctx: &mut VisitorContext) -> Result<Node> {
        // Include references are expanded elsewhere; their name is not a
        // data field.
        if node.field.eq_ignore_ascii_case(INCLUDE_FIELD) {
            return Ok(Node::Field(node));
        }
        self.check_field(&node.field, node.span, ctx);
        Self::push_field(ctx, &node.field);
        let visited = match node.query.take() {
            Some(query) => {
                let result = self.visit(*query, ctx).await;
                match result {
                    Ok(child) => {
                        node.query = Some(Box::new(child));
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        };
        Self::pop_field(ctx);
        visited?;
        Ok(Node::Field(node))
    }

    async fn visit_boolean(&self, mut node: BooleanNode, ctx: &mut VisitorContext) -> Result<Node> {
        let field = Self::current_field(ctx);
        self.check_operation(Operation::Boolean, &field, node.span, ctx);
        for clause in &mut node.clauses {
            if let Some(query) = clause.query.take() {
                clause.query = Some(Box::new(self.visit(*query, ctx).await?));
            }
        }
        Ok(Node::Boolean(node))
    }

    async fn visit_term(&self, node: TermNode, ctx: &mut VisitorContext) -> Result<Node> {
        let field = Self::current_field(ctx);
        if node.is_prefix {
            self.check_operation(Operation::Prefix, &field, node.span, ctx);
        } else if node.is_wildcard {
            self.check_operation(Operation::Wildcard, &field, node.span, ctx);
        }
        if !self.options.allow_leading_wildcards
            && (node.raw_term.starts_with('*') || node.raw_term.starts_with('?'))
        {
            ctx.validation_result_mut().add_error(
                format!("Leading wildcards are not allowed: '{}'", node.unescaped_term),
                node.span.start_offset,
            );
        }
        Ok(Node::Term(node))
    }

    async fn visit_range(&self, node: RangeNode, ctx: &mut VisitorContext) -> Result<Node> {
        let field = match &node.field {
            Some(field) => {
                self.check_field(field, node.span, ctx);
                field.clone()
            }
            None => Self::current_field(ctx),
        };
        self.check_operation(Operation::Range, &field, node.span, ctx);
        Ok(Node::Range(node))
    }

    async fn visit_regex(&self, node: RegexNode, ctx: &mut VisitorContext) -> Result<Node> {
        let field = Self::current_field(ctx);
        self.check_operation(Operation::Regex, &field, node.span, ctx);
        Ok(Node::Regex(node))
    }

    async fn visit_exists(&self, node: ExistsNode, ctx: &mut VisitorContext) -> Result<Node> {
        self.check_field(&node.field, node.span, ctx);
        self.check_operation(Operation::Exists, &node.field, node.span, ctx);
        Ok(Node::Exists(node))
    }

    async fn visit_missing(&self, node: MissingNode, ctx: &mut VisitorContext) -> Result<Node> {
        self.check_field(&node.field, node.span, ctx);
        self.check_operation(Operation::Missing, &node.field, node.span, ctx);
        Ok(Node::Missing(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::Parser;

    fn parse(input: &str) -> Node {
        Parser::new(input).parse().document
    }

    async fn validate(input: &str, options: ValidationOptions) -> ValidationResult {
        parse(input).validate(&options).await.unwrap()
    }

    #[tokio::test]
    async fn test_collects_referenced_fields() {
        let result = validate("title:rust AND status:active OR price:[1 TO 2]", ValidationOptions::default()).await;
        assert!(result.is_valid());
        let fields: Vec<&str> = result.referenced_fields.iter().map(String::as_str).collect();
        assert_eq!(fields, vec!["price", "status", "title"]);
    }

    #[tokio::test]
    async fn test_allowed_fields_reject_unknown() {
        let options = ValidationOptions {
            allowed_fields: ["title".to_string()].into(),
            ..Default::default()
        };
        let result = validate("title:a AND status:b", options).await;
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("'status' is not allowed"));
    }

    #[tokio::test]
    async fn test_restricted_fields_always_reject() {
        let options = ValidationOptions {
            restricted_fields: ["secret".to_string()].into(),
            ..Default::default()
        };
        let result = validate("secret:x", options).await;
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("restricted"));
    }

    #[tokio::test]
    async fn test_operations_are_recorded_per_field() {
        let result = validate(
            "name:jo* AND age:[1 TO 2] AND title:/re/ AND deleted:*",
            ValidationOptions::default(),
        )
        .await;
        assert!(result.operations[&Operation::Prefix].contains("name"));
        assert!(result.operations[&Operation::Range].contains("age"));
        assert!(result.operations[&Operation::Regex].contains("title"));
        assert!(result.operations[&Operation::Exists].contains("deleted"));
        assert!(result.operations[&Operation::Boolean].contains(""));
    }

    #[tokio::test]
    async fn test_restricted_operations() {
        let options = ValidationOptions {
            restricted_operations: [Operation::Regex].into(),
            ..Default::default()
        };
        let result = validate("title:/ab+/", options).await;
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("'regex' is restricted"));
    }

    #[tokio::test]
    async fn test_allowed_operations_reject_others() {
        let options = ValidationOptions {
            allowed_operations: [Operation::Boolean].into(),
            ..Default::default()
        };
        let result = validate("a AND price:[1 TO 2]", options).await;
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("'range' is not allowed"));
    }

    #[tokio::test]
    async fn test_max_node_depth() {
        let options = ValidationOptions {
            allowed_max_node_depth: 1,
            ..Default::default()
        };
        let result = validate("(a AND (b OR c))", options).await;
        assert_eq!(result.max_node_depth, 2);
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("maximum node depth"));
    }

    #[tokio::test]
    async fn test_depth_does_not_accumulate_across_siblings() {
        let options = ValidationOptions {
            allowed_max_node_depth: 1,
            ..Default::default()
        };
        let result = validate("(a) AND (b) AND (c)", options).await;
        assert_eq!(result.max_node_depth, 1);
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn test_leading_wildcard_policy() {
        let options = ValidationOptions {
            allow_leading_wildcards: false,
            ..Default::default()
        };
        let result = validate("name:*son", options).await;
        assert!(!result.is_valid());
        assert!(result.errors[0].message.contains("Leading wildcards"));

        let trailing = validate(
            "name:jo*",
            ValidationOptions {
                allow_leading_wildcards: false,
                ..Default::default()
            },
        )
        .await;
        assert!(trailing.is_valid());
    }

    #[tokio::test]
    async fn test_include_reference_is_not_a_field() {
        let result = validate("@include:common AND title:x", ValidationOptions::default()).await;
        assert!(!result.referenced_fields.contains("@include"));
        assert!(result.referenced_fields.contains("title"));
    }

    #[tokio::test]
    async fn test_validate_and_throw() {
        let options = ValidationOptions {
            restricted_fields: ["secret".to_string()].into(),
            ..Default::default()
        };
        let err = parse("secret:x").validate_and_throw(&options).await.unwrap_err();
        match err {
            crate::error::QueryError::Validation(exception) => {
                assert_eq!(exception.result.errors.len(), 1);
            }
            other => panic!("expected validation error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_error_index_points_at_source() {
        let options = ValidationOptions {
            restricted_fields: ["b".to_string()].into(),
            ..Default::default()
        };
        let result = validate("a:x AND b:y", options).await;
        assert_eq!(result.errors[0].index, 8);
    }
}
