//! Bundled tree-rewrite and analysis visitors
//!
//! - [`include`]: `@include:name` expansion with cycle detection
//! - [`fields`]: field-name resolution with referenced/unresolved tracking
//! - [`validate`]: policy validation and per-query statistics

pub mod fields;
pub mod include;
pub mod validate;

pub use fields::{FieldResolutionVisitor, FieldResolver, HierarchicalFieldResolver};
pub use include::{IncludeExpansionVisitor, IncludeResolver, MapIncludeResolver, INCLUDE_FIELD};
pub use validate::{
    Operation, ValidationError, ValidationException, ValidationOptions, ValidationResult,
    ValidationVisitor,
};
