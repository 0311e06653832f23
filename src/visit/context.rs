//! Shared per-run state for visitor chains

use std::any::Any;
use std::collections::HashMap;

use crate::ast::Span;
use crate::visitors::validate::{ValidationOptions, ValidationResult};

const VALIDATION_RESULT_KEY: &str = "validation.result";
const VALIDATION_OPTIONS_KEY: &str = "validation.options";
const INCLUDE_STACK_KEY: &str = "include.stack";
const ORIGINAL_FIELDS_KEY: &str = "fields.original";

/// String-keyed store of arbitrary values shared by one visitor-chain run
///
/// The map is untyped so that new visitors can share state without plumbing
/// every option through signatures; the typed accessors below cover the
/// state the bundled visitors exchange. A context lives exactly for the
/// duration of one chain run and is not shared between concurrent runs.
#[derive(Default)]
pub struct VisitorContext {
    values: HashMap<String, Box<dyn Any + Send>>,
}

impl VisitorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a typed value by key
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Look up a typed value by key for mutation
    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Store a value, replacing any previous value under the same key
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Remove and return a typed value
    pub fn remove<T: 'static>(&mut self, key: &str) -> Option<T> {
        let value = self.values.remove(key)?;
        match value.downcast::<T>() {
            Ok(boxed) => Some(*boxed),
            Err(original) => {
                // Type mismatch: put it back untouched.
                self.values.insert(key.to_string(), original);
                None
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fetch a typed value, inserting its default first when absent
    fn entry_or_default<T: Any + Send + Default>(&mut self, key: &str) -> &mut T {
        self.values
            .entry(key.to_string())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut()
            .expect("context entry holds a different type")
    }

    /// The validation result accumulated by this run
    ///
    /// Created on first access; the include, field-resolution and
    /// validation visitors all write their bookkeeping here.
    pub fn validation_result_mut(&mut self) -> &mut ValidationResult {
        self.entry_or_default(VALIDATION_RESULT_KEY)
    }

    /// Remove and return the accumulated validation result
    pub fn take_validation_result(&mut self) -> ValidationResult {
        self.remove(VALIDATION_RESULT_KEY).unwrap_or_default()
    }

    pub fn validation_options(&self) -> Option<&ValidationOptions> {
        self.get(VALIDATION_OPTIONS_KEY)
    }

    pub fn set_validation_options(&mut self, options: ValidationOptions) {
        self.insert(VALIDATION_OPTIONS_KEY, options);
    }

    /// Names of the includes currently being expanded, outermost first
    pub fn include_stack(&self) -> &[String] {
        self.get::<Vec<String>>(INCLUDE_STACK_KEY)
            .map_or(&[], |stack| stack.as_slice())
    }

    pub fn push_include(&mut self, name: impl Into<String>) {
        self.entry_or_default::<Vec<String>>(INCLUDE_STACK_KEY)
            .push(name.into());
    }

    pub fn pop_include(&mut self) -> Option<String> {
        self.get_mut::<Vec<String>>(INCLUDE_STACK_KEY)
            .and_then(|stack| stack.pop())
    }

    /// Case-insensitive membership test used for cycle detection
    pub fn include_stack_contains(&self, name: &str) -> bool {
        self.include_stack()
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(name))
    }

    /// Remember the pre-resolution name of a field-carrying node
    pub fn record_original_field(&mut self, span: Span, original: impl Into<String>) {
        self.entry_or_default::<HashMap<Span, String>>(ORIGINAL_FIELDS_KEY)
            .insert(span, original.into());
    }

    /// The pre-resolution name of the node at `span`, if it was resolved
    pub fn original_field(&self, span: Span) -> Option<&str> {
        self.get::<HashMap<Span, String>>(ORIGINAL_FIELDS_KEY)
            .and_then(|map| map.get(&span))
            .map(String::as_str)
    }
}
