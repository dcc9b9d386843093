//! Bound query parameters.

use std::collections::HashMap;

use sqlit_core::ast::{visit, Expr, Query, Statement};
use sqlit_core::{ToValue, Value};

use crate::error::{Error, Result};

/// The positional and named parameters bound to one query execution.
///
/// Positional `?` placeholders are resolved left to right; named `:name`
/// placeholders are resolved by key. Shortfalls surface as
/// [`Error::NotEnoughParameters`] and [`Error::MissingParameter`] before
/// execution begins.
#[derive(Debug, Clone, Default)]
pub struct Params {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl Params {
    /// No parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional parameters from any [`ToValue`] items.
    pub fn positional<T: ToValue, I: IntoIterator<Item = T>>(values: I) -> Self {
        Self {
            positional: values.into_iter().map(ToValue::to_value).collect(),
            named: HashMap::new(),
        }
    }

    /// Appends one positional parameter.
    pub fn push(&mut self, value: impl ToValue) {
        self.positional.push(value.to_value());
    }

    /// Adds a named parameter, replacing any previous binding of that name.
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, value: impl ToValue) -> Self {
        self.named.insert(name.into(), value.to_value());
        self
    }

    /// Resolves the positional parameter at 1-based `position`.
    pub(crate) fn positional_at(&self, position: usize) -> Result<&Value> {
        self.positional
            .get(position.wrapping_sub(1))
            .ok_or(Error::NotEnoughParameters {
                needed: position,
                got: self.positional.len(),
            })
    }

    /// Resolves a named parameter.
    pub(crate) fn named_get(&self, name: &str) -> Result<&Value> {
        self.named
            .get(name)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }

    /// Resolves one placeholder reference.
    pub(crate) fn resolve(&self, name: Option<&str>, position: usize) -> Result<&Value> {
        match name {
            Some(name) => self.named_get(name),
            None => self.positional_at(position),
        }
    }

    /// Number of positional values.
    #[must_use]
    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }

    /// `true` when no parameters are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// The positional values, in order.
    #[must_use]
    pub fn positional_values(&self) -> &[Value] {
        &self.positional
    }

    /// Merges another parameter set: its positional values are appended,
    /// its named values override same-named bindings.
    pub(crate) fn merge(&mut self, other: Params) {
        self.positional.extend(other.positional);
        self.named.extend(other.named);
    }

    /// Verifies that every placeholder in `stmt` can be resolved.
    pub(crate) fn check_statement(&self, stmt: &Statement) -> Result<()> {
        let mut result = Ok(());
        visit::visit_expressions(stmt, &mut |expr| {
            if result.is_ok() {
                if let Expr::Parameter { name, position } = expr {
                    if let Err(err) = self.resolve(name.as_deref(), *position) {
                        result = Err(err);
                    }
                }
            }
        });
        result
    }

    /// Verifies that every placeholder in `query` can be resolved.
    pub(crate) fn check_query(&self, query: &Query) -> Result<()> {
        let mut result = Ok(());
        visit::visit_query(query, &mut |expr| {
            if result.is_ok() {
                if let Expr::Parameter { name, position } = expr {
                    if let Err(err) = self.resolve(name.as_deref(), *position) {
                        result = Err(err);
                    }
                }
            }
        });
        result
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: HashMap::new(),
        }
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Self {
            positional: values.to_vec(),
            named: HashMap::new(),
        }
    }
}
