//! Error types for the query engine.

use std::time::Duration;

use thiserror::Error;

use crate::hydrate::HydrationError;
use sqlit_core::dialect::RenderError;
use sqlit_core::parser::ParseError;

/// Errors surfaced by the engine, the query builder, and the backends.
#[derive(Debug, Error)]
pub enum Error {
    /// The SQL text could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// The renderer cannot express a construct in the chosen dialect.
    #[error(transparent)]
    Dialect(#[from] RenderError),

    /// A construct cannot be handled by the chosen execution path.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A referenced table is not registered.
    #[error("no such table: {0}")]
    MissingTable(String),

    /// A referenced column does not exist in the row scope.
    #[error("no such column: {0}")]
    MissingColumn(String),

    /// A named parameter was referenced but not supplied.
    #[error("missing named parameter :{0}")]
    MissingParameter(String),

    /// Fewer positional parameters were supplied than the query references.
    #[error("not enough positional parameters: query uses {needed}, got {got}")]
    NotEnoughParameters {
        /// Number of positional placeholders in the query.
        needed: usize,
        /// Number of positional values supplied.
        got: usize,
    },

    /// An unqualified column name matches more than one table in scope.
    #[error("ambiguous column reference: {0}")]
    AmbiguousReference(String),

    /// A value does not fit the operation or the target column.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An INSERT or a builder operation violates a declared constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Two merged queries define the same CTE name differently.
    #[error("conflicting definitions for CTE '{0}'")]
    ConflictingCte(String),

    /// A new CTE would shadow one that is already defined.
    #[error("CTE '{0}' shadows an existing definition")]
    CteShadowing(String),

    /// A recursive CTE did not converge within the iteration cap.
    #[error("recursive CTE '{name}' exceeded {limit} iterations")]
    RecursionLimit {
        /// The CTE's name.
        name: String,
        /// The configured iteration cap.
        limit: usize,
    },

    /// The per-query deadline elapsed. No partial results are returned.
    #[error("query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// A result row could not be absorbed by the hydration target.
    #[error(transparent)]
    Hydration(#[from] HydrationError),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::Unsupported`] with a formatted message.
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}
