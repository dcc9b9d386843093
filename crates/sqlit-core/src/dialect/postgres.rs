//! PostgreSQL dialect implementation.

use super::Dialect;

/// PostgreSQL dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn parameter_placeholder(&self, position: usize) -> String {
        format!("${position}")
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_upsert(&self) -> bool {
        true // ON CONFLICT since 9.5
    }

    // Auto-increment is expressed through SERIAL/IDENTITY column types.
    fn autoincrement_keyword(&self) -> &'static str {
        ""
    }
}
