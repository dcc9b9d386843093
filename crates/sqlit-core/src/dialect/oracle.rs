//! Oracle dialect implementation.

use super::Dialect;

/// Oracle dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn parameter_placeholder(&self, position: usize) -> String {
        format!(":{position}")
    }

    fn autoincrement_keyword(&self) -> &'static str {
        "GENERATED ALWAYS AS IDENTITY"
    }
}
