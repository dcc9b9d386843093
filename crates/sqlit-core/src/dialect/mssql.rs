//! SQL Server dialect implementation.

use super::{Dialect, LimitStyle};

/// Microsoft SQL Server dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn parameter_placeholder(&self, position: usize) -> String {
        format!("@p{position}")
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::OffsetFetch
    }

    fn autoincrement_keyword(&self) -> &'static str {
        "IDENTITY(1,1)"
    }
}
