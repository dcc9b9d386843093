//! MySQL dialect implementation.

use super::{Dialect, LimitStyle};
use crate::ast::SetOperator;

/// MySQL dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::MySql
    }

    // EXCEPT/INTERSECT only landed in MySQL 8.0.31; we target the long
    // tail of 5.7/8.0 installs where only UNION exists.
    fn supports_set_operation(&self, operator: SetOperator) -> bool {
        matches!(operator, SetOperator::Union)
    }

    fn autoincrement_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }
}
