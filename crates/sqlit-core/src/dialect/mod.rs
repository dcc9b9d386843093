//! SQL dialect support and AST rendering.
//!
//! Different databases agree on the bulk of SQL but diverge on a few
//! syntactic corners — most visibly `LIMIT`/`OFFSET` encoding and
//! parameter placeholder style. [`Dialect`] captures those differences;
//! [`render`] walks a [`crate::ast::Statement`] and emits `(sql,
//! params)` for a chosen dialect.

mod generic;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod render;
mod sqlite;

pub use generic::GenericDialect;
pub use mssql::SqlServerDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use render::{render, ParamRef, RenderError, Rendered};
pub use sqlite::SqliteDialect;

/// How a dialect encodes `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT {lim}` / `LIMIT {lim} OFFSET {off}`.
    LimitOffset,
    /// `LIMIT {lim}` / `LIMIT {off}, {lim}` (MySQL).
    MySql,
    /// `OFFSET {off} ROWS FETCH NEXT {lim} ROWS ONLY` (SQL Server).
    OffsetFetch,
}

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (e.g., `"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the string escape character.
    fn string_escape(&self) -> &'static str {
        "''"
    }

    /// Returns the placeholder text for the `n`th (1-based) bound parameter.
    fn parameter_placeholder(&self, position: usize) -> String {
        let _ = position;
        String::from("?")
    }

    /// Returns whether the dialect supports the `RETURNING` clause.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Returns whether the dialect supports `ON CONFLICT` upserts.
    fn supports_upsert(&self) -> bool {
        false
    }

    /// Returns whether the dialect can express a given set operator.
    fn supports_set_operation(&self, operator: crate::ast::SetOperator) -> bool {
        let _ = operator;
        true
    }

    /// Returns how this dialect encodes `LIMIT`/`OFFSET`.
    fn limit_style(&self) -> LimitStyle {
        LimitStyle::LimitOffset
    }

    /// Quotes an identifier, splitting dotted names piece by piece.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        name.split('.')
            .map(|part| format!("{quote}{part}{quote}"))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Renders a value as an inline SQL literal (used by `quote`).
    fn quote_value(&self, value: &crate::value::Value) -> String {
        value.to_sql_inline()
    }

    /// Returns the column-definition keyword(s) for `AUTOINCREMENT`, or an
    /// empty string if the dialect expresses auto-increment through the
    /// column's data type instead (e.g. Postgres `SERIAL`).
    fn autoincrement_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }
}
