//! Declared SQL data types and column definitions.
//!
//! A declared type carries two things: the spelling the source used
//! (`VARCHAR`, `INT`, `DATETIME`, …) and the [`TypeFamily`] that spelling
//! resolves to. The family is what execution cares about — it is the same
//! eight-way vocabulary the engine's tables use for their columns — while
//! the spelling survives so rendering reproduces the declaration.

use core::fmt;

/// The value family a declared SQL type resolves to.
///
/// Every recognised type name collapses into one of these:
/// `INTEGER`/`INT`/`SMALLINT`/`TINYINT`/`BIGINT` → `Int`,
/// `REAL`/`FLOAT`/`DOUBLE` → `Float`, `DECIMAL`/`NUMERIC` → `Decimal`,
/// `TEXT`/`VARCHAR`/`CHAR`/`CLOB` → `Text`,
/// `BLOB`/`BINARY`/`VARBINARY` → `Binary`, and the date/time names map
/// onto their own families. `BOOLEAN` keeps a family of its own so
/// dialects that render it natively can.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// 64-bit integers.
    Int,
    /// 64-bit floats.
    Float,
    /// Fixed-point decimals.
    Decimal,
    /// Character data.
    Text,
    /// Raw bytes.
    Binary,
    /// Calendar dates.
    Date,
    /// Times of day.
    Time,
    /// Combined date and time.
    DateTime,
    /// Booleans.
    Bool,
}

/// A data type as declared in SQL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataType {
    /// The type name as spelled (canonicalised to the keyword's case for
    /// recognised names).
    pub name: String,
    /// The family the name resolves to.
    pub family: TypeFamily,
    /// Declared length (`CHAR(10)`) or precision (`DECIMAL(10, 2)`).
    pub precision: Option<u32>,
    /// Declared scale (`DECIMAL(10, 2)`).
    pub scale: Option<u32>,
}

impl DataType {
    /// A type with no modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>, family: TypeFamily) -> Self {
        Self {
            name: name.into(),
            family,
            precision: None,
            scale: None,
        }
    }

    /// The SQL rendering: the declared name plus its modifiers.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match (self.precision, self.scale) {
            (Some(p), Some(s)) => format!("{}({p}, {s})", self.name),
            (Some(p), None) => format!("{}({p})", self.name),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// One column of a `CREATE TABLE` statement.
///
/// The parser fills the constraint flags directly; `PRIMARY KEY` also
/// sets `not_null`, since a key column can never hold NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// `NOT NULL` was declared (or implied by `PRIMARY KEY`).
    pub not_null: bool,
    /// `PRIMARY KEY` was declared.
    pub primary_key: bool,
    /// `UNIQUE` was declared.
    pub unique: bool,
    /// `AUTOINCREMENT` was declared.
    pub autoincrement: bool,
    /// `DEFAULT <expr>`, when declared.
    pub default: Option<super::Expr>,
}

impl ColumnDef {
    /// An unconstrained column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            primary_key: false,
            unique: false,
            autoincrement: false,
            default: None,
        }
    }
}
