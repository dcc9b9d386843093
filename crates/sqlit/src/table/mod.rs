//! The table abstraction: lazy, composable row sources.
//!
//! A [`Table`] yields `(row id, row)` pairs and describes its columns.
//! Every relational operation — comparison filters, IN sets, ordering,
//! pagination, projection, distinct, aliasing, union, except, OR of
//! predicates — returns a *new* table wrapping the receiver, leaving the
//! original untouched. The engine composes these wrappers when it pushes
//! predicates down, and only falls back to row-by-row evaluation for
//! expressions no wrapper can express.
//!
//! [`MemoryTable`] is the one mutable implementation: the kind of table a
//! host registers with the virtual engine. Everything else is a view.

mod memory;
mod view;

use std::sync::Arc;

use indexmap::IndexMap;
use sqlit_core::Value;

pub use memory::MemoryTable;
pub(crate) use view::{
    AliasTable, DistinctTable, ExceptByIdTable, FilterTable, InSetTable, LimitTable, OffsetTable,
    OrTable, OrderTable, ProjectTable, SnapshotTable, UnionAllTable,
};

use crate::row::Row;
use crate::value_ops;

/// Identifies a row within its base table. Stable across views: every
/// filtering, ordering, or paginating wrapper passes the inner id through,
/// so mutations addressed through a view reach the right base rows.
pub type RowId = i64;

/// A shareable table handle.
pub type SharedTable = Arc<dyn Table>;

/// Column value domain of a registered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Arbitrary-precision decimal with an optional declared scale.
    Decimal {
        /// Digits after the decimal point, when declared.
        scale: Option<u32>,
    },
    /// Text.
    Text,
    /// Binary blob.
    Binary,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
}

/// How a column is indexed, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexHint {
    /// Not indexed.
    #[default]
    None,
    /// Non-unique index.
    Index,
    /// Unique index.
    Unique,
    /// Primary key (unique, at most one per table).
    Primary,
}

impl IndexHint {
    /// `true` for any hint that allows an equality probe.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// `true` when duplicate values are rejected.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        matches!(self, Self::Unique | Self::Primary)
    }
}

/// A column's declared type and index hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Value domain.
    pub column_type: ColumnType,
    /// Index hint.
    pub index: IndexHint,
}

impl ColumnInfo {
    /// A plain, unindexed column.
    #[must_use]
    pub const fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            index: IndexHint::None,
        }
    }

    /// Sets the index hint.
    #[must_use]
    pub const fn with_index(mut self, index: IndexHint) -> Self {
        self.index = index;
        self
    }
}

/// A lazy row source.
pub trait Table: Send + Sync {
    /// The table's columns, in declaration order.
    fn columns(&self) -> IndexMap<String, ColumnInfo>;

    /// Iterates `(row id, row)` pairs.
    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_>;

    /// Serves an equality lookup from an index, if one exists for the
    /// column. `None` means "no index; scan instead".
    fn probe_eq(&self, column: &str, value: &Value) -> Option<Vec<(RowId, Row)>> {
        let _ = (column, value);
        None
    }

    /// The name this table is known by in an enclosing query scope.
    fn scope_name(&self) -> Option<&str> {
        None
    }

    /// Downcast hook for the one mutable implementation.
    fn as_memory(&self) -> Option<&MemoryTable> {
        None
    }
}

/// Comparison operators a table can evaluate natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    NotEq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// SQL LIKE.
    Like,
}

/// A single pushed-down condition: `column op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name (bare, or qualified for joined rows).
    pub column: String,
    /// Comparison operator.
    pub op: CmpOp,
    /// Right-hand value.
    pub value: Value,
}

impl Condition {
    /// Creates a condition.
    #[must_use]
    pub fn new(column: impl Into<String>, op: CmpOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    /// Whether a row satisfies the condition. NULL comparisons are
    /// UNKNOWN, i.e. `false`, except `Eq` against NULL which matches SQL's
    /// `IS NULL` (the engine lowers `IS NULL` to an equality condition
    /// against NULL).
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        let Some(cell) = lookup_cell(row, &self.column) else {
            return false;
        };
        match (&self.op, self.value.is_null()) {
            (CmpOp::Eq, true) => cell.is_null(),
            (CmpOp::NotEq, true) => false,
            (CmpOp::Like, _) => match (cell, &self.value) {
                (Value::Text(text), Value::Text(pattern)) => {
                    value_ops::like_match(text, pattern)
                }
                _ => false,
            },
            _ => match value_ops::value_cmp(cell, &self.value) {
                None => false,
                Some(ordering) => match self.op {
                    CmpOp::Eq => ordering.is_eq(),
                    CmpOp::NotEq => ordering.is_ne(),
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::Lte => ordering.is_le(),
                    CmpOp::Gt => ordering.is_gt(),
                    CmpOp::Gte => ordering.is_ge(),
                    CmpOp::Like => unreachable!(),
                },
            },
        }
    }
}

/// A conjunction of conditions, usable as one branch of an OR push-down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    /// Conditions, all of which must hold.
    pub conditions: Vec<Condition>,
}

impl Predicate {
    /// An empty (always-true) predicate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether a row satisfies every condition.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// One ORDER BY key for [`TableOps::order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Column name.
    pub column: String,
    /// Descending order.
    pub descending: bool,
    /// `NULLS LAST` (default places NULLs first).
    pub nulls_last: bool,
}

impl SortKey {
    /// Ascending key.
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
            nulls_last: false,
        }
    }

    /// Descending key.
    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
            nulls_last: false,
        }
    }
}

/// Resolves a column name against a row, accepting bare names for
/// qualified cells and qualified names for bare cells.
#[must_use]
pub(crate) fn lookup_cell<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(column) {
        return Some(value);
    }
    if let Some(bare) = column.rsplit('.').next() {
        if bare != column {
            if let Some(value) = row.get(bare) {
                return Some(value);
            }
        }
    }
    // Bare name against qualified cells: match a unique `.column` suffix.
    let suffix = format!(".{column}");
    let mut found = None;
    for (name, value) in row.iter() {
        if name.ends_with(&suffix) {
            if found.is_some() {
                return None;
            }
            found = Some(value);
        }
    }
    found
}

/// The composable operators every table supports. Each returns a new
/// table; the receiver is unchanged.
pub trait TableOps {
    /// Rows where `column = value` (`value` NULL matches SQL NULLs).
    fn eq(&self, column: &str, value: Value) -> SharedTable;
    /// Rows where `column != value`.
    fn neq(&self, column: &str, value: Value) -> SharedTable;
    /// Rows where `column < value`.
    fn lt(&self, column: &str, value: Value) -> SharedTable;
    /// Rows where `column <= value`.
    fn lte(&self, column: &str, value: Value) -> SharedTable;
    /// Rows where `column > value`.
    fn gt(&self, column: &str, value: Value) -> SharedTable;
    /// Rows where `column >= value`.
    fn gte(&self, column: &str, value: Value) -> SharedTable;
    /// Rows where `column LIKE pattern`.
    fn like(&self, column: &str, pattern: String) -> SharedTable;
    /// Rows where `column` is in `values`.
    fn in_set(&self, column: &str, values: Vec<Value>) -> SharedTable;
    /// Rows matching at least one predicate.
    fn or_any(&self, predicates: Vec<Predicate>) -> SharedTable;
    /// Rows sorted by `keys`.
    fn order(&self, keys: Vec<SortKey>) -> SharedTable;
    /// The first `n` rows.
    fn limit(&self, n: usize) -> SharedTable;
    /// Rows after skipping `n`.
    fn offset(&self, n: usize) -> SharedTable;
    /// Rows narrowed to the named columns.
    fn project(&self, columns: Vec<String>) -> SharedTable;
    /// Rows deduplicated by content.
    fn distinct(&self) -> SharedTable;
    /// The same rows under a scope alias.
    fn with_alias(&self, alias: impl Into<String>) -> SharedTable;
    /// Rows of both tables (duplicates kept).
    fn union_all(&self, other: SharedTable) -> SharedTable;
    /// Rows of the receiver whose row id does not appear in `other`.
    /// Both sides must share a lineage (`other` is a view of the
    /// receiver's base); this is how NOT-predicates are pushed down.
    fn except(&self, other: SharedTable) -> SharedTable;
}

impl TableOps for SharedTable {
    fn eq(&self, column: &str, value: Value) -> SharedTable {
        filter(self, column, CmpOp::Eq, value)
    }

    fn neq(&self, column: &str, value: Value) -> SharedTable {
        filter(self, column, CmpOp::NotEq, value)
    }

    fn lt(&self, column: &str, value: Value) -> SharedTable {
        filter(self, column, CmpOp::Lt, value)
    }

    fn lte(&self, column: &str, value: Value) -> SharedTable {
        filter(self, column, CmpOp::Lte, value)
    }

    fn gt(&self, column: &str, value: Value) -> SharedTable {
        filter(self, column, CmpOp::Gt, value)
    }

    fn gte(&self, column: &str, value: Value) -> SharedTable {
        filter(self, column, CmpOp::Gte, value)
    }

    fn like(&self, column: &str, pattern: String) -> SharedTable {
        filter(self, column, CmpOp::Like, Value::Text(pattern))
    }

    fn in_set(&self, column: &str, values: Vec<Value>) -> SharedTable {
        Arc::new(InSetTable::new(Arc::clone(self), column, values))
    }

    fn or_any(&self, predicates: Vec<Predicate>) -> SharedTable {
        Arc::new(OrTable::new(Arc::clone(self), predicates))
    }

    fn order(&self, keys: Vec<SortKey>) -> SharedTable {
        Arc::new(OrderTable::new(Arc::clone(self), keys))
    }

    fn limit(&self, n: usize) -> SharedTable {
        Arc::new(LimitTable::new(Arc::clone(self), n))
    }

    fn offset(&self, n: usize) -> SharedTable {
        Arc::new(OffsetTable::new(Arc::clone(self), n))
    }

    fn project(&self, columns: Vec<String>) -> SharedTable {
        Arc::new(ProjectTable::new(Arc::clone(self), columns))
    }

    fn distinct(&self) -> SharedTable {
        Arc::new(DistinctTable::new(Arc::clone(self)))
    }

    fn with_alias(&self, alias: impl Into<String>) -> SharedTable {
        Arc::new(AliasTable::new(Arc::clone(self), alias.into()))
    }

    fn union_all(&self, other: SharedTable) -> SharedTable {
        Arc::new(UnionAllTable::new(Arc::clone(self), other))
    }

    fn except(&self, other: SharedTable) -> SharedTable {
        Arc::new(ExceptByIdTable::new(Arc::clone(self), other))
    }
}

fn filter(table: &SharedTable, column: &str, op: CmpOp, value: Value) -> SharedTable {
    Arc::new(FilterTable::new(
        Arc::clone(table),
        Condition::new(column, op, value),
    ))
}
