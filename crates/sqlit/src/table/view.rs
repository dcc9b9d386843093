//! Lazy view wrappers over an inner table.
//!
//! Filtering, ordering, and paginating views pass the inner row ids
//! through unchanged, so a chain of views over a [`super::MemoryTable`]
//! still addresses the base rows — updates and deletes rely on that.
//! Combining views (union) renumber ids because their rows no longer have
//! a single base.

use std::collections::HashSet;

use indexmap::IndexMap;
use sqlit_core::Value;

use super::{
    lookup_cell, ColumnInfo, Condition, MemoryTable, Predicate, RowId, SharedTable, SortKey, Table,
};
use crate::row::Row;
use crate::value_ops;

/// Rows of `inner` satisfying one condition.
pub(crate) struct FilterTable {
    inner: SharedTable,
    condition: Condition,
}

impl FilterTable {
    pub(crate) fn new(inner: SharedTable, condition: Condition) -> Self {
        Self { inner, condition }
    }
}

impl Table for FilterTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        // An indexed equality goes through the probe instead of a scan.
        if self.condition.op == super::CmpOp::Eq && !self.condition.value.is_null() {
            if let Some(hits) = self.inner.probe_eq(&self.condition.column, &self.condition.value)
            {
                return Box::new(hits.into_iter());
            }
        }
        let condition = self.condition.clone();
        Box::new(
            self.inner
                .scan()
                .filter(move |(_, row)| condition.matches(row)),
        )
    }

    fn probe_eq(&self, column: &str, value: &Value) -> Option<Vec<(RowId, Row)>> {
        let hits = self.inner.probe_eq(column, value)?;
        Some(
            hits.into_iter()
                .filter(|(_, row)| self.condition.matches(row))
                .collect(),
        )
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// Rows of `inner` whose column value is in a set.
pub(crate) struct InSetTable {
    inner: SharedTable,
    column: String,
    keys: HashSet<String>,
}

impl InSetTable {
    pub(crate) fn new(inner: SharedTable, column: &str, values: Vec<Value>) -> Self {
        let keys = values
            .iter()
            .filter(|v| !v.is_null())
            .map(value_ops::serialize_value)
            .collect();
        Self {
            inner,
            column: column.to_string(),
            keys,
        }
    }
}

impl Table for InSetTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.inner.scan().filter(move |(_, row)| {
            lookup_cell(row, &self.column).is_some_and(|cell| {
                !cell.is_null() && self.keys.contains(&value_ops::serialize_value(cell))
            })
        }))
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// Rows of `inner` matching at least one predicate.
pub(crate) struct OrTable {
    inner: SharedTable,
    predicates: Vec<Predicate>,
}

impl OrTable {
    pub(crate) fn new(inner: SharedTable, predicates: Vec<Predicate>) -> Self {
        Self { inner, predicates }
    }
}

impl Table for OrTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.inner.scan().filter(move |(_, row)| {
            self.predicates.iter().any(|p| p.matches(row))
        }))
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// Rows of `inner` sorted by a key list. Materialises on scan.
pub(crate) struct OrderTable {
    inner: SharedTable,
    keys: Vec<SortKey>,
}

impl OrderTable {
    pub(crate) fn new(inner: SharedTable, keys: Vec<SortKey>) -> Self {
        Self { inner, keys }
    }
}

impl Table for OrderTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        let mut rows: Vec<(RowId, Row)> = self.inner.scan().collect();
        rows.sort_by(|(_, a), (_, b)| {
            for key in &self.keys {
                let left = lookup_cell(a, &key.column).unwrap_or(&Value::Null);
                let right = lookup_cell(b, &key.column).unwrap_or(&Value::Null);
                let mut ordering = value_ops::sort_cmp(left, right, key.nulls_last);
                if key.descending {
                    ordering = ordering.reverse();
                }
                if !ordering.is_eq() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Box::new(rows.into_iter())
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// The first `n` rows of `inner`.
pub(crate) struct LimitTable {
    inner: SharedTable,
    limit: usize,
}

impl LimitTable {
    pub(crate) fn new(inner: SharedTable, limit: usize) -> Self {
        Self { inner, limit }
    }
}

impl Table for LimitTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.inner.scan().take(self.limit))
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// Rows of `inner` after skipping `n`.
pub(crate) struct OffsetTable {
    inner: SharedTable,
    offset: usize,
}

impl OffsetTable {
    pub(crate) fn new(inner: SharedTable, offset: usize) -> Self {
        Self { inner, offset }
    }
}

impl Table for OffsetTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.inner.scan().skip(self.offset))
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// Rows of `inner` narrowed to the named columns.
pub(crate) struct ProjectTable {
    inner: SharedTable,
    columns: Vec<String>,
}

impl ProjectTable {
    pub(crate) fn new(inner: SharedTable, columns: Vec<String>) -> Self {
        Self { inner, columns }
    }
}

impl Table for ProjectTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        let inner = self.inner.columns();
        self.columns
            .iter()
            .filter_map(|name| inner.get(name).map(|info| (name.clone(), *info)))
            .collect()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.inner.scan().map(move |(id, row)| {
            let projected = self
                .columns
                .iter()
                .map(|name| {
                    (
                        name.clone(),
                        lookup_cell(&row, name).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();
            (id, projected)
        }))
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }
}

/// Rows of `inner` deduplicated by content; the first occurrence wins.
pub(crate) struct DistinctTable {
    inner: SharedTable,
}

impl DistinctTable {
    pub(crate) fn new(inner: SharedTable) -> Self {
        Self { inner }
    }
}

impl Table for DistinctTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        let mut seen = HashSet::new();
        Box::new(
            self.inner
                .scan()
                .filter(move |(_, row)| seen.insert(row.content_key())),
        )
    }

    fn scope_name(&self) -> Option<&str> {
        self.inner.scope_name()
    }
}

/// The same rows under a different scope name.
pub(crate) struct AliasTable {
    inner: SharedTable,
    alias: String,
}

impl AliasTable {
    pub(crate) fn new(inner: SharedTable, alias: String) -> Self {
        Self { inner, alias }
    }
}

impl Table for AliasTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.inner.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        self.inner.scan()
    }

    fn probe_eq(&self, column: &str, value: &Value) -> Option<Vec<(RowId, Row)>> {
        self.inner.probe_eq(column, value)
    }

    fn scope_name(&self) -> Option<&str> {
        Some(&self.alias)
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.inner.as_memory()
    }
}

/// All rows of both sides. Row ids are renumbered; the result no longer
/// addresses either base table.
pub(crate) struct UnionAllTable {
    left: SharedTable,
    right: SharedTable,
}

impl UnionAllTable {
    pub(crate) fn new(left: SharedTable, right: SharedTable) -> Self {
        Self { left, right }
    }
}

impl Table for UnionAllTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.left.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(
            self.left
                .scan()
                .map(|(_, row)| row)
                .chain(self.right.scan().map(|(_, row)| row))
                .enumerate()
                .map(|(i, row)| (i as RowId, row)),
        )
    }
}

/// Rows of `left` whose id does not appear in `right`. Meaningful only
/// when `right` is a view over the same base as `left`.
pub(crate) struct ExceptByIdTable {
    left: SharedTable,
    right: SharedTable,
}

impl ExceptByIdTable {
    pub(crate) fn new(left: SharedTable, right: SharedTable) -> Self {
        Self { left, right }
    }
}

impl Table for ExceptByIdTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.left.columns()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        let excluded: HashSet<RowId> = self.right.scan().map(|(id, _)| id).collect();
        Box::new(
            self.left
                .scan()
                .filter(move |(id, _)| !excluded.contains(id)),
        )
    }

    fn scope_name(&self) -> Option<&str> {
        self.left.scope_name()
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        self.left.as_memory()
    }
}

/// An already-materialised row set, produced by fallback row-by-row
/// evaluation, index probes, and correlated-subquery planning.
pub(crate) struct SnapshotTable {
    columns: IndexMap<String, ColumnInfo>,
    scope: Option<String>,
    rows: Vec<(RowId, Row)>,
}

impl SnapshotTable {
    /// Rows carved out of `source`, keeping its shape and scope.
    pub(crate) fn carved(source: &SharedTable, rows: Vec<(RowId, Row)>) -> Self {
        Self {
            columns: source.columns(),
            scope: source.scope_name().map(str::to_string),
            rows,
        }
    }
}

impl Table for SnapshotTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.columns.clone()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.rows.iter().cloned())
    }

    fn scope_name(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}
