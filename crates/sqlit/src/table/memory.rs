//! The registered, mutable in-memory table.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use sqlit_core::Value;
use tracing::debug;

use super::{ColumnInfo, ColumnType, IndexHint, RowId, Table};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::value_ops::serialize_value;

/// An in-memory table with stable row ids and hash indexes on columns
/// whose [`IndexHint`] asks for one.
///
/// Mutators take `&self`; the table serialises its own internal state but
/// makes no ordering promise between concurrent readers and writers.
pub struct MemoryTable {
    name: String,
    inner: RwLock<TableData>,
}

#[derive(Default)]
struct TableData {
    columns: IndexMap<String, ColumnInfo>,
    rows: IndexMap<RowId, Row>,
    next_id: RowId,
    /// column → serialized value → row ids. Unique columns keep the vec at
    /// length one.
    indexes: HashMap<String, HashMap<String, Vec<RowId>>>,
}

impl MemoryTable {
    /// An empty table with no columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(TableData {
                next_id: 1,
                ..TableData::default()
            }),
        }
    }

    /// Builder-style column declaration.
    #[must_use]
    pub fn with_column(self, name: impl Into<String>, info: ColumnInfo) -> Self {
        {
            let mut data = self.write();
            let name = name.into();
            if info.index.is_indexed() {
                data.indexes.insert(name.clone(), HashMap::new());
            }
            data.columns.insert(name, info);
        }
        self
    }

    /// The table's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().rows.len()
    }

    /// `true` when the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().rows.is_empty()
    }

    /// The primary-key column, if one is declared.
    #[must_use]
    pub fn primary_key(&self) -> Option<String> {
        self.read()
            .columns
            .iter()
            .find(|(_, info)| info.index == IndexHint::Primary)
            .map(|(name, _)| name.clone())
    }

    /// Inserts a row, returning its id.
    ///
    /// Cells are reordered to the declared column order; missing columns
    /// become NULL. An auto-assigned integer fills a missing primary key.
    ///
    /// # Errors
    ///
    /// [`Error::MissingColumn`] for a cell that names no declared column,
    /// [`Error::TypeMismatch`] when a value does not fit its column type,
    /// [`Error::ConstraintViolation`] on a unique-index duplicate.
    pub fn insert(&self, row: Row) -> Result<RowId> {
        let mut data = self.write();
        let id = data.next_id;

        for name in row.columns() {
            if !data.columns.contains_key(name) {
                return Err(Error::MissingColumn(format!("{}.{name}", self.name)));
            }
        }

        let mut stored = Row::new();
        for (name, info) in data.columns.clone() {
            let mut value = row.get(&name).cloned().unwrap_or(Value::Null);
            if value.is_null() && info.index == IndexHint::Primary {
                value = Value::Int(id);
            }
            check_type(&self.name, &name, info.column_type, &value)?;
            stored.set(name, value);
        }

        // Check unique constraints before touching any index.
        for (column, info) in data.columns.clone() {
            if info.index.is_unique() {
                let key = serialize_value(stored.get(&column).unwrap_or(&Value::Null));
                if let Some(index) = data.indexes.get(&column) {
                    if index.get(&key).is_some_and(|ids| !ids.is_empty()) {
                        return Err(Error::ConstraintViolation(format!(
                            "duplicate value for unique column {}.{column}",
                            self.name
                        )));
                    }
                }
            }
        }

        for (column, key) in index_entries(&data.columns, &stored) {
            data.indexes
                .entry(column)
                .or_default()
                .entry(key)
                .or_default()
                .push(id);
        }
        data.rows.insert(id, stored);
        data.next_id += 1;
        debug!(table = %self.name, id, "insert");
        Ok(id)
    }

    /// Applies `changes` to the identified rows, returning how many rows
    /// were touched.
    ///
    /// # Errors
    ///
    /// Same constraint and type errors as [`MemoryTable::insert`].
    pub fn update_rows(&self, ids: &[RowId], changes: &Row) -> Result<usize> {
        let mut data = self.write();
        for name in changes.columns() {
            let Some(info) = data.columns.get(name) else {
                return Err(Error::MissingColumn(format!("{}.{name}", self.name)));
            };
            if let Some(value) = changes.get(name) {
                check_type(&self.name, name, info.column_type, value)?;
            }
        }

        let mut touched = 0;
        for &id in ids {
            let Some(current) = data.rows.get(&id).cloned() else {
                continue;
            };
            let mut updated = current.clone();
            for (name, value) in changes.iter() {
                updated.set(name.to_string(), value.clone());
            }

            // Re-check uniqueness against every *other* row.
            for (column, info) in data.columns.clone() {
                if info.index.is_unique() && changes.get(&column).is_some() {
                    let key = serialize_value(updated.get(&column).unwrap_or(&Value::Null));
                    if let Some(owners) = data.indexes.get(&column).and_then(|i| i.get(&key)) {
                        if owners.iter().any(|&owner| owner != id) {
                            return Err(Error::ConstraintViolation(format!(
                                "duplicate value for unique column {}.{column}",
                                self.name
                            )));
                        }
                    }
                }
            }

            remove_index_entries(&mut data, &current, id);
            for (column, key) in index_entries(&data.columns, &updated) {
                data.indexes
                    .entry(column)
                    .or_default()
                    .entry(key)
                    .or_default()
                    .push(id);
            }
            data.rows.insert(id, updated);
            touched += 1;
        }
        debug!(table = %self.name, touched, "update");
        Ok(touched)
    }

    /// Inserts a pre-shaped row without type or constraint checks. Used
    /// for materialised intermediate results (subqueries, CTE working
    /// sets), which have no indexes and already carry every column.
    pub(crate) fn insert_unchecked(&self, row: Row) -> RowId {
        let mut data = self.write();
        let id = data.next_id;
        data.rows.insert(id, row);
        data.next_id += 1;
        id
    }

    /// Removes the identified rows, returning how many existed.
    pub fn delete_rows(&self, ids: &[RowId]) -> usize {
        let mut data = self.write();
        let mut removed = 0;
        for &id in ids {
            if let Some(row) = data.rows.shift_remove(&id) {
                remove_index_entries(&mut data, &row, id);
                removed += 1;
            }
        }
        debug!(table = %self.name, removed, "delete");
        removed
    }

    /// Updates every row produced by `view` (a filtered view of this
    /// table), applying `changes`.
    ///
    /// # Errors
    ///
    /// Same errors as [`MemoryTable::update_rows`].
    pub fn update(&self, view: &dyn Table, changes: &Row) -> Result<usize> {
        let ids: Vec<RowId> = view.scan().map(|(id, _)| id).collect();
        self.update_rows(&ids, changes)
    }

    /// Deletes every row produced by `view` (a filtered view of this
    /// table).
    pub fn delete(&self, view: &dyn Table) -> usize {
        let ids: Vec<RowId> = view.scan().map(|(id, _)| id).collect();
        self.delete_rows(&ids)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, TableData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, TableData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Table for MemoryTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        self.read().columns.clone()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        // Snapshot under the lock; iteration is lock-free afterwards.
        let rows: Vec<(RowId, Row)> = self
            .read()
            .rows
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect();
        Box::new(rows.into_iter())
    }

    fn probe_eq(&self, column: &str, value: &Value) -> Option<Vec<(RowId, Row)>> {
        let data = self.read();
        let index = data.indexes.get(column)?;
        let ids = index.get(&serialize_value(value)).cloned().unwrap_or_default();
        Some(
            ids.iter()
                .filter_map(|id| data.rows.get(id).map(|row| (*id, row.clone())))
                .collect(),
        )
    }

    fn scope_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn as_memory(&self) -> Option<&MemoryTable> {
        Some(self)
    }
}

fn index_entries(
    columns: &IndexMap<String, ColumnInfo>,
    row: &Row,
) -> Vec<(String, String)> {
    columns
        .iter()
        .filter(|(_, info)| info.index.is_indexed())
        .map(|(name, _)| {
            (
                name.clone(),
                serialize_value(row.get(name).unwrap_or(&Value::Null)),
            )
        })
        .collect()
}

fn remove_index_entries(data: &mut TableData, row: &Row, id: RowId) {
    let columns: Vec<String> = data.indexes.keys().cloned().collect();
    for column in columns {
        let key = serialize_value(row.get(&column).unwrap_or(&Value::Null));
        if let Some(index) = data.indexes.get_mut(&column) {
            if let Some(ids) = index.get_mut(&key) {
                ids.retain(|&existing| existing != id);
            }
        }
    }
}

fn check_type(table: &str, column: &str, column_type: ColumnType, value: &Value) -> Result<()> {
    let ok = match (column_type, value) {
        (_, Value::Null) => true,
        (ColumnType::Int, Value::Int(_) | Value::Bool(_)) => true,
        (ColumnType::Float, Value::Float(_) | Value::Int(_)) => true,
        (ColumnType::Decimal { .. }, Value::Decimal(_) | Value::Int(_) | Value::Float(_)) => true,
        (ColumnType::Text, Value::Text(_)) => true,
        (ColumnType::Binary, Value::Blob(_)) => true,
        (ColumnType::Date, Value::Date(_) | Value::Text(_) | Value::Int(_)) => true,
        (ColumnType::Time, Value::Time(_) | Value::Text(_)) => true,
        (
            ColumnType::DateTime,
            Value::DateTime(_) | Value::Date(_) | Value::Text(_) | Value::Int(_) | Value::Float(_),
        ) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::TypeMismatch(format!(
            "{} does not fit {table}.{column}",
            value.to_sql_inline()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::table::TableOps;
    use std::sync::Arc;

    fn users() -> MemoryTable {
        MemoryTable::new("users")
            .with_column(
                "id",
                ColumnInfo::new(ColumnType::Int).with_index(IndexHint::Primary),
            )
            .with_column("email", ColumnInfo::new(ColumnType::Text).with_index(IndexHint::Unique))
            .with_column("age", ColumnInfo::new(ColumnType::Int))
    }

    #[test]
    fn insert_assigns_stable_ids_and_fills_missing_cells() {
        let table = users();
        let id = table.insert(row!("email" => "a@x", "age" => 30)).unwrap();
        assert_eq!(id, 1);
        let (_, row) = table.scan().next().unwrap();
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "email", "age"]);
    }

    #[test]
    fn unique_violation_is_a_constraint_error() {
        let table = users();
        table.insert(row!("email" => "a@x")).unwrap();
        let err = table.insert(row!("email" => "a@x")).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let table = users();
        let err = table.insert(row!("nope" => 1)).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let table = users();
        let err = table.insert(row!("age" => "forty")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn probe_eq_uses_the_index() {
        let table = users();
        for i in 0..10 {
            table.insert(row!("email" => format!("u{i}@x"))).unwrap();
        }
        let hits = table.probe_eq("email", &Value::Text("u3@x".into())).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(table.probe_eq("age", &Value::Int(1)).is_none());
    }

    #[test]
    fn update_through_a_view() {
        let table = Arc::new(users());
        table.insert(row!("email" => "a@x", "age" => 30)).unwrap();
        table.insert(row!("email" => "b@x", "age" => 50)).unwrap();

        let shared: crate::table::SharedTable = Arc::clone(&table) as _;
        let view = shared.gt("age", Value::Int(40));
        let touched = table.update(view.as_ref(), &row!("age" => 51)).unwrap();
        assert_eq!(touched, 1);
        let ages: Vec<_> = table.scan().map(|(_, r)| r.get("age").cloned()).collect();
        assert_eq!(ages, vec![Some(Value::Int(30)), Some(Value::Int(51))]);
    }

    #[test]
    fn delete_through_a_view_and_index_consistency() {
        let table = Arc::new(users());
        table.insert(row!("email" => "a@x")).unwrap();
        table.insert(row!("email" => "b@x")).unwrap();

        let shared: crate::table::SharedTable = Arc::clone(&table) as _;
        let removed = table.delete(shared.eq("email", Value::Text("a@x".into())).as_ref());
        assert_eq!(removed, 1);
        // The index entry is gone: reinserting the same email succeeds.
        table.insert(row!("email" => "a@x")).unwrap();
    }
}
