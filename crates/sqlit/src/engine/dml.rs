//! INSERT, UPDATE, DELETE and the DDL subset.

use std::sync::Arc;

use sqlit_core::ast::{
    ConflictAction, DataType, DeleteStatement, DropTableStatement, Expr, InsertSource,
    InsertStatement, TypeFamily, UpdateStatement,
};
use sqlit_core::Value;
use tracing::debug;

use super::eval::Evaluator;
use super::{plan, EngineInner, ExecCtx, OuterScopes};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::row::Row;
use crate::table::{
    ColumnInfo, ColumnType, IndexHint, MemoryTable, SharedTable, Table, TableOps,
};

impl EngineInner {
    pub(crate) fn run_insert(
        &self,
        insert: &InsertStatement,
        params: &Params,
        ctx: &ExecCtx,
    ) -> Result<u64> {
        let table = self.resolve_table(&insert.table)?;
        let Some(target) = table.as_memory() else {
            return Err(Error::unsupported(format!(
                "{} is not a writable table",
                insert.table
            )));
        };
        let declared = target.columns();
        let columns: Vec<String> = if insert.columns.is_empty() {
            declared.keys().cloned().collect()
        } else {
            insert.columns.clone()
        };
        let ev = Evaluator::new(self, params, None, OuterScopes::default(), ctx);
        let do_nothing = matches!(
            insert.on_conflict.as_ref().map(|oc| &oc.action),
            Some(ConflictAction::DoNothing)
        );
        if matches!(
            insert.on_conflict.as_ref().map(|oc| &oc.action),
            Some(ConflictAction::DoUpdate(_))
        ) {
            return Err(Error::unsupported(
                "ON CONFLICT DO UPDATE on the virtual backend",
            ));
        }

        let mut value_rows: Vec<Row> = Vec::new();
        match &insert.values {
            InsertSource::Values(rows) => {
                for exprs in rows {
                    if exprs.len() != columns.len() {
                        return Err(Error::TypeMismatch(format!(
                            "INSERT INTO {} expects {} values, got {}",
                            insert.table,
                            columns.len(),
                            exprs.len()
                        )));
                    }
                    let mut row = Row::new();
                    for (column, expr) in columns.iter().zip(exprs) {
                        row.set(column.clone(), ev.eval(expr, &Row::new())?);
                    }
                    value_rows.push(row);
                }
            }
            InsertSource::Query(query) => {
                let result = self.run_query(query, params, &OuterScopes::default(), ctx)?;
                for source_row in result.rows {
                    let values: Vec<Value> = source_row.into_values();
                    if values.len() != columns.len() {
                        return Err(Error::TypeMismatch(format!(
                            "INSERT INTO {} expects {} values, got {}",
                            insert.table,
                            columns.len(),
                            values.len()
                        )));
                    }
                    let mut row = Row::new();
                    for (column, value) in columns.iter().zip(values) {
                        row.set(column.clone(), value);
                    }
                    value_rows.push(row);
                }
            }
            InsertSource::DefaultValues => value_rows.push(Row::new()),
        }

        let mut affected = 0;
        for row in value_rows {
            ctx.tick()?;
            match target.insert(row) {
                Ok(id) => {
                    self.set_last_insert_id(id);
                    affected += 1;
                }
                Err(Error::ConstraintViolation(_)) if do_nothing => {}
                Err(err) => return Err(err),
            }
        }
        Ok(affected)
    }

    pub(crate) fn run_update(
        &self,
        update: &UpdateStatement,
        params: &Params,
        ctx: &ExecCtx,
    ) -> Result<u64> {
        let table = self.resolve_table(&update.table)?;
        let Some(target) = table.as_memory() else {
            return Err(Error::unsupported(format!(
                "{} is not a writable table",
                update.table
            )));
        };
        let scope = update
            .alias
            .clone()
            .unwrap_or_else(|| update.table.clone());
        let ev = Evaluator::new(self, params, Some(scope.clone()), OuterScopes::default(), ctx);

        let mut view: SharedTable = Arc::clone(&table);
        if update.alias.is_some() {
            view = view.with_alias(scope);
        }
        if let Some(where_clause) = &update.where_clause {
            view = plan::apply_where(view, where_clause, &ev)?;
        }

        // Constant SET expressions collapse into one changes map; anything
        // referencing the row is evaluated per matched row.
        let constant = update
            .assignments
            .iter()
            .all(|assign| is_row_free(&assign.value));
        if constant {
            let mut changes = Row::new();
            for assign in &update.assignments {
                changes.set(assign.column.clone(), ev.eval(&assign.value, &Row::new())?);
            }
            let touched = target.update(view.as_ref(), &changes)?;
            debug!(table = %update.table, touched, "update");
            return Ok(touched as u64);
        }

        let matched: Vec<(i64, Row)> = view.scan().collect();
        let mut touched = 0;
        for (id, row) in matched {
            ctx.tick()?;
            let mut changes = Row::new();
            for assign in &update.assignments {
                changes.set(assign.column.clone(), ev.eval(&assign.value, &row)?);
            }
            touched += target.update_rows(&[id], &changes)?;
        }
        debug!(table = %update.table, touched, "update");
        Ok(touched as u64)
    }

    pub(crate) fn run_delete(
        &self,
        delete: &DeleteStatement,
        params: &Params,
        ctx: &ExecCtx,
    ) -> Result<u64> {
        let table = self.resolve_table(&delete.table)?;
        let Some(target) = table.as_memory() else {
            return Err(Error::unsupported(format!(
                "{} is not a writable table",
                delete.table
            )));
        };
        let scope = delete
            .alias
            .clone()
            .unwrap_or_else(|| delete.table.clone());
        let ev = Evaluator::new(self, params, Some(scope.clone()), OuterScopes::default(), ctx);

        let mut view: SharedTable = Arc::clone(&table);
        if delete.alias.is_some() {
            view = view.with_alias(scope);
        }
        if let Some(where_clause) = &delete.where_clause {
            view = plan::apply_where(view, where_clause, &ev)?;
        }
        let removed = target.delete(view.as_ref());
        debug!(table = %delete.table, removed, "delete");
        Ok(removed as u64)
    }

    pub(crate) fn run_create_table(
        &self,
        create: &sqlit_core::ast::CreateTableStatement,
    ) -> Result<u64> {
        if self.table_exists(&create.name) {
            if create.if_not_exists {
                return Ok(0);
            }
            return Err(Error::ConstraintViolation(format!(
                "table {} already exists",
                create.name
            )));
        }
        let mut table = MemoryTable::new(create.name.clone());
        for col in &create.columns {
            let mut info = ColumnInfo::new(map_column_type(&col.data_type));
            if col.primary_key {
                info = info.with_index(IndexHint::Primary);
            } else if col.unique {
                info = info.with_index(IndexHint::Unique);
            }
            table = table.with_column(col.name.clone(), info);
        }
        debug!(table = %create.name, "create table");
        self.register(create.name.clone(), Arc::new(table));
        Ok(0)
    }

    pub(crate) fn run_drop_table(&self, drop: &DropTableStatement) -> Result<u64> {
        let removed = self.unregister(&drop.name);
        if !removed && !drop.if_exists {
            return Err(Error::MissingTable(drop.name.clone()));
        }
        debug!(table = %drop.name, removed, "drop table");
        Ok(0)
    }

    /// CREATE INDEX is accepted and ignored: registered tables index
    /// through their declared column hints.
    pub(crate) fn run_create_index(
        &self,
        create: &sqlit_core::ast::CreateIndexStatement,
    ) -> Result<u64> {
        if !self.table_exists(&create.table) {
            return Err(Error::MissingTable(create.table.clone()));
        }
        Ok(0)
    }
}

/// `true` when the expression references no columns (it may reference
/// parameters and uncorrelated subqueries).
fn is_row_free(expr: &Expr) -> bool {
    let mut row_free = true;
    sqlit_core::ast::visit::visit_expr(expr, &mut |e| {
        if matches!(e, Expr::Column { .. }) {
            row_free = false;
        }
    });
    row_free
}

/// Declared types collapse onto the table column vocabulary by family;
/// booleans are stored as integers.
fn map_column_type(data_type: &DataType) -> ColumnType {
    match data_type.family {
        TypeFamily::Int | TypeFamily::Bool => ColumnType::Int,
        TypeFamily::Float => ColumnType::Float,
        TypeFamily::Decimal => ColumnType::Decimal {
            scale: data_type.scale,
        },
        TypeFamily::Text => ColumnType::Text,
        TypeFamily::Binary => ColumnType::Binary,
        TypeFamily::Date => ColumnType::Date,
        TypeFamily::Time => ColumnType::Time,
        TypeFamily::DateTime => ColumnType::DateTime,
    }
}
