//! The SELECT evaluation pipeline.
//!
//! Evaluation order: resolve FROM (with JOINs), push the WHERE down,
//! branch into the aggregate or window path when the projection calls for
//! it, then ORDER BY (pushed to the table when every key is a plain
//! column, otherwise an in-memory sort that keeps the pre-projection rows
//! around), then OFFSET/LIMIT, then projection with optional DISTINCT.

use std::collections::HashSet;
use std::sync::Arc;

use sqlit_core::ast::{
    Expr, JoinType, OrderBy, SelectColumn, SelectStatement, TableRef,
};
use sqlit_core::Value;

use super::eval::Evaluator;
use super::{aggregate, join, plan, window, EngineInner, ResultSet};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::table::{SharedTable, SnapshotTable, SortKey, Table, TableOps};
use crate::value_ops;

impl EngineInner {
    pub(crate) fn run_select(
        &self,
        select: &SelectStatement,
        ev_parent: &Evaluator<'_>,
    ) -> Result<ResultSet> {
        // 1. Resolve FROM, applying JOINs (and, for cross joins, pushing
        //    single-sided WHERE conjuncts into the sides first).
        let (source, scope, consumed) = self.resolve_from(select, ev_parent)?;
        let ev = Evaluator::new(
            self,
            ev_parent.params,
            scope,
            ev_parent.outer.clone(),
            ev_parent.ctx,
        );

        // 2. Push the remaining WHERE into the table.
        let source = match &select.where_clause {
            Some(where_clause) => {
                let conjuncts: Vec<&Expr> = plan::split_and(where_clause)
                    .into_iter()
                    .filter(|c| !consumed.contains(&(std::ptr::from_ref(*c) as usize)))
                    .collect();
                let mut table = source;
                for conjunct in conjuncts {
                    table = plan::apply_where(table, conjunct, &ev)?;
                }
                table
            }
            None => source,
        };

        // 3. Aggregate and window paths take over from here.
        if aggregate::select_has_aggregates(select, &ev) {
            return aggregate::run(select, &source, &ev);
        }
        if window::select_has_windows(select) {
            return window::run(select, &source, &ev);
        }

        // 4. ORDER BY: push simple column sorts into the table.
        let aliases = projected_aliases(&select.columns);
        let pushable = !select.order_by.is_empty()
            && select
                .order_by
                .iter()
                .all(|ob| order_key_column(ob, &aliases).is_some());

        if pushable || select.order_by.is_empty() {
            let mut table = source;
            if pushable {
                let keys = select
                    .order_by
                    .iter()
                    .map(|ob| {
                        let mut key = SortKey::asc(
                            order_key_column(ob, &aliases).unwrap_or_default(),
                        );
                        key.descending = ob.direction == sqlit_core::ast::OrderDirection::Desc;
                        key.nulls_last =
                            ob.nulls == Some(sqlit_core::ast::NullOrdering::Last);
                        key
                    })
                    .collect();
                table = table.order(keys);
            }
            // 5. OFFSET then LIMIT delegate to the table.
            let (limit, offset) = page_bounds(select, &ev)?;
            if let Some(offset) = offset {
                table = table.offset(offset);
            }
            if let Some(limit) = limit {
                table = table.limit(limit);
            }
            // 6. Project.
            let mut rows = Vec::new();
            for (_, row) in table.scan() {
                ev.ctx.tick()?;
                rows.push(project_columns(&select.columns, &row, &ev)?);
            }
            return Ok(finish(select, rows, &ev));
        }

        // ORDER BY needs expressions or projection aliases: project first,
        // keep the original row alongside for keys the projection dropped.
        let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
        for (_, row) in source.scan() {
            ev.ctx.tick()?;
            let projected = project_columns(&select.columns, &row, &ev)?;
            let keys = order_key_values(&select.order_by, &projected, &row, &ev)?;
            keyed.push((keys, projected));
        }
        sort_keyed_rows(&mut keyed, &select.order_by);
        let (limit, offset) = page_bounds(select, &ev)?;
        let rows = page_rows(keyed.into_iter().map(|(_, row)| row), limit, offset);
        Ok(finish(select, rows, &ev))
    }

    /// Resolves the FROM clause into a table, returning the scope name
    /// (when the source is a single named table) and the set of WHERE
    /// conjuncts already consumed by cross-join push-down (keyed by node
    /// address).
    fn resolve_from(
        &self,
        select: &SelectStatement,
        ev: &Evaluator<'_>,
    ) -> Result<(SharedTable, Option<String>, HashSet<usize>)> {
        let mut consumed = HashSet::new();
        let Some(from) = &select.from else {
            // FROM-less SELECT: one empty row to project expressions from.
            let table = SnapshotTable::carved(
                &(Arc::new(crate::table::MemoryTable::new("")) as SharedTable),
                vec![(0, Row::new())],
            );
            return Ok((Arc::new(table) as SharedTable, None, consumed));
        };
        match from {
            TableRef::Table { name, alias, .. } => {
                let table = self.resolve_table(name)?;
                let scope = alias.clone().unwrap_or_else(|| name.clone());
                let table = if alias.is_some() {
                    table.with_alias(scope.clone())
                } else {
                    table
                };
                Ok((table, Some(scope), consumed))
            }
            TableRef::Subquery { query, alias } => {
                let result = self.run_query(query, ev.params, &ev.outer, ev.ctx)?;
                let table = super::materialize(alias, &result);
                Ok((Arc::new(table) as SharedTable, Some(alias.clone()), consumed))
            }
            TableRef::Join { .. } => {
                let table = self.resolve_join_tree(from, select, ev, &mut consumed)?;
                Ok((table, None, consumed))
            }
        }
    }

    /// Builds a left-deep join tree.
    fn resolve_join_tree(
        &self,
        table_ref: &TableRef,
        select: &SelectStatement,
        ev: &Evaluator<'_>,
        consumed: &mut HashSet<usize>,
    ) -> Result<SharedTable> {
        match table_ref {
            TableRef::Table { name, alias, .. } => {
                let table = self.resolve_table(name)?;
                let scope = alias.clone().unwrap_or_else(|| name.clone());
                Ok(table.with_alias(scope))
            }
            TableRef::Subquery { query, alias } => {
                let result = self.run_query(query, ev.params, &ev.outer, ev.ctx)?;
                Ok(Arc::new(super::materialize(alias, &result)) as SharedTable)
            }
            TableRef::Join { left, join } => {
                let mut left_table = self.resolve_join_tree(left, select, ev, consumed)?;
                let mut right_table =
                    self.resolve_join_tree(&join.table, select, ev, consumed)?;
                let left_qualified = matches!(&**left, TableRef::Join { .. });
                let left_scope = scope_of(left).unwrap_or_default();
                let right_scope = scope_of(&join.table).unwrap_or_default();

                let mut left_scopes = HashSet::new();
                collect_scope_names(left, &mut left_scopes);

                // Comma-style cross join: push single-sided WHERE
                // conjuncts into the sides before the product is built.
                if join.join_type == JoinType::Cross && join.on.is_none() {
                    if let Some(where_clause) = &select.where_clause {
                        for conjunct in plan::split_and(where_clause) {
                            let quals = plan::expr_qualifiers(conjunct);
                            if quals.len() != 1 {
                                continue;
                            }
                            let qual = quals.iter().next().cloned().unwrap_or_default();
                            let side = if qual.eq_ignore_ascii_case(&right_scope) {
                                Some(false)
                            } else if left_scopes.contains(&qual) {
                                Some(true)
                            } else {
                                None
                            };
                            let Some(is_left) = side else { continue };
                            let scoped_ev = Evaluator::new(
                                self,
                                ev.params,
                                Some(qual.clone()),
                                ev.outer.clone(),
                                ev.ctx,
                            );
                            let target = if is_left {
                                &mut left_table
                            } else {
                                &mut right_table
                            };
                            let pushed = plan::apply_where(
                                Arc::clone(target),
                                conjunct,
                                &scoped_ev,
                            )?;
                            *target = pushed;
                            consumed.insert(std::ptr::from_ref(conjunct) as usize);
                        }
                    }
                }

                let conds = if let Some(on) = &join.on {
                    join::lower_on_condition(
                        on,
                        &left_scopes,
                        &left_table.columns(),
                        &right_scope,
                        &right_table.columns(),
                    )?
                } else if !join.using.is_empty() {
                    join::lower_using(&join.using, &left_scope)
                } else if join.join_type == JoinType::Cross {
                    Vec::new()
                } else {
                    return Err(Error::unsupported(
                        "JOIN without an ON or USING condition",
                    ));
                };

                Ok(Arc::new(join::JoinTable::new(
                    join.join_type,
                    left_table,
                    right_table,
                    conds,
                    left_qualified,
                    left_scope,
                    right_scope,
                )) as SharedTable)
            }
        }
    }
}

fn scope_of(table_ref: &TableRef) -> Option<String> {
    match table_ref {
        TableRef::Table { name, alias, .. } => {
            Some(alias.clone().unwrap_or_else(|| name.clone()))
        }
        TableRef::Subquery { alias, .. } => Some(alias.clone()),
        TableRef::Join { left, .. } => scope_of(left),
    }
}

fn collect_scope_names(table_ref: &TableRef, out: &mut HashSet<String>) {
    match table_ref {
        TableRef::Table { name, alias, .. } => {
            out.insert(name.to_lowercase());
            if let Some(alias) = alias {
                out.insert(alias.to_lowercase());
            }
        }
        TableRef::Subquery { alias, .. } => {
            out.insert(alias.to_lowercase());
        }
        TableRef::Join { left, join } => {
            collect_scope_names(left, out);
            collect_scope_names(&join.table, out);
        }
    }
}

/// Output aliases declared by the projection.
fn projected_aliases(columns: &[SelectColumn]) -> HashSet<String> {
    columns
        .iter()
        .filter_map(|col| col.alias.clone())
        .collect()
}

/// The table sort column for an ORDER BY item, when it is a plain column
/// reference that the projection does not alias.
fn order_key_column(ob: &OrderBy, aliases: &HashSet<String>) -> Option<String> {
    match &ob.expr {
        Expr::Column { table, name, .. } => {
            if aliases.contains(name) {
                return None;
            }
            Some(match table {
                Some(table) => format!("{table}.{name}"),
                None => name.clone(),
            })
        }
        _ => None,
    }
}

/// Evaluates the ORDER BY key values for one row. A numeric item indexes
/// into the projection; an alias reads the projected cell; anything else
/// evaluates against the original row.
pub(crate) fn order_key_values(
    order_by: &[OrderBy],
    projected: &Row,
    original: &Row,
    ev: &Evaluator<'_>,
) -> Result<Vec<Value>> {
    order_by
        .iter()
        .map(|ob| {
            if let Expr::Literal(sqlit_core::ast::Literal::Integer(n)) = &ob.expr {
                let index = usize::try_from(*n).unwrap_or(0);
                return Ok(projected
                    .get_index(index.saturating_sub(1))
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null));
            }
            if let Expr::Column { table: None, name, .. } = &ob.expr {
                if let Some(value) = projected.get(name) {
                    return Ok(value.clone());
                }
            }
            ev.eval(&ob.expr, original)
        })
        .collect()
}

/// Sorts `(keys, row)` pairs by the ORDER BY directions.
pub(crate) fn sort_keyed_rows(keyed: &mut [(Vec<Value>, Row)], order_by: &[OrderBy]) {
    keyed.sort_by(|(a, _), (b, _)| {
        for (i, ob) in order_by.iter().enumerate() {
            let left = a.get(i).unwrap_or(&Value::Null);
            let right = b.get(i).unwrap_or(&Value::Null);
            let nulls_last = ob.nulls == Some(sqlit_core::ast::NullOrdering::Last);
            let mut ordering = value_ops::sort_cmp(left, right, nulls_last);
            if ob.direction == sqlit_core::ast::OrderDirection::Desc {
                ordering = ordering.reverse();
            }
            if !ordering.is_eq() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Evaluates LIMIT and OFFSET into concrete bounds.
pub(crate) fn page_bounds(
    select: &SelectStatement,
    ev: &Evaluator<'_>,
) -> Result<(Option<usize>, Option<usize>)> {
    let bound = |expr: &Option<Expr>| -> Result<Option<usize>> {
        match expr {
            None => Ok(None),
            Some(expr) => {
                let value = ev.eval(expr, &Row::new())?;
                let n = value_ops::as_i64(&value).ok_or_else(|| {
                    Error::TypeMismatch(format!(
                        "LIMIT/OFFSET must be an integer, got {}",
                        value.to_sql_inline()
                    ))
                })?;
                Ok(Some(usize::try_from(n.max(0)).unwrap_or(0)))
            }
        }
    };
    Ok((bound(&select.limit)?, bound(&select.offset)?))
}

/// Applies offset then limit to an already-ordered row stream.
pub(crate) fn page_rows(
    rows: impl Iterator<Item = Row>,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Vec<Row> {
    let skipped = rows.skip(offset.unwrap_or(0));
    match limit {
        Some(limit) => skipped.take(limit).collect(),
        None => skipped.collect(),
    }
}

/// Projects one source row through the SELECT column list.
pub(crate) fn project_columns(
    columns: &[SelectColumn],
    row: &Row,
    ev: &Evaluator<'_>,
) -> Result<Row> {
    let mut out = Row::new();
    for col in columns {
        match &col.expr {
            Expr::Wildcard { table: None } => {
                for (name, value) in row.iter() {
                    out.set(output_name_for_cell(name, row), value.clone());
                }
            }
            Expr::Wildcard { table: Some(scope) } => {
                let prefix = format!("{scope}.");
                let mut copied = false;
                for (name, value) in row.iter() {
                    if let Some(bare) = name.strip_prefix(&prefix) {
                        out.set(bare.to_string(), value.clone());
                        copied = true;
                    }
                }
                if !copied {
                    // Unqualified source rows: `t.*` over the sole scope.
                    let matches_scope = ev
                        .scope
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(scope));
                    if matches_scope {
                        for (name, value) in row.iter() {
                            out.set(name.to_string(), value.clone());
                        }
                    } else {
                        return Err(Error::MissingTable(scope.clone()));
                    }
                }
            }
            expr => {
                let value = ev.eval(expr, row)?;
                out.set(output_column_name(col), value);
            }
        }
    }
    Ok(out)
}

/// The result-set name for a projected expression.
pub(crate) fn output_column_name(col: &SelectColumn) -> String {
    if let Some(alias) = &col.alias {
        return alias.clone();
    }
    match &col.expr {
        Expr::Column { name, .. } => name.clone(),
        expr => expr.to_string(),
    }
}

/// `SELECT *` output names: qualified cells shed their qualifier when the
/// bare name is unambiguous within the row.
fn output_name_for_cell(name: &str, row: &Row) -> String {
    let Some(bare) = name.rsplit('.').next() else {
        return name.to_string();
    };
    if bare == name {
        return name.to_string();
    }
    let suffix = format!(".{bare}");
    let duplicates = row
        .columns()
        .filter(|other| other.ends_with(&suffix) || *other == bare)
        .count();
    if duplicates > 1 {
        name.to_string()
    } else {
        bare.to_string()
    }
}

/// DISTINCT and result assembly.
fn finish(select: &SelectStatement, rows: Vec<Row>, _ev: &Evaluator<'_>) -> ResultSet {
    let rows = if select.distinct {
        let mut seen = HashSet::new();
        rows.into_iter()
            .filter(|row| seen.insert(row.content_key()))
            .collect()
    } else {
        rows
    };
    let columns = rows.first().map_or_else(
        || {
            select
                .columns
                .iter()
                .filter(|col| !matches!(col.expr, Expr::Wildcard { .. }))
                .map(output_column_name)
                .collect()
        },
        |row| row.columns().map(str::to_string).collect(),
    );
    ResultSet { columns, rows }
}

/// Shared tail for the aggregate path: order the produced rows by
/// precomputed keys, then page. Distinct-ness follows the SELECT flag.
pub(crate) fn finish_keyed(
    select: &SelectStatement,
    mut keyed: Vec<(Vec<Value>, Row)>,
    ev: &Evaluator<'_>,
) -> Result<ResultSet> {
    sort_keyed_rows(&mut keyed, &select.order_by);
    let (limit, offset) = page_bounds(select, ev)?;
    let rows = page_rows(keyed.into_iter().map(|(_, row)| row), limit, offset);
    Ok(finish(select, rows, ev))
}
