//! JOIN evaluation.
//!
//! Each join becomes a wrapper table over its two sides. The ON condition
//! is lowered to column-to-column comparisons; equalities act as bind
//! predicates — for every left row the right side is filtered with the
//! left value through its own push-down (which probes an index when the
//! right column has one). INNER/LEFT/RIGHT/FULL/CROSS differ only in row
//! emission.
//!
//! Merged rows carry qualified cell names (`scope.column`) so that both
//! sides stay addressable downstream.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use sqlit_core::ast::{BinaryOp, Expr, JoinType};
use sqlit_core::Value;

use super::plan;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::table::{CmpOp, ColumnInfo, RowId, SharedTable, Table, TableOps};
use crate::value_ops;

/// One lowered ON comparison: `left.column op right.column`.
#[derive(Debug, Clone)]
pub(crate) struct JoinCond {
    /// Qualified key into merged/qualified left rows.
    pub(crate) left_col: String,
    pub(crate) op: CmpOp,
    /// Bare key into the right table.
    pub(crate) right_col: String,
}

/// A join of two sides under the usual SQL flavours.
pub(crate) struct JoinTable {
    kind: JoinType,
    left: SharedTable,
    right: SharedTable,
    conds: Vec<JoinCond>,
    /// Left rows already carry qualified cells (nested join).
    left_qualified: bool,
    left_scope: String,
    right_scope: String,
}

impl JoinTable {
    pub(crate) fn new(
        kind: JoinType,
        left: SharedTable,
        right: SharedTable,
        conds: Vec<JoinCond>,
        left_qualified: bool,
        left_scope: String,
        right_scope: String,
    ) -> Self {
        Self {
            kind,
            left,
            right,
            conds,
            left_qualified,
            left_scope,
            right_scope,
        }
    }

    fn qualified_left(&self, row: Row) -> Row {
        if self.left_qualified {
            row
        } else {
            qualify_row(row, &self.left_scope)
        }
    }

    /// Right-side rows matching one left row: equalities become filters on
    /// the right table (served by an index when one exists), the rest is
    /// checked per candidate.
    fn right_matches(&self, left_row: &Row) -> Vec<(RowId, Row)> {
        let mut probe = Arc::clone(&self.right);
        let mut rest = Vec::new();
        for cond in &self.conds {
            let value = crate::table::lookup_cell(left_row, &cond.left_col)
                .cloned()
                .unwrap_or(Value::Null);
            if cond.op == CmpOp::Eq {
                if value.is_null() {
                    return Vec::new();
                }
                probe = probe.eq(&cond.right_col, value);
            } else {
                rest.push((cond, value));
            }
        }
        probe
            .scan()
            .filter(|(_, right_row)| {
                rest.iter().all(|(cond, left_value)| {
                    let right_value = right_row.get(&cond.right_col).unwrap_or(&Value::Null);
                    match value_ops::value_cmp(left_value, right_value) {
                        None => false,
                        Some(ordering) => match cond.op {
                            CmpOp::Eq => ordering.is_eq(),
                            CmpOp::NotEq => ordering.is_ne(),
                            CmpOp::Lt => ordering.is_lt(),
                            CmpOp::Lte => ordering.is_le(),
                            CmpOp::Gt => ordering.is_gt(),
                            CmpOp::Gte => ordering.is_ge(),
                            CmpOp::Like => false,
                        },
                    }
                })
            })
            .collect()
    }

    fn null_right(&self) -> Row {
        self.right
            .columns()
            .keys()
            .map(|name| (format!("{}.{name}", self.right_scope), Value::Null))
            .collect()
    }

    fn null_left(&self) -> Row {
        self.left
            .columns()
            .keys()
            .map(|name| {
                let key = if name.contains('.') {
                    name.clone()
                } else {
                    format!("{}.{name}", self.left_scope)
                };
                (key, Value::Null)
            })
            .collect()
    }

    fn merge(&self, left: &Row, right: &Row) -> Row {
        let mut merged = left.clone();
        for (name, value) in right.iter() {
            merged.set(name.to_string(), value.clone());
        }
        merged
    }
}

impl Table for JoinTable {
    fn columns(&self) -> IndexMap<String, ColumnInfo> {
        let mut out = IndexMap::new();
        for (name, info) in self.left.columns() {
            let key = if self.left_qualified || name.contains('.') {
                name
            } else {
                format!("{}.{name}", self.left_scope)
            };
            out.insert(key, info);
        }
        for (name, info) in self.right.columns() {
            out.insert(format!("{}.{name}", self.right_scope), info);
        }
        out
    }

    #[allow(clippy::too_many_lines)]
    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        let mut rows: Vec<Row> = Vec::new();
        match self.kind {
            JoinType::Cross => {
                let right_rows: Vec<Row> = self
                    .right
                    .scan()
                    .map(|(_, row)| qualify_row(row, &self.right_scope))
                    .collect();
                for (_, left_row) in self.left.scan() {
                    let left_row = self.qualified_left(left_row);
                    for right_row in &right_rows {
                        rows.push(self.merge(&left_row, right_row));
                    }
                }
            }
            JoinType::Inner | JoinType::Left => {
                for (_, left_row) in self.left.scan() {
                    let left_row = self.qualified_left(left_row);
                    let matches = self.right_matches(&left_row);
                    if matches.is_empty() {
                        if self.kind == JoinType::Left {
                            rows.push(self.merge(&left_row, &self.null_right()));
                        }
                        continue;
                    }
                    for (_, right_row) in matches {
                        let right_row = qualify_row(right_row, &self.right_scope);
                        rows.push(self.merge(&left_row, &right_row));
                    }
                }
            }
            JoinType::Right => {
                // Symmetric to LEFT, keeping left-then-right cell order.
                let left_rows: Vec<Row> = self
                    .left
                    .scan()
                    .map(|(_, row)| self.qualified_left(row))
                    .collect();
                for (_, right_row) in self.right.scan() {
                    let right_row = qualify_row(right_row, &self.right_scope);
                    let mut matched = false;
                    for left_row in &left_rows {
                        if self.pair_matches(left_row, &right_row) {
                            matched = true;
                            rows.push(self.merge(left_row, &right_row));
                        }
                    }
                    if !matched {
                        rows.push(self.merge(&self.null_left(), &right_row));
                    }
                }
            }
            JoinType::Full => {
                let mut matched_right: HashSet<RowId> = HashSet::new();
                for (_, left_row) in self.left.scan() {
                    let left_row = self.qualified_left(left_row);
                    let matches = self.right_matches(&left_row);
                    if matches.is_empty() {
                        rows.push(self.merge(&left_row, &self.null_right()));
                        continue;
                    }
                    for (right_id, right_row) in matches {
                        matched_right.insert(right_id);
                        let right_row = qualify_row(right_row, &self.right_scope);
                        rows.push(self.merge(&left_row, &right_row));
                    }
                }
                for (right_id, right_row) in self.right.scan() {
                    if !matched_right.contains(&right_id) {
                        let right_row = qualify_row(right_row, &self.right_scope);
                        rows.push(self.merge(&self.null_left(), &right_row));
                    }
                }
            }
        }
        Box::new(
            rows.into_iter()
                .enumerate()
                .map(|(i, row)| (i as RowId, row)),
        )
    }
}

impl JoinTable {
    fn pair_matches(&self, left_row: &Row, right_row: &Row) -> bool {
        self.conds.iter().all(|cond| {
            let left_value =
                crate::table::lookup_cell(left_row, &cond.left_col).unwrap_or(&Value::Null);
            let right_value =
                crate::table::lookup_cell(right_row, &cond.right_col).unwrap_or(&Value::Null);
            match value_ops::value_cmp(left_value, right_value) {
                None => false,
                Some(ordering) => match cond.op {
                    CmpOp::Eq => ordering.is_eq(),
                    CmpOp::NotEq => ordering.is_ne(),
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::Lte => ordering.is_le(),
                    CmpOp::Gt => ordering.is_gt(),
                    CmpOp::Gte => ordering.is_ge(),
                    CmpOp::Like => false,
                },
            }
        })
    }
}

/// Prefixes every bare cell of `row` with `scope.`.
pub(crate) fn qualify_row(row: Row, scope: &str) -> Row {
    row.into_iter()
        .map(|(name, value)| {
            let key = if name.contains('.') {
                name
            } else {
                format!("{scope}.{name}")
            };
            (key, value)
        })
        .collect()
}

/// Lowers an ON expression into [`JoinCond`]s. The ON tree must be a
/// conjunction of column-to-column comparisons.
pub(crate) fn lower_on_condition(
    on: &Expr,
    left_scopes: &HashSet<String>,
    left_columns: &IndexMap<String, ColumnInfo>,
    right_scope: &str,
    right_columns: &IndexMap<String, ColumnInfo>,
) -> Result<Vec<JoinCond>> {
    let mut conds = Vec::new();
    for conjunct in plan::split_and(on) {
        let Expr::Binary { left, op, right } = unparen(conjunct) else {
            return Err(Error::unsupported(format!(
                "JOIN condition {conjunct} must compare columns"
            )));
        };
        let cmp = match op {
            BinaryOp::Eq => CmpOp::Eq,
            BinaryOp::NotEq => CmpOp::NotEq,
            BinaryOp::Lt => CmpOp::Lt,
            BinaryOp::LtEq => CmpOp::Lte,
            BinaryOp::Gt => CmpOp::Gt,
            BinaryOp::GtEq => CmpOp::Gte,
            _ => {
                return Err(Error::unsupported(format!(
                    "JOIN condition operator {op} is not a comparison"
                )))
            }
        };
        let l = classify_side(left, left_scopes, left_columns, right_scope, right_columns)?;
        let r = classify_side(right, left_scopes, left_columns, right_scope, right_columns)?;
        let cond = match (l, r) {
            (Side::Left(left_col), Side::Right(right_col)) => JoinCond {
                left_col,
                op: cmp,
                right_col,
            },
            (Side::Right(right_col), Side::Left(left_col)) => JoinCond {
                left_col,
                op: flip(cmp),
                right_col,
            },
            _ => {
                return Err(Error::unsupported(format!(
                    "JOIN condition {conjunct} must reference both sides"
                )))
            }
        };
        conds.push(cond);
    }
    Ok(conds)
}

/// Builds equality conditions for `USING (col, …)`.
pub(crate) fn lower_using(columns: &[String], left_scope: &str) -> Vec<JoinCond> {
    columns
        .iter()
        .map(|name| JoinCond {
            left_col: format!("{left_scope}.{name}"),
            op: CmpOp::Eq,
            right_col: name.clone(),
        })
        .collect()
}

enum Side {
    Left(String),
    Right(String),
}

fn classify_side(
    expr: &Expr,
    left_scopes: &HashSet<String>,
    left_columns: &IndexMap<String, ColumnInfo>,
    right_scope: &str,
    right_columns: &IndexMap<String, ColumnInfo>,
) -> Result<Side> {
    let Expr::Column { table, name, .. } = unparen(expr) else {
        return Err(Error::unsupported(format!(
            "JOIN condition side {expr} must be a column"
        )));
    };
    if let Some(qual) = table {
        let qual = qual.to_lowercase();
        if qual == right_scope.to_lowercase() {
            return Ok(Side::Right(name.clone()));
        }
        if left_scopes.contains(&qual) {
            return Ok(Side::Left(qualified_left_key(&qual, name, left_columns)));
        }
        return Err(Error::MissingTable(qual));
    }
    // Unqualified: resolve by column membership, right side first (the
    // freshly joined table is the narrower scope).
    if right_columns.contains_key(name) {
        return Ok(Side::Right(name.clone()));
    }
    if left_columns.contains_key(name) {
        return Ok(Side::Left(name.clone()));
    }
    let suffix = format!(".{name}");
    for key in left_columns.keys() {
        if key.ends_with(&suffix) {
            return Ok(Side::Left(key.clone()));
        }
    }
    Err(Error::MissingColumn(name.clone()))
}

/// The merged-row key for a left-side column: qualified when the left
/// side is (or will be) qualified.
fn qualified_left_key(
    qual: &str,
    name: &str,
    left_columns: &IndexMap<String, ColumnInfo>,
) -> String {
    let qualified = format!("{qual}.{name}");
    for key in left_columns.keys() {
        if key.eq_ignore_ascii_case(&qualified) {
            return key.clone();
        }
    }
    qualified
}

const fn flip(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Lte => CmpOp::Gte,
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Gte => CmpOp::Lte,
        other => other,
    }
}

fn unparen(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(inner) => unparen(inner),
        other => other,
    }
}
