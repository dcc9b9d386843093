//! WHERE-clause planning: predicate push-down into table operators.
//!
//! The planner splits a WHERE clause into top-level conjuncts and pushes
//! each one into the table independently. A conjunct the table operators
//! can express becomes a wrapper view (possibly after constant folding,
//! literal-on-left normalisation, or algebraic solving of a one-sided
//! arithmetic expression); anything else is retained row by row through
//! the evaluator. The fallback is a deliberate classification, not an
//! error path.

use std::collections::HashSet;
use std::sync::Arc;

use sqlit_core::ast::{visit, BinaryOp, Expr, InSource, Query, TableRef};
use sqlit_core::Value;
use tracing::trace;

use super::eval::Evaluator;
use crate::error::Result;
use crate::row::Row;
use crate::table::{
    CmpOp, Condition, Predicate, RowId, SharedTable, SnapshotTable, Table, TableOps,
};
use crate::value_ops;

/// Applies a WHERE expression to `table`, pushing what it can and
/// retaining the rest row by row.
pub(crate) fn apply_where(
    table: SharedTable,
    expr: &Expr,
    ev: &Evaluator<'_>,
) -> Result<SharedTable> {
    let mut current = table;
    let mut residual: Vec<&Expr> = Vec::new();
    for conjunct in split_and(expr) {
        match push_conjunct(&current, conjunct, ev)? {
            Some(pushed) => current = pushed,
            None => residual.push(conjunct),
        }
    }
    if residual.is_empty() {
        return Ok(current);
    }
    trace!(count = residual.len(), "retaining conjuncts row-by-row");
    retain_rows(&current, &residual, ev)
}

/// Splits an expression into its top-level AND conjuncts.
pub(crate) fn split_and(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            let mut out = split_and(left);
            out.extend(split_and(right));
            out
        }
        Expr::Paren(inner) => split_and(inner),
        other => vec![other],
    }
}

/// Materialises the rows of `table` that satisfy every expression in
/// `conjuncts` under the evaluator.
pub(crate) fn retain_rows(
    table: &SharedTable,
    conjuncts: &[&Expr],
    ev: &Evaluator<'_>,
) -> Result<SharedTable> {
    let mut kept: Vec<(RowId, Row)> = Vec::new();
    for (id, row) in table.scan() {
        ev.ctx.tick()?;
        let mut all = true;
        for conjunct in conjuncts {
            if !ev.matches(conjunct, &row)? {
                all = false;
                break;
            }
        }
        if all {
            kept.push((id, row));
        }
    }
    Ok(Arc::new(SnapshotTable::carved(table, kept)))
}

/// Tries to push one conjunct into the table. `Ok(None)` means the
/// conjunct must be evaluated row by row.
fn push_conjunct(
    table: &SharedTable,
    expr: &Expr,
    ev: &Evaluator<'_>,
) -> Result<Option<SharedTable>> {
    match expr {
        Expr::Paren(inner) => push_conjunct(table, inner, ev),

        // Both sides constant: fold to everything or nothing.
        _ if is_constant_for(table, expr) => {
            let keep = ev.matches(expr, &Row::new())?;
            Ok(Some(if keep {
                Arc::clone(table)
            } else {
                empty_of(table)
            }))
        }

        Expr::Binary { left, op, right } if comparison_cmp(*op).is_some() => {
            push_comparison(table, left, *op, right, ev)
        }

        Expr::Between {
            expr: subject,
            low,
            high,
            negated,
        } => {
            let Some(column) = column_key(table, subject) else {
                return Ok(None);
            };
            if !(is_value_expr(table, low) && is_value_expr(table, high)) {
                return Ok(None);
            }
            let low = ev.eval(low, &Row::new())?;
            let high = ev.eval(high, &Row::new())?;
            if low.is_null() || high.is_null() {
                // BETWEEN with a NULL bound is UNKNOWN for every row.
                return Ok(Some(if *negated { Arc::clone(table) } else { empty_of(table) }));
            }
            let range = table.gte(&column, low).lte(&column, high);
            Ok(Some(if *negated {
                table.except(range)
            } else {
                range
            }))
        }

        Expr::In {
            expr: subject,
            source,
            negated,
        } => push_in(table, subject, source, *negated, ev),

        Expr::IsNull {
            expr: subject,
            negated,
        } => {
            let Some(column) = column_key(table, subject) else {
                return Ok(None);
            };
            let nulls = table.eq(&column, Value::Null);
            Ok(Some(if *negated {
                table.except(nulls)
            } else {
                nulls
            }))
        }

        Expr::Exists { subquery, negated } => push_exists(table, subquery, *negated, ev),

        Expr::Unary {
            op: sqlit_core::ast::UnaryOp::Not,
            operand,
        } => {
            // NOT expr: compute the matching set, subtract it.
            let matched = apply_where(Arc::clone(table), operand, ev)?;
            Ok(Some(table.except(matched)))
        }

        Expr::Binary {
            op: BinaryOp::Or, ..
        } => {
            let mut predicates = Vec::new();
            for branch in split_or(expr) {
                match branch_predicate(table, branch, ev)? {
                    Some(predicate) => predicates.push(predicate),
                    None => return Ok(None),
                }
            }
            Ok(Some(table.or_any(predicates)))
        }

        _ => Ok(None),
    }
}

fn push_comparison(
    table: &SharedTable,
    left: &Expr,
    op: BinaryOp,
    right: &Expr,
    ev: &Evaluator<'_>,
) -> Result<Option<SharedTable>> {
    // Literal-on-left normalisation: `7 < col` becomes `col > 7`.
    let (column_side, value_side, op) =
        if column_side_of(table, left).is_some() && is_value_expr(table, right) {
            (left, right, op)
        } else if column_side_of(table, right).is_some() && is_value_expr(table, left) {
            (right, left, flip_comparison(op))
        } else {
            return Ok(None);
        };

    let value = ev.eval(value_side, &Row::new())?;
    // `col = NULL` (and any other comparison against NULL, including one
    // produced by NULL propagation through arithmetic) is UNKNOWN.
    if value.is_null() {
        return Ok(Some(empty_of(table)));
    }

    let Some(((column, op), value)) = solve_column_side(table, column_side, op, value)? else {
        return Ok(None);
    };

    let Some(cmp) = comparison_cmp(op) else {
        return Ok(None);
    };
    if cmp == CmpOp::Like && !matches!(value, Value::Text(_)) {
        return Ok(None);
    }
    Ok(Some(match cmp {
        CmpOp::Eq => table.eq(&column, value),
        CmpOp::NotEq => table.neq(&column, value),
        CmpOp::Lt => table.lt(&column, value),
        CmpOp::Lte => table.lte(&column, value),
        CmpOp::Gt => table.gt(&column, value),
        CmpOp::Gte => table.gte(&column, value),
        CmpOp::Like => match value {
            Value::Text(pattern) => table.like(&column, pattern),
            _ => unreachable!(),
        },
    }))
}

/// Solves `(col ± const) op v`, `(const ± col) op v`, `(col */÷ const) op
/// v` down to `col op' v'`. Returns the plain column for non-arithmetic
/// sides. `None` aborts the rewrite (division by zero, inexact division).
#[allow(clippy::type_complexity)]
fn solve_column_side(
    table: &SharedTable,
    expr: &Expr,
    op: BinaryOp,
    value: Value,
) -> Result<Option<((String, BinaryOp), Value)>> {
    match expr {
        Expr::Paren(inner) => solve_column_side(table, inner, op, value),
        Expr::Column { .. } => {
            let Some(column) = column_key(table, expr) else {
                return Ok(None);
            };
            Ok(Some(((column, op), value)))
        }
        Expr::Binary {
            left,
            op: arith,
            right,
        } => {
            let constant = |e: &Expr| -> Option<Value> {
                match e {
                    Expr::Literal(lit) => Some(super::eval::literal_value(lit)),
                    _ => None,
                }
            };
            match arith {
                BinaryOp::Add => {
                    if let Some(c) = constant(right) {
                        // (col + c) op v  →  col op v - c
                        let solved = value_ops::arithmetic(BinaryOp::Sub, &value, &c)?;
                        return solve_column_side(table, left, op, solved);
                    }
                    if let Some(c) = constant(left) {
                        let solved = value_ops::arithmetic(BinaryOp::Sub, &value, &c)?;
                        return solve_column_side(table, right, op, solved);
                    }
                    Ok(None)
                }
                BinaryOp::Sub => {
                    if let Some(c) = constant(right) {
                        // (col - c) op v  →  col op v + c
                        let solved = value_ops::arithmetic(BinaryOp::Add, &value, &c)?;
                        return solve_column_side(table, left, op, solved);
                    }
                    if let Some(c) = constant(left) {
                        // (c - col) op v  →  col flip(op) c - v
                        let solved = value_ops::arithmetic(BinaryOp::Sub, &c, &value)?;
                        return solve_column_side(table, right, flip_comparison(op), solved);
                    }
                    Ok(None)
                }
                BinaryOp::Mul => {
                    let (inner, c) = if let Some(c) = constant(right) {
                        (left, c)
                    } else if let Some(c) = constant(left) {
                        (right, c)
                    } else {
                        return Ok(None);
                    };
                    solve_scaled(table, inner, op, value, &c, true)
                }
                BinaryOp::Div => {
                    let Some(c) = constant(right) else {
                        return Ok(None);
                    };
                    solve_scaled(table, left, op, value, &c, false)
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

/// Solves a multiplied (`scaled = true`) or divided column side against a
/// constant factor, flipping the comparison for negative factors and
/// aborting on zero or precision-losing division.
fn solve_scaled(
    table: &SharedTable,
    inner: &Expr,
    op: BinaryOp,
    value: Value,
    factor: &Value,
    scaled: bool,
) -> Result<Option<((String, BinaryOp), Value)>> {
    let Some(f) = value_ops::as_decimal(factor) else {
        return Ok(None);
    };
    if f.is_zero() {
        // col * 0 / col ÷ 0: no algebraic solution; leave for the
        // row-by-row path.
        return Ok(None);
    }
    let solved = if scaled {
        // (col * f) op v  →  col op v / f, only when exact.
        let Some(v) = value_ops::as_decimal(&value) else {
            return Ok(None);
        };
        let Some(quotient) = v.checked_div(f) else {
            return Ok(None);
        };
        if quotient.checked_mul(f) != Some(v) {
            // Inexact division: the rewrite would change float/int
            // semantics.
            return Ok(None);
        }
        decimal_back(quotient, &value)
    } else {
        // (col / f) op v  →  col op v * f.
        let Some(v) = value_ops::as_decimal(&value) else {
            return Ok(None);
        };
        let Some(product) = v.checked_mul(f) else {
            return Ok(None);
        };
        decimal_back(product, &value)
    };
    let op = if f.is_sign_negative() {
        flip_comparison(op)
    } else {
        op
    };
    solve_column_side(table, inner, op, solved)
}

/// Keeps the solved value in the family of the original where possible.
fn decimal_back(solved: rust_decimal::Decimal, original: &Value) -> Value {
    use rust_decimal::prelude::ToPrimitive;
    match original {
        Value::Int(_) if solved.is_integer() => solved
            .to_i64()
            .map_or(Value::Decimal(solved), Value::Int),
        Value::Float(_) => solved
            .to_f64()
            .map_or(Value::Decimal(solved), Value::Float),
        _ => Value::Decimal(solved),
    }
}

fn push_in(
    table: &SharedTable,
    subject: &Expr,
    source: &InSource,
    negated: bool,
    ev: &Evaluator<'_>,
) -> Result<Option<SharedTable>> {
    let Some(column) = column_key(table, subject) else {
        return Ok(None);
    };
    let mut values: Vec<Value> = Vec::new();
    let mut saw_null = false;
    match source {
        InSource::List(items) => {
            for item in items {
                if !is_value_expr(table, item) {
                    return Ok(None);
                }
                let value = ev.eval(item, &Row::new())?;
                if value.is_null() {
                    saw_null = true;
                } else {
                    values.push(value);
                }
            }
        }
        InSource::Subquery(query) => {
            if !foreign_qualifiers(query).is_empty() {
                // Correlated IN falls back to the evaluator.
                return Ok(None);
            }
            let result = ev
                .engine
                .run_query(query, ev.params, &ev.outer, ev.ctx)?;
            for row in result.rows {
                let value = row.into_values().into_iter().next().unwrap_or(Value::Null);
                if value.is_null() {
                    saw_null = true;
                } else {
                    values.push(value);
                }
            }
        }
    }

    if negated && saw_null {
        // `x NOT IN (…, NULL)` is never true.
        return Ok(Some(empty_of(table)));
    }
    if values.is_empty() {
        // `IN ()` matches nothing; `NOT IN ()` performs no comparison and
        // matches everything.
        return Ok(Some(if negated {
            Arc::clone(table)
        } else {
            empty_of(table)
        }));
    }

    let matched = in_table(table, &column, values);
    Ok(Some(if negated {
        // NOT IN also rejects NULL subjects.
        table
            .except(matched)
            .except(table.eq(&column, Value::Null))
    } else {
        matched
    }))
}

/// Builds the IN match table, probing the index per value when the outer
/// column has one.
fn in_table(table: &SharedTable, column: &str, values: Vec<Value>) -> SharedTable {
    let indexed = table
        .columns()
        .get(column)
        .is_some_and(|info| info.index.is_indexed());
    if indexed {
        let mut seen_values = HashSet::new();
        let mut seen_rows = HashSet::new();
        let mut rows: Vec<(RowId, Row)> = Vec::new();
        let mut all_probed = true;
        for value in &values {
            if !seen_values.insert(value_ops::serialize_value(value)) {
                continue;
            }
            match table.probe_eq(column, value) {
                Some(hits) => {
                    for (id, row) in hits {
                        if seen_rows.insert(id) {
                            rows.push((id, row));
                        }
                    }
                }
                None => {
                    all_probed = false;
                    break;
                }
            }
        }
        if all_probed {
            return Arc::new(SnapshotTable::carved(table, rows));
        }
    }
    table.in_set(column, values)
}

fn push_exists(
    table: &SharedTable,
    subquery: &Query,
    negated: bool,
    ev: &Evaluator<'_>,
) -> Result<Option<SharedTable>> {
    let foreign = foreign_qualifiers(subquery);
    if foreign.is_empty() {
        // Uncorrelated: one execution decides for every row.
        let result = ev
            .engine
            .run_query(subquery, ev.params, &ev.outer, ev.ctx)?;
        let hit = !result.rows.is_empty();
        return Ok(Some(if hit != negated {
            Arc::clone(table)
        } else {
            empty_of(table)
        }));
    }

    // Correlated: try the template strategy first — local conjuncts are
    // pushed once, equality correlations become per-row binds.
    if let Some(template) = CorrelatedTemplate::build(subquery, ev)? {
        let mut kept: Vec<(RowId, Row)> = Vec::new();
        for (id, row) in table.scan() {
            ev.ctx.tick()?;
            if template.exists_for(&row, ev)? != negated {
                kept.push((id, row));
            }
        }
        return Ok(Some(Arc::new(SnapshotTable::carved(table, kept))));
    }

    // General correlation (OR over outer references, computed
    // correlations): evaluate the full subquery per outer row.
    let mut kept: Vec<(RowId, Row)> = Vec::new();
    for (id, row) in table.scan() {
        ev.ctx.tick()?;
        let mut outer = ev.outer.clone();
        outer.push(ev.scope.clone().unwrap_or_default(), row.clone());
        let result = ev
            .engine
            .run_query(subquery, ev.params, &outer, ev.ctx)?;
        if result.rows.is_empty() == negated {
            kept.push((id, row));
        }
    }
    Ok(Some(Arc::new(SnapshotTable::carved(table, kept))))
}

/// A pre-planned correlated EXISTS: the subquery's local conditions are
/// applied once; each correlated equality becomes a per-outer-row bind.
struct CorrelatedTemplate {
    base: SharedTable,
    /// `(inner column, outer column expr)` equality pairs.
    binds: Vec<(String, Expr)>,
}

impl CorrelatedTemplate {
    fn build(subquery: &Query, ev: &Evaluator<'_>) -> Result<Option<Self>> {
        let Query::Select(select) = subquery else {
            return Ok(None);
        };
        let Some(TableRef::Table { name, alias, .. }) = &select.from else {
            return Ok(None);
        };
        if select.group_by.is_empty()
            && select.having.is_none()
            && select.limit.is_none()
            && select.offset.is_none()
        {
            let scope = alias.clone().unwrap_or_else(|| name.clone());
            let inner_table = match ev.engine.resolve_table(name) {
                Ok(t) => t,
                Err(_) => return Ok(None),
            };
            let mut base = inner_table;
            if alias.is_some() {
                base = base.with_alias(scope.clone());
            }

            let mut binds = Vec::new();
            if let Some(where_clause) = &select.where_clause {
                let sub_ev = Evaluator::new(
                    ev.engine,
                    ev.params,
                    Some(scope.clone()),
                    ev.outer.clone(),
                    ev.ctx,
                );
                for conjunct in split_and(where_clause) {
                    if expr_qualifiers(conjunct)
                        .iter()
                        .all(|q| q.eq_ignore_ascii_case(&scope))
                    {
                        // Local condition: push once.
                        base = apply_where(base, conjunct, &sub_ev)?;
                        continue;
                    }
                    let Some((inner, outer)) = correlation_pair(conjunct, &scope) else {
                        return Ok(None);
                    };
                    binds.push((inner, outer));
                }
            }
            if binds.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Self { base, binds }));
        }
        Ok(None)
    }

    fn exists_for(&self, outer_row: &Row, ev: &Evaluator<'_>) -> Result<bool> {
        let mut probe = Arc::clone(&self.base);
        for (inner_column, outer_expr) in &self.binds {
            let value = ev.eval(outer_expr, outer_row)?;
            if value.is_null() {
                return Ok(false);
            }
            probe = probe.eq(inner_column, value);
        }
        let found = probe.scan().next().is_some();
        Ok(found)
    }
}

/// Splits `inner.col = outer.col` into the inner column name and the
/// outer-side expression.
fn correlation_pair(expr: &Expr, inner_scope: &str) -> Option<(String, Expr)> {
    let Expr::Binary {
        left,
        op: BinaryOp::Eq,
        right,
    } = strip_parens(expr)
    else {
        return None;
    };
    let side = |e: &Expr| -> Option<(bool, String, Expr)> {
        if let Expr::Column { table, name, .. } = strip_parens(e) {
            let local = table
                .as_deref()
                .is_none_or(|t| t.eq_ignore_ascii_case(inner_scope));
            return Some((local, name.clone(), e.clone()));
        }
        None
    };
    let (l_local, l_name, l_expr) = side(left)?;
    let (r_local, r_name, r_expr) = side(right)?;
    match (l_local, r_local) {
        (true, false) => Some((l_name, r_expr)),
        (false, true) => Some((r_name, l_expr)),
        _ => None,
    }
}

fn strip_parens(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(inner) => strip_parens(inner),
        other => other,
    }
}

/// Flattens a top-level OR chain.
fn split_or(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Binary {
            left,
            op: BinaryOp::Or,
            right,
        } => {
            let mut out = split_or(left);
            out.extend(split_or(right));
            out
        }
        Expr::Paren(inner) => split_or(inner),
        other => vec![other],
    }
}

/// Converts one OR branch into an ANDed condition list, or `None` when a
/// member cannot be expressed as a simple condition.
fn branch_predicate(
    table: &SharedTable,
    branch: &Expr,
    ev: &Evaluator<'_>,
) -> Result<Option<Predicate>> {
    let mut predicate = Predicate::new();
    for conjunct in split_and(branch) {
        match simple_condition(table, conjunct, ev)? {
            Some(conditions) => {
                for condition in conditions {
                    predicate = predicate.and(condition);
                }
            }
            None => return Ok(None),
        }
    }
    Ok(Some(predicate))
}

/// Lowers a conjunct to native conditions when possible: plain
/// comparisons, LIKE, BETWEEN (two conditions), IS NULL.
fn simple_condition(
    table: &SharedTable,
    expr: &Expr,
    ev: &Evaluator<'_>,
) -> Result<Option<Vec<Condition>>> {
    match strip_parens(expr) {
        Expr::Binary { left, op, right } if comparison_cmp(*op).is_some() => {
            let (column_expr, value_expr, op) =
                if column_side_of(table, left).is_some() && is_value_expr(table, right) {
                    (left, right, *op)
                } else if column_side_of(table, right).is_some() && is_value_expr(table, left) {
                    (right, left, flip_comparison(*op))
                } else {
                    return Ok(None);
                };
            let Some(column) = column_key(table, column_expr) else {
                return Ok(None);
            };
            let value = ev.eval(value_expr, &Row::new())?;
            let Some(cmp) = comparison_cmp(op) else {
                return Ok(None);
            };
            if value.is_null() {
                // A literal comparison against NULL is UNKNOWN for every
                // row; NotEq-against-NULL is the never-matching condition.
                return Ok(Some(vec![Condition::new(column, CmpOp::NotEq, Value::Null)]));
            }
            Ok(Some(vec![Condition::new(column, cmp, value)]))
        }
        Expr::Between {
            expr: subject,
            low,
            high,
            negated: false,
        } => {
            let Some(column) = column_key(table, subject) else {
                return Ok(None);
            };
            if !(is_value_expr(table, low) && is_value_expr(table, high)) {
                return Ok(None);
            }
            Ok(Some(vec![
                Condition::new(column.clone(), CmpOp::Gte, ev.eval(low, &Row::new())?),
                Condition::new(column, CmpOp::Lte, ev.eval(high, &Row::new())?),
            ]))
        }
        Expr::IsNull {
            expr: subject,
            negated: false,
        } => {
            let Some(column) = column_key(table, subject) else {
                return Ok(None);
            };
            Ok(Some(vec![Condition::new(column, CmpOp::Eq, Value::Null)]))
        }
        _ => Ok(None),
    }
}

/// An empty table with the same shape.
pub(crate) fn empty_of(table: &SharedTable) -> SharedTable {
    table.limit(0)
}

fn comparison_cmp(op: BinaryOp) -> Option<CmpOp> {
    match op {
        BinaryOp::Eq => Some(CmpOp::Eq),
        BinaryOp::NotEq => Some(CmpOp::NotEq),
        BinaryOp::Lt => Some(CmpOp::Lt),
        BinaryOp::LtEq => Some(CmpOp::Lte),
        BinaryOp::Gt => Some(CmpOp::Gt),
        BinaryOp::GtEq => Some(CmpOp::Gte),
        BinaryOp::Like => Some(CmpOp::Like),
        _ => None,
    }
}

const fn flip_comparison(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::LtEq => BinaryOp::GtEq,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::GtEq => BinaryOp::LtEq,
        other => other,
    }
}

/// The condition key for a plain column reference belonging to `table`.
/// `None` for references the table cannot answer (outer references,
/// unknown columns); those stay with the row-by-row evaluator, which
/// resolves outer scopes or reports the missing column.
fn column_key(table: &SharedTable, expr: &Expr) -> Option<String> {
    match strip_parens(expr) {
        Expr::Column { table: qual, name, .. } => {
            let columns = table.columns();
            if let Some(qual) = qual {
                let scope_matches = table
                    .scope_name()
                    .is_some_and(|s| s.eq_ignore_ascii_case(qual));
                if scope_matches && columns.contains_key(name) {
                    return Some(name.clone());
                }
                // Joined rows carry qualified cells.
                let qualified = format!("{qual}.{name}");
                if columns.contains_key(&qualified) {
                    return Some(qualified);
                }
                return None;
            }
            if columns.contains_key(name) {
                return Some(name.clone());
            }
            // A bare name over joined columns: accept a unique suffix.
            let suffix = format!(".{name}");
            let mut matched = None;
            for key in columns.keys() {
                if key.ends_with(&suffix) {
                    if matched.is_some() {
                        return None;
                    }
                    matched = Some(key.clone());
                }
            }
            matched
        }
        _ => None,
    }
}

/// `true` when `expr` is a column side: a plain column, possibly inside
/// solvable arithmetic.
fn column_side_of(table: &SharedTable, expr: &Expr) -> Option<String> {
    match strip_parens(expr) {
        Expr::Column { .. } => column_key(table, expr),
        Expr::Binary { left, op, right } => match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let l = column_side_of(table, left);
                let r = column_side_of(table, right);
                match (l, r) {
                    (Some(c), None) if matches!(strip_parens(right), Expr::Literal(_)) => Some(c),
                    (None, Some(c)) if matches!(strip_parens(left), Expr::Literal(_)) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        },
        _ => None,
    }
}

/// `true` when `expr` references no column of the current scope: a
/// literal, parameter, arithmetic over those, or an uncorrelated
/// subquery.
fn is_value_expr(table: &SharedTable, expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Parameter { .. } => true,
        Expr::Paren(inner) => is_value_expr(table, inner),
        Expr::Unary { operand, .. } => is_value_expr(table, operand),
        Expr::Binary { left, right, .. } => {
            is_value_expr(table, left) && is_value_expr(table, right)
        }
        Expr::Subquery(query) => foreign_qualifiers(query).is_empty(),
        _ => false,
    }
}

fn is_constant_for(table: &SharedTable, expr: &Expr) -> bool {
    match expr {
        Expr::Binary { left, right, .. } => {
            is_value_expr(table, left) && is_value_expr(table, right)
        }
        Expr::IsNull { expr, .. } => is_value_expr(table, expr),
        Expr::Unary { operand, .. } => is_constant_for(table, operand),
        Expr::Paren(inner) => is_constant_for(table, inner),
        _ => is_value_expr(table, expr),
    }
}

/// Qualifiers used anywhere in `query` that no scope inside `query`
/// defines. A non-empty result marks the query as correlated.
pub(crate) fn foreign_qualifiers(query: &Query) -> HashSet<String> {
    let mut scopes = HashSet::new();
    collect_scopes(query, &mut scopes);
    // Expression-level subqueries define scopes of their own; counting
    // them as local over-approximates, which only disables an
    // optimisation, never changes results.
    visit::visit_query(query, &mut |expr| match expr {
        Expr::Subquery(q)
        | Expr::Exists { subquery: q, .. }
        | Expr::Quantified { subquery: q, .. }
        | Expr::In {
            source: InSource::Subquery(q),
            ..
        } => collect_scopes(q, &mut scopes),
        _ => {}
    });
    let mut used = HashSet::new();
    visit::visit_query(query, &mut |expr| {
        if let Expr::Column {
            table: Some(qual), ..
        } = expr
        {
            used.insert(qual.to_lowercase());
        }
    });
    used.difference(&scopes).cloned().collect()
}

/// Qualifiers referenced by one expression.
pub(crate) fn expr_qualifiers(expr: &Expr) -> HashSet<String> {
    let mut out = HashSet::new();
    visit::visit_expr(expr, &mut |e| {
        if let Expr::Column {
            table: Some(qual), ..
        } = e
        {
            out.insert(qual.to_lowercase());
        }
    });
    out
}

fn collect_scopes(query: &Query, scopes: &mut HashSet<String>) {
    match query {
        Query::Select(select) => {
            if let Some(from) = &select.from {
                collect_table_scopes(from, scopes);
            }
        }
        Query::SetOperation(op) => {
            collect_scopes(&op.left, scopes);
            collect_scopes(&op.right, scopes);
        }
        Query::With(with, body) => {
            for cte in &with.ctes {
                scopes.insert(cte.name.to_lowercase());
                collect_scopes(&cte.query, scopes);
            }
            collect_scopes(body, scopes);
        }
    }
}

fn collect_table_scopes(table: &TableRef, scopes: &mut HashSet<String>) {
    match table {
        TableRef::Table { name, alias, .. } => {
            scopes.insert(name.to_lowercase());
            if let Some(alias) = alias {
                scopes.insert(alias.to_lowercase());
            }
        }
        TableRef::Subquery { query, alias } => {
            scopes.insert(alias.to_lowercase());
            collect_scopes(query, scopes);
        }
        TableRef::Join { left, join } => {
            collect_table_scopes(left, scopes);
            collect_table_scopes(&join.table, scopes);
        }
    }
}
