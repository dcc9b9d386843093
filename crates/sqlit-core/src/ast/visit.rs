//! Structural AST walks.
//!
//! [`visit_expressions`] and [`visit_expressions_mut`] drive a closure over
//! every expression in a statement or query, in left-to-right clause order,
//! descending into subqueries, CTEs, join conditions, and insert values.
//! Callers use this for placeholder discovery and rewriting; the walk order
//! matches the renderer's parameter occurrence order.

use super::{
    Expr, InSource, InsertSource, Query, SelectStatement, Statement, TableRef,
};

/// Calls `f` for every expression node reachable from `stmt`.
pub fn visit_expressions(stmt: &Statement, f: &mut impl FnMut(&Expr)) {
    match stmt {
        Statement::Query(query) => visit_query(query, f),
        Statement::Insert(insert) => {
            match &insert.values {
                InsertSource::Values(rows) => {
                    for row in rows {
                        for expr in row {
                            visit_expr(expr, f);
                        }
                    }
                }
                InsertSource::Query(query) => visit_query(query, f),
                InsertSource::DefaultValues => {}
            }
            if let Some(on_conflict) = &insert.on_conflict {
                if let super::ConflictAction::DoUpdate(assignments) = &on_conflict.action {
                    for assign in assignments {
                        visit_expr(&assign.value, f);
                    }
                }
            }
        }
        Statement::Update(update) => {
            for assign in &update.assignments {
                visit_expr(&assign.value, f);
            }
            if let Some(from) = &update.from {
                visit_table_ref(from, f);
            }
            if let Some(cond) = &update.where_clause {
                visit_expr(cond, f);
            }
        }
        Statement::Delete(delete) => {
            if let Some(cond) = &delete.where_clause {
                visit_expr(cond, f);
            }
        }
        Statement::CreateTable(create) => {
            for col in &create.columns {
                if let Some(default) = &col.default {
                    visit_expr(default, f);
                }
            }
        }
        Statement::DropTable(_) | Statement::CreateIndex(_) | Statement::DropIndex(_) => {}
    }
}

/// Calls `f` for every expression node reachable from `query`.
pub fn visit_query(query: &Query, f: &mut impl FnMut(&Expr)) {
    match query {
        Query::Select(select) => visit_select(select, f),
        Query::SetOperation(op) => {
            visit_query(&op.left, f);
            visit_query(&op.right, f);
        }
        Query::With(with, body) => {
            for cte in &with.ctes {
                visit_query(&cte.query, f);
            }
            visit_query(body, f);
        }
    }
}

fn visit_select(select: &SelectStatement, f: &mut impl FnMut(&Expr)) {
    for col in &select.columns {
        visit_expr(&col.expr, f);
    }
    if let Some(from) = &select.from {
        visit_table_ref(from, f);
    }
    if let Some(cond) = &select.where_clause {
        visit_expr(cond, f);
    }
    for expr in &select.group_by {
        visit_expr(expr, f);
    }
    if let Some(having) = &select.having {
        visit_expr(having, f);
    }
    for ob in &select.order_by {
        visit_expr(&ob.expr, f);
    }
    if let Some(limit) = &select.limit {
        visit_expr(limit, f);
    }
    if let Some(offset) = &select.offset {
        visit_expr(offset, f);
    }
}

fn visit_table_ref(table: &TableRef, f: &mut impl FnMut(&Expr)) {
    match table {
        TableRef::Table { .. } => {}
        TableRef::Subquery { query, .. } => visit_query(query, f),
        TableRef::Join { left, join } => {
            visit_table_ref(left, f);
            visit_table_ref(&join.table, f);
            if let Some(on) = &join.on {
                visit_expr(on, f);
            }
        }
    }
}

/// Calls `f` for `expr` and every expression nested below it.
pub fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Literal(_) | Expr::Column { .. } | Expr::Parameter { .. } | Expr::Wildcard { .. } => {}
        Expr::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::Unary { operand, .. } => visit_expr(operand, f),
        Expr::Paren(inner) => visit_expr(inner, f),
        Expr::Function(call) => {
            for arg in &call.args {
                visit_expr(arg, f);
            }
        }
        Expr::Window { function, spec } => {
            for arg in &function.args {
                visit_expr(arg, f);
            }
            for expr in &spec.partition_by {
                visit_expr(expr, f);
            }
            for ob in &spec.order_by {
                visit_expr(&ob.expr, f);
            }
        }
        Expr::Subquery(query) => visit_query(query, f),
        Expr::Exists { subquery, .. } => visit_query(subquery, f),
        Expr::Quantified { left, subquery, .. } => {
            visit_expr(left, f);
            visit_query(subquery, f);
        }
        Expr::IsNull { expr, .. } => visit_expr(expr, f),
        Expr::In { expr, source, .. } => {
            visit_expr(expr, f);
            match source {
                InSource::List(items) => {
                    for item in items {
                        visit_expr(item, f);
                    }
                }
                InSource::Subquery(query) => visit_query(query, f),
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            visit_expr(expr, f);
            visit_expr(low, f);
            visit_expr(high, f);
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(operand) = operand {
                visit_expr(operand, f);
            }
            for (when, then) in when_clauses {
                visit_expr(when, f);
                visit_expr(then, f);
            }
            if let Some(else_clause) = else_clause {
                visit_expr(else_clause, f);
            }
        }
        Expr::Cast { expr, .. } => visit_expr(expr, f),
    }
}

/// Calls `f` for every expression node reachable from `query`, mutably.
pub fn visit_query_mut(query: &mut Query, f: &mut impl FnMut(&mut Expr)) {
    match query {
        Query::Select(select) => visit_select_mut(select, f),
        Query::SetOperation(op) => {
            visit_query_mut(&mut op.left, f);
            visit_query_mut(&mut op.right, f);
        }
        Query::With(with, body) => {
            for cte in &mut with.ctes {
                visit_query_mut(&mut cte.query, f);
            }
            visit_query_mut(body, f);
        }
    }
}

fn visit_select_mut(select: &mut SelectStatement, f: &mut impl FnMut(&mut Expr)) {
    for col in &mut select.columns {
        visit_expr_mut(&mut col.expr, f);
    }
    if let Some(from) = &mut select.from {
        visit_table_ref_mut(from, f);
    }
    if let Some(cond) = &mut select.where_clause {
        visit_expr_mut(cond, f);
    }
    for expr in &mut select.group_by {
        visit_expr_mut(expr, f);
    }
    if let Some(having) = &mut select.having {
        visit_expr_mut(having, f);
    }
    for ob in &mut select.order_by {
        visit_expr_mut(&mut ob.expr, f);
    }
    if let Some(limit) = &mut select.limit {
        visit_expr_mut(limit, f);
    }
    if let Some(offset) = &mut select.offset {
        visit_expr_mut(offset, f);
    }
}

fn visit_table_ref_mut(table: &mut TableRef, f: &mut impl FnMut(&mut Expr)) {
    match table {
        TableRef::Table { .. } => {}
        TableRef::Subquery { query, .. } => visit_query_mut(query, f),
        TableRef::Join { left, join } => {
            visit_table_ref_mut(left, f);
            visit_table_ref_mut(&mut join.table, f);
            if let Some(on) = &mut join.on {
                visit_expr_mut(on, f);
            }
        }
    }
}

/// Calls `f` for `expr` and every expression nested below it, mutably.
pub fn visit_expr_mut(expr: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    f(expr);
    match expr {
        Expr::Literal(_) | Expr::Column { .. } | Expr::Parameter { .. } | Expr::Wildcard { .. } => {}
        Expr::Binary { left, right, .. } => {
            visit_expr_mut(left, f);
            visit_expr_mut(right, f);
        }
        Expr::Unary { operand, .. } => visit_expr_mut(operand, f),
        Expr::Paren(inner) => visit_expr_mut(inner, f),
        Expr::Function(call) => {
            for arg in &mut call.args {
                visit_expr_mut(arg, f);
            }
        }
        Expr::Window { function, spec } => {
            for arg in &mut function.args {
                visit_expr_mut(arg, f);
            }
            for expr in &mut spec.partition_by {
                visit_expr_mut(expr, f);
            }
            for ob in &mut spec.order_by {
                visit_expr_mut(&mut ob.expr, f);
            }
        }
        Expr::Subquery(query) => visit_query_mut(query, f),
        Expr::Exists { subquery, .. } => visit_query_mut(subquery, f),
        Expr::Quantified { left, subquery, .. } => {
            visit_expr_mut(left, f);
            visit_query_mut(subquery, f);
        }
        Expr::IsNull { expr, .. } => visit_expr_mut(expr, f),
        Expr::In { expr, source, .. } => {
            visit_expr_mut(expr, f);
            match source {
                InSource::List(items) => {
                    for item in items {
                        visit_expr_mut(item, f);
                    }
                }
                InSource::Subquery(query) => visit_query_mut(query, f),
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            visit_expr_mut(expr, f);
            visit_expr_mut(low, f);
            visit_expr_mut(high, f);
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(operand) = operand {
                visit_expr_mut(operand, f);
            }
            for (when, then) in when_clauses {
                visit_expr_mut(when, f);
                visit_expr_mut(then, f);
            }
            if let Some(else_clause) = else_clause {
                visit_expr_mut(else_clause, f);
            }
        }
        Expr::Cast { expr, .. } => visit_expr_mut(expr, f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parser;

    fn parse(sql: &str) -> Statement {
        Parser::new(sql).parse_statement().unwrap()
    }

    #[test]
    fn counts_parameters_across_clauses() {
        let stmt = parse("SELECT a FROM t WHERE b = ? AND c IN (?, ?) LIMIT ?");
        let mut count = 0;
        visit_expressions(&stmt, &mut |expr| {
            if matches!(expr, Expr::Parameter { .. }) {
                count += 1;
            }
        });
        assert_eq!(count, 4);
    }

    #[test]
    fn descends_into_subqueries_and_ctes() {
        let stmt = parse(
            "WITH c AS (SELECT x FROM u WHERE y = :y) \
             SELECT a FROM t WHERE EXISTS (SELECT 1 FROM c WHERE c.x = :x)",
        );
        let mut named = vec![];
        visit_expressions(&stmt, &mut |expr| {
            if let Expr::Parameter {
                name: Some(name), ..
            } = expr
            {
                named.push(name.clone());
            }
        });
        assert_eq!(named, vec!["y".to_string(), "x".to_string()]);
    }

    #[test]
    fn mutable_walk_rewrites_positions() {
        let Statement::Query(mut query) = parse("SELECT a FROM t WHERE b = ? AND c = ?") else {
            panic!("expected query");
        };
        visit_query_mut(&mut query, &mut |expr| {
            if let Expr::Parameter {
                name: None,
                position,
            } = expr
            {
                *position += 10;
            }
        });
        let mut positions = vec![];
        visit_query(&query, &mut |expr| {
            if let Expr::Parameter {
                name: None,
                position,
            } = expr
            {
                positions.push(*position);
            }
        });
        assert_eq!(positions, vec![11, 12]);
    }
}
