//! Row-context expression evaluation.
//!
//! The evaluator computes an expression against one row, with access to
//! outer rows for correlated subqueries and to the engine for subquery
//! execution. WHERE-clause truthiness follows SQL three-valued logic:
//! a NULL result never matches.

use std::cell::RefCell;
use std::collections::HashMap;

use sqlit_core::ast::{
    BinaryOp, DataType, Expr, FunctionCall, InSource, Literal, Quantifier, Query, TypeFamily,
    UnaryOp,
};
use sqlit_core::Value;

use super::{EngineInner, ExecCtx, OuterScopes};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::row::Row;
use crate::value_ops;

/// Evaluates expressions against rows in one query scope.
pub(crate) struct Evaluator<'a> {
    pub(crate) engine: &'a EngineInner,
    pub(crate) params: &'a Params,
    /// The scope name of the current FROM source, if known.
    pub(crate) scope: Option<String>,
    /// Rows of enclosing queries, innermost last.
    pub(crate) outer: OuterScopes,
    pub(crate) ctx: &'a ExecCtx,
    /// Precomputed values for specific expression nodes (aggregate and
    /// window results), keyed by node address.
    pub(crate) overrides: Option<&'a HashMap<usize, Value>>,
    /// Cache for uncorrelated scalar subqueries, keyed by node address.
    scalar_cache: RefCell<HashMap<usize, Value>>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        engine: &'a EngineInner,
        params: &'a Params,
        scope: Option<String>,
        outer: OuterScopes,
        ctx: &'a ExecCtx,
    ) -> Self {
        Self {
            engine,
            params,
            scope,
            outer,
            ctx,
            overrides: None,
            scalar_cache: RefCell::new(HashMap::new()),
        }
    }

    /// An evaluator that reads aggregate/window results from `overrides`.
    pub(crate) fn with_overrides<'b>(
        &'b self,
        overrides: &'b HashMap<usize, Value>,
    ) -> Evaluator<'b> {
        Evaluator {
            engine: self.engine,
            params: self.params,
            scope: self.scope.clone(),
            outer: self.outer.clone(),
            ctx: self.ctx,
            overrides: Some(overrides),
            scalar_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Evaluates `expr` against `row`.
    pub(crate) fn eval(&self, expr: &Expr, row: &Row) -> Result<Value> {
        if let Some(overrides) = self.overrides {
            if let Some(value) = overrides.get(&expr_key(expr)) {
                return Ok(value.clone());
            }
        }
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Column { table, name, .. } => self.resolve_column(row, table.as_deref(), name),
            Expr::Parameter { name, position } => {
                self.params.resolve(name.as_deref(), *position).cloned()
            }
            Expr::Paren(inner) => self.eval(inner, row),
            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right, row),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, row)?;
                match op {
                    UnaryOp::Not => Ok(match sql_bool(&value) {
                        None => Value::Null,
                        Some(b) => Value::Bool(!b),
                    }),
                    UnaryOp::Neg => {
                        value_ops::arithmetic(BinaryOp::Sub, &Value::Int(0), &value)
                    }
                    UnaryOp::BitNot => match value_ops::as_i64(&value) {
                        Some(n) => Ok(Value::Int(!n)),
                        None if value.is_null() => Ok(Value::Null),
                        None => Err(Error::TypeMismatch(format!(
                            "cannot apply ~ to {}",
                            value.to_sql_inline()
                        ))),
                    },
                }
            }
            Expr::IsNull {
                expr: inner,
                negated,
            } => {
                let value = self.eval(inner, row)?;
                Ok(Value::Bool(value.is_null() != *negated))
            }
            Expr::Between {
                expr: inner,
                low,
                high,
                negated,
            } => {
                let value = self.eval(inner, row)?;
                let low = self.eval(low, row)?;
                let high = self.eval(high, row)?;
                let in_range = match (
                    value_ops::value_cmp(&value, &low),
                    value_ops::value_cmp(&value, &high),
                ) {
                    (Some(l), Some(h)) => Some(l.is_ge() && h.is_le()),
                    _ => None,
                };
                Ok(match in_range {
                    None => Value::Null,
                    Some(b) => Value::Bool(b != *negated),
                })
            }
            Expr::In {
                expr: inner,
                source,
                negated,
            } => self.eval_in(inner, source, *negated, row),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => self.eval_case(operand.as_deref(), when_clauses, else_clause.as_deref(), row),
            Expr::Cast {
                expr: inner,
                data_type,
            } => {
                let value = self.eval(inner, row)?;
                cast_value(&value, data_type)
            }
            Expr::Function(call) => self.eval_function(call, row),
            Expr::Window { .. } => Err(Error::unsupported(
                "window function outside a windowed SELECT",
            )),
            Expr::Subquery(query) => self.eval_scalar_subquery(expr, query, row),
            Expr::Exists { subquery, negated } => {
                let result = self.run_subquery(subquery, row)?;
                Ok(Value::Bool(result.rows.is_empty() == *negated))
            }
            Expr::Quantified {
                left,
                op,
                quantifier,
                subquery,
            } => self.eval_quantified(left, *op, *quantifier, subquery, row),
            Expr::Wildcard { .. } => Err(Error::unsupported("* outside a projection list")),
        }
    }

    /// Evaluates `expr` and reduces it to WHERE truthiness (NULL → false).
    pub(crate) fn matches(&self, expr: &Expr, row: &Row) -> Result<bool> {
        Ok(value_ops::truthy(&self.eval(expr, row)?))
    }

    fn eval_binary(&self, left: &Expr, op: BinaryOp, right: &Expr, row: &Row) -> Result<Value> {
        match op {
            BinaryOp::And => {
                let l = sql_bool(&self.eval(left, row)?);
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = sql_bool(&self.eval(right, row)?);
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            BinaryOp::Or => {
                let l = sql_bool(&self.eval(left, row)?);
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = sql_bool(&self.eval(right, row)?);
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => {
                let l = self.eval(left, row)?;
                let r = self.eval(right, row)?;
                Ok(match value_ops::value_cmp(&l, &r) {
                    None => Value::Null,
                    Some(ordering) => Value::Bool(match op {
                        BinaryOp::Eq => ordering.is_eq(),
                        BinaryOp::NotEq => ordering.is_ne(),
                        BinaryOp::Lt => ordering.is_lt(),
                        BinaryOp::LtEq => ordering.is_le(),
                        BinaryOp::Gt => ordering.is_gt(),
                        BinaryOp::GtEq => ordering.is_ge(),
                        _ => unreachable!(),
                    }),
                })
            }
            BinaryOp::Like => {
                let l = self.eval(left, row)?;
                let r = self.eval(right, row)?;
                match (&l, &r) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::Text(text), Value::Text(pattern)) => {
                        Ok(Value::Bool(value_ops::like_match(text, pattern)))
                    }
                    _ => Ok(Value::Bool(false)),
                }
            }
            _ => {
                let l = self.eval(left, row)?;
                let r = self.eval(right, row)?;
                value_ops::arithmetic(op, &l, &r)
            }
        }
    }

    fn eval_in(
        &self,
        inner: &Expr,
        source: &InSource,
        negated: bool,
        row: &Row,
    ) -> Result<Value> {
        let needle = self.eval(inner, row)?;
        if needle.is_null() {
            return Ok(Value::Null);
        }
        let mut saw_null = false;
        let mut found = false;
        match source {
            InSource::List(items) => {
                for item in items {
                    let candidate = self.eval(item, row)?;
                    match value_ops::value_eq(&needle, &candidate) {
                        None => saw_null = true,
                        Some(true) => {
                            found = true;
                            break;
                        }
                        Some(false) => {}
                    }
                }
            }
            InSource::Subquery(query) => {
                let result = self.run_subquery(query, row)?;
                for candidate_row in &result.rows {
                    let candidate = candidate_row.first().cloned().unwrap_or(Value::Null);
                    match value_ops::value_eq(&needle, &candidate) {
                        None => saw_null = true,
                        Some(true) => {
                            found = true;
                            break;
                        }
                        Some(false) => {}
                    }
                }
            }
        }
        Ok(if found {
            Value::Bool(!negated)
        } else if saw_null {
            Value::Null
        } else {
            Value::Bool(negated)
        })
    }

    fn eval_case(
        &self,
        operand: Option<&Expr>,
        when_clauses: &[(Expr, Expr)],
        else_clause: Option<&Expr>,
        row: &Row,
    ) -> Result<Value> {
        let subject = operand.map(|o| self.eval(o, row)).transpose()?;
        for (when, then) in when_clauses {
            let hit = match &subject {
                Some(subject) => {
                    let candidate = self.eval(when, row)?;
                    value_ops::value_eq(subject, &candidate) == Some(true)
                }
                None => self.matches(when, row)?,
            };
            if hit {
                return self.eval(then, row);
            }
        }
        else_clause.map_or(Ok(Value::Null), |e| self.eval(e, row))
    }

    fn eval_quantified(
        &self,
        left: &Expr,
        op: BinaryOp,
        quantifier: Quantifier,
        subquery: &Query,
        row: &Row,
    ) -> Result<Value> {
        if !op.is_comparison() {
            return Err(Error::unsupported(format!(
                "{op} cannot be quantified with ANY/ALL"
            )));
        }
        let needle = self.eval(left, row)?;
        let result = self.run_subquery(subquery, row)?;
        let mut any = false;
        let mut all = true;
        let mut unknown = false;
        for candidate_row in &result.rows {
            let candidate = candidate_row.first().cloned().unwrap_or(Value::Null);
            match value_ops::value_cmp(&needle, &candidate) {
                None => unknown = true,
                Some(ordering) => {
                    let holds = match op {
                        BinaryOp::Eq => ordering.is_eq(),
                        BinaryOp::NotEq => ordering.is_ne(),
                        BinaryOp::Lt => ordering.is_lt(),
                        BinaryOp::LtEq => ordering.is_le(),
                        BinaryOp::Gt => ordering.is_gt(),
                        BinaryOp::GtEq => ordering.is_ge(),
                        _ => unreachable!(),
                    };
                    any |= holds;
                    all &= holds;
                }
            }
        }
        Ok(match quantifier {
            Quantifier::Any => {
                if any {
                    Value::Bool(true)
                } else if unknown {
                    Value::Null
                } else {
                    Value::Bool(false)
                }
            }
            Quantifier::All => {
                if !all {
                    Value::Bool(false)
                } else if unknown {
                    Value::Null
                } else {
                    Value::Bool(true)
                }
            }
        })
    }

    fn eval_function(&self, call: &FunctionCall, row: &Row) -> Result<Value> {
        let name = call.name.to_uppercase();
        if self.engine.is_aggregate(&name) {
            return Err(Error::unsupported(format!(
                "aggregate {name}() used outside an aggregate query"
            )));
        }
        let args: Vec<Value> = call
            .args
            .iter()
            .map(|arg| self.eval(arg, row))
            .collect::<Result<_>>()?;
        scalar_function(&name, &args)
    }

    fn eval_scalar_subquery(&self, node: &Expr, query: &Query, row: &Row) -> Result<Value> {
        let correlated = self.subquery_is_correlated(query);
        let key = expr_key(node);
        if !correlated {
            if let Some(cached) = self.scalar_cache.borrow().get(&key) {
                return Ok(cached.clone());
            }
        }
        let result = self.run_subquery(query, row)?;
        let value = result
            .rows
            .first()
            .and_then(|r| r.first().cloned())
            .unwrap_or(Value::Null);
        if !correlated {
            self.scalar_cache.borrow_mut().insert(key, value.clone());
        }
        Ok(value)
    }

    /// Executes a subquery with the current row pushed onto the outer
    /// scope stack.
    fn run_subquery(&self, query: &Query, row: &Row) -> Result<super::ResultSet> {
        let mut outer = self.outer.clone();
        outer.push(self.scope.clone().unwrap_or_default(), row.clone());
        self.engine.run_query(query, self.params, &outer, self.ctx)
    }

    fn subquery_is_correlated(&self, query: &Query) -> bool {
        !super::plan::foreign_qualifiers(query).is_empty()
    }

    fn resolve_column(&self, row: &Row, table: Option<&str>, name: &str) -> Result<Value> {
        if let Some(value) = resolve_in_row(row, self.scope.as_deref(), table, name)? {
            return Ok(value);
        }
        // Outer scopes, innermost first.
        for (scope, outer_row) in self.outer.iter().rev() {
            let scope = if scope.is_empty() { None } else { Some(scope.as_str()) };
            if let Some(value) = resolve_in_row(outer_row, scope, table, name)? {
                return Ok(value);
            }
        }
        Err(Error::MissingColumn(match table {
            Some(table) => format!("{table}.{name}"),
            None => name.to_string(),
        }))
    }
}

/// Resolves a possibly-qualified column against one row.
fn resolve_in_row(
    row: &Row,
    scope: Option<&str>,
    table: Option<&str>,
    name: &str,
) -> Result<Option<Value>> {
    if let Some(table) = table {
        // Qualified: the qualifier must match the row's scope or a cell
        // prefix.
        if let Some(value) = row.get(&format!("{table}.{name}")) {
            return Ok(Some(value.clone()));
        }
        if scope.is_some_and(|s| s.eq_ignore_ascii_case(table)) {
            if let Some(value) = row.get(name) {
                return Ok(Some(value.clone()));
            }
        }
        return Ok(None);
    }
    if let Some(value) = row.get(name) {
        return Ok(Some(value.clone()));
    }
    // Bare name against qualified cells: a unique suffix match.
    let suffix = format!(".{name}");
    let mut found: Option<&Value> = None;
    for (cell, value) in row.iter() {
        if cell.ends_with(&suffix) {
            if found.is_some() {
                return Err(Error::AmbiguousReference(name.to_string()));
            }
            found = Some(value);
        }
    }
    Ok(found.cloned())
}

/// Converts a value into SQL boolean-ish: `None` for NULL.
pub(crate) fn sql_bool(value: &Value) -> Option<bool> {
    if value.is_null() {
        None
    } else {
        Some(value_ops::truthy(value))
    }
}

/// The address of an expression node, used as an identity key for
/// aggregate/window overrides and the scalar-subquery cache.
pub(crate) fn expr_key(expr: &Expr) -> usize {
    std::ptr::from_ref(expr) as usize
}

pub(crate) fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Integer(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Text(s.clone()),
        Literal::Blob(b) => Value::Blob(b.clone()),
    }
}

/// Built-in scalar functions available in any row context.
fn scalar_function(name: &str, args: &[Value]) -> Result<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    match name {
        "COALESCE" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        "NULLIF" => {
            let (a, b) = (arg(0), arg(1));
            if value_ops::value_eq(&a, &b) == Some(true) {
                Ok(Value::Null)
            } else {
                Ok(a)
            }
        }
        "UPPER" => Ok(match arg(0) {
            Value::Text(s) => Value::Text(s.to_uppercase()),
            other => other,
        }),
        "LOWER" => Ok(match arg(0) {
            Value::Text(s) => Value::Text(s.to_lowercase()),
            other => other,
        }),
        "LENGTH" => Ok(match arg(0) {
            Value::Null => Value::Null,
            Value::Text(s) => Value::Int(s.chars().count() as i64),
            Value::Blob(b) => Value::Int(b.len() as i64),
            other => Value::Int(value_ops::text_of(&other).chars().count() as i64),
        }),
        "ABS" => match arg(0) {
            Value::Null => Ok(Value::Null),
            Value::Int(n) => Ok(Value::Int(n.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
            other => Err(Error::TypeMismatch(format!(
                "ABS expects a number, got {}",
                other.to_sql_inline()
            ))),
        },
        "ROUND" => {
            let digits = match arg(1) {
                Value::Null => 0,
                other => value_ops::as_i64(&other).unwrap_or(0),
            };
            match arg(0) {
                Value::Null => Ok(Value::Null),
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Float(f) => {
                    let factor = 10_f64.powi(digits as i32);
                    Ok(Value::Float((f * factor).round() / factor))
                }
                Value::Decimal(d) => Ok(Value::Decimal(d.round_dp(digits.max(0) as u32))),
                other => Err(Error::TypeMismatch(format!(
                    "ROUND expects a number, got {}",
                    other.to_sql_inline()
                ))),
            }
        }
        _ => Err(Error::unsupported(format!("unknown function {name}()"))),
    }
}

/// `CAST(expr AS type)` conversion, driven by the target's value family.
fn cast_value(value: &Value, data_type: &DataType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let fail = || {
        Error::TypeMismatch(format!(
            "cannot cast {} to {data_type}",
            value.to_sql_inline()
        ))
    };
    match data_type.family {
        TypeFamily::Int => value_ops::as_i64(value).map(Value::Int).ok_or_else(fail),
        TypeFamily::Float => value_ops::as_f64(value).map(Value::Float).ok_or_else(fail),
        TypeFamily::Decimal => value_ops::as_decimal(value)
            .map(Value::Decimal)
            .ok_or_else(fail),
        TypeFamily::Text => Ok(Value::Text(value_ops::text_of(value))),
        TypeFamily::Bool => Ok(Value::Bool(value_ops::truthy(value))),
        TypeFamily::Binary => match value {
            Value::Blob(b) => Ok(Value::Blob(b.clone())),
            Value::Text(s) => Ok(Value::Blob(s.clone().into_bytes())),
            _ => Err(fail()),
        },
        TypeFamily::Date | TypeFamily::Time | TypeFamily::DateTime => Ok(value.clone()),
    }
}
