//! Aggregate evaluation: COUNT/SUM/AVG/MIN/MAX, user aggregates,
//! DISTINCT arguments, GROUP BY and HAVING.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use sqlit_core::ast::{Expr, FunctionCall, SelectStatement};
use sqlit_core::Value;

use super::eval::{expr_key, Evaluator};
use super::select;
use super::ResultSet;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::table::{SharedTable, Table};
use crate::value_ops;

/// A host-registered aggregate: a step function folding argument tuples
/// into an accumulator, a finaliser, and the expected arity (`-1` for
/// variadic).
pub struct AggregateSpec {
    /// Folds one argument tuple into the accumulator.
    pub step: Arc<dyn Fn(&mut Value, &[Value]) + Send + Sync>,
    /// Produces the result from the accumulator.
    pub finalize: Arc<dyn Fn(Value) -> Value + Send + Sync>,
    /// Expected argument count; `-1` accepts any arity.
    pub arg_count: i32,
}

const BUILTINS: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// `true` when the name is a built-in aggregate.
pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// `true` when any projected column or the HAVING clause contains an
/// aggregate call (outside a window).
pub(crate) fn select_has_aggregates(
    select: &SelectStatement,
    ev: &Evaluator<'_>,
) -> bool {
    let mut found = false;
    let mut check = |expr: &Expr| {
        collect_calls_into(expr, ev, &mut |_| found = true);
    };
    for col in &select.columns {
        check(&col.expr);
    }
    if let Some(having) = &select.having {
        check(having);
    }
    found || !select.group_by.is_empty()
}

/// Walks `expr` calling `f` for every aggregate call, without descending
/// into window specs or subqueries (those evaluate in their own context).
fn collect_calls_into<'e>(expr: &'e Expr, ev: &Evaluator<'_>, f: &mut impl FnMut(&'e Expr)) {
    match expr {
        Expr::Function(call) if ev.engine.is_aggregate(&call.name.to_uppercase()) => f(expr),
        Expr::Window { .. }
        | Expr::Subquery(_)
        | Expr::Exists { .. }
        | Expr::Quantified { .. } => {}
        Expr::Binary { left, right, .. } => {
            collect_calls_into(left, ev, f);
            collect_calls_into(right, ev, f);
        }
        Expr::Unary { operand, .. } => collect_calls_into(operand, ev, f),
        Expr::Paren(inner) => collect_calls_into(inner, ev, f),
        Expr::Function(call) => {
            for arg in &call.args {
                collect_calls_into(arg, ev, f);
            }
        }
        Expr::IsNull { expr: inner, .. } => collect_calls_into(inner, ev, f),
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            collect_calls_into(inner, ev, f);
            collect_calls_into(low, ev, f);
            collect_calls_into(high, ev, f);
        }
        Expr::In { expr: inner, .. } => collect_calls_into(inner, ev, f),
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(operand) = operand {
                collect_calls_into(operand, ev, f);
            }
            for (when, then) in when_clauses {
                collect_calls_into(when, ev, f);
                collect_calls_into(then, ev, f);
            }
            if let Some(else_clause) = else_clause {
                collect_calls_into(else_clause, ev, f);
            }
        }
        Expr::Cast { expr: inner, .. } => collect_calls_into(inner, ev, f),
        _ => {}
    }
}

enum AggKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Custom(Arc<AggregateSpec>),
}

/// One aggregate call site within the query.
struct CallSite<'q> {
    key: usize,
    call: &'q FunctionCall,
    kind: AggKind,
}

/// Per-group accumulation state for one call site.
struct AggState {
    acc: Value,
    count: i64,
    seen: HashSet<String>,
}

impl AggState {
    fn new() -> Self {
        Self {
            acc: Value::Null,
            count: 0,
            seen: HashSet::new(),
        }
    }
}

struct Group {
    sample: Row,
    states: Vec<AggState>,
}

/// Runs the aggregate path of a SELECT over the already-filtered source.
pub(crate) fn run(
    select: &SelectStatement,
    source: &SharedTable,
    ev: &Evaluator<'_>,
) -> Result<ResultSet> {
    let sites = collect_sites(select, ev)?;

    // Group rows by the serialised GROUP BY tuple.
    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for (_, row) in source.scan() {
        ev.ctx.tick()?;
        let mut group_key = String::new();
        for expr in &select.group_by {
            let value = ev.eval(expr, &row)?;
            group_key.push_str(&value_ops::serialize_value(&value));
            group_key.push('\u{1f}');
        }
        let group = groups.entry(group_key).or_insert_with(|| Group {
            sample: row.clone(),
            states: sites.iter().map(|_| AggState::new()).collect(),
        });
        for (site, state) in sites.iter().zip(&mut group.states) {
            step_site(site, state, &row, ev)?;
        }
    }

    // No input rows: a grand total still produces one finalised row, a
    // grouped query produces none.
    if groups.is_empty() && select.group_by.is_empty() {
        groups.insert(String::new(), Group {
            sample: Row::new(),
            states: sites.iter().map(|_| AggState::new()).collect(),
        });
    }

    let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
    for group in groups.into_values() {
        ev.ctx.tick()?;
        let mut overrides: HashMap<usize, Value> = HashMap::new();
        for (site, state) in sites.iter().zip(group.states) {
            overrides.insert(site.key, finalize_site(site, state));
        }
        let group_ev = ev.with_overrides(&overrides);
        let result_row = select::project_columns(&select.columns, &group.sample, &group_ev)?;

        // HAVING and ORDER BY see both the group's source columns and the
        // produced aliases; aggregate calls resolve through the overrides.
        let mut env = group.sample.clone();
        for (name, value) in result_row.iter() {
            env.set(name.to_string(), value.clone());
        }
        if let Some(having) = &select.having {
            if !group_ev.matches(having, &env)? {
                continue;
            }
        }
        let keys = select::order_key_values(&select.order_by, &result_row, &env, &group_ev)?;
        keyed.push((keys, result_row));
    }

    select::finish_keyed(select, keyed, ev)
}

fn collect_sites<'q>(
    select: &'q SelectStatement,
    ev: &Evaluator<'_>,
) -> Result<Vec<CallSite<'q>>> {
    let mut sites: Vec<CallSite<'q>> = Vec::new();
    {
        let mut push = |expr: &'q Expr| {
            let Expr::Function(call) = expr else { return };
            sites.push(CallSite {
                key: expr_key(expr),
                call,
                kind: kind_of(&call.name.to_uppercase(), ev),
            });
        };
        for col in &select.columns {
            collect_calls_into(&col.expr, ev, &mut push);
        }
        if let Some(having) = &select.having {
            collect_calls_into(having, ev, &mut push);
        }
        for ob in &select.order_by {
            collect_calls_into(&ob.expr, ev, &mut push);
        }
    }
    for site in &sites {
        if let AggKind::Custom(spec) = &site.kind {
            let expected = spec.arg_count;
            if expected >= 0 && site.call.args.len() != expected as usize {
                return Err(Error::TypeMismatch(format!(
                    "{}() takes {expected} arguments, got {}",
                    site.call.name,
                    site.call.args.len()
                )));
            }
        }
    }
    Ok(sites)
}

fn kind_of(name: &str, ev: &Evaluator<'_>) -> AggKind {
    match name {
        "COUNT" => AggKind::Count,
        "SUM" => AggKind::Sum,
        "AVG" => AggKind::Avg,
        "MIN" => AggKind::Min,
        "MAX" => AggKind::Max,
        other => AggKind::Custom(
            ev.engine
                .custom_aggregate(other)
                .unwrap_or_else(|| unreachable!("collect only sees registered aggregates")),
        ),
    }
}

fn step_site(
    site: &CallSite<'_>,
    state: &mut AggState,
    row: &Row,
    ev: &Evaluator<'_>,
) -> Result<()> {
    // COUNT(*) counts rows; the wildcard argument never evaluates.
    let star = site
        .call
        .args
        .iter()
        .any(|arg| matches!(arg, Expr::Wildcard { .. }));
    let args: Vec<Value> = if star {
        vec![]
    } else {
        site.call
            .args
            .iter()
            .map(|arg| ev.eval(arg, row))
            .collect::<Result<_>>()?
    };

    if site.call.distinct && !star {
        let mut dedup_key = String::new();
        for value in &args {
            dedup_key.push_str(&value_ops::serialize_value(value));
            dedup_key.push('\u{1f}');
        }
        if !state.seen.insert(dedup_key) {
            return Ok(());
        }
    }

    match &site.kind {
        AggKind::Count => {
            if star || args.first().is_some_and(|v| !v.is_null()) {
                state.count += 1;
            }
        }
        AggKind::Sum | AggKind::Avg => {
            if let Some(value) = args.first().filter(|v| !v.is_null()) {
                state.count += 1;
                state.acc = if state.acc.is_null() {
                    value.clone()
                } else {
                    value_ops::arithmetic(sqlit_core::ast::BinaryOp::Add, &state.acc, value)?
                };
            }
        }
        AggKind::Min => {
            if let Some(value) = args.first().filter(|v| !v.is_null()) {
                if state.acc.is_null()
                    || value_ops::value_cmp(value, &state.acc)
                        .is_some_and(std::cmp::Ordering::is_lt)
                {
                    state.acc = value.clone();
                }
            }
        }
        AggKind::Max => {
            if let Some(value) = args.first().filter(|v| !v.is_null()) {
                if state.acc.is_null()
                    || value_ops::value_cmp(value, &state.acc)
                        .is_some_and(std::cmp::Ordering::is_gt)
                {
                    state.acc = value.clone();
                }
            }
        }
        AggKind::Custom(spec) => {
            (spec.step)(&mut state.acc, &args);
        }
    }
    Ok(())
}

fn finalize_site(site: &CallSite<'_>, state: AggState) -> Value {
    match &site.kind {
        AggKind::Count => Value::Int(state.count),
        AggKind::Sum | AggKind::Min | AggKind::Max => state.acc,
        AggKind::Avg => {
            if state.count == 0 {
                Value::Null
            } else {
                value_ops::arithmetic(
                    sqlit_core::ast::BinaryOp::Div,
                    &state.acc,
                    &Value::Int(state.count),
                )
                .unwrap_or(Value::Null)
            }
        }
        AggKind::Custom(spec) => (spec.finalize)(state.acc),
    }
}
