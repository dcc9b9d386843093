//! Window function evaluation: ROW_NUMBER, RANK, DENSE_RANK.
//!
//! All input rows are materialised, partitioned by the serialised
//! PARTITION BY tuple, sorted within each partition by the window's own
//! ORDER BY, and decorated with per-row window values. The outer ORDER
//! BY, OFFSET and LIMIT then apply to the decorated rows.

use std::collections::HashMap;

use indexmap::IndexMap;
use sqlit_core::ast::{Expr, SelectStatement, WindowSpec};
use sqlit_core::Value;

use super::eval::{expr_key, Evaluator};
use super::select;
use super::ResultSet;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::table::{SharedTable, Table};
use crate::value_ops;

/// `true` when any projected column contains a window call.
pub(crate) fn select_has_windows(select: &SelectStatement) -> bool {
    select.columns.iter().any(|col| contains_window(&col.expr))
}

fn contains_window(expr: &Expr) -> bool {
    let mut found = false;
    sqlit_core::ast::visit::visit_expr(expr, &mut |e| {
        if matches!(e, Expr::Window { .. }) {
            found = true;
        }
    });
    found
}

struct WindowSite<'q> {
    key: usize,
    name: String,
    spec: &'q WindowSpec,
}

/// Runs the window path of a SELECT over the already-filtered source.
pub(crate) fn run(
    select: &SelectStatement,
    source: &SharedTable,
    ev: &Evaluator<'_>,
) -> Result<ResultSet> {
    let mut sites: Vec<WindowSite<'_>> = Vec::new();
    for col in &select.columns {
        collect_sites(&col.expr, &mut sites)?;
    }

    let mut rows: Vec<Row> = Vec::new();
    for (_, row) in source.scan() {
        ev.ctx.tick()?;
        rows.push(row);
    }

    // site key → row index → window value.
    let mut decorations: HashMap<usize, Vec<Value>> = HashMap::new();
    for site in &sites {
        decorations.insert(site.key, compute_site(site, &rows, ev)?);
    }

    let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        ev.ctx.tick()?;
        let overrides: HashMap<usize, Value> = sites
            .iter()
            .map(|site| {
                let value = decorations
                    .get(&site.key)
                    .and_then(|values| values.get(index))
                    .cloned()
                    .unwrap_or(Value::Null);
                (site.key, value)
            })
            .collect();
        let row_ev = ev.with_overrides(&overrides);
        let projected = select::project_columns(&select.columns, row, &row_ev)?;
        let keys = select::order_key_values(&select.order_by, &projected, row, &row_ev)?;
        keyed.push((keys, projected));
    }

    select::finish_keyed(select, keyed, ev)
}

fn collect_sites<'q>(expr: &'q Expr, sites: &mut Vec<WindowSite<'q>>) -> Result<()> {
    match expr {
        Expr::Window { function, spec } => {
            let name = function.name.to_uppercase();
            if !matches!(name.as_str(), "ROW_NUMBER" | "RANK" | "DENSE_RANK") {
                return Err(Error::unsupported(format!(
                    "window function {name}() is not supported"
                )));
            }
            sites.push(WindowSite {
                key: expr_key(expr),
                name,
                spec,
            });
            Ok(())
        }
        Expr::Binary { left, right, .. } => {
            collect_sites(left, sites)?;
            collect_sites(right, sites)
        }
        Expr::Unary { operand, .. } => collect_sites(operand, sites),
        Expr::Paren(inner) => collect_sites(inner, sites),
        Expr::Function(call) => {
            for arg in &call.args {
                collect_sites(arg, sites)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Computes one window function over every row, returning the value for
/// each input row index.
fn compute_site(
    site: &WindowSite<'_>,
    rows: &[Row],
    ev: &Evaluator<'_>,
) -> Result<Vec<Value>> {
    // Partition by the serialised PARTITION BY tuple, preserving input
    // order within each partition.
    let mut partitions: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (index, row) in rows.iter().enumerate() {
        let mut key = String::new();
        for expr in &site.spec.partition_by {
            let value = ev.eval(expr, row)?;
            key.push_str(&value_ops::serialize_value(&value));
            key.push('\u{1f}');
        }
        partitions.entry(key).or_default().push(index);
    }

    let mut out = vec![Value::Null; rows.len()];
    for indices in partitions.into_values() {
        // Sort the partition by the window's ORDER BY.
        let mut sort_keys: Vec<(Vec<Value>, usize)> = Vec::with_capacity(indices.len());
        for &index in &indices {
            let keys = site
                .spec
                .order_by
                .iter()
                .map(|ob| ev.eval(&ob.expr, &rows[index]))
                .collect::<Result<Vec<_>>>()?;
            sort_keys.push((keys, index));
        }
        sort_keys.sort_by(|(a, _), (b, _)| {
            for (i, ob) in site.spec.order_by.iter().enumerate() {
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

        // Assign rank values along the sorted partition.
        let mut previous_key: Option<String> = None;
        let mut rank: i64 = 0;
        let mut dense_rank: i64 = 0;
        for (position, (keys, index)) in sort_keys.iter().enumerate() {
            let key: String = keys
                .iter()
                .map(value_ops::serialize_value)
                .collect::<Vec<_>>()
                .join("\u{1f}");
            let changed = previous_key.as_ref() != Some(&key);
            if changed {
                rank = position as i64 + 1;
                dense_rank += 1;
                previous_key = Some(key);
            }
            out[*index] = Value::Int(match site.name.as_str() {
                "ROW_NUMBER" => position as i64 + 1,
                "RANK" => rank,
                "DENSE_RANK" => dense_rank,
                _ => unreachable!("validated in collect_sites"),
            });
        }
    }
    Ok(out)
}
