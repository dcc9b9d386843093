//! Subqueries: scalar, IN, EXISTS (correlated and not), quantified
//! comparisons.

mod common;
use common::*;

use sqlit::Value;

fn orgs_engine() -> sqlit::Engine {
    let engine = engine_with_users();
    add_orders(&engine, &[(1, 10), (3, 5), (3, 7)]);
    engine
}

#[test]
fn scalar_subquery_in_projection() {
    let engine = orgs_engine();
    let row = query(
        &engine,
        "SELECT name, (SELECT MAX(total) FROM orders) AS top FROM users WHERE name = 'ada'",
    )
    .remove(0);
    assert_eq!(row.get("top"), Some(&Value::Int(10)));
}

#[test]
fn correlated_scalar_subquery() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT name, (SELECT SUM(total) FROM orders WHERE orders.user_id = users.id) AS spent \
         FROM users ORDER BY id",
    );
    assert_eq!(rows[0].get("spent"), Some(&Value::Int(10)));
    assert_eq!(rows[1].get("spent"), Some(&Value::Null));
    assert_eq!(rows[2].get("spent"), Some(&Value::Int(12)));
}

#[test]
fn in_subquery() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT name FROM users WHERE id IN (SELECT user_id FROM orders) ORDER BY id",
    );
    assert_eq!(texts(&rows, "name"), vec!["ada", "grace"]);
}

#[test]
fn not_in_subquery() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT name FROM users WHERE id NOT IN (SELECT user_id FROM orders) ORDER BY id",
    );
    assert_eq!(texts(&rows, "name"), vec!["alan", "edsger", "barbara"]);
}

#[test]
fn exists_correlated() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT id FROM users u WHERE EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id) ORDER BY id",
    );
    assert_eq!(ints(&rows, "id"), vec![1, 3]);
}

#[test]
fn not_exists_correlated() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT id FROM users u WHERE NOT EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id) ORDER BY id",
    );
    assert_eq!(ints(&rows, "id"), vec![2, 4, 5]);
}

#[test]
fn exists_uncorrelated_decides_for_all_rows() {
    let engine = orgs_engine();
    assert_eq!(
        query(&engine, "SELECT id FROM users WHERE EXISTS (SELECT 1 FROM orders)").len(),
        5
    );
    assert!(query(
        &engine,
        "SELECT id FROM users WHERE EXISTS (SELECT 1 FROM orders WHERE total > 100)"
    )
    .is_empty());
}

#[test]
fn exists_with_local_and_correlated_conditions() {
    let engine = orgs_engine();
    // total > 5 filters once; the user binding applies per row.
    let rows = query(
        &engine,
        "SELECT id FROM users u WHERE EXISTS (\
            SELECT 1 FROM orders o WHERE o.total > 5 AND o.user_id = u.id) ORDER BY id",
    );
    assert_eq!(ints(&rows, "id"), vec![1, 3]);
}

#[test]
fn exists_with_or_over_outer_references() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT id FROM users u WHERE EXISTS (\
            SELECT 1 FROM orders o WHERE o.user_id = u.id OR u.age > 80) ORDER BY id",
    );
    // grace (id 3) matches on orders; everyone also matches when the
    // outer row itself satisfies age > 80 — that is grace again.
    assert_eq!(ints(&rows, "id"), vec![1, 3]);
}

#[test]
fn quantified_any_and_all() {
    let engine = orgs_engine();
    let rows = query(
        &engine,
        "SELECT name FROM users WHERE id < ANY (SELECT user_id FROM orders) ORDER BY id",
    );
    assert_eq!(texts(&rows, "name"), vec!["ada", "alan"]);

    let rows = query(
        &engine,
        "SELECT name FROM users WHERE id >= ALL (SELECT user_id FROM orders) ORDER BY id",
    );
    assert_eq!(texts(&rows, "name"), vec!["grace", "edsger", "barbara"]);
}
