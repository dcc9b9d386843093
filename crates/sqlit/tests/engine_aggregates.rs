//! Aggregates: built-ins, DISTINCT arguments, GROUP BY, HAVING, and
//! user-registered aggregates.

mod common;
use common::*;

use sqlit::{Params, Value};

fn orders_engine() -> sqlit::Engine {
    let engine = engine_with_users();
    add_orders(&engine, &[(1, 10), (1, 20), (2, 5), (2, 5), (2, 5)]);
    engine
}

#[test]
fn count_sum_avg_min_max() {
    let engine = orders_engine();
    let row = query(
        &engine,
        "SELECT COUNT(*) AS n, SUM(total) AS s, AVG(total) AS a, MIN(total) AS lo, MAX(total) AS hi FROM orders",
    )
    .remove(0);
    assert_eq!(row.get("n"), Some(&Value::Int(5)));
    assert_eq!(row.get("s"), Some(&Value::Int(45)));
    assert_eq!(row.get("a"), Some(&Value::Int(9)));
    assert_eq!(row.get("lo"), Some(&Value::Int(5)));
    assert_eq!(row.get("hi"), Some(&Value::Int(20)));
}

#[test]
fn count_column_skips_nulls() {
    let engine = engine_with_users();
    engine
        .exec(
            "INSERT INTO users (name, age, org) VALUES ('anon', NULL, 'acme')",
            Params::new(),
        )
        .unwrap();
    let row = query(&engine, "SELECT COUNT(*) AS all_rows, COUNT(age) AS with_age FROM users")
        .remove(0);
    assert_eq!(row.get("all_rows"), Some(&Value::Int(6)));
    assert_eq!(row.get("with_age"), Some(&Value::Int(5)));
}

#[test]
fn count_distinct() {
    let engine = orders_engine();
    let row = query(&engine, "SELECT COUNT(DISTINCT total) AS n FROM orders").remove(0);
    assert_eq!(row.get("n"), Some(&Value::Int(3)));
}

#[test]
fn group_by_having_order() {
    let engine = orders_engine();
    let rows = query(
        &engine,
        "SELECT user_id, SUM(total) AS s FROM orders GROUP BY user_id HAVING s >= 15 ORDER BY user_id",
    );
    assert_eq!(ints(&rows, "user_id"), vec![1, 2]);
    assert_eq!(ints(&rows, "s"), vec![30, 15]);
}

#[test]
fn having_with_aggregate_expression() {
    let engine = orders_engine();
    let rows = query(
        &engine,
        "SELECT user_id FROM orders GROUP BY user_id HAVING COUNT(*) > 2",
    );
    assert_eq!(ints(&rows, "user_id"), vec![2]);
}

#[test]
fn order_by_aggregate() {
    let engine = orders_engine();
    let rows = query(
        &engine,
        "SELECT user_id FROM orders GROUP BY user_id ORDER BY SUM(total) DESC",
    );
    assert_eq!(ints(&rows, "user_id"), vec![1, 2]);
}

#[test]
fn grand_total_over_empty_input_yields_one_row() {
    let engine = orders_engine();
    let row = query(&engine, "SELECT COUNT(*) AS n, SUM(total) AS s FROM orders WHERE total > 100")
        .remove(0);
    assert_eq!(row.get("n"), Some(&Value::Int(0)));
    assert_eq!(row.get("s"), Some(&Value::Null));
}

#[test]
fn grouped_query_over_empty_input_yields_no_rows() {
    let engine = orders_engine();
    let rows = query(
        &engine,
        "SELECT user_id, COUNT(*) FROM orders WHERE total > 100 GROUP BY user_id",
    );
    assert!(rows.is_empty());
}

#[test]
fn aggregate_over_expression() {
    let engine = orders_engine();
    let row = query(&engine, "SELECT SUM(total * 2) AS s FROM orders").remove(0);
    assert_eq!(row.get("s"), Some(&Value::Int(90)));
}

#[test]
fn group_by_expression() {
    let engine = orders_engine();
    let rows = query(
        &engine,
        "SELECT COUNT(*) AS n FROM orders GROUP BY total > 9 ORDER BY n",
    );
    assert_eq!(ints(&rows, "n"), vec![2, 3]);
}

#[test]
fn user_registered_aggregate() {
    let engine = orders_engine();
    engine.create_aggregate(
        "product",
        |acc, args| {
            let factor = match args.first() {
                Some(Value::Int(n)) => *n,
                _ => return,
            };
            *acc = match &*acc {
                Value::Null => Value::Int(factor),
                Value::Int(current) => Value::Int(*current * factor),
                other => other.clone(),
            };
        },
        |acc| acc,
        1,
    );
    let row = query(&engine, "SELECT PRODUCT(total) AS p FROM orders WHERE user_id = 1").remove(0);
    assert_eq!(row.get("p"), Some(&Value::Int(200)));
}

#[test]
fn user_aggregate_arity_is_checked() {
    let engine = orders_engine();
    engine.create_aggregate("two_args", |_, _| {}, |acc| acc, 2);
    let err = engine
        .query("SELECT TWO_ARGS(total) FROM orders", Params::new())
        .unwrap_err();
    assert!(matches!(err, sqlit::Error::TypeMismatch(_)));
}
