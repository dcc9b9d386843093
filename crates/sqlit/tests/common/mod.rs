#![allow(dead_code)]

use std::sync::Arc;

use sqlit::{
    row, ColumnInfo, ColumnType, Engine, IndexHint, MemoryTable, Params, Row, Value,
};

/// Opt-in tracing for test debugging: `RUST_LOG=sqlit=trace cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// An engine with a `users(id PRIMARY, name, age, org)` table.
pub fn engine_with_users() -> Engine {
    init_tracing();
    let engine = Engine::new();
    let users = MemoryTable::new("users")
        .with_column(
            "id",
            ColumnInfo::new(ColumnType::Int).with_index(IndexHint::Primary),
        )
        .with_column("name", ColumnInfo::new(ColumnType::Text))
        .with_column("age", ColumnInfo::new(ColumnType::Int))
        .with_column("org", ColumnInfo::new(ColumnType::Text));
    for (name, age, org) in [
        ("ada", 36, "acme"),
        ("alan", 41, "acme"),
        ("grace", 85, "navy"),
        ("edsger", 72, "univ"),
        ("barbara", 58, "univ"),
    ] {
        users
            .insert(row!("name" => name, "age" => age, "org" => org))
            .unwrap();
    }
    engine.register_table("users", Arc::new(users));
    engine
}

/// Adds an `orders(id PRIMARY, user_id, total)` table to the engine.
pub fn add_orders(engine: &Engine, rows: &[(i64, i64)]) {
    let orders = MemoryTable::new("orders")
        .with_column(
            "id",
            ColumnInfo::new(ColumnType::Int).with_index(IndexHint::Primary),
        )
        .with_column("user_id", ColumnInfo::new(ColumnType::Int))
        .with_column("total", ColumnInfo::new(ColumnType::Int));
    for (user_id, total) in rows {
        orders
            .insert(row!("user_id" => *user_id, "total" => *total))
            .unwrap();
    }
    engine.register_table("orders", Arc::new(orders));
}

/// An engine with a single-column `t(id)` table holding `1..=n`.
pub fn engine_with_sequence(n: i64) -> Engine {
    let engine = Engine::new();
    let t = MemoryTable::new("t").with_column(
        "id",
        ColumnInfo::new(ColumnType::Int).with_index(IndexHint::Primary),
    );
    for id in 1..=n {
        t.insert(row!("id" => id)).unwrap();
    }
    engine.register_table("t", Arc::new(t));
    engine
}

pub fn query(engine: &Engine, sql: &str) -> Vec<Row> {
    engine
        .query(sql, Params::new())
        .unwrap_or_else(|e| panic!("query failed: {sql}\n{e}"))
}

/// The named column of every row, as i64.
pub fn ints(rows: &[Row], column: &str) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.get(column) {
            Some(Value::Int(n)) => *n,
            other => panic!("expected integer in {column}, got {other:?}"),
        })
        .collect()
}

/// The named column of every row, as text.
pub fn texts(rows: &[Row], column: &str) -> Vec<String> {
    rows.iter()
        .map(|row| match row.get(column) {
            Some(Value::Text(s)) => s.clone(),
            other => panic!("expected text in {column}, got {other:?}"),
        })
        .collect()
}
