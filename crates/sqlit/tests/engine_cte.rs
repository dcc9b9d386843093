//! Common table expressions: plain, chained, recursive, and the
//! transient registration contract.

mod common;
use common::*;

use sqlit::{Error, Params};

#[test]
fn cte_is_queryable_by_name() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "WITH seniors AS (SELECT name, age FROM users WHERE age >= 58) \
         SELECT name FROM seniors ORDER BY age",
    );
    assert_eq!(texts(&rows, "name"), vec!["barbara", "edsger", "grace"]);
}

#[test]
fn cte_declared_columns_rename_positionally() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "WITH n (who, years) AS (SELECT name, age FROM users WHERE age > 80) \
         SELECT who, years FROM n",
    );
    assert_eq!(texts(&rows, "who"), vec!["grace"]);
    assert_eq!(ints(&rows, "years"), vec![85]);
}

#[test]
fn later_ctes_reference_earlier_ones() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "WITH adults AS (SELECT name, age FROM users WHERE age >= 41), \
              elders AS (SELECT name FROM adults WHERE age >= 72) \
         SELECT name FROM elders ORDER BY name",
    );
    assert_eq!(texts(&rows, "name"), vec!["edsger", "grace"]);
}

#[test]
fn cte_shadows_a_registered_table() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "WITH users AS (SELECT 'only' AS name) SELECT name FROM users",
    );
    assert_eq!(texts(&rows, "name"), vec!["only"]);
    // The shadow is gone once the statement finishes.
    assert_eq!(query(&engine, "SELECT name FROM users").len(), 5);
}

#[test]
fn recursive_cte_counts_to_five() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "WITH RECURSIVE n (x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 5) \
         SELECT x FROM n",
    );
    assert_eq!(ints(&rows, "x"), vec![1, 2, 3, 4, 5]);
}

#[test]
fn recursive_cte_walks_a_hierarchy() {
    let engine = sqlit::Engine::new();
    let tree = sqlit::MemoryTable::new("tree")
        .with_column("id", sqlit::ColumnInfo::new(sqlit::ColumnType::Int))
        .with_column("parent", sqlit::ColumnInfo::new(sqlit::ColumnType::Int));
    for (id, parent) in [(1, 0), (2, 1), (3, 1), (4, 2), (5, 9)] {
        tree.insert(sqlit::row!("id" => id, "parent" => parent))
            .unwrap();
    }
    engine.register_table("tree", std::sync::Arc::new(tree));

    let rows = query(
        &engine,
        "WITH RECURSIVE sub (id) AS (\
            SELECT id FROM tree WHERE parent = 0 \
            UNION ALL \
            SELECT t.id FROM tree t INNER JOIN sub s ON t.parent = s.id) \
         SELECT id FROM sub ORDER BY id",
    );
    assert_eq!(ints(&rows, "id"), vec![1, 2, 3, 4]);
}

#[test]
fn recursion_cap_is_enforced() {
    let engine = engine_with_users();
    engine.set_recursion_limit(10);
    let err = engine
        .query(
            "WITH RECURSIVE n (x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT x FROM n",
            Params::new(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::RecursionLimit { limit: 10, .. }));
}

#[test]
fn recursive_union_distinct_converges() {
    let engine = engine_with_users();
    // Without ALL, the repeated row is dropped and iteration stops.
    let rows = query(
        &engine,
        "WITH RECURSIVE n (x) AS (SELECT 1 UNION SELECT x FROM n) SELECT x FROM n",
    );
    assert_eq!(ints(&rows, "x"), vec![1]);
}

#[test]
fn temporary_registration_is_removed_after_errors() {
    let engine = engine_with_users();
    let err = engine
        .query(
            "WITH tmp AS (SELECT name FROM users) SELECT missing_column FROM tmp",
            Params::new(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::MissingColumn(_)));
    // `tmp` must not linger in the registry.
    let err = engine.query("SELECT * FROM tmp", Params::new()).unwrap_err();
    assert!(matches!(err, Error::MissingTable(name) if name == "tmp"));
}
