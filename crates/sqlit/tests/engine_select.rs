//! SELECT evaluation against registered tables: projection, predicate
//! push-down, ordering, pagination, DISTINCT, and parameters.

mod common;
use common::*;

use sqlit::{Error, Params, Value};

#[test]
fn select_star_returns_full_rows() {
    let engine = engine_with_users();
    let rows = query(&engine, "SELECT * FROM users");
    assert_eq!(rows.len(), 5);
    assert_eq!(
        rows[0].columns().collect::<Vec<_>>(),
        vec!["id", "name", "age", "org"]
    );
}

#[test]
fn projection_by_name_and_alias() {
    let engine = engine_with_users();
    let rows = query(&engine, "SELECT name, age AS years FROM users WHERE name = 'ada'");
    assert_eq!(texts(&rows, "name"), vec!["ada"]);
    assert_eq!(ints(&rows, "years"), vec![36]);
}

#[test]
fn select_without_from() {
    let engine = engine_with_users();
    let rows = query(&engine, "SELECT 1 + 1");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].first(), Some(&Value::Int(2)));
}

#[test]
fn where_comparison_operators() {
    let engine = engine_with_users();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age > 60"), "name"),
        vec!["grace", "edsger"]
    );
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age <= 41"), "name"),
        vec!["ada", "alan"]
    );
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE name != 'ada'"), "name"),
        vec!["alan", "grace", "edsger", "barbara"]
    );
}

#[test]
fn literal_on_left_is_normalised() {
    let engine = engine_with_users();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE 60 < age"), "name"),
        vec!["grace", "edsger"]
    );
}

#[test]
fn arithmetic_on_the_column_side_is_solved() {
    let engine = engine_with_users();
    // age + 10 > 70  →  age > 60
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age + 10 > 70"), "name"),
        vec!["grace", "edsger"]
    );
    // 100 - age < 30  →  age > 70
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE 100 - age < 30"), "name"),
        vec!["grace", "edsger"]
    );
    // age * 2 >= 144  →  age >= 72
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age * 2 >= 144"), "name"),
        vec!["grace", "edsger"]
    );
}

#[test]
fn constant_conditions_fold() {
    let engine = engine_with_users();
    assert_eq!(query(&engine, "SELECT name FROM users WHERE 1 = 1").len(), 5);
    assert!(query(&engine, "SELECT name FROM users WHERE 1 = 0").is_empty());
}

#[test]
fn comparison_with_null_matches_nothing() {
    let engine = engine_with_users();
    assert!(query(&engine, "SELECT name FROM users WHERE age = NULL").is_empty());
    assert!(query(&engine, "SELECT name FROM users WHERE age > NULL").is_empty());
    // NULL propagating through arithmetic is just as UNKNOWN.
    assert!(query(&engine, "SELECT name FROM users WHERE age + NULL > 1").is_empty());
}

#[test]
fn is_null_and_is_not_null() {
    let engine = engine_with_users();
    engine
        .exec(
            "INSERT INTO users (name, age, org) VALUES ('anon', NULL, 'acme')",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age IS NULL"), "name"),
        vec!["anon"]
    );
    assert_eq!(query(&engine, "SELECT name FROM users WHERE age IS NOT NULL").len(), 5);
}

#[test]
fn between_and_not_between() {
    let engine = engine_with_users();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age BETWEEN 40 AND 60"), "name"),
        vec!["alan", "barbara"]
    );
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE age NOT BETWEEN 40 AND 60"), "name"),
        vec!["ada", "grace", "edsger"]
    );
}

#[test]
fn like_patterns() {
    let engine = engine_with_users();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE name LIKE 'a%'"), "name"),
        vec!["ada", "alan"]
    );
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE name LIKE '_da'"), "name"),
        vec!["ada"]
    );
}

#[test]
fn in_list_probes_the_primary_index() {
    let engine = engine_with_sequence(1_000);
    let rows = query(&engine, "SELECT * FROM t WHERE id IN (3, 7, 42)");
    assert_eq!(ints(&rows, "id"), vec![3, 7, 42]);
}

#[test]
fn in_empty_list_matches_nothing() {
    let engine = engine_with_users();
    let q = engine
        .from_sql("SELECT name FROM users", Params::new())
        .in_values::<i64, _>("age", [])
        .unwrap();
    assert!(q.rows().unwrap().is_empty());
}

#[test]
fn not_in_rejects_nulls() {
    let engine = engine_with_users();
    assert_eq!(
        query(&engine, "SELECT name FROM users WHERE age NOT IN (36, 41)").len(),
        3
    );
    // A NULL in the list makes NOT IN unknown for every row.
    assert!(query(&engine, "SELECT name FROM users WHERE age NOT IN (36, NULL)").is_empty());
}

#[test]
fn or_of_pushable_predicates() {
    let engine = engine_with_users();
    assert_eq!(
        texts(
            &query(&engine, "SELECT name FROM users WHERE age < 40 OR org = 'navy'"),
            "name"
        ),
        vec!["ada", "grace"]
    );
}

#[test]
fn or_with_unpushable_side_falls_back() {
    let engine = engine_with_users();
    // LENGTH() cannot be pushed; the whole OR is evaluated row by row.
    assert_eq!(
        texts(
            &query(
                &engine,
                "SELECT name FROM users WHERE LENGTH(name) = 3 OR age > 80"
            ),
            "name"
        ),
        vec!["ada", "grace"]
    );
}

#[test]
fn not_prefix_subtracts_the_matching_set() {
    let engine = engine_with_users();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users WHERE NOT age > 60"), "name"),
        vec!["ada", "alan", "barbara"]
    );
}

#[test]
fn order_by_directions_and_multiple_keys() {
    let engine = engine_with_users();
    assert_eq!(
        texts(&query(&engine, "SELECT name FROM users ORDER BY age DESC"), "name"),
        vec!["grace", "edsger", "barbara", "alan", "ada"]
    );
    assert_eq!(
        texts(
            &query(&engine, "SELECT name FROM users ORDER BY org, age DESC"),
            "name"
        ),
        vec!["alan", "ada", "grace", "edsger", "barbara"]
    );
}

#[test]
fn order_by_expression_and_position() {
    let engine = engine_with_users();
    assert_eq!(
        texts(
            &query(&engine, "SELECT name FROM users ORDER BY age * -1"),
            "name"
        ),
        vec!["grace", "edsger", "barbara", "alan", "ada"]
    );
    assert_eq!(
        texts(&query(&engine, "SELECT name, age FROM users ORDER BY 2 DESC"), "name"),
        vec!["grace", "edsger", "barbara", "alan", "ada"]
    );
}

#[test]
fn order_by_column_dropped_by_projection() {
    let engine = engine_with_users();
    // `org` is not projected; the engine keeps the original row for the
    // sort key.
    assert_eq!(
        texts(
            &query(&engine, "SELECT name FROM users ORDER BY org DESC, age"),
            "name"
        ),
        vec!["barbara", "edsger", "grace", "ada", "alan"]
    );
}

#[test]
fn limit_and_offset() {
    let engine = engine_with_sequence(20);
    let rows = query(&engine, "SELECT id FROM t ORDER BY id LIMIT 5 OFFSET 3");
    assert_eq!(ints(&rows, "id"), vec![4, 5, 6, 7, 8]);
}

#[test]
fn distinct_deduplicates_projected_rows() {
    let engine = engine_with_users();
    let rows = query(&engine, "SELECT DISTINCT org FROM users ORDER BY org");
    assert_eq!(texts(&rows, "org"), vec!["acme", "navy", "univ"]);
}

#[test]
fn scalar_functions_and_case() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "SELECT UPPER(name) AS loud, CASE WHEN age >= 65 THEN 'retired' ELSE 'working' END AS phase \
         FROM users WHERE name = 'grace'",
    );
    assert_eq!(texts(&rows, "loud"), vec!["GRACE"]);
    assert_eq!(texts(&rows, "phase"), vec!["retired"]);
}

#[test]
fn positional_and_named_parameters() {
    let engine = engine_with_users();
    let rows = engine
        .query(
            "SELECT name FROM users WHERE age > ? AND org = :org",
            Params::positional([50]).with_named("org", "univ"),
        )
        .unwrap();
    assert_eq!(texts(&rows, "name"), vec!["edsger", "barbara"]);
}

#[test]
fn missing_parameters_error_before_execution() {
    let engine = engine_with_users();
    let err = engine
        .query("SELECT * FROM users WHERE age > ?", Params::new())
        .unwrap_err();
    assert!(matches!(err, Error::NotEnoughParameters { .. }));

    let err = engine
        .query("SELECT * FROM users WHERE org = :org", Params::new())
        .unwrap_err();
    assert!(matches!(err, Error::MissingParameter(name) if name == "org"));
}

#[test]
fn missing_table_is_reported() {
    let engine = engine_with_users();
    let err = engine.query("SELECT * FROM nope", Params::new()).unwrap_err();
    assert!(matches!(err, Error::MissingTable(name) if name == "nope"));
}

#[test]
fn table_names_are_case_insensitive() {
    let engine = engine_with_users();
    assert_eq!(query(&engine, "SELECT * FROM USERS").len(), 5);
}

#[test]
fn derived_table_in_from() {
    let engine = engine_with_users();
    let rows = query(
        &engine,
        "SELECT t.name FROM (SELECT name, age FROM users WHERE age < 60) AS t ORDER BY t.age DESC",
    );
    assert_eq!(texts(&rows, "name"), vec!["barbara", "alan", "ada"]);
}

#[test]
fn query_surface_helpers() {
    let engine = engine_with_users();
    let one = engine
        .query_one("SELECT name FROM users ORDER BY age DESC", Params::new())
        .unwrap()
        .unwrap();
    assert_eq!(one.get("name"), Some(&Value::Text("grace".into())));

    let field = engine
        .query_field("SELECT COUNT(*) FROM users", Params::new())
        .unwrap();
    assert_eq!(field, Some(Value::Int(5)));

    let column = engine
        .query_column("SELECT name FROM users WHERE org = 'acme' ORDER BY name", Params::new())
        .unwrap();
    assert_eq!(
        column,
        vec![Value::Text("ada".into()), Value::Text("alan".into())]
    );
}

#[test]
fn syntax_errors_surface_as_parse_failures() {
    let engine = engine_with_users();
    assert!(matches!(
        engine.query("SELEC * FROM users", Params::new()),
        Err(Error::Syntax(_))
    ));
}

#[test]
fn query_timeout_terminates_long_scans() {
    let engine = engine_with_sequence(5_000);
    engine.set_query_timeout(Some(std::time::Duration::ZERO));
    let err = engine
        .query("SELECT * FROM t WHERE LENGTH(id) >= 0", Params::new())
        .unwrap_err();
    assert!(matches!(err, Error::QueryTimeout(_)));
    engine.set_query_timeout(None);
    assert_eq!(query(&engine, "SELECT COUNT(*) FROM t").len(), 1);
}
