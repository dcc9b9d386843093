//! Query-builder composition: immutability, the pagination barrier,
//! limit/offset arithmetic, set operations with CTE merging, projection
//! narrowing, and the fast/slow execution paths.

mod common;
use common::*;

use sqlit::{Error, Params, QueryBuilder, Value};
use sqlit_core::dialect::GenericDialect;

fn seq_builder(engine: &sqlit::Engine) -> QueryBuilder {
    engine.from_sql("SELECT id FROM t", Params::new())
}

#[test]
fn mutators_leave_the_original_untouched() {
    let engine = engine_with_sequence(20);
    let base = seq_builder(&engine).order(Some("id")).unwrap();
    let narrowed = base.where_("id > ?", Params::positional([15])).unwrap();

    assert_eq!(ints(&narrowed.rows().unwrap(), "id"), vec![16, 17, 18, 19, 20]);
    // The original still produces every row, with identical SQL.
    assert_eq!(base.rows().unwrap().len(), 20);
}

#[test]
fn unmutated_builder_takes_the_fast_path() {
    let engine = engine_with_sequence(3);
    let q = seq_builder(&engine);
    assert!(q.is_unmutated());
    let (sql, params) = q.to_sql(&GenericDialect).unwrap();
    assert_eq!(sql, "SELECT id FROM t");
    assert!(params.is_empty());

    let mutated = q.limit(2).unwrap();
    assert!(!mutated.is_unmutated());
    let (sql, _) = mutated.to_sql(&GenericDialect).unwrap();
    assert_eq!(sql, "SELECT \"id\" FROM \"t\" LIMIT 2");
}

#[test]
fn pagination_barrier_filters_the_window() {
    let engine = engine_with_sequence(20);
    let window = seq_builder(&engine)
        .order(Some("id"))
        .unwrap()
        .limit(10)
        .unwrap();
    let filtered = window.where_("id > ?", Params::positional([5])).unwrap();
    // The predicate applies to the ten paginated rows, not the base set.
    assert_eq!(ints(&filtered.rows().unwrap(), "id"), vec![6, 7, 8, 9, 10]);
}

#[test]
fn limit_narrows_and_offset_adds() {
    let engine = engine_with_sequence(20);
    let q = seq_builder(&engine)
        .order(Some("id"))
        .unwrap()
        .limit(10)
        .unwrap()
        .offset(3)
        .unwrap()
        .limit(5)
        .unwrap();
    assert_eq!(ints(&q.rows().unwrap(), "id"), vec![4, 5, 6, 7, 8]);
}

#[test]
fn repeated_offsets_accumulate() {
    let engine = engine_with_sequence(20);
    let q = seq_builder(&engine)
        .order(Some("id"))
        .unwrap()
        .limit(10)
        .unwrap()
        .offset(2)
        .unwrap()
        .offset(3)
        .unwrap();
    // offset 5, limit 10 - 2 - 3 = 5.
    assert_eq!(ints(&q.rows().unwrap(), "id"), vec![6, 7, 8, 9, 10]);
}

#[test]
fn shorthand_predicates() {
    let engine = engine_with_users();
    let q = engine.table("users");
    assert_eq!(
        texts(&q.eq("org", "acme").unwrap().rows().unwrap(), "name"),
        vec!["ada", "alan"]
    );
    assert_eq!(
        texts(&q.gt("age", 70).unwrap().rows().unwrap(), "name"),
        vec!["grace", "edsger"]
    );
    assert_eq!(
        texts(&q.like("name", "a%").unwrap().rows().unwrap(), "name"),
        vec!["ada", "alan"]
    );
}

#[test]
fn eq_null_becomes_is_null() {
    let engine = engine_with_users();
    engine
        .exec(
            "INSERT INTO users (name, age, org) VALUES ('anon', NULL, 'x')",
            Params::new(),
        )
        .unwrap();
    let q = engine.table("users").eq("age", Value::Null).unwrap();
    assert_eq!(texts(&q.rows().unwrap(), "name"), vec!["anon"]);
}

#[test]
fn in_values_and_in_query() {
    let engine = engine_with_users();
    add_orders(&engine, &[(1, 10), (3, 5)]);

    let picked = engine.table("users").in_values("id", [1_i64, 3]).unwrap();
    assert_eq!(texts(&picked.rows().unwrap(), "name"), vec!["ada", "grace"]);

    let buyers = engine.from_sql("SELECT user_id FROM orders", Params::new());
    let q = engine.table("users").in_query("id", &buyers).unwrap();
    assert_eq!(texts(&q.rows().unwrap(), "name"), vec!["ada", "grace"]);
}

#[test]
fn or_where_requires_two_predicates() {
    let engine = engine_with_users();
    let err = engine
        .table("users")
        .or_where(&[("age > 80", Params::new())])
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));

    let q = engine
        .table("users")
        .or_where(&[
            ("age > ?", Params::positional([80])),
            ("org = ?", Params::positional([Value::Text("acme".into())])),
        ])
        .unwrap();
    assert_eq!(
        texts(&q.rows().unwrap(), "name"),
        vec!["ada", "alan", "grace"]
    );
}

#[test]
fn order_replaces_and_clears() {
    let engine = engine_with_users();
    let q = engine.table("users").order(Some("age DESC")).unwrap();
    assert_eq!(texts(&q.rows().unwrap(), "name")[0], "grace");
    let q = q.order(Some("name")).unwrap();
    assert_eq!(texts(&q.rows().unwrap(), "name")[0], "ada");
    let cleared = q.order(None).unwrap();
    assert_eq!(cleared.rows().unwrap().len(), 5);
}

#[test]
fn distinct_through_the_builder() {
    let engine = engine_with_users();
    let q = engine
        .from_sql("SELECT org FROM users", Params::new())
        .distinct()
        .unwrap();
    assert_eq!(q.rows().unwrap().len(), 3);
}

#[test]
fn union_merges_identical_ctes() {
    let engine = engine_with_users();
    let cte = engine.from_sql("SELECT id, org FROM users", Params::new());

    let a = engine
        .from_sql("SELECT id FROM c WHERE org = 'acme'", Params::new())
        .with_cte("c", &cte)
        .unwrap();
    let b = engine
        .from_sql("SELECT id FROM c WHERE org = 'navy'", Params::new())
        .with_cte("c", &cte)
        .unwrap();

    let union = a.union(&b).unwrap();
    let ast = union.query_ast().unwrap();
    let sqlit_core::ast::Query::With(with, _) = &*ast else {
        panic!("expected WITH");
    };
    assert_eq!(with.ctes.len(), 1);

    let mut ids = ints(&union.rows().unwrap(), "id");
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn union_rejects_conflicting_ctes() {
    let engine = engine_with_users();
    let a = engine
        .from_sql("SELECT id FROM c", Params::new())
        .with_cte("c", &engine.from_sql("SELECT id FROM users", Params::new()))
        .unwrap();
    let b = engine
        .from_sql("SELECT id FROM c", Params::new())
        .with_cte("c", &engine.from_sql("SELECT age FROM users", Params::new()))
        .unwrap();
    let err = a.union(&b).unwrap_err();
    assert!(matches!(err, Error::ConflictingCte(name) if name == "c"));
}

#[test]
fn with_cte_rejects_shadowing() {
    let engine = engine_with_users();
    let inner = engine.from_sql("SELECT id FROM users", Params::new());
    let q = engine
        .from_sql("SELECT id FROM c", Params::new())
        .with_cte("c", &inner)
        .unwrap();
    let err = q.with_cte("c", &inner).unwrap_err();
    assert!(matches!(err, Error::CteShadowing(name) if name == "c"));
}

#[test]
fn except_through_the_builder() {
    let engine = engine_with_users();
    let all = engine.from_sql("SELECT org FROM users", Params::new());
    let acme = engine.from_sql("SELECT org FROM users WHERE org = 'acme'", Params::new());
    let mut rest = texts(&all.except(&acme).unwrap().rows().unwrap(), "org");
    rest.sort();
    assert_eq!(rest, vec!["navy", "univ"]);
}

#[test]
fn columns_only_narrow() {
    let engine = engine_with_users();
    let narrowed = engine.table("users").columns(&["id", "name"]).unwrap();
    let row = narrowed.one().unwrap().unwrap();
    assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);

    let tighter = narrowed.columns(&["name"]).unwrap();
    assert_eq!(
        tighter.one().unwrap().unwrap().columns().collect::<Vec<_>>(),
        vec!["name"]
    );

    let err = narrowed.columns(&["org"]).unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
}

#[test]
fn select_wraps_previous_projection() {
    let engine = engine_with_users();
    let q = engine
        .table("users")
        .columns(&["age"])
        .unwrap()
        .select("MAX(age)")
        .unwrap();
    assert_eq!(q.field().unwrap(), Some(Value::Int(85)));
}

#[test]
fn terminal_readers() {
    let engine = engine_with_users();
    let q = engine.from_sql(
        "SELECT name, age FROM users ORDER BY age DESC",
        Params::new(),
    );
    assert_eq!(
        q.one().unwrap().unwrap().get("name"),
        Some(&Value::Text("grace".into()))
    );
    assert_eq!(q.field().unwrap(), Some(Value::Text("grace".into())));
    assert_eq!(q.column().unwrap().len(), 5);
    assert_eq!(q.count().unwrap(), 5);
    assert!(q.exists().unwrap());
    assert!(!engine
        .table("users")
        .eq("name", "nobody")
        .unwrap()
        .exists()
        .unwrap());
}

#[test]
fn count_survives_pagination_and_ctes() {
    let engine = engine_with_sequence(20);
    let q = seq_builder(&engine)
        .order(Some("id"))
        .unwrap()
        .limit(7)
        .unwrap();
    assert_eq!(q.count().unwrap(), 7);
}

#[test]
fn fragment_parameters_renumber_across_mutations() {
    let engine = engine_with_sequence(20);
    let q = seq_builder(&engine)
        .where_("id > ?", Params::positional([5]))
        .unwrap()
        .where_("id < ?", Params::positional([9]))
        .unwrap();
    assert_eq!(ints(&q.rows().unwrap(), "id"), vec![6, 7, 8]);

    let (sql, params) = q.to_sql(&GenericDialect).unwrap();
    assert_eq!(params, vec![Value::Int(5), Value::Int(9)]);
    assert!(sql.contains("WHERE"));
}

#[test]
fn builder_over_raw_union_paginates_the_combined_rows() {
    let engine = engine_with_sequence(20);
    let q = engine
        .from_sql(
            "SELECT id FROM t WHERE id < 3 UNION SELECT id FROM t WHERE id > 18",
            Params::new(),
        )
        .order(Some("id"))
        .unwrap()
        .limit(3)
        .unwrap();
    assert_eq!(ints(&q.rows().unwrap(), "id"), vec![1, 2, 19]);
}
