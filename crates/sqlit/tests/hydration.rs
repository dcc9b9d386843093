//! The hydration pipeline: entities, row hydrators, closures, load
//! callbacks, converters, and the datetime contract.

mod common;
use common::*;

use chrono::NaiveDateTime;
use chrono_tz::Tz;

use sqlit::{
    assign, DateTimeConfig, Entity, Error, FieldDescriptor, FromSqlRow, HydrationContext,
    HydrationError, Params, Row, Value,
};

#[derive(Debug, Default, PartialEq)]
struct User {
    id: i64,
    name: String,
    age: Option<i64>,
    greeting: String,
}

impl Entity for User {
    fn fields() -> &'static [FieldDescriptor<Self>] {
        &[
            FieldDescriptor {
                name: "id",
                set: |u, v, c| assign(&mut u.id, v, c),
            },
            FieldDescriptor {
                name: "name",
                set: |u, v, c| assign(&mut u.name, v, c),
            },
            FieldDescriptor {
                name: "age",
                set: |u, v, c| assign(&mut u.age, v, c),
            },
        ]
    }
}

#[test]
fn entities_fill_matching_fields_and_ignore_the_rest() {
    let engine = engine_with_users();
    let users: Vec<User> = engine
        .from_sql("SELECT id, name, age, org FROM users ORDER BY id", Params::new())
        .hydrate_entities::<User>()
        .fetch()
        .unwrap();
    assert_eq!(users.len(), 5);
    assert_eq!(users[0].id, 1);
    assert_eq!(users[0].name, "ada");
    assert_eq!(users[0].age, Some(36));
    // No `org` field: the column is ignored; no `greeting` column: the
    // default stays.
    assert_eq!(users[0].greeting, "");
}

#[test]
fn load_callback_runs_after_each_instance() {
    let engine = engine_with_users();
    let users: Vec<User> = engine
        .table("users")
        .hydrate_entities::<User>()
        .with_load_callback(|u: &mut User| u.greeting = format!("hi {}", u.name))
        .fetch()
        .unwrap();
    assert_eq!(users[0].greeting, "hi ada");
}

#[derive(Debug, PartialEq)]
struct NameOnly(String);

impl FromSqlRow for NameOnly {
    fn from_sql_row(row: &Row, ctx: &HydrationContext) -> Result<Self, HydrationError> {
        let value = row
            .get("name")
            .ok_or_else(|| HydrationError::new::<Self>("row has no name column"))?;
        Ok(Self(ctx.value_as(value)?))
    }
}

#[test]
fn custom_row_hydrator() {
    let engine = engine_with_users();
    let names: Vec<NameOnly> = engine
        .from_sql("SELECT name FROM users WHERE org = 'acme' ORDER BY name", Params::new())
        .hydrate::<NameOnly>()
        .fetch()
        .unwrap();
    assert_eq!(names, vec![NameOnly("ada".into()), NameOnly("alan".into())]);
}

#[test]
fn closure_hydrator_receives_positional_values() {
    let engine = engine_with_users();
    let pairs: Vec<(String, i64)> = engine
        .from_sql("SELECT name, age FROM users WHERE age > 80", Params::new())
        .hydrate_with(|values: &[Value]| {
            let name = match &values[0] {
                Value::Text(s) => s.clone(),
                other => return Err(HydrationError::new::<(String, i64)>(format!(
                    "unexpected {other:?}"
                ))),
            };
            let age = match &values[1] {
                Value::Int(n) => *n,
                other => return Err(HydrationError::new::<(String, i64)>(format!(
                    "unexpected {other:?}"
                ))),
            };
            Ok((name, age))
        })
        .fetch()
        .unwrap();
    assert_eq!(pairs, vec![("grace".into(), 85)]);
}

#[test]
fn hydration_failures_carry_the_target_type() {
    let engine = engine_with_users();
    let err = engine
        .from_sql("SELECT name AS id FROM users", Params::new())
        .hydrate_entities::<User>()
        .fetch()
        .unwrap_err();
    let Error::Hydration(inner) = err else {
        panic!("expected hydration error");
    };
    assert!(inner.target.contains("i64"));
}

#[derive(Debug, Default, PartialEq)]
struct Flagged {
    id: i64,
    flag: String,
}

impl Entity for Flagged {
    fn fields() -> &'static [FieldDescriptor<Self>] {
        &[
            FieldDescriptor {
                name: "id",
                set: |f, v, c| assign(&mut f.id, v, c),
            },
            FieldDescriptor {
                name: "flag",
                set: |f, v, c| assign(&mut f.flag, v, c),
            },
        ]
    }
}

#[test]
fn registered_converter_overrides_the_builtin() {
    let engine = engine_with_sequence(2);
    engine.register_converter(|value: &Value, _config: &DateTimeConfig| match value {
        Value::Int(n) => Some(format!("#{n}")),
        _ => None,
    });
    let flagged: Vec<Flagged> = engine
        .from_sql("SELECT id, id AS flag FROM t ORDER BY id", Params::new())
        .hydrate_entities::<Flagged>()
        .fetch()
        .unwrap();
    assert_eq!(flagged[0].flag, "#1");
    assert_eq!(flagged[1].flag, "#2");
}

#[derive(Debug, Default)]
struct Stamped {
    at: Option<NaiveDateTime>,
}

impl Entity for Stamped {
    fn fields() -> &'static [FieldDescriptor<Self>] {
        &[FieldDescriptor {
            name: "at",
            set: |s, v, c| assign(&mut s.at, v, c),
        }]
    }
}

#[test]
fn datetime_strings_follow_the_timezone_config() {
    let engine = engine_with_users();
    engine.set_datetime_config(DateTimeConfig {
        sql_timezone: Tz::UTC,
        app_timezone: Tz::Europe__Oslo,
    });
    let stamped: Vec<Stamped> = engine
        .from_sql("SELECT '2024-01-15 12:00:00' AS at", Params::new())
        .hydrate_entities::<Stamped>()
        .fetch()
        .unwrap();
    assert_eq!(
        stamped[0].at.map(|at| at.to_string()),
        Some("2024-01-15 13:00:00".to_string())
    );
}

#[test]
fn epoch_values_hydrate_as_datetimes() {
    let engine = engine_with_users();
    let stamped: Vec<Stamped> = engine
        .from_sql("SELECT 1700000000 AS at", Params::new())
        .hydrate_entities::<Stamped>()
        .fetch()
        .unwrap();
    assert_eq!(
        stamped[0].at.map(|at| at.to_string()),
        Some("2023-11-14 22:13:20".to_string())
    );
}

#[test]
fn raw_rows_need_no_target() {
    let engine = engine_with_users();
    let rows = engine.table("users").rows().unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows[0].get("name").is_some());
}
