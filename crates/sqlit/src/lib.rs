//! # sqlit
//!
//! An embeddable SQL query engine. SQL text plus positional/named
//! parameters go in; row iterators or affected-row counts come out —
//! against either of two backends:
//!
//! - the **virtual backend**: an in-memory engine over tables the host
//!   registers, with predicate push-down, index-aware `IN`, correlated
//!   subqueries, aggregates, window functions, JOINs, CTEs (including
//!   recursive), and set operations;
//! - a **driver backend**: any persistent connection implementing the
//!   [`Driver`] contract, which receives `(sql, params)` rendered in its
//!   own dialect.
//!
//! On top sits an immutable [`QueryBuilder`] (compose, filter, paginate,
//! union, chain CTEs — every mutator returns a new value) and the
//! hydration pipeline ([`Entity`], [`FromSqlRow`], [`FromSqlValue`],
//! closures, a converter registry) that turns raw rows into host types.
//!
//! ```rust
//! use std::sync::Arc;
//! use sqlit::{ColumnInfo, ColumnType, Engine, IndexHint, MemoryTable, Params};
//!
//! let engine = Engine::new();
//! let users = MemoryTable::new("users")
//!     .with_column("id", ColumnInfo::new(ColumnType::Int).with_index(IndexHint::Primary))
//!     .with_column("name", ColumnInfo::new(ColumnType::Text));
//! engine.register_table("users", Arc::new(users));
//!
//! engine.exec("INSERT INTO users (name) VALUES (?)", Params::positional(["ada"]))?;
//! let rows = engine.query("SELECT id, name FROM users WHERE name = ?",
//!     Params::positional(["ada"]))?;
//! assert_eq!(rows.len(), 1);
//! # Ok::<(), sqlit::Error>(())
//! ```

mod backend;
mod builder;
mod convert;
mod datetime;
mod engine;
mod error;
mod hydrate;
mod params;
mod row;
pub mod table;
mod value_ops;

pub use backend::{Backend, Driver, DriverConnection, Executor, RawQuery};
pub use builder::{Hydrating, QueryBuilder};
pub use convert::ConverterRegistry;
pub use datetime::DateTimeConfig;
pub use engine::{AggregateSpec, Engine};
pub use error::{Error, Result};
pub use hydrate::{
    assign, Entity, FieldDescriptor, FromSqlRow, FromSqlValue, HydrationContext, HydrationError,
};
pub use params::Params;
pub use row::Row;
pub use table::{ColumnInfo, ColumnType, IndexHint, MemoryTable, SharedTable, Table, TableOps};

// The front end's core types, re-exported for convenience.
pub use sqlit_core::{ToValue, Value};
