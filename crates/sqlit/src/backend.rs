//! Execution backends: the virtual engine and the persistent driver.
//!
//! A [`crate::QueryBuilder`] is bound to one [`Backend`]. Execution goes
//! through an [`Executor`] callback: when the builder has not been
//! mutated it may hand over the original SQL and parameters untouched
//! (the fast path); once an AST exists, the executor receives it and
//! must use it.

use std::sync::Arc;

use sqlit_core::ast::{Query, Statement};
use sqlit_core::dialect::{Dialect, ParamRef};
use sqlit_core::Value;

use crate::engine::Engine;
use crate::error::Result;
use crate::hydrate::HydrationContext;
use crate::params::Params;
use crate::row::Row;

/// The raw, unmutated form of a builder's query.
#[derive(Debug)]
pub struct RawQuery<'a> {
    /// The original SQL text.
    pub sql: &'a str,
    /// The parameters bound so far.
    pub params: &'a Params,
}

/// The executor callback a builder runs through: `(raw, ast) → rows`.
/// `ast` is `None` exactly when the builder was never mutated.
pub type Executor = Arc<dyn Fn(&RawQuery<'_>, Option<&Query>) -> Result<Vec<Row>> + Send + Sync>;

/// The persistent-connection contract: a classical parameterised-query
/// interface. The engine renders a built AST through the driver's
/// dialect and forwards `(sql, params)`.
pub trait Driver: Send + Sync {
    /// The driver's SQL dialect.
    fn dialect(&self) -> &dyn Dialect;

    /// Runs a row-producing statement.
    ///
    /// # Errors
    ///
    /// Driver-defined; surfaced unchanged.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Runs a statement, returning affected rows.
    ///
    /// # Errors
    ///
    /// Driver-defined; surfaced unchanged.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// The id generated by the most recent INSERT, if the driver tracks
    /// one.
    fn last_insert_id(&self) -> Option<i64> {
        None
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Driver-defined; surfaced unchanged.
    fn begin(&self) -> Result<()> {
        Ok(())
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Driver-defined; surfaced unchanged.
    fn commit(&self) -> Result<()> {
        Ok(())
    }

    /// Rolls the open transaction back.
    ///
    /// # Errors
    ///
    /// Driver-defined; surfaced unchanged.
    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

/// A thin adapter over a [`Driver`]: renders ASTs in the driver's
/// dialect, binds parameters in renderer occurrence order, forwards.
pub struct DriverConnection {
    driver: Arc<dyn Driver>,
    hydration: HydrationContext,
}

impl DriverConnection {
    /// Wraps a driver.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            hydration: HydrationContext::default(),
        }
    }

    /// Replaces the hydration context used for rows this connection
    /// produces.
    #[must_use]
    pub fn with_hydration_context(mut self, hydration: HydrationContext) -> Self {
        self.hydration = hydration;
        self
    }

    /// The driver's dialect tag.
    #[must_use]
    pub fn dialect(&self) -> &'static str {
        self.driver.dialect().name()
    }

    /// Renders a statement for the driver's dialect and resolves its
    /// parameter references.
    pub(crate) fn render(&self, stmt: &Statement, params: &Params) -> Result<(String, Vec<Value>)> {
        let rendered = sqlit_core::dialect::render(stmt, self.driver.dialect())?;
        let mut values = Vec::with_capacity(rendered.params.len());
        for param in &rendered.params {
            let value = match param {
                ParamRef::Positional(position) => params.positional_at(*position)?,
                ParamRef::Named(name) => params.named_get(name)?,
            };
            values.push(value.clone());
        }
        Ok((rendered.sql, values))
    }

    /// Runs a query AST through the driver.
    ///
    /// # Errors
    ///
    /// Render errors, parameter-binding errors, driver errors.
    pub fn query_ast(&self, query: &Query, params: &Params) -> Result<Vec<Row>> {
        let (sql, values) = self.render(&Statement::Query(query.clone()), params)?;
        self.driver.query(&sql, &values)
    }

    /// Runs raw SQL through the driver (the fast path).
    ///
    /// # Errors
    ///
    /// Driver errors.
    pub fn query_raw(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.driver.query(sql, params.positional_values())
    }

    /// Runs a non-query statement.
    ///
    /// # Errors
    ///
    /// Driver errors.
    pub fn exec_raw(&self, sql: &str, params: &Params) -> Result<u64> {
        self.driver.exec(sql, params.positional_values())
    }

    /// The driver's last generated insert id.
    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        self.driver.last_insert_id()
    }

    /// Runs `task` inside a driver transaction, rolling back when it
    /// fails.
    ///
    /// # Errors
    ///
    /// The task's error, or the driver's begin/commit error.
    pub fn transaction<T>(&self, task: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.driver.begin()?;
        match task(self) {
            Ok(value) => {
                self.driver.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Roll back best-effort; the task's error is the one that
                // matters.
                let _ = self.driver.rollback();
                Err(err)
            }
        }
    }

    /// Renders a value as an inline SQL literal in the driver's dialect.
    #[must_use]
    pub fn quote(&self, value: &Value) -> String {
        self.driver.dialect().quote_value(value)
    }

    /// Quotes an identifier in the driver's dialect, dotted names
    /// piecewise.
    #[must_use]
    pub fn quote_identifier(&self, identifier: &str) -> String {
        self.driver.dialect().quote_identifier(identifier)
    }
}

/// The engine-or-driver handle a builder carries. Identity comparison
/// backs the same-backend checks in `union`, `except`, `with_cte`, and
/// builder-valued `in`.
#[derive(Clone)]
pub enum Backend {
    /// The in-memory virtual engine.
    Virtual(Engine),
    /// A persistent driver connection.
    Driver(Arc<DriverConnection>),
}

impl Backend {
    /// `true` when both handles point at the same engine or connection.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Virtual(a), Self::Virtual(b)) => Arc::ptr_eq(a.inner(), b.inner()),
            (Self::Driver(a), Self::Driver(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The default executor for this backend.
    #[must_use]
    pub fn executor(&self) -> Executor {
        match self {
            Self::Virtual(engine) => {
                let engine = engine.clone();
                Arc::new(move |raw, ast| match ast {
                    Some(query) => engine.run_ast(query, raw.params),
                    None => engine.query(raw.sql, raw.params.clone()),
                })
            }
            Self::Driver(connection) => {
                let connection = Arc::clone(connection);
                Arc::new(move |raw, ast| match ast {
                    Some(query) => connection.query_ast(query, raw.params),
                    None => connection.query_raw(raw.sql, raw.params),
                })
            }
        }
    }

    /// The hydration context rows of this backend are converted under.
    #[must_use]
    pub fn hydration_context(&self) -> HydrationContext {
        match self {
            Self::Virtual(engine) => engine.hydration_context(),
            Self::Driver(connection) => connection.hydration.clone(),
        }
    }
}
