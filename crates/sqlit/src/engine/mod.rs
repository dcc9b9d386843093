//! The virtual execution engine: SQL over host-registered in-memory
//! tables.
//!
//! [`Engine`] owns a case-insensitive table registry, a statement cache,
//! user aggregates, the converter registry, and per-query limits. A query
//! flows parse → dispatch (CTEs, set operations, SELECT) → predicate
//! push-down → row production; DML resolves its target to the registered
//! mutable table and delegates.

mod aggregate;
mod dml;
mod eval;
mod join;
mod plan;
mod select;
mod window;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use std::cell::Cell;

use sqlit_core::ast::{CommonTableExpr, Query, SetOperator, Statement, WithClause};
use sqlit_core::dialect::{Dialect, GenericDialect};
use sqlit_core::{Parser, Value};
use tracing::debug;

pub use aggregate::AggregateSpec;

use crate::convert::ConverterRegistry;
use crate::datetime::DateTimeConfig;
use crate::error::{Error, Result};
use crate::hydrate::HydrationContext;
use crate::params::Params;
use crate::row::Row;
use crate::table::{ColumnInfo, ColumnType, MemoryTable, SharedTable};
use eval::Evaluator;

/// Default iteration cap for recursive CTEs.
const DEFAULT_RECURSION_LIMIT: usize = 10_000;

/// How many produced/considered rows pass between deadline checks.
const TIMEOUT_CHECK_INTERVAL: u64 = 100;

/// The rows and column names one query evaluation produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResultSet {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Row>,
}

/// Rows of enclosing queries a correlated subquery may reference,
/// innermost last. Each entry pairs the scope name with the row.
#[derive(Debug, Clone, Default)]
pub(crate) struct OuterScopes(Vec<(String, Row)>);

impl OuterScopes {
    pub(crate) fn push(&mut self, scope: String, row: Row) {
        self.0.push((scope, row));
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, (String, Row)> {
        self.0.iter()
    }
}

/// Per-query execution state: the deadline and the row counter that
/// paces deadline checks.
pub(crate) struct ExecCtx {
    deadline: Option<Instant>,
    timeout: Duration,
    counter: Cell<u64>,
}

impl ExecCtx {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            timeout: timeout.unwrap_or_default(),
            counter: Cell::new(0),
        }
    }

    /// Counts one row of work; raises [`Error::QueryTimeout`] once the
    /// deadline has passed. Checked every [`TIMEOUT_CHECK_INTERVAL`] rows.
    pub(crate) fn tick(&self) -> Result<()> {
        let count = self.counter.get() + 1;
        self.counter.set(count);
        if count % TIMEOUT_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() > deadline {
                    return Err(Error::QueryTimeout(self.timeout));
                }
            }
        }
        Ok(())
    }
}

pub(crate) struct EngineInner {
    /// Lowercased name → table. CTE execution registers temporaries here
    /// and removes them on exit.
    tables: RwLock<HashMap<String, SharedTable>>,
    /// Uppercased name → user aggregate.
    aggregates: RwLock<HashMap<String, Arc<AggregateSpec>>>,
    /// Source text → parsed statement.
    cache: Mutex<HashMap<String, Arc<Statement>>>,
    converters: RwLock<Arc<ConverterRegistry>>,
    datetime: RwLock<DateTimeConfig>,
    last_insert_id: AtomicI64,
    timeout: RwLock<Option<Duration>>,
    recursion_limit: RwLock<usize>,
}

/// The embeddable SQL engine over registered in-memory tables.
///
/// Cloning is cheap and shares every registration, the statement cache,
/// and `last_insert_id`.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// A fresh engine with no registered tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                tables: RwLock::new(HashMap::new()),
                aggregates: RwLock::new(HashMap::new()),
                cache: Mutex::new(HashMap::new()),
                converters: RwLock::new(Arc::new(ConverterRegistry::new())),
                datetime: RwLock::new(DateTimeConfig::default()),
                last_insert_id: AtomicI64::new(0),
                timeout: RwLock::new(None),
                recursion_limit: RwLock::new(DEFAULT_RECURSION_LIMIT),
            }),
        }
    }

    /// Registers a table under a case-insensitive name, shadowing any
    /// previous registration of that name.
    pub fn register_table(&self, name: impl Into<String>, table: Arc<MemoryTable>) {
        self.inner.register(name.into(), table);
    }

    /// Registers a user aggregate. `arg_count` of `-1` accepts any arity.
    pub fn create_aggregate(
        &self,
        name: impl Into<String>,
        step: impl Fn(&mut Value, &[Value]) + Send + Sync + 'static,
        finalize: impl Fn(Value) -> Value + Send + Sync + 'static,
        arg_count: i32,
    ) {
        let spec = Arc::new(AggregateSpec {
            step: Arc::new(step),
            finalize: Arc::new(finalize),
            arg_count,
        });
        self.inner
            .aggregates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into().to_uppercase(), spec);
    }

    /// Sets (or clears) the per-query timeout.
    pub fn set_query_timeout(&self, timeout: Option<Duration>) {
        *self
            .inner
            .timeout
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timeout;
    }

    /// Sets the recursive-CTE iteration cap.
    pub fn set_recursion_limit(&self, limit: usize) {
        *self
            .inner
            .recursion_limit
            .write()
            .unwrap_or_else(PoisonError::into_inner) = limit;
    }

    /// Sets the SQL/application timezone pair used by hydration.
    pub fn set_datetime_config(&self, config: DateTimeConfig) {
        *self
            .inner
            .datetime
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Registers a value converter for hydration targets of type `T`.
    pub fn register_converter<T, F>(&self, convert: F)
    where
        T: 'static,
        F: Fn(&Value, &DateTimeConfig) -> Option<T> + Send + Sync + 'static,
    {
        let mut guard = self
            .inner
            .converters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut registry = (**guard).clone();
        registry.register(convert);
        *guard = Arc::new(registry);
    }

    /// The context hydration runs under: converter registry snapshot plus
    /// datetime configuration.
    #[must_use]
    pub fn hydration_context(&self) -> HydrationContext {
        HydrationContext {
            registry: Arc::clone(
                &self
                    .inner
                    .converters
                    .read()
                    .unwrap_or_else(PoisonError::into_inner),
            ),
            datetime: *self
                .inner
                .datetime
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Runs a SELECT-like statement, returning its rows.
    ///
    /// # Errors
    ///
    /// Parse errors, binding errors, and any execution error of the
    /// crate's error surface.
    pub fn query(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        let params = params.into();
        let stmt = self.inner.parse_cached(sql)?;
        params.check_statement(&stmt)?;
        let Statement::Query(query) = &*stmt else {
            return Err(Error::unsupported(format!(
                "query() expects a SELECT-like statement, got `{stmt}`; use exec()"
            )));
        };
        let ctx = self.inner.exec_ctx();
        let result = self
            .inner
            .run_query(query, &params, &OuterScopes::default(), &ctx)?;
        Ok(result.rows)
    }

    /// First row, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::query`].
    pub fn query_one(&self, sql: &str, params: impl Into<Params>) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// First field of the first row, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::query`].
    pub fn query_field(&self, sql: &str, params: impl Into<Params>) -> Result<Option<Value>> {
        Ok(self
            .query_one(sql, params)?
            .and_then(|row| row.first().cloned()))
    }

    /// First field of every row.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::query`].
    pub fn query_column(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Value>> {
        Ok(self
            .query(sql, params)?
            .into_iter()
            .map(|row| row.first().cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Runs an INSERT/UPDATE/DELETE or DDL statement, returning affected
    /// rows (`0` for DDL).
    ///
    /// # Errors
    ///
    /// Same surface as [`Engine::query`].
    pub fn exec(&self, sql: &str, params: impl Into<Params>) -> Result<u64> {
        let params = params.into();
        let stmt = self.inner.parse_cached(sql)?;
        params.check_statement(&stmt)?;
        let ctx = self.inner.exec_ctx();
        match &*stmt {
            Statement::Query(_) => Err(Error::unsupported(
                "exec() expects a data or schema statement; use query() for SELECT",
            )),
            Statement::Insert(insert) => self.inner.run_insert(insert, &params, &ctx),
            Statement::Update(update) => self.inner.run_update(update, &params, &ctx),
            Statement::Delete(delete) => self.inner.run_delete(delete, &params, &ctx),
            Statement::CreateTable(create) => self.inner.run_create_table(create),
            Statement::DropTable(drop) => self.inner.run_drop_table(drop),
            Statement::CreateIndex(create) => self.inner.run_create_index(create),
            Statement::DropIndex(_) => Ok(0),
        }
    }

    /// The row id produced by the most recent INSERT through this engine.
    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        match self.inner.last_insert_id.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }

    /// Runs `task`. The virtual backend has no isolation; the task simply
    /// executes against the live tables.
    ///
    /// # Errors
    ///
    /// Whatever `task` returns.
    pub fn transaction<T>(&self, task: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        task(self)
    }

    /// The dialect tag of the virtual backend.
    #[must_use]
    pub fn dialect(&self) -> &'static str {
        GenericDialect.name()
    }

    /// Renders a value as an inline SQL literal.
    #[must_use]
    pub fn quote(&self, value: &Value) -> String {
        GenericDialect.quote_value(value)
    }

    /// Quotes an identifier, dotted names piecewise.
    #[must_use]
    pub fn quote_identifier(&self, identifier: &str) -> String {
        GenericDialect.quote_identifier(identifier)
    }

    /// Executes an already-built query AST with the given parameters.
    /// This is the slow path the query builder's executor uses.
    ///
    /// # Errors
    ///
    /// Same surface as [`Engine::query`].
    pub(crate) fn run_ast(&self, query: &Query, params: &Params) -> Result<Vec<Row>> {
        params.check_query(query)?;
        let ctx = self.inner.exec_ctx();
        Ok(self
            .inner
            .run_query(query, params, &OuterScopes::default(), &ctx)?
            .rows)
    }

    /// A query builder over raw SQL, bound to this engine.
    #[must_use]
    pub fn from_sql(&self, sql: impl Into<String>, params: impl Into<Params>) -> crate::QueryBuilder {
        crate::QueryBuilder::from_sql(crate::Backend::Virtual(self.clone()), sql, params)
    }

    /// A query builder producing every row of a registered table.
    #[must_use]
    pub fn table(&self, name: impl Into<String>) -> crate::QueryBuilder {
        crate::QueryBuilder::from_table(crate::Backend::Virtual(self.clone()), name)
    }

    pub(crate) fn inner(&self) -> &Arc<EngineInner> {
        &self.inner
    }
}

impl EngineInner {
    fn exec_ctx(&self) -> ExecCtx {
        ExecCtx::new(
            *self
                .timeout
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub(crate) fn parse_cached(&self, sql: &str) -> Result<Arc<Statement>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stmt) = cache.get(sql) {
            return Ok(Arc::clone(stmt));
        }
        let stmt = Arc::new(Parser::new(sql).parse_statement()?);
        cache.insert(sql.to_string(), Arc::clone(&stmt));
        Ok(stmt)
    }

    pub(crate) fn register(&self, name: String, table: Arc<MemoryTable>) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), table as SharedTable);
    }

    fn register_shared(&self, name: &str, table: SharedTable) -> Option<SharedTable> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), table)
    }

    pub(crate) fn unregister(&self, name: &str) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
            .is_some()
    }

    pub(crate) fn table_exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name.to_lowercase())
    }

    pub(crate) fn resolve_table(&self, name: &str) -> Result<SharedTable> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::MissingTable(name.to_string()))
    }

    pub(crate) fn is_aggregate(&self, upper_name: &str) -> bool {
        aggregate::is_builtin(upper_name)
            || self
                .aggregates
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(upper_name)
    }

    pub(crate) fn custom_aggregate(&self, upper_name: &str) -> Option<Arc<AggregateSpec>> {
        self.aggregates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(upper_name)
            .cloned()
    }

    pub(crate) fn set_last_insert_id(&self, id: i64) {
        self.last_insert_id.store(id, Ordering::Relaxed);
    }

    fn recursion_limit(&self) -> usize {
        *self
            .recursion_limit
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatches a query: CTEs, set operations, or a plain SELECT.
    pub(crate) fn run_query(
        &self,
        query: &Query,
        params: &Params,
        outer: &OuterScopes,
        ctx: &ExecCtx,
    ) -> Result<ResultSet> {
        match query {
            Query::Select(select) => {
                let ev = Evaluator::new(self, params, None, outer.clone(), ctx);
                self.run_select(select, &ev)
            }
            Query::SetOperation(op) => {
                let left = self.run_query(&op.left, params, outer, ctx)?;
                let right = self.run_query(&op.right, params, outer, ctx)?;
                combine(op.operator, op.all, left, right)
            }
            Query::With(with, body) => self.run_with(with, body, params, outer, ctx),
        }
    }

    /// Executes a WITH clause: CTEs run in declaration order, each
    /// registered as a temporary table visible to later CTEs and the
    /// body. The registrations are removed when this returns, normally or
    /// through an error.
    fn run_with(
        &self,
        with: &WithClause,
        body: &Query,
        params: &Params,
        outer: &OuterScopes,
        ctx: &ExecCtx,
    ) -> Result<ResultSet> {
        let mut guard = CteGuard::new(self);
        for cte in &with.ctes {
            let mut result = if with.recursive && query_references(&cte.query, &cte.name) {
                self.run_recursive_cte(cte, params, outer, ctx)?
            } else {
                self.run_query(&cte.query, params, outer, ctx)?
            };
            if !cte.columns.is_empty() {
                result = rename_columns(result, &cte.columns);
            }
            debug!(cte = %cte.name, rows = result.rows.len(), "cte materialised");
            guard.register(&cte.name, Arc::new(materialize(&cte.name, &result)));
        }
        self.run_query(body, params, outer, ctx)
    }

    /// Recursive CTE: anchor first, then iterate the recursive branch
    /// against the previous working set until it produces nothing new or
    /// the iteration cap trips.
    fn run_recursive_cte(
        &self,
        cte: &CommonTableExpr,
        params: &Params,
        outer: &OuterScopes,
        ctx: &ExecCtx,
    ) -> Result<ResultSet> {
        let Query::SetOperation(op) = &*cte.query else {
            return Err(Error::unsupported(format!(
                "recursive CTE {} must be `anchor UNION [ALL] recursive`",
                cte.name
            )));
        };
        if op.operator != SetOperator::Union {
            return Err(Error::unsupported(format!(
                "recursive CTE {} must combine with UNION",
                cte.name
            )));
        }

        let mut anchor = self.run_query(&op.left, params, outer, ctx)?;
        if !cte.columns.is_empty() {
            anchor = rename_columns(anchor, &cte.columns);
        }
        let columns = anchor.columns.clone();

        let mut seen: std::collections::HashSet<String> = anchor
            .rows
            .iter()
            .map(Row::content_key)
            .collect();
        let mut accumulated = anchor.rows.clone();
        let mut working = anchor.rows;

        let limit = self.recursion_limit();
        let mut guard = CteGuard::new(self);
        let mut iterations = 0;
        while !working.is_empty() {
            iterations += 1;
            if iterations > limit {
                return Err(Error::RecursionLimit {
                    name: cte.name.clone(),
                    limit,
                });
            }
            ctx.tick()?;

            let working_set = ResultSet {
                columns: columns.clone(),
                rows: working,
            };
            guard.register(&cte.name, Arc::new(materialize(&cte.name, &working_set)));

            let produced = self.run_query(&op.right, params, outer, ctx)?;
            // The recursive branch's output columns take the anchor's
            // names, positionally.
            let produced = rename_columns(produced, &columns);

            let mut next = Vec::new();
            for row in produced.rows {
                if op.all || seen.insert(row.content_key()) {
                    next.push(row);
                }
            }
            accumulated.extend(next.iter().cloned());
            working = next;
        }
        drop(guard);

        Ok(ResultSet {
            columns,
            rows: accumulated,
        })
    }
}

/// Temporarily registers CTE tables, restoring whatever the names pointed
/// at before when dropped.
struct CteGuard<'a> {
    engine: &'a EngineInner,
    saved: Vec<(String, Option<SharedTable>)>,
}

impl<'a> CteGuard<'a> {
    fn new(engine: &'a EngineInner) -> Self {
        Self {
            engine,
            saved: Vec::new(),
        }
    }

    fn register(&mut self, name: &str, table: Arc<MemoryTable>) {
        let previous = self.engine.register_shared(name, table as SharedTable);
        if !self
            .saved
            .iter()
            .any(|(saved, _)| saved.eq_ignore_ascii_case(name))
        {
            self.saved.push((name.to_string(), previous));
        }
    }
}

impl Drop for CteGuard<'_> {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(table) => {
                    self.engine.register_shared(&name, table);
                }
                None => {
                    self.engine.unregister(&name);
                }
            }
        }
    }
}

/// `true` when the query references `name` as a table anywhere.
fn query_references(query: &Query, name: &str) -> bool {
    fn table_ref_references(table: &sqlit_core::ast::TableRef, name: &str) -> bool {
        match table {
            sqlit_core::ast::TableRef::Table { name: t, .. } => t.eq_ignore_ascii_case(name),
            sqlit_core::ast::TableRef::Subquery { query, .. } => query_references(query, name),
            sqlit_core::ast::TableRef::Join { left, join } => {
                table_ref_references(left, name) || table_ref_references(&join.table, name)
            }
        }
    }
    match query {
        Query::Select(select) => select
            .from
            .as_ref()
            .is_some_and(|from| table_ref_references(from, name)),
        Query::SetOperation(op) => {
            query_references(&op.left, name) || query_references(&op.right, name)
        }
        Query::With(with, body) => {
            with.ctes.iter().any(|cte| query_references(&cte.query, name))
                || query_references(body, name)
        }
    }
}

/// Renames result columns positionally.
fn rename_columns(result: ResultSet, names: &[String]) -> ResultSet {
    let columns: Vec<String> = names
        .iter()
        .cloned()
        .chain(result.columns.iter().skip(names.len()).cloned())
        .collect();
    let rows = result
        .rows
        .into_iter()
        .map(|row| {
            row.into_values()
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    (
                        columns.get(i).cloned().unwrap_or_else(|| format!("_{i}")),
                        value,
                    )
                })
                .collect()
        })
        .collect();
    ResultSet { columns, rows }
}

/// Materialises a result set into a registered-table shape. Column types
/// are inferred from the first non-null value of each column.
pub(crate) fn materialize(name: &str, result: &ResultSet) -> MemoryTable {
    let mut table = MemoryTable::new(name);
    for (index, column) in result.columns.iter().enumerate() {
        let column_type = result
            .rows
            .iter()
            .find_map(|row| {
                row.get_index(index)
                    .map(|(_, v)| v)
                    .filter(|v| !v.is_null())
                    .map(infer_type)
            })
            .unwrap_or(ColumnType::Text);
        table = table.with_column(column.clone(), ColumnInfo::new(column_type));
    }
    for row in &result.rows {
        let renamed: Row = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                (
                    column.clone(),
                    row.get_index(i).map(|(_, v)| v.clone()).unwrap_or(Value::Null),
                )
            })
            .collect();
        // Result rows are already shaped; inference is advisory, so the
        // unchecked path avoids rejecting mixed-type set-operation output.
        table.insert_unchecked(renamed);
    }
    table
}

fn infer_type(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) | Value::Int(_) => ColumnType::Int,
        Value::Float(_) => ColumnType::Float,
        Value::Decimal(_) => ColumnType::Decimal { scale: None },
        Value::Blob(_) => ColumnType::Binary,
        Value::Date(_) => ColumnType::Date,
        Value::Time(_) => ColumnType::Time,
        Value::DateTime(_) => ColumnType::DateTime,
        Value::Null | Value::Text(_) => ColumnType::Text,
    }
}

/// Combines two result sets under a set operator. The right side's
/// columns take the left side's names, positionally.
fn combine(
    operator: SetOperator,
    all: bool,
    left: ResultSet,
    right: ResultSet,
) -> Result<ResultSet> {
    if !left.columns.is_empty()
        && !right.columns.is_empty()
        && left.columns.len() != right.columns.len()
    {
        return Err(Error::TypeMismatch(format!(
            "set operation arms produce {} and {} columns",
            left.columns.len(),
            right.columns.len()
        )));
    }
    let columns = left.columns.clone();
    let right = rename_columns(right, &columns);

    let rows = match operator {
        SetOperator::Union => {
            let mut rows = left.rows;
            rows.extend(right.rows);
            if all {
                rows
            } else {
                let mut seen = std::collections::HashSet::new();
                rows.into_iter()
                    .filter(|row| seen.insert(row.content_key()))
                    .collect()
            }
        }
        SetOperator::Intersect => {
            let mut right_counts: HashMap<String, usize> = HashMap::new();
            for row in &right.rows {
                *right_counts.entry(row.content_key()).or_default() += 1;
            }
            let mut seen = std::collections::HashSet::new();
            left.rows
                .into_iter()
                .filter(|row| {
                    let key = row.content_key();
                    let Some(count) = right_counts.get_mut(&key) else {
                        return false;
                    };
                    if *count == 0 {
                        return false;
                    }
                    if all {
                        *count -= 1;
                        true
                    } else {
                        seen.insert(key)
                    }
                })
                .collect()
        }
        SetOperator::Except => {
            let mut right_counts: HashMap<String, usize> = HashMap::new();
            for row in &right.rows {
                *right_counts.entry(row.content_key()).or_default() += 1;
            }
            let mut seen = std::collections::HashSet::new();
            left.rows
                .into_iter()
                .filter(|row| {
                    let key = row.content_key();
                    if let Some(count) = right_counts.get_mut(&key) {
                        if all && *count > 0 {
                            *count -= 1;
                            return false;
                        }
                        if !all {
                            return false;
                        }
                    }
                    if all {
                        true
                    } else {
                        seen.insert(key)
                    }
                })
                .collect()
        }
    };
    Ok(ResultSet { columns, rows })
}
