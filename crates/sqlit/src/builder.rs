//! The immutable query builder.
//!
//! A builder wraps a base SQL string (left unparsed until the first
//! operation that needs the AST) plus its parameters. Every mutator
//! clones and returns a new value; the original stays observably
//! unchanged. The AST is held behind an `Arc`: clone-on-write through
//! [`Arc::make_mut`] means sharing a parsed AST between builder values is
//! free until one of them mutates.
//!
//! An unmutated builder executes through the fast path — its stored SQL
//! and parameters go to the backend untouched. Any mutation switches it
//! to the slow path, where the executor receives the AST.
//!
//! Operations that change row membership (`where`, `in`, `or`, `order`,
//! `distinct`) honour the pagination barrier: when the current query
//! carries LIMIT or OFFSET, it is first wrapped as `SELECT * FROM
//! (current) AS _q` so the new clause applies to the paginated window,
//! not the pre-paginated set.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use sqlit_core::ast::{
    visit, BinaryOp, CommonTableExpr, Expr, Query, SelectColumn, SelectStatement, SetOperation,
    SetOperator, TableRef, WithClause,
};
use sqlit_core::{Parser, ToValue, Value};

use crate::backend::{Backend, Executor, RawQuery};
use crate::error::{Error, Result};
use crate::hydrate::{Entity, FromSqlRow, HydrationContext, HydrationError};
use crate::params::Params;
use crate::row::Row;
use crate::table::Table as _;
use crate::value_ops;

/// An immutable, composable SQL query bound to a backend.
#[derive(Clone)]
pub struct QueryBuilder {
    backend: Backend,
    executor: Executor,
    /// Authoritative only while `ast` is `None`.
    sql: Option<String>,
    params: Params,
    ast: Option<Arc<Query>>,
    select_called: bool,
    available_columns: Option<IndexSet<String>>,
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("sql", &self.sql)
            .field("mutated", &self.ast.is_some())
            .finish_non_exhaustive()
    }
}

impl QueryBuilder {
    /// A builder over raw SQL. The text is not parsed until an operation
    /// needs the AST.
    #[must_use]
    pub fn from_sql(backend: Backend, sql: impl Into<String>, params: impl Into<Params>) -> Self {
        let executor = backend.executor();
        Self {
            backend,
            executor,
            sql: Some(sql.into()),
            params: params.into(),
            ast: None,
            select_called: false,
            available_columns: None,
        }
    }

    /// [`QueryBuilder::from_sql`] with a custom executor.
    #[must_use]
    pub fn from_sql_with_executor(
        backend: Backend,
        executor: Executor,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Self {
        Self {
            backend,
            executor,
            sql: Some(sql.into()),
            params: params.into(),
            ast: None,
            select_called: false,
            available_columns: None,
        }
    }

    /// A builder producing every row of a named table.
    #[must_use]
    pub fn from_table(backend: Backend, table: impl Into<String>) -> Self {
        let executor = backend.executor();
        Self {
            backend,
            executor,
            sql: None,
            params: Params::new(),
            ast: Some(Arc::new(Query::Select(SelectStatement::from_table(table)))),
            select_called: false,
            available_columns: None,
        }
    }

    /// The backend this builder executes against.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// `true` while the builder still executes through the fast path.
    #[must_use]
    pub fn is_unmutated(&self) -> bool {
        self.ast.is_none()
    }

    /// The current query AST, parsing the stored SQL on first use.
    ///
    /// # Errors
    ///
    /// [`Error::Syntax`] when the stored SQL does not parse, and
    /// [`Error::Unsupported`] when it is not a query.
    pub fn query_ast(&self) -> Result<Arc<Query>> {
        if let Some(ast) = &self.ast {
            return Ok(Arc::clone(ast));
        }
        Ok(Arc::new(self.parse_raw()?))
    }

    fn parse_raw(&self) -> Result<Query> {
        let sql = self.sql.as_deref().unwrap_or_default();
        let stmt = Parser::new(sql).parse_statement()?;
        match stmt {
            sqlit_core::ast::Statement::Query(query) => Ok(query),
            other => Err(Error::unsupported(format!(
                "builder requires a SELECT-like statement, got `{other}`"
            ))),
        }
    }

    /// Clones the builder and mutates its (privately owned) AST.
    fn with_ast(
        &self,
        f: impl FnOnce(&mut Query, &mut Params) -> Result<()>,
    ) -> Result<Self> {
        let mut next = self.clone();
        let mut arc = match next.ast.take() {
            Some(arc) => arc,
            None => Arc::new(next.parse_raw()?),
        };
        f(Arc::make_mut(&mut arc), &mut next.params)?;
        next.ast = Some(arc);
        next.sql = None;
        Ok(next)
    }

    // -----------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------

    /// ANDs a parsed SQL fragment onto the WHERE clause, binding the
    /// fragment's placeholders from `params`.
    ///
    /// # Errors
    ///
    /// Parse errors in the fragment; see also [`QueryBuilder::query_ast`].
    pub fn where_(&self, fragment: &str, params: impl Into<Params>) -> Result<Self> {
        let expr = Parser::new(fragment).parse_expression_fragment()?;
        self.and_where(expr, params.into())
    }

    fn and_where(&self, mut expr: Expr, extra: Params) -> Result<Self> {
        self.with_ast(move |query, own_params| {
            offset_positional_expr(&mut expr, own_params.positional_len());
            own_params.merge(extra);
            let select = filtering_select(query);
            and_onto(&mut select.where_clause, expr);
            Ok(())
        })
    }

    /// `column = value`; a NULL value becomes `IS NULL`.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn eq(&self, column: &str, value: impl ToValue) -> Result<Self> {
        self.cmp(column, BinaryOp::Eq, value.to_value())
    }

    /// `column < value`.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn lt(&self, column: &str, value: impl ToValue) -> Result<Self> {
        self.cmp(column, BinaryOp::Lt, value.to_value())
    }

    /// `column <= value`.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn lte(&self, column: &str, value: impl ToValue) -> Result<Self> {
        self.cmp(column, BinaryOp::LtEq, value.to_value())
    }

    /// `column > value`.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn gt(&self, column: &str, value: impl ToValue) -> Result<Self> {
        self.cmp(column, BinaryOp::Gt, value.to_value())
    }

    /// `column >= value`.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn gte(&self, column: &str, value: impl ToValue) -> Result<Self> {
        self.cmp(column, BinaryOp::GtEq, value.to_value())
    }

    /// `column LIKE pattern`.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn like(&self, column: &str, pattern: impl Into<String>) -> Result<Self> {
        self.cmp(column, BinaryOp::Like, Value::Text(pattern.into()))
    }

    fn cmp(&self, column: &str, op: BinaryOp, value: Value) -> Result<Self> {
        if value.is_null() && op == BinaryOp::Eq {
            return self.and_where(Expr::column(column).is_null(), Params::new());
        }
        let column = column.to_string();
        self.with_ast(move |query, params| {
            let position = params.positional_len() + 1;
            params.push(value);
            let expr = Expr::column(column).binary(
                op,
                Expr::Parameter {
                    name: None,
                    position,
                },
            );
            let select = filtering_select(query);
            and_onto(&mut select.where_clause, expr);
            Ok(())
        })
    }

    /// `column IN (values…)`. An empty list matches nothing.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn in_values<T: ToValue, I: IntoIterator<Item = T>>(
        &self,
        column: &str,
        values: I,
    ) -> Result<Self> {
        let values: Vec<Value> = values.into_iter().map(ToValue::to_value).collect();
        if values.is_empty() {
            // A query that matches nothing, in any dialect.
            return self.and_where(Expr::integer(1).eq(Expr::integer(0)), Params::new());
        }
        let column = column.to_string();
        self.with_ast(move |query, params| {
            let base = params.positional_len();
            let items = values
                .iter()
                .enumerate()
                .map(|(i, _)| Expr::Parameter {
                    name: None,
                    position: base + i + 1,
                })
                .collect();
            for value in values {
                params.push(value);
            }
            let expr = Expr::column(column).in_list(items);
            let select = filtering_select(query);
            and_onto(&mut select.where_clause, expr);
            Ok(())
        })
    }

    /// `column IN (subquery)` when `other` lives on the same backend;
    /// otherwise `other` is executed and its first column becomes a value
    /// list.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`]; plus `other`'s execution errors on
    /// the materialising path and [`Error::ConflictingCte`] when CTE
    /// names collide.
    pub fn in_query(&self, column: &str, other: &Self) -> Result<Self> {
        if !self.backend.same_as(&other.backend) {
            let values = other.column()?;
            return self.in_values(column, values);
        }
        let other_ast = other.query_ast()?;
        let other_params = other.params.clone();
        let column = column.to_string();
        self.with_ast(move |query, params| {
            let mut embedded = (*other_ast).clone();
            offset_positional_query(&mut embedded, params.positional_len());
            params.merge(other_params);
            // CTEs bubble out of the subquery into the outer WITH.
            let (ctes, recursive, inner) = split_with(embedded);
            let expr = Expr::column(column).in_subquery(inner);
            let select = filtering_select(query);
            and_onto(&mut select.where_clause, expr);
            merge_ctes_into(query, ctes, recursive)
        })
    }

    /// `column IN (…)` over the first cell of every row of a table.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn in_table(&self, column: &str, table: &crate::table::SharedTable) -> Result<Self> {
        let values: Vec<Value> = table
            .scan()
            .map(|(_, row)| row.first().cloned().unwrap_or(Value::Null))
            .filter(|value| !value.is_null())
            .collect();
        self.in_values(column, values)
    }

    /// ORs two or more predicates together and ANDs the result onto the
    /// WHERE clause. Each predicate is a SQL fragment with its own
    /// parameters; conditions inside a fragment are ANDed.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] with fewer than two predicates; fragment
    /// parse errors.
    pub fn or_where(&self, predicates: &[(&str, Params)]) -> Result<Self> {
        if predicates.len() < 2 {
            return Err(Error::unsupported(
                "or_where requires at least two predicates",
            ));
        }
        let mut parsed = Vec::with_capacity(predicates.len());
        for (fragment, params) in predicates {
            parsed.push((
                Parser::new(fragment).parse_expression_fragment()?,
                params.clone(),
            ));
        }
        self.with_ast(move |query, own_params| {
            let mut combined: Option<Expr> = None;
            for (mut expr, extra) in parsed {
                offset_positional_expr(&mut expr, own_params.positional_len());
                own_params.merge(extra);
                let branch = Expr::Paren(Box::new(expr));
                combined = Some(match combined {
                    None => branch,
                    Some(previous) => previous.or(branch),
                });
            }
            if let Some(disjunction) = combined {
                let select = filtering_select(query);
                and_onto(&mut select.where_clause, Expr::Paren(Box::new(disjunction)));
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------
    // Ordering, pagination, shape
    // -----------------------------------------------------------------

    /// Replaces the ORDER BY clause; `None` clears it.
    ///
    /// # Errors
    ///
    /// Fragment parse errors; see [`QueryBuilder::query_ast`].
    pub fn order(&self, spec: Option<&str>) -> Result<Self> {
        let items = match spec {
            Some(fragment) => Parser::new(fragment).parse_order_by_fragment()?,
            None => Vec::new(),
        };
        self.with_ast(move |query, _| {
            let select = filtering_select(query);
            select.order_by = items;
            Ok(())
        })
    }

    /// Narrows the LIMIT: the effective limit is the minimum of the
    /// current and the new value.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn limit(&self, n: u64) -> Result<Self> {
        self.with_ast(move |query, _| {
            normalize_paging(query);
            let select = paging_select(query);
            let effective = match literal_int(select.limit.as_ref()) {
                Some(current) => current.min(n as i64),
                None => n as i64,
            };
            select.limit = Some(Expr::integer(effective));
            Ok(())
        })
    }

    /// Adds to the OFFSET. An existing LIMIT shrinks by the same amount
    /// (floor 0) so the visible window stays inside the original.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn offset(&self, n: u64) -> Result<Self> {
        self.with_ast(move |query, _| {
            normalize_paging(query);
            let select = paging_select(query);
            let current = literal_int(select.offset.as_ref()).unwrap_or(0);
            select.offset = Some(Expr::integer(current + n as i64));
            if let Some(limit) = literal_int(select.limit.as_ref()) {
                select.limit = Some(Expr::integer((limit - n as i64).max(0)));
            }
            Ok(())
        })
    }

    /// Makes the query DISTINCT.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::query_ast`].
    pub fn distinct(&self) -> Result<Self> {
        self.with_ast(|query, _| {
            let select = filtering_select(query);
            select.distinct = true;
            Ok(())
        })
    }

    // -----------------------------------------------------------------
    // Set operations and CTEs
    // -----------------------------------------------------------------

    /// `self UNION other`. Both sides must share a backend; their CTEs
    /// merge, and conflicting definitions of one name raise
    /// [`Error::ConflictingCte`].
    ///
    /// # Errors
    ///
    /// As described; see also [`QueryBuilder::query_ast`].
    pub fn union(&self, other: &Self) -> Result<Self> {
        self.combine(other, SetOperator::Union)
    }

    /// `self EXCEPT other`; same contract as [`QueryBuilder::union`].
    ///
    /// # Errors
    ///
    /// As for [`QueryBuilder::union`].
    pub fn except(&self, other: &Self) -> Result<Self> {
        self.combine(other, SetOperator::Except)
    }

    fn combine(&self, other: &Self, operator: SetOperator) -> Result<Self> {
        if !self.backend.same_as(&other.backend) {
            return Err(Error::unsupported(
                "set operations require both queries on the same backend",
            ));
        }
        let other_ast = other.query_ast()?;
        let other_params = other.params.clone();
        self.with_ast(move |query, params| {
            let mut right = (*other_ast).clone();
            offset_positional_query(&mut right, params.positional_len());
            params.merge(other_params);

            let own = std::mem::replace(query, placeholder_query());
            let (mut ctes, mut recursive, left_inner) = split_with(own);
            let (right_ctes, right_recursive, right_inner) = split_with(right);
            merge_cte_lists(&mut ctes, right_ctes)?;
            recursive |= right_recursive;

            let combined = Query::SetOperation(SetOperation {
                left: Box::new(left_inner),
                operator,
                all: false,
                right: Box::new(right_inner),
            });
            *query = rewrap_with(ctes, recursive, combined);
            Ok(())
        })
    }

    /// Adds `other` as a CTE named `name` over the current query.
    /// Shadowing an existing CTE name raises [`Error::CteShadowing`].
    ///
    /// # Errors
    ///
    /// As described, plus [`Error::ConflictingCte`] when `other`'s own
    /// CTEs collide with existing ones.
    pub fn with_cte(&self, name: &str, other: &Self) -> Result<Self> {
        if !self.backend.same_as(&other.backend) {
            return Err(Error::unsupported(
                "a CTE must live on the same backend as its outer query",
            ));
        }
        let other_ast = other.query_ast()?;
        let other_params = other.params.clone();
        let name = name.to_string();
        self.with_ast(move |query, params| {
            let mut cte_query = (*other_ast).clone();
            offset_positional_query(&mut cte_query, params.positional_len());
            params.merge(other_params);

            let own = std::mem::replace(query, placeholder_query());
            let (mut ctes, mut recursive, inner) = split_with(own);
            if ctes.iter().any(|cte| cte.name.eq_ignore_ascii_case(&name)) {
                return Err(Error::CteShadowing(name.clone()));
            }
            let (nested, nested_recursive, cte_inner) = split_with(cte_query);
            merge_cte_lists(&mut ctes, nested)?;
            recursive |= nested_recursive;
            ctes.push(CommonTableExpr {
                name: name.clone(),
                columns: Vec::new(),
                query: Box::new(cte_inner),
            });
            *query = rewrap_with(ctes, recursive, inner);
            Ok(())
        })
    }

    // -----------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------

    /// Replaces the projection with a single expression, wrapping the
    /// current query as a subquery when its own projection must be
    /// preserved.
    ///
    /// # Errors
    ///
    /// Fragment parse errors; see [`QueryBuilder::query_ast`].
    pub fn select(&self, expr: &str) -> Result<Self> {
        let parsed = Parser::new(expr).parse_expression_fragment()?;
        let wrap = self.select_called;
        let mut next = self.with_ast(move |query, _| {
            let select = projection_select(query, wrap);
            select.columns = vec![SelectColumn::new(parsed)];
            Ok(())
        })?;
        next.select_called = true;
        Ok(next)
    }

    /// Narrows the projection to the named columns. Once narrowed, later
    /// calls may only narrow further; naming a column outside the allowed
    /// set raises [`Error::ConstraintViolation`].
    ///
    /// # Errors
    ///
    /// As described; see also [`QueryBuilder::query_ast`].
    pub fn columns(&self, names: &[&str]) -> Result<Self> {
        if let Some(allowed) = &self.available_columns {
            for name in names {
                if !allowed.contains(*name) {
                    return Err(Error::ConstraintViolation(format!(
                        "column {name} is outside the narrowed set"
                    )));
                }
            }
        }
        let owned: Vec<String> = names.iter().map(|s| (*s).to_string()).collect();
        let wrap = self.select_called;
        let mut next = self.with_ast(move |query, _| {
            let select = projection_select(query, wrap);
            select.columns = owned
                .into_iter()
                .map(|name| SelectColumn::new(Expr::column(name)))
                .collect();
            Ok(())
        })?;
        next.select_called = true;
        next.available_columns = Some(names.iter().map(|s| (*s).to_string()).collect());
        Ok(next)
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    /// Executes and returns the raw rows.
    ///
    /// # Errors
    ///
    /// Backend execution errors; see [`QueryBuilder::query_ast`].
    pub fn rows(&self) -> Result<Vec<Row>> {
        let raw = RawQuery {
            sql: self.sql.as_deref().unwrap_or_default(),
            params: &self.params,
        };
        (self.executor)(&raw, self.ast.as_deref())
    }

    /// Applies `LIMIT 1` and returns the first row.
    ///
    /// # Errors
    ///
    /// As for [`QueryBuilder::rows`].
    pub fn one(&self) -> Result<Option<Row>> {
        Ok(self.limit(1)?.rows()?.into_iter().next())
    }

    /// The first field of every row.
    ///
    /// # Errors
    ///
    /// As for [`QueryBuilder::rows`].
    pub fn column(&self) -> Result<Vec<Value>> {
        Ok(self
            .rows()?
            .into_iter()
            .map(|row| row.first().cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// The first field of the first row.
    ///
    /// # Errors
    ///
    /// As for [`QueryBuilder::rows`].
    pub fn field(&self) -> Result<Option<Value>> {
        Ok(self.one()?.and_then(|row| row.first().cloned()))
    }

    /// `SELECT COUNT(*) FROM (current) AS _count`, with ORDER BY
    /// stripped.
    ///
    /// # Errors
    ///
    /// As for [`QueryBuilder::rows`].
    pub fn count(&self) -> Result<i64> {
        let counted = self.with_ast(|query, _| {
            // CTEs stay outside the count wrapper; ORDER BY is stripped
            // since it cannot change the count.
            let own = std::mem::replace(query, placeholder_query());
            let (ctes, recursive, mut inner) = split_with(own);
            if let Query::Select(select) = &mut inner {
                select.order_by.clear();
            }
            *query = rewrap_with(ctes, recursive, Query::Select(wrap_count(inner)));
            Ok(())
        })?;
        let value = counted.field()?.unwrap_or(Value::Int(0));
        value_ops::as_i64(&value).ok_or_else(|| {
            Error::TypeMismatch(format!("COUNT produced {}", value.to_sql_inline()))
        })
    }

    /// `true` when at least one row matches (`LIMIT 1` under the hood).
    ///
    /// # Errors
    ///
    /// As for [`QueryBuilder::rows`].
    pub fn exists(&self) -> Result<bool> {
        Ok(!self.limit(1)?.rows()?.is_empty())
    }

    /// The `(sql, positional parameters)` pair this builder would send to
    /// a driver speaking `dialect`. The fast path returns the original
    /// SQL untouched.
    ///
    /// # Errors
    ///
    /// Render and binding errors; see [`QueryBuilder::query_ast`].
    pub fn to_sql(&self, dialect: &dyn sqlit_core::Dialect) -> Result<(String, Vec<Value>)> {
        match &self.ast {
            None => Ok((
                self.sql.clone().unwrap_or_default(),
                self.params.positional_values().to_vec(),
            )),
            Some(ast) => {
                let stmt = sqlit_core::ast::Statement::Query((**ast).clone());
                let rendered = sqlit_core::dialect::render(&stmt, dialect)?;
                let mut values = Vec::with_capacity(rendered.params.len());
                for param in &rendered.params {
                    let value = match param {
                        sqlit_core::dialect::ParamRef::Positional(position) => {
                            self.params.positional_at(*position)?
                        }
                        sqlit_core::dialect::ParamRef::Named(name) => {
                            self.params.named_get(name)?
                        }
                    };
                    values.push(value.clone());
                }
                Ok((rendered.sql, values))
            }
        }
    }

    // -----------------------------------------------------------------
    // Hydration
    // -----------------------------------------------------------------

    /// Hydrates rows through the target's [`FromSqlRow`].
    #[must_use]
    pub fn hydrate<T: FromSqlRow + 'static>(&self) -> Hydrating<T> {
        Hydrating {
            builder: self.clone(),
            mapper: Arc::new(T::from_sql_row),
            load_callback: None,
        }
    }

    /// Hydrates rows into an [`Entity`] by matching columns against its
    /// field descriptors.
    #[must_use]
    pub fn hydrate_entities<T: Entity + 'static>(&self) -> Hydrating<T> {
        Hydrating {
            builder: self.clone(),
            mapper: Arc::new(T::hydrate),
            load_callback: None,
        }
    }

    /// Hydrates rows through a closure receiving each row's values in
    /// positional order.
    #[must_use]
    pub fn hydrate_with<T, F>(&self, hydrator: F) -> Hydrating<T>
    where
        T: 'static,
        F: Fn(&[Value]) -> std::result::Result<T, HydrationError> + Send + Sync + 'static,
    {
        Hydrating {
            builder: self.clone(),
            mapper: Arc::new(move |row: &Row, _ctx: &HydrationContext| {
                let values: Vec<Value> = row.values().cloned().collect();
                hydrator(&values)
            }),
            load_callback: None,
        }
    }
}

/// A builder paired with a hydration strategy for `T`.
pub struct Hydrating<T> {
    builder: QueryBuilder,
    mapper: Arc<dyn Fn(&Row, &HydrationContext) -> std::result::Result<T, HydrationError> + Send + Sync>,
    load_callback: Option<Arc<dyn Fn(&mut T) + Send + Sync>>,
}

impl<T> Clone for Hydrating<T> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            mapper: Arc::clone(&self.mapper),
            load_callback: self.load_callback.clone(),
        }
    }
}

impl<T> Hydrating<T> {
    /// Runs `callback` on every hydrated instance, after construction.
    #[must_use]
    pub fn with_load_callback(mut self, callback: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.load_callback = Some(Arc::new(callback));
        self
    }

    /// Executes and hydrates every row.
    ///
    /// # Errors
    ///
    /// Execution errors, and [`Error::Hydration`] per failing row.
    pub fn fetch(&self) -> Result<Vec<T>> {
        let ctx = self.builder.backend.hydration_context();
        let mut out = Vec::new();
        for row in self.builder.rows()? {
            let mut instance = (self.mapper)(&row, &ctx)?;
            if let Some(callback) = &self.load_callback {
                callback(&mut instance);
            }
            out.push(instance);
        }
        Ok(out)
    }

    /// Executes with `LIMIT 1` and hydrates the first row.
    ///
    /// # Errors
    ///
    /// As for [`Hydrating::fetch`].
    pub fn one(&self) -> Result<Option<T>> {
        let narrowed = Self {
            builder: self.builder.limit(1)?,
            mapper: Arc::clone(&self.mapper),
            load_callback: self.load_callback.clone(),
        };
        Ok(narrowed.fetch()?.into_iter().next())
    }
}

// ---------------------------------------------------------------
// AST surgery helpers
// ---------------------------------------------------------------

/// Stand-in used while a query node is being replaced.
fn placeholder_query() -> Query {
    Query::Select(SelectStatement::from_table("_"))
}

/// Descends through a WITH wrapper to the query body.
fn body_of(query: &mut Query) -> &mut Query {
    match query {
        Query::With(_, body) => body_of(body),
        other => other,
    }
}

/// The SELECT that membership-changing operations apply to, wrapping the
/// body as a subquery first when it is paginated or a set operation.
fn filtering_select(query: &mut Query) -> &mut SelectStatement {
    let body = body_of(query);
    let needs_barrier = match body {
        Query::Select(select) => select.limit.is_some() || select.offset.is_some(),
        Query::SetOperation(_) => true,
        Query::With(..) => unreachable!("body_of strips WITH wrappers"),
    };
    if needs_barrier {
        barrier(body);
    }
    match body {
        Query::Select(select) => select,
        _ => unreachable!("barrier always leaves a SELECT"),
    }
}

/// Wraps the body when its LIMIT or OFFSET is an expression the builder
/// cannot fold (a parameter, say); narrowing then applies to the wrapper
/// and stays inside the original window.
fn normalize_paging(query: &mut Query) {
    let body = body_of(query);
    if let Query::Select(select) = body {
        let opaque = |expr: &Option<Expr>| {
            expr.is_some() && literal_int(expr.as_ref()).is_none()
        };
        if opaque(&select.limit) || opaque(&select.offset) {
            barrier(body);
        }
    }
}

/// The SELECT that LIMIT/OFFSET apply to; a set operation is wrapped so
/// the bound applies to the combined rows.
fn paging_select(query: &mut Query) -> &mut SelectStatement {
    let body = body_of(query);
    if matches!(body, Query::SetOperation(_)) {
        barrier(body);
    }
    match body {
        Query::Select(select) => select,
        _ => unreachable!("barrier always leaves a SELECT"),
    }
}

/// The SELECT a projection replacement applies to.
fn projection_select(query: &mut Query, force_wrap: bool) -> &mut SelectStatement {
    let body = body_of(query);
    let needs_barrier = force_wrap
        || match body {
            Query::Select(select) => {
                select.distinct
                    || !select.group_by.is_empty()
                    || select.limit.is_some()
                    || select.offset.is_some()
            }
            Query::SetOperation(_) => true,
            Query::With(..) => unreachable!("body_of strips WITH wrappers"),
        };
    if needs_barrier {
        barrier(body);
    }
    match body {
        Query::Select(select) => select,
        _ => unreachable!("barrier always leaves a SELECT"),
    }
}

/// Replaces `slot` with `SELECT * FROM (slot) AS _q`.
fn barrier(slot: &mut Query) {
    let inner = std::mem::replace(slot, placeholder_query());
    *slot = Query::Select(SelectStatement {
        distinct: false,
        columns: vec![SelectColumn::new(Expr::Wildcard { table: None })],
        from: Some(TableRef::Subquery {
            query: Box::new(inner),
            alias: "_q".to_string(),
        }),
        where_clause: None,
        group_by: Vec::new(),
        having: None,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    });
}

fn wrap_count(inner: Query) -> SelectStatement {
    SelectStatement {
        distinct: false,
        columns: vec![SelectColumn::new(Expr::Function(
            sqlit_core::ast::FunctionCall {
                name: "COUNT".to_string(),
                args: vec![Expr::Wildcard { table: None }],
                distinct: false,
            },
        ))],
        from: Some(TableRef::Subquery {
            query: Box::new(inner),
            alias: "_count".to_string(),
        }),
        where_clause: None,
        group_by: Vec::new(),
        having: None,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    }
}

fn and_onto(slot: &mut Option<Expr>, expr: Expr) {
    let wrapped = match &expr {
        Expr::Binary {
            op: BinaryOp::Or, ..
        } => Expr::Paren(Box::new(expr)),
        _ => expr,
    };
    *slot = Some(match slot.take() {
        None => wrapped,
        Some(existing) => existing.and(wrapped),
    });
}

fn literal_int(expr: Option<&Expr>) -> Option<i64> {
    match expr {
        Some(Expr::Literal(sqlit_core::ast::Literal::Integer(n))) => Some(*n),
        _ => None,
    }
}

/// Splits a query into its CTE list, recursive flag, and inner body.
fn split_with(query: Query) -> (Vec<CommonTableExpr>, bool, Query) {
    match query {
        Query::With(with, body) => (with.ctes, with.recursive, *body),
        other => (Vec::new(), false, other),
    }
}

fn rewrap_with(ctes: Vec<CommonTableExpr>, recursive: bool, body: Query) -> Query {
    if ctes.is_empty() {
        body
    } else {
        Query::With(WithClause { recursive, ctes }, Box::new(body))
    }
}

/// Merges `incoming` CTEs into `existing`: an identical definition of an
/// existing name is dropped, a different one is a conflict.
fn merge_cte_lists(
    existing: &mut Vec<CommonTableExpr>,
    incoming: Vec<CommonTableExpr>,
) -> Result<()> {
    for cte in incoming {
        match existing
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(&cte.name))
        {
            None => existing.push(cte),
            Some(present) if *present == cte => {}
            Some(_) => return Err(Error::ConflictingCte(cte.name)),
        }
    }
    Ok(())
}

/// Hoists `ctes` onto `query`'s WITH clause (merging by name).
fn merge_ctes_into(
    query: &mut Query,
    ctes: Vec<CommonTableExpr>,
    recursive: bool,
) -> Result<()> {
    if ctes.is_empty() {
        return Ok(());
    }
    let own = std::mem::replace(query, placeholder_query());
    let (mut existing, mut own_recursive, body) = split_with(own);
    merge_cte_lists(&mut existing, ctes)?;
    own_recursive |= recursive;
    *query = rewrap_with(existing, own_recursive, body);
    Ok(())
}

fn offset_positional_expr(expr: &mut Expr, by: usize) {
    if by == 0 {
        return;
    }
    visit::visit_expr_mut(expr, &mut |e| {
        if let Expr::Parameter {
            name: None,
            position,
        } = e
        {
            *position += by;
        }
    });
}

fn offset_positional_query(query: &mut Query, by: usize) {
    if by == 0 {
        return;
    }
    visit::visit_query_mut(query, &mut |e| {
        if let Expr::Parameter {
            name: None,
            position,
        } = e
        {
            *position += by;
        }
    });
}
