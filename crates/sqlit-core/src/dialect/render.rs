//! AST to SQL text rendering.
//!
//! [`render`] walks a [`Statement`] and produces the SQL text for a chosen
//! [`Dialect`] plus the ordered list of parameter references that bind spots
//! were rewritten into. Literal [`Expr::Parameter`] nodes already present in
//! the AST (`?` or `:name`) are preserved as-is; the renderer's own job is
//! placeholder *numbering* (dialects disagree on whether the nth placeholder
//! is `?`, `$n`, or `@pN`) and expressing constructs a dialect can't, like
//! `EXCEPT` on a dialect that only understands `MINUS`.

use thiserror::Error;

use super::{Dialect, LimitStyle};
use crate::ast::{
    CommonTableExpr, Expr, FrameUnit, FunctionCall, InSource, JoinClause, JoinType, Literal,
    OrderBy, OrderDirection, Quantifier, Query, SelectColumn, SelectStatement, SetOperator,
    Statement, TableRef, UnaryOp, WindowSpec, WithClause,
};

/// A reference to a bound parameter as it appears, left to right, in the
/// rendered SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRef {
    /// A positional parameter (`?`), numbered in render order.
    Positional(usize),
    /// A named parameter (`:name`).
    Named(String),
}

/// The output of [`render`]: SQL text and the parameters it references, in
/// the order they were encountered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The rendered SQL text.
    pub sql: String,
    /// Parameter references in left-to-right occurrence order.
    pub params: Vec<ParamRef>,
}

/// Errors raised while rendering an AST for a specific dialect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The target dialect cannot express this construct at all.
    #[error("{dialect} does not support {feature}")]
    UnsupportedDialectFeature {
        /// The dialect that rejected the construct.
        dialect: String,
        /// A short description of what was being rendered.
        feature: String,
    },
}

/// Renders `stmt` as SQL text for `dialect`.
///
/// # Errors
///
/// Returns [`RenderError::UnsupportedDialectFeature`] if `stmt` uses a
/// construct `dialect` cannot express, such as a set operator the dialect
/// rejects (see [`Dialect::supports_set_operation`]).
pub fn render(stmt: &Statement, dialect: &dyn Dialect) -> Result<Rendered, RenderError> {
    let mut r = Renderer {
        dialect,
        sql: String::new(),
        params: Vec::new(),
    };
    r.render_statement(stmt)?;
    Ok(Rendered {
        sql: r.sql,
        params: r.params,
    })
}

struct Renderer<'a> {
    dialect: &'a dyn Dialect,
    sql: String,
    params: Vec<ParamRef>,
}

impl Renderer<'_> {
    fn render_statement(&mut self, stmt: &Statement) -> Result<(), RenderError> {
        match stmt {
            Statement::Query(query) => self.render_query(query),
            Statement::Insert(insert) => self.render_insert(insert),
            Statement::Update(update) => self.render_update(update),
            Statement::Delete(delete) => self.render_delete(delete),
            Statement::CreateTable(create) => self.render_create_table(create),
            Statement::DropTable(drop) => self.render_drop_table(drop),
            Statement::CreateIndex(create) => self.render_create_index(create),
            Statement::DropIndex(drop) => self.render_drop_index(drop),
        }
    }

    fn render_query(&mut self, query: &Query) -> Result<(), RenderError> {
        match query {
            Query::Select(select) => self.render_select(select),
            Query::SetOperation(op) => {
                if !self.dialect.supports_set_operation(op.operator) {
                    return Err(RenderError::UnsupportedDialectFeature {
                        dialect: self.dialect.name().to_string(),
                        feature: format!("{} set operator", set_operator_keyword(op.operator)),
                    });
                }
                self.render_query(&op.left)?;
                self.sql.push(' ');
                self.sql.push_str(set_operator_keyword(op.operator));
                if op.all {
                    self.sql.push_str(" ALL");
                }
                self.sql.push(' ');
                self.render_query(&op.right)
            }
            Query::With(with, body) => {
                self.render_with_clause(with)?;
                self.sql.push(' ');
                self.render_query(body)
            }
        }
    }

    fn render_with_clause(&mut self, with: &WithClause) -> Result<(), RenderError> {
        self.sql.push_str("WITH ");
        if with.recursive {
            self.sql.push_str("RECURSIVE ");
        }
        for (i, cte) in with.ctes.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.render_cte(cte)?;
        }
        Ok(())
    }

    fn render_cte(&mut self, cte: &CommonTableExpr) -> Result<(), RenderError> {
        self.sql.push_str(&self.dialect.quote_identifier(&cte.name));
        if !cte.columns.is_empty() {
            self.sql.push_str(" (");
            for (i, col) in cte.columns.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.sql.push_str(&self.dialect.quote_identifier(col));
            }
            self.sql.push(')');
        }
        self.sql.push_str(" AS (");
        self.render_query(&cte.query)?;
        self.sql.push(')');
        Ok(())
    }

    fn render_select(&mut self, select: &SelectStatement) -> Result<(), RenderError> {
        self.sql.push_str("SELECT ");
        if select.distinct {
            self.sql.push_str("DISTINCT ");
        }
        for (i, col) in select.columns.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.render_select_column(col)?;
        }
        if let Some(from) = &select.from {
            self.sql.push_str(" FROM ");
            self.render_table_ref(from)?;
        }
        if let Some(cond) = &select.where_clause {
            self.sql.push_str(" WHERE ");
            self.render_expr(cond)?;
        }
        if !select.group_by.is_empty() {
            self.sql.push_str(" GROUP BY ");
            for (i, expr) in select.group_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.render_expr(expr)?;
            }
        }
        if let Some(having) = &select.having {
            self.sql.push_str(" HAVING ");
            self.render_expr(having)?;
        }
        if !select.order_by.is_empty() {
            self.sql.push_str(" ORDER BY ");
            for (i, ob) in select.order_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.render_order_by(ob)?;
            }
        }
        self.render_limit_offset(select.limit.as_ref(), select.offset.as_ref())?;
        Ok(())
    }

    /// Renders a sub-expression in isolation, returning its text. Parameters
    /// it references are still recorded (and numbered) against the overall
    /// render, since `LIMIT`/`OFFSET` text must be reordered per dialect
    /// while parameter numbering follows the original left-to-right clause
    /// order the caller renders its pieces in.
    fn render_expr_text(&mut self, expr: &Expr) -> Result<String, RenderError> {
        let saved = core::mem::take(&mut self.sql);
        self.render_expr(expr)?;
        Ok(core::mem::replace(&mut self.sql, saved))
    }

    fn render_limit_offset(
        &mut self,
        limit: Option<&Expr>,
        offset: Option<&Expr>,
    ) -> Result<(), RenderError> {
        let limit_text = limit.map(|e| self.render_expr_text(e)).transpose()?;
        let offset_text = offset.map(|e| self.render_expr_text(e)).transpose()?;

        let Some(limit_text) = limit_text else {
            if let Some(offset_text) = offset_text {
                match self.dialect.limit_style() {
                    LimitStyle::LimitOffset | LimitStyle::MySql => {
                        self.sql.push_str(&format!(" OFFSET {offset_text}"));
                    }
                    LimitStyle::OffsetFetch => {
                        self.sql.push_str(&format!(" OFFSET {offset_text} ROWS"));
                    }
                }
            }
            return Ok(());
        };
        match self.dialect.limit_style() {
            LimitStyle::LimitOffset => {
                self.sql.push_str(&format!(" LIMIT {limit_text}"));
                if let Some(offset_text) = offset_text {
                    self.sql.push_str(&format!(" OFFSET {offset_text}"));
                }
            }
            LimitStyle::MySql => {
                if let Some(offset_text) = offset_text {
                    self.sql
                        .push_str(&format!(" LIMIT {offset_text}, {limit_text}"));
                } else {
                    self.sql.push_str(&format!(" LIMIT {limit_text}"));
                }
            }
            LimitStyle::OffsetFetch => {
                let offset_text = offset_text.unwrap_or_else(|| "0".to_string());
                self.sql.push_str(&format!(
                    " OFFSET {offset_text} ROWS FETCH NEXT {limit_text} ROWS ONLY"
                ));
            }
        }
        Ok(())
    }

    fn render_select_column(&mut self, col: &SelectColumn) -> Result<(), RenderError> {
        self.render_expr(&col.expr)?;
        if let Some(alias) = &col.alias {
            self.sql.push_str(" AS ");
            self.sql.push_str(&self.dialect.quote_identifier(alias));
        }
        Ok(())
    }

    fn render_order_by(&mut self, ob: &OrderBy) -> Result<(), RenderError> {
        self.render_expr(&ob.expr)?;
        match ob.direction {
            OrderDirection::Asc => {}
            OrderDirection::Desc => self.sql.push_str(" DESC"),
        }
        if let Some(nulls) = ob.nulls {
            self.sql.push_str(match nulls {
                crate::ast::NullOrdering::First => " NULLS FIRST",
                crate::ast::NullOrdering::Last => " NULLS LAST",
            });
        }
        Ok(())
    }

    fn render_table_ref(&mut self, table: &TableRef) -> Result<(), RenderError> {
        match table {
            TableRef::Table {
                schema,
                name,
                alias,
            } => {
                if let Some(schema) = schema {
                    self.sql.push_str(&self.dialect.quote_identifier(schema));
                    self.sql.push('.');
                }
                self.sql.push_str(&self.dialect.quote_identifier(name));
                if let Some(alias) = alias {
                    self.sql.push_str(" AS ");
                    self.sql.push_str(&self.dialect.quote_identifier(alias));
                }
            }
            TableRef::Subquery { query, alias } => {
                self.sql.push('(');
                self.render_query(query)?;
                self.sql.push_str(") AS ");
                self.sql.push_str(&self.dialect.quote_identifier(alias));
            }
            TableRef::Join { left, join } => {
                self.render_table_ref(left)?;
                self.sql.push(' ');
                self.render_join_clause(join)?;
            }
        }
        Ok(())
    }

    fn render_join_clause(&mut self, join: &JoinClause) -> Result<(), RenderError> {
        self.sql.push_str(join_keyword(join.join_type));
        self.sql.push(' ');
        self.render_table_ref(&join.table)?;
        if let Some(on) = &join.on {
            self.sql.push_str(" ON ");
            self.render_expr(on)?;
        } else if !join.using.is_empty() {
            self.sql.push_str(" USING (");
            for (i, col) in join.using.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.sql.push_str(&self.dialect.quote_identifier(col));
            }
            self.sql.push(')');
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn render_expr(&mut self, expr: &Expr) -> Result<(), RenderError> {
        match expr {
            Expr::Literal(lit) => self.render_literal(lit),
            Expr::Column { table, name, .. } => {
                if let Some(table) = table {
                    self.sql.push_str(&self.dialect.quote_identifier(table));
                    self.sql.push('.');
                }
                self.sql.push_str(&self.dialect.quote_identifier(name));
            }
            Expr::Wildcard { table } => {
                if let Some(table) = table {
                    self.sql.push_str(&self.dialect.quote_identifier(table));
                    self.sql.push('.');
                }
                self.sql.push('*');
            }
            Expr::Parameter { name, position } => self.render_parameter(name, *position),
            Expr::Binary { left, op, right } => {
                self.render_expr(left)?;
                self.sql.push(' ');
                self.sql.push_str(op.as_str());
                self.sql.push(' ');
                self.render_expr(right)?;
            }
            Expr::Unary { op, operand } => {
                match op {
                    UnaryOp::Neg => self.sql.push('-'),
                    UnaryOp::Not => self.sql.push_str("NOT "),
                    UnaryOp::BitNot => self.sql.push('~'),
                }
                self.render_expr(operand)?;
            }
            Expr::Paren(inner) => {
                self.sql.push('(');
                self.render_expr(inner)?;
                self.sql.push(')');
            }
            Expr::Function(call) => self.render_function_call(call)?,
            Expr::Window { function, spec } => {
                self.render_function_call(function)?;
                self.sql.push_str(" OVER (");
                self.render_window_spec(spec)?;
                self.sql.push(')');
            }
            Expr::Subquery(query) => {
                self.sql.push('(');
                self.render_query(query)?;
                self.sql.push(')');
            }
            Expr::Exists { subquery, negated } => {
                if *negated {
                    self.sql.push_str("NOT ");
                }
                self.sql.push_str("EXISTS (");
                self.render_query(subquery)?;
                self.sql.push(')');
            }
            Expr::Quantified {
                left,
                op,
                quantifier,
                subquery,
            } => {
                self.render_expr(left)?;
                self.sql.push(' ');
                self.sql.push_str(op.as_str());
                self.sql.push(' ');
                self.sql.push_str(quantifier_keyword(*quantifier));
                self.sql.push_str(" (");
                self.render_query(subquery)?;
                self.sql.push(')');
            }
            Expr::IsNull { expr, negated } => {
                self.render_expr(expr)?;
                self.sql.push_str(if *negated {
                    " IS NOT NULL"
                } else {
                    " IS NULL"
                });
            }
            Expr::In {
                expr,
                source,
                negated,
            } => {
                self.render_expr(expr)?;
                if *negated {
                    self.sql.push_str(" NOT IN (");
                } else {
                    self.sql.push_str(" IN (");
                }
                match source {
                    InSource::List(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                self.sql.push_str(", ");
                            }
                            self.render_expr(item)?;
                        }
                    }
                    InSource::Subquery(query) => self.render_query(query)?,
                }
                self.sql.push(')');
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.render_expr(expr)?;
                self.sql
                    .push_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.render_expr(low)?;
                self.sql.push_str(" AND ");
                self.render_expr(high)?;
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                self.sql.push_str("CASE");
                if let Some(operand) = operand {
                    self.sql.push(' ');
                    self.render_expr(operand)?;
                }
                for (when, then) in when_clauses {
                    self.sql.push_str(" WHEN ");
                    self.render_expr(when)?;
                    self.sql.push_str(" THEN ");
                    self.render_expr(then)?;
                }
                if let Some(else_clause) = else_clause {
                    self.sql.push_str(" ELSE ");
                    self.render_expr(else_clause)?;
                }
                self.sql.push_str(" END");
            }
            Expr::Cast { expr, data_type } => {
                self.sql.push_str("CAST(");
                self.render_expr(expr)?;
                self.sql.push_str(" AS ");
                self.sql.push_str(&data_type.to_sql());
                self.sql.push(')');
            }
        }
        Ok(())
    }

    fn render_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Null => self.sql.push_str("NULL"),
            Literal::Boolean(b) => self.sql.push_str(if *b { "TRUE" } else { "FALSE" }),
            Literal::Integer(n) => self.sql.push_str(&n.to_string()),
            Literal::Float(f) => self.sql.push_str(&f.to_string()),
            Literal::String(s) => {
                self.sql.push('\'');
                self.sql.push_str(&s.replace('\'', "''"));
                self.sql.push('\'');
            }
            Literal::Blob(bytes) => {
                self.sql.push_str("X'");
                for byte in bytes {
                    self.sql.push_str(&format!("{byte:02X}"));
                }
                self.sql.push('\'');
            }
        }
    }

    fn render_parameter(&mut self, name: &Option<String>, position: usize) {
        let param_ref = name.as_ref().map_or_else(
            || ParamRef::Positional(position),
            |name| ParamRef::Named(name.clone()),
        );
        self.params.push(param_ref);
        self.sql
            .push_str(&self.dialect.parameter_placeholder(self.params.len()));
    }

    fn render_function_call(&mut self, call: &FunctionCall) -> Result<(), RenderError> {
        self.sql.push_str(&call.name);
        self.sql.push('(');
        if call.distinct {
            self.sql.push_str("DISTINCT ");
        }
        for (i, arg) in call.args.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.render_expr(arg)?;
        }
        self.sql.push(')');
        Ok(())
    }

    fn render_window_spec(&mut self, spec: &WindowSpec) -> Result<(), RenderError> {
        let mut wrote_anything = false;
        if !spec.partition_by.is_empty() {
            self.sql.push_str("PARTITION BY ");
            for (i, expr) in spec.partition_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.render_expr(expr)?;
            }
            wrote_anything = true;
        }
        if !spec.order_by.is_empty() {
            if wrote_anything {
                self.sql.push(' ');
            }
            self.sql.push_str("ORDER BY ");
            for (i, ob) in spec.order_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.render_order_by(ob)?;
            }
            wrote_anything = true;
        }
        match spec.frame {
            FrameUnit::Default => {}
            FrameUnit::Rows | FrameUnit::Range => {
                if wrote_anything {
                    self.sql.push(' ');
                }
                self.sql.push_str(match spec.frame {
                    FrameUnit::Rows => "ROWS UNBOUNDED PRECEDING",
                    FrameUnit::Range => "RANGE UNBOUNDED PRECEDING",
                    FrameUnit::Default => unreachable!(),
                });
            }
        }
        Ok(())
    }

    fn render_insert(&mut self, insert: &crate::ast::InsertStatement) -> Result<(), RenderError> {
        self.sql.push_str("INSERT INTO ");
        if let Some(schema) = &insert.schema {
            self.sql.push_str(&self.dialect.quote_identifier(schema));
            self.sql.push('.');
        }
        self.sql.push_str(&self.dialect.quote_identifier(&insert.table));
        if !insert.columns.is_empty() {
            self.sql.push_str(" (");
            for (i, col) in insert.columns.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.sql.push_str(&self.dialect.quote_identifier(col));
            }
            self.sql.push(')');
        }
        self.sql.push(' ');
        match &insert.values {
            crate::ast::InsertSource::Values(rows) => {
                self.sql.push_str("VALUES ");
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.sql.push('(');
                    for (j, expr) in row.iter().enumerate() {
                        if j > 0 {
                            self.sql.push_str(", ");
                        }
                        self.render_expr(expr)?;
                    }
                    self.sql.push(')');
                }
            }
            crate::ast::InsertSource::Query(query) => self.render_query(query)?,
            crate::ast::InsertSource::DefaultValues => self.sql.push_str("DEFAULT VALUES"),
        }
        if let Some(on_conflict) = &insert.on_conflict {
            if !self.dialect.supports_upsert() {
                return Err(RenderError::UnsupportedDialectFeature {
                    dialect: self.dialect.name().to_string(),
                    feature: "ON CONFLICT upserts".to_string(),
                });
            }
            self.sql.push_str(" ON CONFLICT");
            if !on_conflict.columns.is_empty() {
                self.sql.push_str(" (");
                for (i, col) in on_conflict.columns.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.sql.push_str(&self.dialect.quote_identifier(col));
                }
                self.sql.push(')');
            }
            match &on_conflict.action {
                crate::ast::ConflictAction::DoNothing => self.sql.push_str(" DO NOTHING"),
                crate::ast::ConflictAction::DoUpdate(assignments) => {
                    self.sql.push_str(" DO UPDATE SET ");
                    for (i, assign) in assignments.iter().enumerate() {
                        if i > 0 {
                            self.sql.push_str(", ");
                        }
                        self.sql
                            .push_str(&self.dialect.quote_identifier(&assign.column));
                        self.sql.push_str(" = ");
                        self.render_expr(&assign.value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn render_update(&mut self, update: &crate::ast::UpdateStatement) -> Result<(), RenderError> {
        self.sql.push_str("UPDATE ");
        if let Some(schema) = &update.schema {
            self.sql.push_str(&self.dialect.quote_identifier(schema));
            self.sql.push('.');
        }
        self.sql.push_str(&self.dialect.quote_identifier(&update.table));
        if let Some(alias) = &update.alias {
            self.sql.push_str(" AS ");
            self.sql.push_str(&self.dialect.quote_identifier(alias));
        }
        self.sql.push_str(" SET ");
        for (i, assign) in update.assignments.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.sql
                .push_str(&self.dialect.quote_identifier(&assign.column));
            self.sql.push_str(" = ");
            self.render_expr(&assign.value)?;
        }
        if let Some(from) = &update.from {
            self.sql.push_str(" FROM ");
            self.render_table_ref(from)?;
        }
        if let Some(cond) = &update.where_clause {
            self.sql.push_str(" WHERE ");
            self.render_expr(cond)?;
        }
        Ok(())
    }

    fn render_delete(&mut self, delete: &crate::ast::DeleteStatement) -> Result<(), RenderError> {
        self.sql.push_str("DELETE FROM ");
        if let Some(schema) = &delete.schema {
            self.sql.push_str(&self.dialect.quote_identifier(schema));
            self.sql.push('.');
        }
        self.sql.push_str(&self.dialect.quote_identifier(&delete.table));
        if let Some(alias) = &delete.alias {
            self.sql.push_str(" AS ");
            self.sql.push_str(&self.dialect.quote_identifier(alias));
        }
        if let Some(cond) = &delete.where_clause {
            self.sql.push_str(" WHERE ");
            self.render_expr(cond)?;
        }
        Ok(())
    }

    fn render_create_table(
        &mut self,
        create: &crate::ast::CreateTableStatement,
    ) -> Result<(), RenderError> {
        self.sql.push_str("CREATE TABLE ");
        if create.if_not_exists {
            self.sql.push_str("IF NOT EXISTS ");
        }
        self.sql.push_str(&self.dialect.quote_identifier(&create.name));
        self.sql.push_str(" (");
        for (i, col) in create.columns.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.render_column_def(col)?;
        }
        self.sql.push(')');
        Ok(())
    }

    fn render_column_def(&mut self, col: &crate::ast::ColumnDef) -> Result<(), RenderError> {
        self.sql.push_str(&self.dialect.quote_identifier(&col.name));
        self.sql.push(' ');
        self.sql.push_str(&col.data_type.to_sql());
        if col.primary_key {
            self.sql.push_str(" PRIMARY KEY");
        } else if col.not_null {
            self.sql.push_str(" NOT NULL");
        }
        if col.unique && !col.primary_key {
            self.sql.push_str(" UNIQUE");
        }
        if col.autoincrement {
            let keyword = self.dialect.autoincrement_keyword();
            if !keyword.is_empty() {
                self.sql.push(' ');
                self.sql.push_str(keyword);
            }
        }
        if let Some(default) = &col.default {
            self.sql.push_str(" DEFAULT ");
            self.render_expr(default)?;
        }
        Ok(())
    }

    fn render_drop_table(
        &mut self,
        drop: &crate::ast::DropTableStatement,
    ) -> Result<(), RenderError> {
        self.sql.push_str("DROP TABLE ");
        if drop.if_exists {
            self.sql.push_str("IF EXISTS ");
        }
        self.sql.push_str(&self.dialect.quote_identifier(&drop.name));
        Ok(())
    }

    fn render_create_index(
        &mut self,
        create: &crate::ast::CreateIndexStatement,
    ) -> Result<(), RenderError> {
        self.sql.push_str("CREATE ");
        if create.unique {
            self.sql.push_str("UNIQUE ");
        }
        self.sql.push_str("INDEX ");
        if create.if_not_exists {
            self.sql.push_str("IF NOT EXISTS ");
        }
        self.sql.push_str(&self.dialect.quote_identifier(&create.name));
        self.sql.push_str(" ON ");
        self.sql.push_str(&self.dialect.quote_identifier(&create.table));
        self.sql.push_str(" (");
        for (i, col) in create.columns.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push_str(&self.dialect.quote_identifier(col));
        }
        self.sql.push(')');
        Ok(())
    }

    fn render_drop_index(
        &mut self,
        drop: &crate::ast::DropIndexStatement,
    ) -> Result<(), RenderError> {
        self.sql.push_str("DROP INDEX ");
        if drop.if_exists {
            self.sql.push_str("IF EXISTS ");
        }
        self.sql.push_str(&self.dialect.quote_identifier(&drop.name));
        Ok(())
    }
}

fn set_operator_keyword(op: SetOperator) -> &'static str {
    match op {
        SetOperator::Union => "UNION",
        SetOperator::Intersect => "INTERSECT",
        SetOperator::Except => "EXCEPT",
    }
}

fn join_keyword(join_type: JoinType) -> &'static str {
    match join_type {
        JoinType::Inner => "INNER JOIN",
        JoinType::Left => "LEFT JOIN",
        JoinType::Right => "RIGHT JOIN",
        JoinType::Full => "FULL JOIN",
        JoinType::Cross => "CROSS JOIN",
    }
}

fn quantifier_keyword(quantifier: Quantifier) -> &'static str {
    match quantifier {
        Quantifier::Any => "ANY",
        Quantifier::All => "ALL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{GenericDialect, MySqlDialect, SqlServerDialect};
    use crate::Parser;

    fn render_sql(sql: &str, dialect: &dyn Dialect) -> Rendered {
        let stmt = Parser::new(sql).parse_statement().unwrap();
        render(&stmt, dialect).unwrap()
    }

    #[test]
    fn simple_select_round_trips() {
        let rendered = render_sql("SELECT id, name FROM users WHERE id = ?", &GenericDialect);
        assert_eq!(rendered.sql, "SELECT \"id\", \"name\" FROM \"users\" WHERE \"id\" = ?");
        assert_eq!(rendered.params, vec![ParamRef::Positional(1)]);
    }

    #[test]
    fn limit_offset_generic() {
        let rendered = render_sql("SELECT * FROM t LIMIT 10 OFFSET 20", &GenericDialect);
        assert!(rendered.sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn limit_offset_mysql_style() {
        let rendered = render_sql("SELECT * FROM t LIMIT 10 OFFSET 20", &MySqlDialect);
        assert!(rendered.sql.ends_with("LIMIT 20, 10"));
    }

    #[test]
    fn limit_offset_fetch_style() {
        let rendered = render_sql("SELECT * FROM t LIMIT 10 OFFSET 20", &SqlServerDialect);
        assert!(rendered.sql.ends_with("OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"));
    }

    #[test]
    fn except_rejected_by_mysql() {
        let stmt = Parser::new("SELECT a FROM t1 EXCEPT SELECT a FROM t2")
            .parse_statement()
            .unwrap();
        let err = render(&stmt, &MySqlDialect).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedDialectFeature { .. }));
    }

    #[test]
    fn named_parameter_preserved() {
        let rendered = render_sql("SELECT * FROM t WHERE id = :id", &GenericDialect);
        assert_eq!(rendered.params, vec![ParamRef::Named("id".to_string())]);
    }
}
