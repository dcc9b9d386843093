//! SQL Parser
//!
//! A hand-written recursive descent parser with Pratt expression
//! parsing for a subset of SQL:2016 (ISO/IEC 9075) covering DQL, DML,
//! and a practical slice of DDL.
//!
//! # Parsing approach
//!
//! Statements (`SELECT`, `INSERT`, `UPDATE`, `DELETE`, `CREATE`,
//! `DROP`) are parsed by dedicated recursive-descent methods. A query
//! (a `SELECT`, a `UNION`/`INTERSECT`/`EXCEPT` chain, or either
//! wrapped in `WITH`) is represented uniformly by [`crate::ast::Query`]
//! and reused wherever SQL allows a query to appear: top-level
//! statements, scalar and table-valued subqueries, `IN (…)`, and
//! `INSERT … SELECT`. Expressions use a Pratt (top-down operator
//! precedence) parser that handles prefix, infix, and postfix
//! operators with correct precedence and associativity.
//!
//! # Supported statements
//!
//! | Statement | Notes |
//! |-----------|-------|
//! | `SELECT`  | Full DQL with all clauses listed below |
//! | `WITH`    | `[RECURSIVE]`, one or more CTEs, wraps any query |
//! | set ops   | `UNION [ALL]`, `INTERSECT [ALL]`, `EXCEPT [ALL]` |
//! | `INSERT`  | `VALUES`, `DEFAULT VALUES`, sub-query, `ON CONFLICT` |
//! | `UPDATE`  | `SET`, optional `FROM`, optional alias |
//! | `DELETE`  | Optional alias, `WHERE` |
//! | `CREATE TABLE` | `IF NOT EXISTS`, column constraints |
//! | `DROP TABLE` | `IF EXISTS` |
//! | `CREATE [UNIQUE] INDEX` | `IF NOT EXISTS`, `ON table (cols…)` |
//! | `DROP INDEX` | `IF EXISTS` |
//!
//! # SELECT clauses
//!
//! `DISTINCT` / `ALL`, column list with aliases, `FROM` (table,
//! schema-qualified table, subquery, aliases), `WHERE`, `GROUP BY`,
//! `HAVING`, `ORDER BY` (with `ASC` / `DESC` and
//! `NULLS FIRST` / `NULLS LAST`), `LIMIT`, `OFFSET`.
//!
//! # JOINs
//!
//! `INNER`, `LEFT [OUTER]`, `RIGHT [OUTER]`, `FULL [OUTER]`,
//! `CROSS`, with `ON` or `USING` conditions. Chained (multi-table)
//! joins are left-associative.
//!
//! # Expressions
//!
//! - **Literals**: integers, floats, strings, blobs (`X'…'`),
//!   booleans (`TRUE`/`FALSE`), `NULL`
//! - **Column references**: unqualified (`col`), qualified (`t.col`),
//!   wildcards (`*`, `t.*`)
//! - **Binary operators**: `+`, `-`, `*`, `/`, `%`, `||`, `&`, `|`,
//!   `<<`, `>>`, `=`, `!=`/`<>`, `<`, `<=`, `>`, `>=`, `AND`, `OR`,
//!   `LIKE`
//! - **Unary operators**: `-` (negate), `NOT`, `~` (bitwise NOT)
//! - **Special forms**: `IS [NOT] NULL`, `[NOT] BETWEEN … AND …`,
//!   `[NOT] IN (…)` (literal list or subquery), `[NOT] LIKE`,
//!   `CASE`/`WHEN`/`THEN`/`ELSE`/`END`, `CAST(… AS <type>)`,
//!   `[NOT] EXISTS(…)`, quantified comparisons
//!   (`expr op ANY/SOME/ALL (subquery)`)
//! - **Function calls**: named functions with optional `DISTINCT`
//!   (e.g. `COUNT(DISTINCT col)`)
//! - **Window functions**: `func(…) OVER (PARTITION BY … ORDER BY …
//!   [ROWS|RANGE …])`
//! - **Subqueries**: scalar `(SELECT …)` in expressions, anywhere a
//!   query may be parenthesized
//! - **Parameters**: positional (`?`) and named (`:name`)
//!
//! # Data types
//!
//! `SMALLINT`, `INTEGER`/`INT`, `BIGINT`, `REAL`, `DOUBLE`/`FLOAT`,
//! `DECIMAL(p, s)`, `NUMERIC(p, s)`, `CHAR(n)`, `VARCHAR(n)`,
//! `TEXT`, `BLOB`, `BINARY(n)`, `VARBINARY(n)`, `DATE`, `TIME`,
//! `TIMESTAMP`, `DATETIME`, `BOOLEAN`.
//!
//! # INSERT extensions
//!
//! `ON CONFLICT DO NOTHING` and `ON CONFLICT DO UPDATE SET …` for
//! upsert semantics.
//!
//! # Not supported
//!
//! `ALTER TABLE`, transactions (`BEGIN` / `COMMIT` / `ROLLBACK`),
//! `NATURAL JOIN`, views, triggers.

mod error;
mod parser;
mod pratt;

pub use error::ParseError;
pub use parser::Parser;
