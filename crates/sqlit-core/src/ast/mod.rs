//! Abstract Syntax Tree (AST) types for SQL statements.

mod expression;
mod statement;
mod types;
pub mod visit;

pub use expression::{
    BinaryOp, Expr, FrameUnit, FunctionCall, InSource, Literal, Quantifier, UnaryOp, WindowSpec,
};
pub use statement::{
    CommonTableExpr, ConflictAction, CreateIndexStatement, CreateTableStatement, DeleteStatement,
    DropIndexStatement, DropTableStatement, InsertSource, InsertStatement, JoinClause, JoinType,
    NullOrdering, OnConflict, OrderBy, OrderDirection, Query, SelectColumn, SelectStatement,
    SetOperation, SetOperator, Statement, TableRef, UpdateAssignment, UpdateStatement, WithClause,
};
pub use types::{ColumnDef, DataType, TypeFamily};
