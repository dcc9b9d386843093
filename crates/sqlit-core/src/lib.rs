//! # sqlit-core
//!
//! The SQL front end shared by [`sqlit`](https://docs.rs/sqlit): a
//! hand-written lexer, recursive-descent/Pratt parser, dialect-aware
//! renderer, and a dynamic [`Value`] type used to carry bound
//! parameters and hydrated results without compile-time schema
//! knowledge.
//!
//! This crate has no opinion about where a parsed [`Statement`]
//! eventually runs — a real driver, or the in-memory virtual engine
//! built on top of host-registered tables. It only knows how to turn
//! SQL text into an AST, and an AST plus a [`dialect::Dialect`] back
//! into SQL text and bound parameters.
//!
//! ```rust
//! use sqlit_core::Parser;
//!
//! let stmt = Parser::new("SELECT id, name FROM users WHERE active = ?").parse_statement().unwrap();
//! assert_eq!(stmt.to_string(), "SELECT id, name FROM users WHERE active = ?");
//! ```

pub mod ast;
pub mod dialect;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Expr, Query, Statement};
pub use dialect::Dialect;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use value::{ToValue, Value};
