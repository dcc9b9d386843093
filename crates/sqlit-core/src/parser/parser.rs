//! SQL Parser implementation.

use super::error::ParseError;
use super::pratt::{binary_op, infix_tier, unary_op, Tier};
use crate::ast::{
    BinaryOp, ColumnDef, CommonTableExpr, CreateIndexStatement, CreateTableStatement, DataType,
    DeleteStatement, DropIndexStatement, DropTableStatement, Expr, FrameUnit, FunctionCall,
    InSource, InsertSource, InsertStatement, JoinClause, JoinType, Literal, OrderBy,
    OrderDirection, Quantifier, Query, SelectColumn, SelectStatement, SetOperation, SetOperator,
    Statement, TableRef, TypeFamily, UnaryOp, UpdateAssignment, UpdateStatement, WindowSpec,
    WithClause,
};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// SQL Parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Parameter counter for ? placeholders.
    param_counter: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            param_counter: 0,
        }
    }

    /// Parses a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid SQL statement.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::Select | Keyword::With) => {
                Ok(Statement::Query(self.parse_query()?))
            }
            TokenKind::Keyword(Keyword::Insert) => {
                Ok(Statement::Insert(self.parse_insert_statement()?))
            }
            TokenKind::Keyword(Keyword::Update) => {
                Ok(Statement::Update(self.parse_update_statement()?))
            }
            TokenKind::Keyword(Keyword::Delete) => {
                Ok(Statement::Delete(self.parse_delete_statement()?))
            }
            TokenKind::Keyword(Keyword::Create) => self.parse_create_statement(),
            TokenKind::Keyword(Keyword::Drop) => self.parse_drop_statement(),
            _ => Err(ParseError::unexpected(
                "SELECT, WITH, INSERT, UPDATE, DELETE, CREATE, or DROP",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    /// Parses a bare expression fragment, such as the condition text a query
    /// builder appends to a WHERE clause. The whole input must be consumed.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a single valid expression.
    pub fn parse_expression_fragment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression(0)?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parses a bare ORDER BY item list (without the `ORDER BY` keywords),
    /// e.g. `"price DESC, name"`. The whole input must be consumed.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid ORDER BY list.
    pub fn parse_order_by_fragment(&mut self) -> Result<Vec<OrderBy>, ParseError> {
        let items = self.parse_order_by_list()?;
        self.expect_end()?;
        Ok(items)
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.check(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(ParseError::unexpected(
                "end of input",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    // -----------------------------------------------------------------
    // Queries: SELECT, set operations, and WITH
    // -----------------------------------------------------------------

    /// Parses a query: an optional `WITH` clause wrapping a set-operation
    /// chain of `SELECT`s.
    fn parse_query(&mut self) -> Result<Query, ParseError> {
        if self.check_keyword(Keyword::With) {
            let with = self.parse_with_clause()?;
            let body = self.parse_query()?;
            return Ok(Query::With(with, Box::new(body)));
        }
        self.parse_set_operation()
    }

    fn parse_with_clause(&mut self) -> Result<WithClause, ParseError> {
        self.expect_keyword(Keyword::With)?;
        let recursive = if self.check_keyword(Keyword::Recursive) {
            self.advance();
            true
        } else {
            false
        };

        let mut ctes = vec![];
        loop {
            let name = self.expect_identifier()?;
            let columns = if self.check(&TokenKind::LeftParen) {
                self.advance();
                let cols = self.parse_identifier_list()?;
                self.expect(&TokenKind::RightParen)?;
                cols
            } else {
                vec![]
            };
            self.expect_keyword(Keyword::As)?;
            self.expect(&TokenKind::LeftParen)?;
            let query = self.parse_query()?;
            self.expect(&TokenKind::RightParen)?;
            ctes.push(CommonTableExpr {
                name,
                columns,
                query: Box::new(query),
            });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(WithClause { recursive, ctes })
    }

    /// Parses a left-associative chain of `UNION`/`INTERSECT`/`EXCEPT`.
    fn parse_set_operation(&mut self) -> Result<Query, ParseError> {
        let mut left = self.parse_query_primary()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Keyword(Keyword::Union) => SetOperator::Union,
                TokenKind::Keyword(Keyword::Intersect) => SetOperator::Intersect,
                TokenKind::Keyword(Keyword::Except) => SetOperator::Except,
                _ => break,
            };
            self.advance();

            let all = if self.check_keyword(Keyword::All) {
                self.advance();
                true
            } else if self.check_keyword(Keyword::Distinct) {
                self.advance();
                false
            } else {
                false
            };

            let right = self.parse_query_primary()?;
            left = Query::SetOperation(SetOperation {
                left: Box::new(left),
                operator,
                all,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    /// Parses a parenthesized query or a plain `SELECT`.
    fn parse_query_primary(&mut self) -> Result<Query, ParseError> {
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            let query = self.parse_query()?;
            self.expect(&TokenKind::RightParen)?;
            Ok(query)
        } else {
            Ok(Query::Select(self.parse_select_body()?))
        }
    }

    /// Parses a plain SELECT statement body (no `WITH`, no set operators).
    fn parse_select_body(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        // DISTINCT or ALL
        let distinct = if self.check_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else if self.check_keyword(Keyword::All) {
            self.advance();
            false
        } else {
            false
        };

        // SELECT columns
        let columns = self.parse_select_columns()?;

        // FROM clause (optional for expressions like SELECT 1+1).
        // A comma-separated table list is folded into CROSS JOINs.
        let from = if self.check_keyword(Keyword::From) {
            self.advance();
            let mut table_ref = self.parse_table_ref()?;
            while self.check(&TokenKind::Comma) {
                self.advance();
                let right = self.parse_table_ref()?;
                table_ref = TableRef::Join {
                    left: Box::new(table_ref),
                    join: Box::new(JoinClause {
                        join_type: JoinType::Cross,
                        table: right,
                        on: None,
                        using: vec![],
                    }),
                };
            }
            Some(table_ref)
        } else {
            None
        };

        // WHERE clause
        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        // GROUP BY clause
        let group_by = if self.check_keyword(Keyword::Group) {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_expression_list()?
        } else {
            vec![]
        };

        // HAVING clause
        let having = if self.check_keyword(Keyword::Having) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        // ORDER BY clause
        let order_by = if self.check_keyword(Keyword::Order) {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            vec![]
        };

        // LIMIT clause
        let limit = if self.check_keyword(Keyword::Limit) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        // OFFSET clause
        let offset = if self.check_keyword(Keyword::Offset) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    /// Parses SELECT columns.
    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>, ParseError> {
        let mut columns = vec![];

        loop {
            let expr = self.parse_expression(0)?;

            // Check for alias (AS name or just name)
            let alias = if self.check_keyword(Keyword::As) {
                self.advance();
                Some(self.expect_identifier()?)
            } else if matches!(&self.current.kind, TokenKind::Identifier(_)) {
                Some(self.expect_identifier()?)
            } else {
                None
            };

            columns.push(SelectColumn { expr, alias });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(columns)
    }

    /// Parses a table reference.
    fn parse_table_ref(&mut self) -> Result<TableRef, ParseError> {
        let mut table_ref = if self.check(&TokenKind::LeftParen) {
            // Subquery or grouped table ref
            self.advance();
            if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
                let query = self.parse_query()?;
                self.expect(&TokenKind::RightParen)?;
                let alias = self.parse_optional_alias()?;
                TableRef::Subquery {
                    query: Box::new(query),
                    alias: alias.unwrap_or_else(|| String::from("subquery")),
                }
            } else {
                let inner = self.parse_table_ref()?;
                self.expect(&TokenKind::RightParen)?;
                inner
            }
        } else {
            // Simple table name
            let first = self.expect_identifier()?;
            let (schema, name) = if self.check(&TokenKind::Dot) {
                self.advance();
                let table_name = self.expect_identifier()?;
                (Some(first), table_name)
            } else {
                (None, first)
            };

            let alias = self.parse_optional_alias()?;

            TableRef::Table {
                schema,
                name,
                alias,
            }
        };

        // Parse joins
        while self.is_join_keyword() {
            let join_type = self.parse_join_type()?;
            let right = self.parse_simple_table_ref()?;

            let (on, using) = if join_type == JoinType::Cross {
                (None, vec![])
            } else if self.check_keyword(Keyword::On) {
                self.advance();
                (Some(self.parse_expression(0)?), vec![])
            } else if self.check_keyword(Keyword::Using) {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let cols = self.parse_identifier_list()?;
                self.expect(&TokenKind::RightParen)?;
                (None, cols)
            } else {
                return Err(ParseError::new(
                    "Expected ON or USING clause",
                    self.current.span,
                ));
            };

            table_ref = TableRef::Join {
                left: Box::new(table_ref),
                join: Box::new(JoinClause {
                    join_type,
                    table: right,
                    on,
                    using,
                }),
            };
        }

        Ok(table_ref)
    }

    /// Parses a simple table reference (no joins).
    fn parse_simple_table_ref(&mut self) -> Result<TableRef, ParseError> {
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
                let query = self.parse_query()?;
                self.expect(&TokenKind::RightParen)?;
                let alias = self.parse_optional_alias()?;
                return Ok(TableRef::Subquery {
                    query: Box::new(query),
                    alias: alias.unwrap_or_else(|| String::from("subquery")),
                });
            }
            let inner = self.parse_simple_table_ref()?;
            self.expect(&TokenKind::RightParen)?;
            return Ok(inner);
        }

        let first = self.expect_identifier()?;
        let (schema, name) = if self.check(&TokenKind::Dot) {
            self.advance();
            let table_name = self.expect_identifier()?;
            (Some(first), table_name)
        } else {
            (None, first)
        };

        let alias = self.parse_optional_alias()?;

        Ok(TableRef::Table {
            schema,
            name,
            alias,
        })
    }

    /// Checks if current token is a join keyword.
    fn is_join_keyword(&self) -> bool {
        matches!(
            &self.current.kind,
            TokenKind::Keyword(
                Keyword::Join
                    | Keyword::Inner
                    | Keyword::Left
                    | Keyword::Right
                    | Keyword::Full
                    | Keyword::Cross
            )
        )
    }

    /// Parses a join type.
    fn parse_join_type(&mut self) -> Result<JoinType, ParseError> {
        let join_type = match &self.current.kind {
            TokenKind::Keyword(Keyword::Join) => {
                self.advance();
                JoinType::Inner
            }
            TokenKind::Keyword(Keyword::Inner) => {
                self.advance();
                self.expect_keyword(Keyword::Join)?;
                JoinType::Inner
            }
            TokenKind::Keyword(Keyword::Left) => {
                self.advance();
                if self.check_keyword(Keyword::Outer) {
                    self.advance();
                }
                self.expect_keyword(Keyword::Join)?;
                JoinType::Left
            }
            TokenKind::Keyword(Keyword::Right) => {
                self.advance();
                if self.check_keyword(Keyword::Outer) {
                    self.advance();
                }
                self.expect_keyword(Keyword::Join)?;
                JoinType::Right
            }
            TokenKind::Keyword(Keyword::Full) => {
                self.advance();
                if self.check_keyword(Keyword::Outer) {
                    self.advance();
                }
                self.expect_keyword(Keyword::Join)?;
                JoinType::Full
            }
            TokenKind::Keyword(Keyword::Cross) => {
                self.advance();
                self.expect_keyword(Keyword::Join)?;
                JoinType::Cross
            }
            _ => {
                return Err(ParseError::unexpected(
                    "JOIN keyword",
                    self.current.kind.clone(),
                    self.current.span,
                ));
            }
        };
        Ok(join_type)
    }

    /// Parses an optional table alias.
    fn parse_optional_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.check_keyword(Keyword::As) {
            self.advance();
            Ok(Some(self.expect_identifier()?))
        } else if matches!(&self.current.kind, TokenKind::Identifier(_)) && !self.is_reserved_word()
        {
            Ok(Some(self.expect_identifier()?))
        } else {
            Ok(None)
        }
    }

    /// Checks if current identifier is a reserved word.
    fn is_reserved_word(&self) -> bool {
        matches!(
            &self.current.kind,
            TokenKind::Keyword(
                Keyword::Where
                    | Keyword::Order
                    | Keyword::Group
                    | Keyword::Having
                    | Keyword::Limit
                    | Keyword::Offset
                    | Keyword::Join
                    | Keyword::Inner
                    | Keyword::Left
                    | Keyword::Right
                    | Keyword::Full
                    | Keyword::Cross
                    | Keyword::On
                    | Keyword::Using
                    | Keyword::Union
                    | Keyword::Intersect
                    | Keyword::Except
            )
        )
    }

    /// Parses an INSERT statement.
    fn parse_insert_statement(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;

        let first = self.expect_identifier()?;
        let (schema, table) = if self.check(&TokenKind::Dot) {
            self.advance();
            let table_name = self.expect_identifier()?;
            (Some(first), table_name)
        } else {
            (None, first)
        };

        // Column list (optional)
        let columns = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let cols = self.parse_identifier_list()?;
            self.expect(&TokenKind::RightParen)?;
            cols
        } else {
            vec![]
        };

        // VALUES, SELECT, or DEFAULT VALUES
        let values = if self.check_keyword(Keyword::Values) {
            self.advance();
            let mut rows = vec![];
            loop {
                self.expect(&TokenKind::LeftParen)?;
                let row = self.parse_expression_list()?;
                self.expect(&TokenKind::RightParen)?;
                rows.push(row);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
            InsertSource::Values(rows)
        } else if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
            InsertSource::Query(Box::new(self.parse_query()?))
        } else if self.check_keyword(Keyword::Default) {
            self.advance();
            self.expect_keyword(Keyword::Values)?;
            InsertSource::DefaultValues
        } else {
            return Err(ParseError::unexpected(
                "VALUES, SELECT, or DEFAULT VALUES",
                self.current.kind.clone(),
                self.current.span,
            ));
        };

        // ON CONFLICT clause (upsert).
        let on_conflict = if self.check_keyword(Keyword::On) {
            self.advance();
            self.expect_keyword(Keyword::Conflict)?;
            let conflict_columns = if self.check(&TokenKind::LeftParen) {
                self.advance();
                let cols = self.parse_identifier_list()?;
                self.expect(&TokenKind::RightParen)?;
                cols
            } else {
                vec![]
            };
            self.expect_keyword(Keyword::Do)?;
            let action = if self.check_keyword(Keyword::Nothing) {
                self.advance();
                crate::ast::ConflictAction::DoNothing
            } else {
                self.expect_keyword(Keyword::Update)?;
                self.expect_keyword(Keyword::Set)?;
                let mut assignments = vec![];
                loop {
                    let column = self.expect_identifier()?;
                    self.expect(&TokenKind::Eq)?;
                    let value = self.parse_expression(0)?;
                    assignments.push(UpdateAssignment { column, value });
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                crate::ast::ConflictAction::DoUpdate(assignments)
            };
            Some(crate::ast::OnConflict {
                columns: conflict_columns,
                action,
            })
        } else {
            None
        };

        Ok(InsertStatement {
            schema,
            table,
            columns,
            values,
            on_conflict,
        })
    }

    /// Parses an UPDATE statement.
    fn parse_update_statement(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect_keyword(Keyword::Update)?;

        let first = self.expect_identifier()?;
        let (schema, table) = if self.check(&TokenKind::Dot) {
            self.advance();
            let table_name = self.expect_identifier()?;
            (Some(first), table_name)
        } else {
            (None, first)
        };

        let alias = self.parse_optional_alias()?;

        self.expect_keyword(Keyword::Set)?;

        // Parse SET assignments
        let mut assignments = vec![];
        loop {
            let column = self.expect_identifier()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expression(0)?;
            assignments.push(UpdateAssignment { column, value });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        // FROM clause (optional, for joins)
        let from = if self.check_keyword(Keyword::From) {
            self.advance();
            Some(self.parse_table_ref()?)
        } else {
            None
        };

        // WHERE clause
        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(UpdateStatement {
            schema,
            table,
            alias,
            assignments,
            from,
            where_clause,
        })
    }

    /// Parses a DELETE statement.
    fn parse_delete_statement(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;

        let first = self.expect_identifier()?;
        let (schema, table) = if self.check(&TokenKind::Dot) {
            self.advance();
            let table_name = self.expect_identifier()?;
            (Some(first), table_name)
        } else {
            (None, first)
        };

        let alias = self.parse_optional_alias()?;

        // WHERE clause
        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance();
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(DeleteStatement {
            schema,
            table,
            alias,
            where_clause,
        })
    }

    // -----------------------------------------------------------------
    // DDL: CREATE/DROP TABLE, CREATE/DROP INDEX
    // -----------------------------------------------------------------

    fn parse_create_statement(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Create)?;

        if self.check_keyword(Keyword::Unique) {
            self.advance();
            self.expect_keyword(Keyword::Index)?;
            Ok(Statement::CreateIndex(self.parse_create_index_tail(true)?))
        } else if self.check_keyword(Keyword::Index) {
            self.advance();
            Ok(Statement::CreateIndex(self.parse_create_index_tail(false)?))
        } else if self.check_keyword(Keyword::Table) {
            self.advance();
            Ok(Statement::CreateTable(self.parse_create_table_tail()?))
        } else {
            Err(ParseError::unexpected(
                "TABLE, INDEX, or UNIQUE INDEX",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    fn parse_drop_statement(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Drop)?;

        if self.check_keyword(Keyword::Table) {
            self.advance();
            let if_exists = self.parse_if_exists()?;
            let name = self.expect_identifier()?;
            Ok(Statement::DropTable(DropTableStatement { name, if_exists }))
        } else if self.check_keyword(Keyword::Index) {
            self.advance();
            let if_exists = self.parse_if_exists()?;
            let name = self.expect_identifier()?;
            Ok(Statement::DropIndex(DropIndexStatement { name, if_exists }))
        } else {
            Err(ParseError::unexpected(
                "TABLE or INDEX",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    fn parse_create_table_tail(&mut self) -> Result<CreateTableStatement, ParseError> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;

        let mut columns = vec![];
        loop {
            let col_name = self.expect_identifier()?;
            let data_type = self.parse_data_type()?;
            let mut col = ColumnDef::new(col_name, data_type);

            loop {
                if self.check_keyword(Keyword::Not) {
                    self.advance();
                    self.expect_keyword(Keyword::Null)?;
                    col.not_null = true;
                } else if self.check_keyword(Keyword::Primary) {
                    self.advance();
                    self.expect_keyword(Keyword::Key)?;
                    col.primary_key = true;
                    col.not_null = true;
                } else if self.check_keyword(Keyword::Unique) {
                    self.advance();
                    col.unique = true;
                } else if self.check_keyword(Keyword::Autoincrement) {
                    self.advance();
                    col.autoincrement = true;
                } else if self.check_keyword(Keyword::Default) {
                    self.advance();
                    col.default = Some(self.parse_expression(0)?);
                } else {
                    break;
                }
            }

            columns.push(col);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(CreateTableStatement {
            name,
            columns,
            if_not_exists,
        })
    }

    fn parse_create_index_tail(&mut self, unique: bool) -> Result<CreateIndexStatement, ParseError> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(&TokenKind::RightParen)?;

        Ok(CreateIndexStatement {
            name,
            table,
            columns,
            unique,
            if_not_exists,
        })
    }

    fn parse_if_not_exists(&mut self) -> Result<bool, ParseError> {
        if self.check_keyword(Keyword::If) {
            self.advance();
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_if_exists(&mut self) -> Result<bool, ParseError> {
        if self.check_keyword(Keyword::If) {
            self.advance();
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Parses an ORDER BY list.
    fn parse_order_by_list(&mut self) -> Result<Vec<OrderBy>, ParseError> {
        let mut items = vec![];
        loop {
            let expr = self.parse_expression(0)?;
            let direction = if self.check_keyword(Keyword::Desc) {
                self.advance();
                OrderDirection::Desc
            } else if self.check_keyword(Keyword::Asc) {
                self.advance();
                OrderDirection::Asc
            } else {
                OrderDirection::Asc
            };

            let nulls = if self.check_keyword(Keyword::Nulls) {
                self.advance();
                if self.check_keyword(Keyword::First) {
                    self.advance();
                    Some(crate::ast::NullOrdering::First)
                } else {
                    self.expect_keyword(Keyword::Last)?;
                    Some(crate::ast::NullOrdering::Last)
                }
            } else {
                None
            };

            items.push(OrderBy {
                expr,
                direction,
                nulls,
            });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    /// Parses an expression using Pratt parsing.
    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        // Parse prefix (primary expression or unary operator)
        let mut lhs = self.parse_prefix()?;

        // Parse infix operators
        loop {
            // NOT IN / NOT BETWEEN / NOT LIKE bind like their un-negated
            // forms, on the comparison tier.
            if self.check_keyword(Keyword::Not) {
                if Tier::Compare.left() < min_bp {
                    break;
                }
                self.advance();
                lhs = self.parse_negated_predicate(lhs, Tier::Compare.right())?;
                continue;
            }

            // Check if current token is an infix operator
            let (l_bp, r_bp) = match infix_tier(&self.current.kind) {
                Some(tier) => (tier.left(), tier.right()),
                None => break,
            };

            if l_bp < min_bp {
                break;
            }

            // Handle special infix operators
            match &self.current.kind {
                TokenKind::Keyword(Keyword::Is) => {
                    self.advance();
                    let negated = if self.check_keyword(Keyword::Not) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    self.expect_keyword(Keyword::Null)?;
                    lhs = Expr::IsNull {
                        expr: Box::new(lhs),
                        negated,
                    };
                }
                TokenKind::Keyword(Keyword::In) => {
                    self.advance();
                    self.expect(&TokenKind::LeftParen)?;
                    let source = self.parse_in_source()?;
                    self.expect(&TokenKind::RightParen)?;
                    lhs = Expr::In {
                        expr: Box::new(lhs),
                        source,
                        negated: false,
                    };
                }
                TokenKind::Keyword(Keyword::Between) => {
                    self.advance();
                    let low = self.parse_expression(r_bp)?;
                    self.expect_keyword(Keyword::And)?;
                    let high = self.parse_expression(r_bp)?;
                    lhs = Expr::Between {
                        expr: Box::new(lhs),
                        low: Box::new(low),
                        high: Box::new(high),
                        negated: false,
                    };
                }
                _ => {
                    if let Some(op) = binary_op(&self.current.kind) {
                        self.advance();
                        if op.is_comparison() && self.is_quantifier_keyword() {
                            lhs = self.parse_quantified_tail(lhs, op)?;
                        } else {
                            let rhs = self.parse_expression(r_bp)?;
                            lhs = Expr::Binary {
                                left: Box::new(lhs),
                                op,
                                right: Box::new(rhs),
                            };
                        }
                    } else {
                        break;
                    }
                }
            }
        }

        Ok(lhs)
    }

    fn is_quantifier_keyword(&self) -> bool {
        self.check_keyword(Keyword::Any)
            || self.check_keyword(Keyword::All)
            || self.check_keyword(Keyword::Some)
    }

    fn parse_quantified_tail(&mut self, lhs: Expr, op: BinaryOp) -> Result<Expr, ParseError> {
        let quantifier = if self.check_keyword(Keyword::All) {
            Quantifier::All
        } else {
            Quantifier::Any
        };
        self.advance();
        self.expect(&TokenKind::LeftParen)?;
        let subquery = self.parse_query()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(Expr::Quantified {
            left: Box::new(lhs),
            op,
            quantifier,
            subquery: Box::new(subquery),
        })
    }

    /// Parses the tail of a `NOT IN` / `NOT BETWEEN` / `NOT LIKE` predicate,
    /// having already consumed `lhs` and the `NOT` keyword.
    fn parse_negated_predicate(&mut self, lhs: Expr, r_bp: u8) -> Result<Expr, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::In) => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let source = self.parse_in_source()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(Expr::In {
                    expr: Box::new(lhs),
                    source,
                    negated: true,
                })
            }
            TokenKind::Keyword(Keyword::Between) => {
                self.advance();
                let low = self.parse_expression(r_bp)?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_expression(r_bp)?;
                Ok(Expr::Between {
                    expr: Box::new(lhs),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: true,
                })
            }
            TokenKind::Keyword(Keyword::Like) => {
                self.advance();
                let rhs = self.parse_expression(r_bp)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(Expr::Binary {
                        left: Box::new(lhs),
                        op: BinaryOp::Like,
                        right: Box::new(rhs),
                    }),
                })
            }
            _ => Err(ParseError::unexpected(
                "IN, BETWEEN, or LIKE after NOT",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    fn parse_in_source(&mut self) -> Result<InSource, ParseError> {
        if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
            Ok(InSource::Subquery(Box::new(self.parse_query()?)))
        } else {
            Ok(InSource::List(self.parse_expression_list()?))
        }
    }

    /// Parses a prefix expression.
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        // NOT EXISTS is a dedicated AST node, not a generic unary wrap.
        if self.check_keyword(Keyword::Not) {
            self.advance();
            if self.check_keyword(Keyword::Exists) {
                return self.parse_exists_tail(true);
            }
            let operand = self.parse_expression(Tier::And.left())?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }

        // Check for other unary operators
        if let Some((op, power)) = unary_op(&self.current.kind) {
            self.advance();
            let operand = self.parse_expression(power)?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }

        self.parse_primary()
    }

    fn parse_exists_tail(&mut self, negated: bool) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::Exists)?;
        self.expect(&TokenKind::LeftParen)?;
        let subquery = self.parse_query()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(Expr::Exists {
            subquery: Box::new(subquery),
            negated,
        })
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current.clone();

        match &token.kind {
            // Literals
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(*n)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(*f)))
            }
            TokenKind::String(s) => {
                let value = s.clone();
                self.advance();
                Ok(Expr::Literal(Literal::String(value)))
            }
            TokenKind::Blob(b) => {
                let value = b.clone();
                self.advance();
                Ok(Expr::Literal(Literal::Blob(value)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }

            // Parameter placeholders
            TokenKind::Question => {
                self.param_counter += 1;
                let position = self.param_counter;
                self.advance();
                Ok(Expr::Parameter {
                    name: None,
                    position,
                })
            }
            TokenKind::Colon => {
                self.advance();
                let name = self.expect_identifier()?;
                Ok(Expr::Parameter {
                    name: Some(name),
                    position: 0,
                })
            }

            // Wildcard
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Wildcard { table: None })
            }

            // Parenthesized expression or subquery
            TokenKind::LeftParen => {
                self.advance();
                if self.check_keyword(Keyword::Select) || self.check_keyword(Keyword::With) {
                    let subquery = self.parse_query()?;
                    self.expect(&TokenKind::RightParen)?;
                    Ok(Expr::Subquery(Box::new(subquery)))
                } else {
                    let expr = self.parse_expression(0)?;
                    self.expect(&TokenKind::RightParen)?;
                    Ok(Expr::Paren(Box::new(expr)))
                }
            }

            // Aggregate functions
            TokenKind::Keyword(
                kw @ (Keyword::Count | Keyword::Sum | Keyword::Avg | Keyword::Min | Keyword::Max),
            ) => {
                let name = kw.as_str().to_string();
                self.advance();
                let call = self.parse_function_call(name)?;
                self.maybe_window(call)
            }

            // Other functions
            TokenKind::Keyword(kw @ (Keyword::Coalesce | Keyword::Nullif | Keyword::Cast)) => {
                let name = kw.as_str().to_string();
                self.advance();
                if matches!(kw, Keyword::Cast) {
                    self.parse_cast_expression()
                } else {
                    self.parse_function_call(name)
                }
            }

            // CASE expression
            TokenKind::Keyword(Keyword::Case) => self.parse_case_expression(),

            // EXISTS
            TokenKind::Keyword(Keyword::Exists) => self.parse_exists_tail(false),

            // Identifier (column reference or function call)
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = token.span;
                self.advance();

                // Check for function call
                if self.check(&TokenKind::LeftParen) {
                    let call = self.parse_function_call(name)?;
                    return self.maybe_window(call);
                }

                // Check for qualified name (table.column or table.*)
                if self.check(&TokenKind::Dot) {
                    self.advance();
                    if self.check(&TokenKind::Star) {
                        self.advance();
                        return Ok(Expr::Wildcard { table: Some(name) });
                    }
                    let column = self.expect_identifier()?;
                    return Ok(Expr::Column {
                        table: Some(name),
                        name: column,
                        span,
                    });
                }

                Ok(Expr::Column {
                    table: None,
                    name,
                    span,
                })
            }

            _ => Err(ParseError::unexpected(
                "expression",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    /// Parses a function call.
    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let distinct = if self.check_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else {
            false
        };

        let args = if self.check(&TokenKind::RightParen) {
            vec![]
        } else if self.check(&TokenKind::Star) {
            self.advance();
            vec![Expr::Wildcard { table: None }]
        } else {
            self.parse_expression_list()?
        };

        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::Function(FunctionCall {
            name,
            args,
            distinct,
        }))
    }

    /// Wraps a function call expression in `Expr::Window` if followed by `OVER (...)`.
    fn maybe_window(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        if !self.check_keyword(Keyword::Over) {
            return Ok(expr);
        }
        self.advance();
        let spec = self.parse_window_spec()?;
        match expr {
            Expr::Function(function) => Ok(Expr::Window { function, spec }),
            other => Ok(other),
        }
    }

    fn parse_window_spec(&mut self) -> Result<WindowSpec, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let partition_by = if self.check_keyword(Keyword::Partition) {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_expression_list()?
        } else {
            vec![]
        };

        let order_by = if self.check_keyword(Keyword::Order) {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            vec![]
        };

        let frame = if self.check_keyword(Keyword::Rows) {
            self.advance();
            self.skip_frame_bound_tokens();
            FrameUnit::Rows
        } else if self.check_keyword(Keyword::Range) {
            self.advance();
            self.skip_frame_bound_tokens();
            FrameUnit::Range
        } else {
            FrameUnit::Default
        };

        self.expect(&TokenKind::RightParen)?;
        Ok(WindowSpec {
            partition_by,
            order_by,
            frame,
        })
    }

    /// Consumes the (not separately modeled) frame-bound tokens of a `ROWS`/`RANGE`
    /// clause, e.g. `BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`.
    fn skip_frame_bound_tokens(&mut self) {
        while !self.check(&TokenKind::RightParen) && !matches!(self.current.kind, TokenKind::Eof)
        {
            self.advance();
        }
    }

    /// Parses a CAST expression.
    fn parse_cast_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;
        let expr = self.parse_expression(0)?;
        self.expect_keyword(Keyword::As)?;
        let data_type = self.parse_data_type()?;
        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::Cast {
            expr: Box::new(expr),
            data_type,
        })
    }

    /// Parses a CASE expression.
    fn parse_case_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::Case)?;

        // Check for simple CASE (CASE expr WHEN ...)
        let operand = if !self.check_keyword(Keyword::When) {
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };

        // Parse WHEN/THEN clauses
        let mut when_clauses = vec![];
        while self.check_keyword(Keyword::When) {
            self.advance();
            let when_expr = self.parse_expression(0)?;
            self.expect_keyword(Keyword::Then)?;
            let then_expr = self.parse_expression(0)?;
            when_clauses.push((when_expr, then_expr));
        }

        // Parse ELSE clause
        let else_clause = if self.check_keyword(Keyword::Else) {
            self.advance();
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };

        self.expect_keyword(Keyword::End)?;

        Ok(Expr::Case {
            operand,
            when_clauses,
            else_clause,
        })
    }

    /// Parses a declared data type: the spelled name, the value family it
    /// resolves to, and any `(precision[, scale])` modifiers.
    fn parse_data_type(&mut self) -> Result<DataType, ParseError> {
        use TypeFamily as F;
        let (name, family) = match &self.current.kind {
            TokenKind::Keyword(kw) => {
                let family = match kw {
                    Keyword::Int | Keyword::Integer | Keyword::Smallint | Keyword::Bigint => {
                        F::Int
                    }
                    Keyword::Real | Keyword::Double | Keyword::Float => F::Float,
                    Keyword::Decimal | Keyword::Numeric => F::Decimal,
                    Keyword::Char | Keyword::Varchar | Keyword::Text => F::Text,
                    Keyword::Blob => F::Binary,
                    Keyword::Boolean => F::Bool,
                    Keyword::Date => F::Date,
                    Keyword::Time => F::Time,
                    Keyword::Timestamp | Keyword::Datetime => F::DateTime,
                    other => {
                        return Err(ParseError::unexpected(
                            "data type",
                            TokenKind::Keyword(*other),
                            self.current.span,
                        ));
                    }
                };
                let name = kw.as_str().to_string();
                self.advance();
                (name, family)
            }
            // Type names the keyword table does not reserve resolve by
            // spelling; anything unrecognised stays text-like.
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let family = match name.to_ascii_uppercase().as_str() {
                    "TINYINT" => F::Int,
                    "BINARY" | "VARBINARY" => F::Binary,
                    _ => F::Text,
                };
                self.advance();
                (name, family)
            }
            _ => {
                return Err(ParseError::unexpected(
                    "data type",
                    self.current.kind.clone(),
                    self.current.span,
                ));
            }
        };

        let mut data_type = DataType::new(name, family);
        let (precision, scale) = self.parse_type_modifiers()?;
        data_type.precision = precision;
        data_type.scale = scale;
        Ok(data_type)
    }

    /// Parses an optional `(precision[, scale])` suffix after a type name.
    fn parse_type_modifiers(&mut self) -> Result<(Option<u32>, Option<u32>), ParseError> {
        if !self.check(&TokenKind::LeftParen) {
            return Ok((None, None));
        }
        self.advance();
        let precision = self.expect_unsigned("precision")?;
        let scale = if self.check(&TokenKind::Comma) {
            self.advance();
            Some(self.expect_unsigned("scale")?)
        } else {
            None
        };
        self.expect(&TokenKind::RightParen)?;
        Ok((Some(precision), scale))
    }

    fn expect_unsigned(&mut self, what: &str) -> Result<u32, ParseError> {
        match &self.current.kind {
            TokenKind::Integer(n) => {
                let value = u32::try_from(*n)
                    .map_err(|_| ParseError::new(format!("{what} out of range"), self.current.span))?;
                self.advance();
                Ok(value)
            }
            _ => Err(ParseError::unexpected(
                "integer",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    /// Parses a comma-separated list of expressions.
    fn parse_expression_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![];
        loop {
            exprs.push(self.parse_expression(0)?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(exprs)
    }

    /// Parses a comma-separated list of identifiers.
    fn parse_identifier_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut idents = vec![];
        loop {
            idents.push(self.expect_identifier()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(idents)
    }

    // --- Helper methods ---

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// Checks if the current token matches the given kind.
    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.current.kind) == core::mem::discriminant(kind)
    }

    /// Checks if the current token is the given keyword.
    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(kw) if *kw == keyword)
    }

    /// Expects the current token to be the given kind.
    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                format!("`{kind}`"),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects the current token to be the given keyword.
    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                keyword.as_str(),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects and returns an identifier.
    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::unexpected(
                "identifier",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }
}
