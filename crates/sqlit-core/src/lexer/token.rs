//! Tokens produced by the lexer.
//!
//! The keyword set is declared once, in the [`keywords!`] table below;
//! the enum, the canonical spellings, and the case-insensitive lookup are
//! all generated from it, so adding a keyword is a one-line change.

use core::fmt;

use super::Span;

macro_rules! keywords {
    ($($variant:ident => $spelling:literal),+ $(,)?) => {
        /// A reserved SQL word.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Keyword {
            $(
                #[doc = $spelling]
                $variant,
            )+
        }

        /// Every keyword paired with its canonical spelling.
        const SPELLINGS: &[(&str, Keyword)] = &[
            $(($spelling, Keyword::$variant),)+
        ];

        impl Keyword {
            /// The canonical (uppercase) spelling.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $spelling,)+
                }
            }
        }
    };
}

// Alphabetical; the lookup assumes nothing about order, but it keeps
// collisions with new entries obvious.
keywords! {
    Abort => "ABORT",
    All => "ALL",
    Alter => "ALTER",
    And => "AND",
    Any => "ANY",
    As => "AS",
    Asc => "ASC",
    Autoincrement => "AUTOINCREMENT",
    Avg => "AVG",
    Begin => "BEGIN",
    Between => "BETWEEN",
    Bigint => "BIGINT",
    Blob => "BLOB",
    Boolean => "BOOLEAN",
    By => "BY",
    Cascade => "CASCADE",
    Case => "CASE",
    Cast => "CAST",
    Char => "CHAR",
    Check => "CHECK",
    Coalesce => "COALESCE",
    Commit => "COMMIT",
    Conflict => "CONFLICT",
    Constraint => "CONSTRAINT",
    Count => "COUNT",
    Create => "CREATE",
    Cross => "CROSS",
    Current => "CURRENT",
    Database => "DATABASE",
    Date => "DATE",
    Datetime => "DATETIME",
    Decimal => "DECIMAL",
    Default => "DEFAULT",
    Delete => "DELETE",
    Desc => "DESC",
    Distinct => "DISTINCT",
    Do => "DO",
    Double => "DOUBLE",
    Drop => "DROP",
    Else => "ELSE",
    End => "END",
    Except => "EXCEPT",
    Exists => "EXISTS",
    Fail => "FAIL",
    False => "FALSE",
    First => "FIRST",
    Float => "FLOAT",
    Following => "FOLLOWING",
    Foreign => "FOREIGN",
    From => "FROM",
    Full => "FULL",
    Group => "GROUP",
    Having => "HAVING",
    If => "IF",
    Ignore => "IGNORE",
    In => "IN",
    Index => "INDEX",
    Inner => "INNER",
    Insert => "INSERT",
    Int => "INT",
    Integer => "INTEGER",
    Intersect => "INTERSECT",
    Into => "INTO",
    Is => "IS",
    Join => "JOIN",
    Key => "KEY",
    Last => "LAST",
    Left => "LEFT",
    Like => "LIKE",
    Limit => "LIMIT",
    Max => "MAX",
    Min => "MIN",
    Not => "NOT",
    Nothing => "NOTHING",
    Null => "NULL",
    Nullif => "NULLIF",
    Nulls => "NULLS",
    Numeric => "NUMERIC",
    Offset => "OFFSET",
    On => "ON",
    Or => "OR",
    Order => "ORDER",
    Outer => "OUTER",
    Over => "OVER",
    Partition => "PARTITION",
    Preceding => "PRECEDING",
    Primary => "PRIMARY",
    Range => "RANGE",
    Real => "REAL",
    Recursive => "RECURSIVE",
    References => "REFERENCES",
    Replace => "REPLACE",
    Restrict => "RESTRICT",
    Right => "RIGHT",
    Rollback => "ROLLBACK",
    Row => "ROW",
    Rows => "ROWS",
    Schema => "SCHEMA",
    Select => "SELECT",
    Set => "SET",
    Smallint => "SMALLINT",
    Some => "SOME",
    Sum => "SUM",
    Table => "TABLE",
    Temp => "TEMP",
    Temporary => "TEMPORARY",
    Text => "TEXT",
    Then => "THEN",
    Time => "TIME",
    Timestamp => "TIMESTAMP",
    Transaction => "TRANSACTION",
    Trigger => "TRIGGER",
    True => "TRUE",
    Unbounded => "UNBOUNDED",
    Union => "UNION",
    Unique => "UNIQUE",
    Update => "UPDATE",
    Using => "USING",
    Values => "VALUES",
    Varchar => "VARCHAR",
    View => "VIEW",
    When => "WHEN",
    Where => "WHERE",
    Window => "WINDOW",
    With => "WITH",
}

impl Keyword {
    /// Case-insensitive lookup of a word against the keyword table.
    #[must_use]
    pub fn lookup(word: &str) -> Option<Self> {
        let upper = word.to_ascii_uppercase();
        SPELLINGS
            .binary_search_by(|(spelling, _)| spelling.cmp(&upper.as_str()))
            .ok()
            .map(|index| SPELLINGS[index].1)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a token is, plus any value it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An integer literal.
    Integer(i64),
    /// A float literal.
    Float(f64),
    /// A string literal, quotes stripped and `''` unescaped.
    String(String),
    /// A blob literal (`X'…'`), decoded.
    Blob(Vec<u8>),
    /// A bare or quoted identifier.
    Identifier(String),
    /// A reserved word.
    Keyword(Keyword),

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `||`
    Concat,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `~`
    BitNot,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,

    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `::`
    DoubleColon,
    /// `?`
    Question,
    /// `@`
    At,

    /// End of input.
    Eof,
    /// A character sequence the lexer could not tokenize.
    Error(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Blob(_) => f.write_str("blob literal"),
            Self::Identifier(name) => f.write_str(name),
            Self::Keyword(keyword) => f.write_str(keyword.as_str()),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Eq => f.write_str("="),
            Self::NotEq => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::LtEq => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::GtEq => f.write_str(">="),
            Self::Concat => f.write_str("||"),
            Self::BitAnd => f.write_str("&"),
            Self::BitOr => f.write_str("|"),
            Self::BitNot => f.write_str("~"),
            Self::LeftShift => f.write_str("<<"),
            Self::RightShift => f.write_str(">>"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Comma => f.write_str(","),
            Self::Semicolon => f.write_str(";"),
            Self::Dot => f.write_str("."),
            Self::Colon => f.write_str(":"),
            Self::DoubleColon => f.write_str("::"),
            Self::Question => f.write_str("?"),
            Self::At => f.write_str("@"),
            Self::Eof => f.write_str("end of input"),
            Self::Error(message) => f.write_str(message),
        }
    }
}

/// A token and where it sits in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was recognised.
    pub kind: TokenKind,
    /// Byte range in the source.
    pub span: Span,
}

impl Token {
    /// Pairs a kind with its span.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// `true` for the end-of-input token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
