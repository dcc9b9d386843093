//! The hand-written SQL tokenizer.
//!
//! [`Lexer`] walks the source once, producing one [`Token`] per call to
//! [`Lexer::next_token`]. Whitespace and both comment styles (`-- …`,
//! `/* … */`) are trivia and never surface as tokens. The lexer does not
//! fail: input it cannot tokenize becomes a [`TokenKind::Error`] token
//! and the parser reports it with its span.

use super::{Keyword, Span, Token, TokenKind};

/// A single-pass tokenizer over SQL source text.
pub struct Lexer<'a> {
    source: &'a str,
    cursor: usize,
}

impl<'a> Lexer<'a> {
    /// A lexer positioned at the start of `source`.
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self { source, cursor: 0 }
    }

    /// Produces the next token. Returns [`TokenKind::Eof`] forever once
    /// the input is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.cursor;
        let Some(first) = self.bump() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match first {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '~' => TokenKind::BitNot,
            '?' => TokenKind::Question,
            '@' => TokenKind::At,
            '=' => TokenKind::Eq,
            '&' => TokenKind::BitAnd,
            ':' => {
                if self.eat(':') {
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::Concat
                } else {
                    TokenKind::BitOr
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else if self.eat('>') {
                    TokenKind::NotEq
                } else if self.eat('<') {
                    TokenKind::LeftShift
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else if self.eat('>') {
                    TokenKind::RightShift
                } else {
                    TokenKind::Gt
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Error("unexpected character: !".to_string())
                }
            }
            '\'' => self.string_literal(),
            '"' | '`' => self.quoted_identifier(first),
            'X' | 'x' if self.peek() == Some('\'') => self.blob_literal(),
            '0'..='9' => self.number(start),
            c if c.is_alphabetic() || c == '_' => self.word(start),
            other => TokenKind::Error(format!("unexpected character: {other}")),
        };
        Token::new(kind, Span::new(start, self.cursor))
    }

    /// Tokenizes the remaining input, ending with the EOF token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    // -----------------------------------------------------------------
    // Cursor primitives
    // -----------------------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.source[self.cursor..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consumes and returns the next character.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    /// Consumes `expected` if it is next.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes characters while `keep` holds.
    fn eat_while(&mut self, keep: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            self.cursor += c.len_utf8();
        }
    }

    /// Skips whitespace, `-- …` line comments, and `/* … */` block
    /// comments.
    fn skip_trivia(&mut self) {
        loop {
            self.eat_while(char::is_whitespace);
            if self.rest().starts_with("--") {
                self.eat_while(|c| c != '\n');
            } else if self.rest().starts_with("/*") {
                self.cursor += 2;
                match self.rest().find("*/") {
                    Some(end) => self.cursor += end + 2,
                    None => self.cursor = self.source.len(),
                }
            } else {
                return;
            }
        }
    }

    // -----------------------------------------------------------------
    // Token scanners — each is entered with its first character already
    // consumed.
    // -----------------------------------------------------------------

    /// A bare identifier or keyword starting at `start`.
    fn word(&mut self, start: usize) -> TokenKind {
        self.eat_while(|c| c.is_alphanumeric() || c == '_');
        let text = &self.source[start..self.cursor];
        Keyword::lookup(text).map_or_else(
            || TokenKind::Identifier(text.to_string()),
            TokenKind::Keyword,
        )
    }

    /// A `"…"` or `` `…` `` identifier; the delimiter doubles to escape
    /// itself.
    fn quoted_identifier(&mut self, delimiter: char) -> TokenKind {
        let mut name = String::new();
        loop {
            match self.bump() {
                Some(c) if c == delimiter => {
                    if self.eat(delimiter) {
                        name.push(delimiter);
                    } else {
                        return TokenKind::Identifier(name);
                    }
                }
                Some(c) => name.push(c),
                None => return TokenKind::Error("unterminated quoted identifier".to_string()),
            }
        }
    }

    /// A `'…'` string; `''` is an escaped quote.
    fn string_literal(&mut self) -> TokenKind {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\'') => {
                    if self.eat('\'') {
                        value.push('\'');
                    } else {
                        return TokenKind::String(value);
                    }
                }
                Some(c) => value.push(c),
                None => return TokenKind::Error("unterminated string literal".to_string()),
            }
        }
    }

    /// An `X'…'` blob: pairs of hex digits, whitespace allowed between
    /// them.
    fn blob_literal(&mut self) -> TokenKind {
        self.cursor += 1; // the opening quote checked by the caller
        let mut digits = String::new();
        loop {
            match self.bump() {
                Some('\'') => break,
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                Some(c) if c.is_whitespace() => {}
                Some(_) => {
                    return TokenKind::Error("invalid character in blob literal".to_string())
                }
                None => return TokenKind::Error("unterminated blob literal".to_string()),
            }
        }
        if digits.len() % 2 != 0 {
            return TokenKind::Error("odd number of hex digits in blob literal".to_string());
        }
        let bytes = digits
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| {
                let text = std::str::from_utf8(pair).unwrap_or_default();
                u8::from_str_radix(text, 16).unwrap_or_default()
            })
            .collect();
        TokenKind::Blob(bytes)
    }

    /// An integer or float starting at `start`. A trailing `.` only joins
    /// the number when a digit follows, so `1.` lexes as `1` then `.`.
    fn number(&mut self, start: usize) -> TokenKind {
        self.eat_while(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.peek() == Some('.')
            && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor += 1;
            self.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.cursor += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.cursor += 1;
            }
            self.eat_while(|c| c.is_ascii_digit());
        }

        let text = &self.source[start..self.cursor];
        if is_float {
            text.parse().map_or_else(
                |_| TokenKind::Error(format!("invalid float literal {text}")),
                TokenKind::Float,
            )
        } else {
            text.parse().map_or_else(
                |_| TokenKind::Error(format!("integer literal {text} out of range")),
                TokenKind::Integer,
            )
        }
    }
}
