//! Query tokenizer
//!
//! Longest-match tokenizer producing offset-carrying tokens. Axis names are
//! not special-cased here: `ancestor::node()` tokenizes as a plain name,
//! the `::` separator, another name, and a parenthesis pair. The parser
//! decides what a name means from its position.

use crate::error::{Error, Result, SyntaxErrorKind};

/// Token kinds of the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Slash,         // /
    DoubleSlash,   // //
    AxisSeparator, // ::
    Colon,         // :
    OpenBracket,   // [
    CloseBracket,  // ]
    OpenParens,    // (
    CloseParens,   // )
    At,            // @
    Comma,         // ,
    Pipe,          // |
    Star,          // *
    Eq,            // =
    NotEq,         // !=
    Lt,            // <
    LtEq,          // <=
    Gt,            // >
    GtEq,          // >=
    And,           // and
    Or,            // or

    // Recognized so the parser can reject them as unsupported.
    Dot,       // .
    DoubleDot, // ..
    Dollar,    // $
    Plus,      // +
    Minus,     // -

    Number(f64),
    Literal(String),
    Name(String),

    Eof,
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Query lexer over a borrowed source string.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let offset = self.pos;

        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    offset,
                })
            }
        };

        let kind = match c {
            '/' => {
                self.advance(1);
                if self.peek() == Some('/') {
                    self.advance(1);
                    TokenKind::DoubleSlash
                } else {
                    TokenKind::Slash
                }
            }
            ':' => {
                self.advance(1);
                if self.peek() == Some(':') {
                    self.advance(1);
                    TokenKind::AxisSeparator
                } else {
                    TokenKind::Colon
                }
            }
            '[' => {
                self.advance(1);
                TokenKind::OpenBracket
            }
            ']' => {
                self.advance(1);
                TokenKind::CloseBracket
            }
            '(' => {
                self.advance(1);
                TokenKind::OpenParens
            }
            ')' => {
                self.advance(1);
                TokenKind::CloseParens
            }
            '@' => {
                self.advance(1);
                TokenKind::At
            }
            ',' => {
                self.advance(1);
                TokenKind::Comma
            }
            '|' => {
                self.advance(1);
                TokenKind::Pipe
            }
            '*' => {
                self.advance(1);
                TokenKind::Star
            }
            '=' => {
                self.advance(1);
                TokenKind::Eq
            }
            '!' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    TokenKind::NotEq
                } else {
                    return Err(Error::syntax(
                        SyntaxErrorKind::UnexpectedCharacter('!'),
                        self.input,
                        offset,
                    ));
                }
            }
            '<' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '.' => {
                self.advance(1);
                if self.peek() == Some('.') {
                    self.advance(1);
                    TokenKind::DoubleDot
                } else if self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos -= 1;
                    self.read_number()
                } else {
                    TokenKind::Dot
                }
            }
            '$' => {
                self.advance(1);
                TokenKind::Dollar
            }
            '+' => {
                self.advance(1);
                TokenKind::Plus
            }
            '-' => {
                self.advance(1);
                TokenKind::Minus
            }
            '"' | '\'' => self.read_literal(offset)?,
            '0'..='9' => self.read_number(),
            _ if is_name_start_char(c) => self.read_name_or_keyword(),
            _ => {
                return Err(Error::syntax(
                    SyntaxErrorKind::UnexpectedCharacter(c),
                    self.input,
                    offset,
                ))
            }
        };

        Ok(Token { kind, offset })
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance(1);
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            self.advance(1);
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.advance(1);
                } else {
                    break;
                }
            }
        }
        let value = self.input[start..self.pos].parse().unwrap_or(f64::NAN);
        TokenKind::Number(value)
    }

    fn read_literal(&mut self, open_offset: usize) -> Result<TokenKind> {
        // Caller guarantees peek() matched a quote char.
        let quote = self.peek().unwrap_or('"');
        self.advance(1);
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c == quote {
                let value = self.input[start..self.pos].to_string();
                self.advance(1);
                return Ok(TokenKind::Literal(value));
            }
            self.advance(c.len_utf8());
        }

        Err(Error::syntax(
            SyntaxErrorKind::UnterminatedLiteral,
            self.input,
            open_offset,
        ))
    }

    fn read_name_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        match &self.input[start..self.pos] {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            name => TokenKind::Name(name.to_string()),
        }
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}
