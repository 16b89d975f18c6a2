use std::rc::Rc;

use crate::diag::Position;
use crate::interner::Symbol;

/// "Words" produced by `Scanner`.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Eof,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
    LeftCurly,
    RightCurly,
    Equal,
    EqualEqual,
    Bang,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Semicolon,
    Comma,
    Dot,

    // Keywords
    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Identifier(Symbol),
    Number(f64),
    Str(Rc<str>),
}

/// A token together with the source text it was scanned from and its line.
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: Position) -> Token {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }

    pub fn eof(line: Position) -> Token {
        Token::new(TokenKind::Eof, "", line)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
