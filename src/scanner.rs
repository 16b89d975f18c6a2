//! Lexical analyzer

use std::iter::Peekable;
use std::rc::Rc;
use std::str::CharIndices;

use crate::ctx::Context;
use crate::diag::{Location, Position, SyntaxError, SyntaxErrorKind};
use crate::token::{Token, TokenKind};

/// Turn source text into a sequence of tokens.
///
/// Lexical errors are collected rather than returned early: the token sequence always runs to
/// the end of the input and always ends with a single `Eof`.
#[derive(Debug)]
pub struct Scanner<'a> {
    source: &'a str,
    input: Peekable<CharIndices<'a>>,
    start: usize,
    line: Position,
    ctx: Rc<Context>,
    errors: Vec<SyntaxError>,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner operating on `source`.
    pub fn new(source: &'a str, ctx: Rc<Context>) -> Scanner<'a> {
        Scanner {
            source,
            input: source.char_indices().peekable(),
            start: 0,
            line: 1,
            ctx,
            errors: vec![],
        }
    }

    /// Scan the whole input.
    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<SyntaxError>) {
        let mut tokens = vec![];
        loop {
            let token = self.get_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.errors)
    }

    /// Scan next token and return it.  Returns `Eof` forever once the input is exhausted.
    pub fn get_token(&mut self) -> Token {
        loop {
            let Some((start, ch)) = self.input.next() else {
                return Token::eof(self.line);
            };
            self.start = start;
            let kind = match ch {
                '\n' => {
                    self.line += 1;
                    continue;
                }
                ' ' | '\t' | '\r' => continue,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => {
                    if self.next_is('/') {
                        self.skip_comment();
                        continue;
                    }
                    TokenKind::Slash
                }
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '{' => TokenKind::LeftCurly,
                '}' => TokenKind::RightCurly,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                '<' => self.either('=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.either('=', TokenKind::GreaterEqual, TokenKind::Greater),
                '=' => self.either('=', TokenKind::EqualEqual, TokenKind::Equal),
                '!' => self.either('=', TokenKind::BangEqual, TokenKind::Bang),
                '"' => match self.scan_string() {
                    Some(kind) => kind,
                    None => continue,
                },
                '0'..='9' => match self.scan_number() {
                    Some(kind) => kind,
                    None => continue,
                },
                'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(),
                _ => {
                    self.error(SyntaxErrorKind::UnexpectedChar(ch));
                    continue;
                }
            };
            return Token::new(kind, self.lexeme(), self.line);
        }
    }

    fn scan_string(&mut self) -> Option<TokenKind> {
        loop {
            match self.input.next() {
                Some((_, '"')) => break,
                Some((_, '\n')) => self.line += 1,
                Some(_) => (),
                None => {
                    self.error(SyntaxErrorKind::UnterminatedString);
                    return None;
                }
            }
        }
        let lexeme = self.lexeme();
        Some(TokenKind::Str(Rc::from(&lexeme[1..lexeme.len() - 1])))
    }

    fn scan_number(&mut self) -> Option<TokenKind> {
        self.skip_digits();

        // A fractional part needs at least one digit after the dot.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|ch| ch.is_ascii_digit()) {
            self.input.next();
            self.skip_digits();
        }

        // Digits with an optional fractional part always parse.
        self.lexeme().parse().ok().map(TokenKind::Number)
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.input.next();
        }
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|ch| ch != '\n') {
            self.input.next();
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            self.input.next();
        }

        let name = self.lexeme();
        let sym = self.ctx.symbol(name);
        self.ctx
            .keyword(&sym)
            .unwrap_or(TokenKind::Identifier(sym))
    }

    /// Consume the next character and return `matched` if it is `expected`, otherwise return
    /// `single` and leave the input untouched.
    fn either(&mut self, expected: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.next_is(expected) {
            self.input.next();
            matched
        } else {
            single
        }
    }

    fn next_is(&mut self, expected: char) -> bool {
        self.peek() == Some(expected)
    }

    fn peek(&mut self) -> Option<char> {
        self.input.peek().map(|&(_, ch)| ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut ahead = self.input.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn offset(&mut self) -> usize {
        self.input
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn lexeme(&mut self) -> &'a str {
        let end = self.offset();
        &self.source[self.start..end]
    }

    fn error(&mut self, kind: SyntaxErrorKind) {
        self.errors.push(SyntaxError {
            line: self.line,
            location: Location::Source,
            kind,
        });
    }
}
