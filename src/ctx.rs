use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::interner::{Interner, Symbol};
use crate::token::TokenKind;

/// Global mostly read-only state context shared by the scanner and the evaluator of one
/// interpreter session.
///
/// It anchors the string interner, so every symbol seen by the evaluator compares by address
/// with the symbols the scanner produced, and maps reserved words to their tokens.
#[derive(Debug)]
pub struct Context {
    interner: RefCell<Interner>,
    keywords: HashMap<Symbol, TokenKind>,
}

impl Context {
    /// Creates a new context.
    ///
    /// Returns a Rc because the context is shared between various data structures.
    pub fn new() -> Rc<Self> {
        let mut interner = Interner::new();

        let mut keywords = HashMap::new();
        for (name, kind) in KEYWORDS.iter().cloned() {
            keywords.insert(interner.symbol(name), kind);
        }

        Rc::new(Context {
            interner: RefCell::new(interner),
            keywords,
        })
    }

    /// Intern the given string if needed and return its associated symbol.
    pub fn symbol(&self, name: &str) -> Symbol {
        self.interner.borrow_mut().symbol(name)
    }

    /// Return the token kind associated with the given symbol if it is a keyword.
    pub fn keyword(&self, id: &Symbol) -> Option<TokenKind> {
        self.keywords.get(id).cloned()
    }
}

const KEYWORDS: [(&str, TokenKind); 16] = [
    ("and", TokenKind::And),
    ("class", TokenKind::Class),
    ("else", TokenKind::Else),
    ("false", TokenKind::False),
    ("for", TokenKind::For),
    ("fun", TokenKind::Fun),
    ("if", TokenKind::If),
    ("nil", TokenKind::Nil),
    ("or", TokenKind::Or),
    ("print", TokenKind::Print),
    ("return", TokenKind::Return),
    ("super", TokenKind::Super),
    ("this", TokenKind::This),
    ("true", TokenKind::True),
    ("var", TokenKind::Var),
    ("while", TokenKind::While),
];
