use std::rc::Rc;

use crate::diag::Position;
use crate::interner::Symbol;

/// An identifier occurrence: the interned name and the line it appeared on.
#[derive(Debug, PartialEq, Clone)]
pub struct Name {
    pub sym: Symbol,
    pub line: Position,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Stmt {
    Expr(Box<Expr>),
    Print(Position, Box<Expr>),
    Var(Name, Option<Box<Expr>>),
    Block(Vec<Stmt>),
    If(Box<Expr>, Box<Stmt>, Option<Box<Stmt>>),
    While(Box<Expr>, Box<Stmt>),
    Function(Rc<FunctionDecl>),
    Return(Option<Box<Expr>>),
    Class(ClassDecl),
}

/// Shared between the declaring statement and every function value created from it.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Name,
    pub params: Vec<Name>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ClassDecl {
    pub name: Name,
    pub superclass: Option<Name>,
    pub methods: Vec<Rc<FunctionDecl>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Literal(Literal),
    Group(Box<Expr>),
    Unary(UnaryOp, Box<Expr>, Position),
    Binary(Box<Expr>, BinaryOp, Box<Expr>, Position),
    Logical(Box<Expr>, LogicalOp, Box<Expr>),
    Var(Name),
    Assign(Name, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>, Position),
    Get(Box<Expr>, Name),
    Set(Box<Expr>, Name, Box<Expr>),
    This(Position),
    Super(Position, Name),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicalOp {
    And,
    Or,
}
