//! A tree-walking interpreter for the Lox scripting language.
//!
//! See [Crafting Interpreters](https://craftinginterpreters.com/).
//!
//! Source text goes through a scanner and a recursive descent parser with panic-mode error
//! recovery, then is executed directly on the syntax tree.  Variable scopes are reference counted,
//! and those only kept alive by cycles (a closure stored in the scope it captures) are collected
//! periodically.
//!
//! # Examples
//!
//! See [`crate::interpreter::Interpreter`].
//!
//! # Limitations
//!
//! - There is no static resolution pass: variables are looked up by walking the scope chain.

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod interpreter;

mod ast;
mod callable;
mod class;
mod ctx;
mod diag;
mod env;
mod eval;
mod gc;
mod interner;
mod parser;
mod scanner;
mod stack;
mod token;
mod value;

pub use config::{Config, ErrorPolicy};
pub use diag::{Location, Position, SyntaxError, SyntaxErrorKind};
pub use eval::{RuntimeError, RuntimeErrorKind};
pub use interpreter::{Interpreter, LoxError};
