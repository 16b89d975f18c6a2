//! API to control the interpreter.

use std::fmt;
use std::io;
use std::io::prelude::*;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::ctx::Context;
use crate::diag::SyntaxError;
use crate::eval::{Evaluator, RuntimeError};
use crate::parser::{Parsed, Parser};
use crate::scanner::Scanner;

/// Tree-walk interpreter.
///
/// Successive calls to [`Interpreter::eval`] share one global scope, so later inputs see what
/// earlier ones declared.
///
/// # Example
///
/// Invoke the interpreter a first time to define a function then additional times to call this
/// function:
///
/// ```
/// # use loxwalk::interpreter::{Interpreter, LoxError};
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let func_def = r#"
///     fun max(x, y) {
///         if ( x > y) {
///             return x;
///         } else {
///             return y;
///         }
///     }
/// "#;
/// interp.eval(func_def.as_bytes())?;
///
/// interp.eval("print max(10,20);".as_bytes()).expect("interpreter error");
/// interp.eval("print max(5,4);".as_bytes()).expect("interpreter error");
///
/// assert_eq!(output, b"20\n5\n");
/// # Ok::<(), LoxError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    ctx: Rc<Context>,
    evaluator: Evaluator<'t, W>,
}

/// Errors the interpreter can raise.
#[derive(Debug, Error)]
pub enum LoxError {
    /// The input could not be read.
    #[error("cannot read input: {0}")]
    Read(#[from] io::Error),

    /// Lexical or syntactic errors.  Nothing was executed.
    #[error("{}", render(.0))]
    Syntax(Vec<SyntaxError>),

    /// Errors raised during execution, at most one per top-level statement.
    #[error("{}", render(.0))]
    Runtime(Vec<RuntimeError>),
}

fn render<'a, E: fmt::Display + 'a>(errors: impl IntoIterator<Item = &'a E>) -> String {
    errors
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl<'t, W: Write> Interpreter<'t, W> {
    pub fn new(output: &'t mut W) -> Interpreter<'t, W> {
        Self::with_config(output, Config::default())
    }

    pub fn with_config(output: &'t mut W, config: Config) -> Interpreter<'t, W> {
        let ctx = Context::new();
        let evaluator = Evaluator::new(output, &ctx, config);
        Interpreter { ctx, evaluator }
    }

    /// Read the whole input then run it.
    pub fn eval<R: Read>(&mut self, mut input: R) -> Result<(), LoxError> {
        let mut source = String::new();
        input.read_to_string(&mut source)?;
        self.run(&source)
    }

    /// Run `source` unless it holds syntax errors.
    #[instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn run(&mut self, source: &str) -> Result<(), LoxError> {
        let parsed = self.parse(source);
        if parsed.has_errors() {
            return Err(LoxError::Syntax(parsed.errors));
        }
        self.evaluator
            .execute_program(&parsed.program)
            .map_err(LoxError::Runtime)
    }

    fn parse(&self, source: &str) -> Parsed {
        let (tokens, mut errors) = Scanner::new(source, self.ctx.clone()).scan_tokens();
        let mut parsed = Parser::new(tokens).parse_program();
        debug!(
            statements = parsed.program.len(),
            lexical_errors = errors.len(),
            syntax_errors = parsed.errors.len(),
            "parsed"
        );
        errors.append(&mut parsed.errors);
        errors.sort_by_key(|e| e.line);
        parsed.errors = errors;
        parsed
    }
}
