use std::fmt;

use thiserror::Error;

/// Line number (starting at one).
pub type Position = u32;

/// Lexical or syntactic error together with where it was detected.
#[derive(Debug, PartialEq, Clone, Error)]
#[error("[line {line}] Error{location}: {kind}")]
pub struct SyntaxError {
    pub line: Position,
    pub location: Location,
    pub kind: SyntaxErrorKind,
}

/// Where on its line a syntax error was detected.
#[derive(Debug, PartialEq, Clone)]
pub enum Location {
    /// Reported by the scanner, no token exists yet.
    Source,
    /// At the given lexeme.
    Lexeme(String),
    /// At the end of input.
    End,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Source => Ok(()),
            Location::Lexeme(lexeme) => write!(f, " at '{}'", lexeme),
            Location::End => write!(f, " at end"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Error)]
pub enum SyntaxErrorKind {
    #[error("Unexpected character '{0}'.")]
    UnexpectedChar(char),
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Expect {0}.")]
    Expected(&'static str),
    #[error("Expect expression.")]
    ExpectedExpression,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Can't have more than {max} {what}.")]
    TooMany { what: &'static str, max: usize },
    #[error("Can't return from top-level code.")]
    ReturnOutsideFunction,
    #[error("Can't use 'this' outside of a class.")]
    ThisOutsideClass,
    #[error("Can't use 'super' outside of a class.")]
    SuperOutsideClass,
    #[error("Can't use 'super' in a class with no superclass.")]
    SuperWithoutSuperclass,
    #[error("A class can't inherit from itself.")]
    InheritsFromItself,
}
