use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Line and column of a token in the source text, both 1-based.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Every failure the parser or the evaluator can produce.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("SyntaxError: {message}{}", location(.position))]
    Syntax {
        message: String,
        position: Option<Position>,
    },

    #[error("NameError: {0}")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("RecursionError: maximum recursion depth of {0} exceeded")]
    Recursion(usize),
}

fn location(position: &Option<Position>) -> String {
    match position {
        Some(p) => format!(" (at {p})"),
        None => String::new(),
    }
}

impl Error {
    pub fn syntax(message: impl Into<String>, position: Option<Position>) -> Self {
        Error::Syntax {
            message: message.into(),
            position,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
