//! Go-style text/HTML template engine.
//!
//! Templates are parsed into a [`Tree`] and executed against JSON data in
//! either plain-text or HTML-escaping [`Mode`].

mod ast;
mod escape;
mod exec;
mod funcs;
mod parse;
mod value;

use thiserror::Error;

pub use ast::Tree;
pub use escape::{escape_html, FILTERED_URL};
pub use exec::{execute, Mode};
pub use funcs::{Func, FuncMap};
pub use parse::parse;
pub use value::Value;

/// Template failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Template failed while executing against data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ExecError {
    pub line: usize,
    pub message: String,
}

impl ExecError {
    pub(crate) fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
