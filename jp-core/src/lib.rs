//! JSONPath query engine.
//!
//! A query written in path notation is parsed and compiled once into an
//! immutable [`Program`] for a small abstract machine, which can then be
//! evaluated any number of times, concurrently, against decoded JSON
//! documents:
//!
//! ```
//! use jp_core::{compile, Val};
//!
//! let prog = compile("$.books[?(@.author == 'Adam Smith')].title").unwrap();
//! let doc: Val = serde_json::json!({"books": [
//!     {"title": "Decline and Fall", "author": "Evelyn Waugh"},
//!     {"title": "Wealth of Nations", "author": "Adam Smith"},
//! ]})
//! .into();
//! let found = prog.eval(&doc).unwrap();
//! assert_eq!(found, [Val::str("Wealth of Nations")]);
//! ```
//!
//! The grammar has two parts: the path proper (steps such as `.member`,
//! `[subscript]`, `..`), and the script expressions embedded in `(...)`
//! and `?(...)`, a small subset of JavaScript whose equality follows the
//! ECMA-262 5.1 §11.9.3 abstract-equality rules, except that arrays and
//! objects compare by structural value.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod compile;
mod error;
mod expr;
mod fns;
mod json;
mod lex;
mod ops;
mod parse;
mod path;
mod program;
mod run;

pub use error::{Error, ParseError};
pub use expr::Expr;
pub use json::{Map, Val};
pub use ops::Op;
pub use path::{Path, Regexp, Step};
pub use program::Program;

/// Parse and compile a path expression.
pub fn compile(s: &str) -> Result<Program, ParseError> {
    parse_path(s)?.compile()
}

/// Parse a path expression into its step sequence.
pub fn parse_path(s: &str) -> Result<Path, ParseError> {
    parse::path(s)
}

/// Parse a bare script expression, without the surrounding path notation.
/// Not normally needed, since [`parse_path`] parses any expressions inside
/// a path, but useful for calculating with values on their own.
pub fn parse_script_expression(s: &str) -> Result<Expr, ParseError> {
    parse::script_expression(s)
}
