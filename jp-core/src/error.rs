//! Compile-time and run-time errors.
//!
//! The propagating "nothing" sentinel of expression evaluation is a machine
//! value, not an error; only the fatal stratum appears here.

use crate::ops::Op;
use core::fmt;

/// Error produced while parsing or compiling a path expression.
///
/// Most carry the byte offset in the source at which they were detected.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ParseErrorKind {
    UnclosedString,
    BadEscape,
    ShortEscape,
    ControlChar,
    IntOverflow,
    BadReal,
    UnexpectedChar(char),
    UnexpectedToken(String),
    Expected(&'static str, String),
    UnexpectedEof,
    BadRegex(String),
    UnionElement(Op),
    NonConstSlice,
    TooManyVals,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset: Some(offset),
        }
    }

    pub(crate) fn plain(kind: ParseErrorKind) -> Self {
        Self { kind, offset: None }
    }

    /// Byte offset in the query string at which the error was detected,
    /// if one applies.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ParseErrorKind::*;
        match &self.kind {
            UnclosedString => write!(f, "unclosed string literal")?,
            BadEscape => write!(f, "unknown character escape sequence")?,
            ShortEscape => write!(f, "unicode escape needs 4 hex digits")?,
            ControlChar => write!(f, "unescaped control character in string literal")?,
            IntOverflow => write!(f, "overflow of integer literal")?,
            BadReal => write!(f, "invalid floating-point literal syntax")?,
            UnexpectedChar(c) => write!(f, "unexpected character {c:?}")?,
            UnexpectedToken(t) => write!(f, "unexpected {t}")?,
            Expected(want, got) => write!(f, "expected {want:?}, got {got}")?,
            UnexpectedEof => write!(f, "unexpected end of expression")?,
            BadRegex(why) => write!(f, "{why}")?,
            UnionElement(op) => {
                return write!(f, "{} cannot be in a union element list", op.text())
            }
            NonConstSlice => return write!(f, "slice bounds must be constant"),
            TooManyVals => return write!(f, "program has too many values"),
        }
        match self.offset {
            Some(o) => write!(f, " at offset {o}"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ParseError {}

/// Fatal evaluation error: aborts the `eval` call.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// `=~` applied to an operand of the wrong shape.
    MatchOperand(&'static str, String),
    /// `in`/`nin` right operand is not an array.
    InOperand(Op, String),
    /// A dynamic regular expression (string right operand of `=~`, or a
    /// `tokenize` pattern) failed to compile.
    Regex(String),
    /// Arithmetic overflow inside a built-in function.
    Overflow(&'static str),
    /// Call to a function that is not defined.
    UnknownFunction(String),
    /// Call with the wrong number of arguments.
    Arity(String, usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MatchOperand(side, got) => {
                write!(f, "=~ requires a {side} operand, not {got}")
            }
            Self::InOperand(op, got) => {
                write!(f, "{} requires an array right operand, not {got}", op.text())
            }
            Self::Regex(why) => write!(f, "bad dynamic regular expression: {why}"),
            Self::Overflow(name) => write!(f, "integer overflow in {name}"),
            Self::UnknownFunction(name) => write!(f, "unknown function {name}"),
            Self::Arity(name, got) => {
                write!(f, "wrong number of arguments ({got}) in call to {name}")
            }
        }
    }
}

impl std::error::Error for Error {}
