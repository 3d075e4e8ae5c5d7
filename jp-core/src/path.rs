//! Parsed paths: a sequence of steps with their argument values.

use crate::expr::Expr;
use crate::ops::Op;
use core::fmt;
use std::sync::Arc;

/// A parsed path expression: an ordered sequence of steps.
///
/// The implicit root (`$`) is not a step; the first step consumes the
/// root's value.
#[derive(Debug)]
pub struct Path {
    pub(crate) steps: Vec<Step>,
}

impl Path {
    /// The steps of the path, in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// A single path operation: an op plus its argument values.
/// Steps are immutable once parsed.
#[derive(Debug)]
pub struct Step {
    pub(crate) op: Op,
    pub(crate) args: Vec<Arg>,
}

impl Step {
    pub(crate) fn new(op: Op, args: Vec<Arg>) -> Self {
        Self { op, args }
    }

    /// The step's operation code.
    pub fn op(&self) -> Op {
        self.op
    }
}

/// A parameter of a step: a constant selector or an embedded expression.
#[derive(Debug)]
pub enum Arg {
    /// Array index or other integer.
    Int(i64),
    /// Identifier, used as a member key.
    Name(String),
    /// String literal, used as a member key.
    Str(String),
    /// Slice bounds `[start:end:stride]`.
    Slice(Slice),
    /// An embedded script expression.
    Expr(Expr),
}

/// Slice bounds; any component may be absent, and absent components take
/// defaults that depend on the sign of the stride at evaluation time.
#[derive(Debug)]
pub struct Slice {
    pub(crate) start: Option<Bound>,
    pub(crate) end: Option<Bound>,
    pub(crate) stride: Option<Bound>,
}

/// One slice component: a literal or a parenthesised expression, the
/// latter folded to a constant when the slice is compiled.
#[derive(Debug)]
pub enum Bound {
    Int(i64),
    Expr(Expr),
}

/// A regular-expression literal: its source text together with the program
/// compiled from it at parse time.
#[derive(Debug)]
pub struct Regexp {
    pub(crate) pattern: String,
    pub(crate) prog: regex::Regex,
}

impl Regexp {
    pub(crate) fn new(pattern: String, prog: regex::Regex) -> Arc<Self> {
        Arc::new(Self { pattern, prog })
    }

    /// The source text of the expression.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.pattern)
    }
}
