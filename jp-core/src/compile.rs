//! Lowering a parsed path to a program.
//!
//! Each step's arguments are emitted first (they become operands on the
//! machine's stack), then the step's op with its argument count in the
//! inline field. Expression trees are emitted in post order. A filter or
//! nesting step becomes a loop: an entry op patched with the loop exit,
//! the step body, then a `Rep` holding the body's address.

use crate::error::{ParseError, ParseErrorKind};
use crate::expr::Expr;
use crate::json::{arith, cvi, Val};
use crate::ops::Op;
use crate::path::{Arg, Bound, Path, Slice, Step};
use crate::program::{is_small_int, mk_order, mk_small, Bounds, Const, Program, INDEX_TOP};
use std::collections::HashMap;
use std::sync::Arc;

impl Path {
    /// Compile the path for the abstract machine.
    pub fn compile(&self) -> Result<Program, ParseError> {
        let mut b = Builder::new();
        for step in &self.steps {
            match step.op {
                Op::NestMember | Op::NestSelect | Op::NestUnion | Op::NestWild
                | Op::NestFilter => b.code_loop(step, Op::Nest)?,
                Op::Filter => b.code_loop(step, Op::For)?,
                _ => {
                    b.code_step(step)?;
                }
            }
        }
        Ok(b.prog)
    }
}

/// Interning key for pooled constants: structural equality, with floats
/// keyed by bit pattern and regexes by their source text.
#[derive(PartialEq, Eq, Hash)]
enum Key {
    Int(i64),
    Float(u64),
    Str(String),
    Name(String),
    Regex(String),
    Bounds(Bounds),
}

struct Builder {
    vals: HashMap<Key, u32>,
    prog: Program,
}

impl Builder {
    fn new() -> Self {
        Self {
            vals: HashMap::new(),
            prog: Program {
                consts: Vec::new(),
                orders: Vec::new(),
            },
        }
    }

    fn code_loop(&mut self, step: &Step, intro: Op) -> Result<(), ParseError> {
        let fpc = self.prog.asm(mk_small(intro, 0));
        let lpc = self.code_step(step)?;
        self.prog.asm(mk_small(Op::Rep, lpc as i64));
        let exit = self.prog.size() as i64;
        self.prog.patch(fpc, mk_small(intro, exit));
        Ok(())
    }

    fn code_step(&mut self, step: &Step) -> Result<usize, ParseError> {
        let pc = self.prog.size();
        for arg in &step.args {
            self.code_arg(arg)?;
        }
        self.prog.asm(mk_small(step.op, step.args.len() as i64));
        Ok(pc)
    }

    fn code_arg(&mut self, arg: &Arg) -> Result<(), ParseError> {
        match arg {
            Arg::Expr(e) => self.code_expr(e),
            Arg::Int(n) => self.code_int(*n),
            Arg::Name(s) => self.code_const(Op::Id, Const::Name(Arc::new(s.clone())), Key::Name(s.clone())),
            Arg::Str(s) => self.code_const(Op::Str, Const::Str(Arc::new(s.clone())), Key::Str(s.clone())),
            Arg::Slice(sl) => {
                let b = fold_slice(sl)?;
                self.code_const(Op::Bounds, Const::Bounds(b), Key::Bounds(b))
            }
        }
    }

    fn code_expr(&mut self, e: &Expr) -> Result<(), ParseError> {
        match e {
            Expr::Int(n) => self.code_int(*n),
            Expr::Real(f) => self.code_const(Op::Real, Const::Float(*f), Key::Float(f.to_bits())),
            Expr::Str(s) => {
                self.code_const(Op::Str, Const::Str(Arc::new(s.clone())), Key::Str(s.clone()))
            }
            Expr::Name(s) => {
                self.code_const(Op::Id, Const::Name(Arc::new(s.clone())), Key::Name(s.clone()))
            }
            Expr::Bool(b) => {
                self.prog.asm(mk_small(Op::Bool, i64::from(*b)));
                Ok(())
            }
            Expr::Null => {
                self.prog.asm(mk_small(Op::Null, 0));
                Ok(())
            }
            Expr::Root => {
                self.prog.asm(mk_small(Op::Root, 0));
                Ok(())
            }
            Expr::Current => {
                self.prog.asm(mk_small(Op::Current, 0));
                Ok(())
            }
            Expr::Regex(re) => self.code_const(
                Op::Regex,
                Const::Regex(re.clone()),
                Key::Regex(re.pattern().into()),
            ),
            Expr::Inner(op, kids) => {
                for kid in kids {
                    self.code_expr(kid)?;
                }
                self.prog.asm(mk_small(*op, kids.len() as i64));
                Ok(())
            }
        }
    }

    fn code_int(&mut self, n: i64) -> Result<(), ParseError> {
        if is_small_int(n) {
            self.prog.asm(mk_small(Op::Int, n));
            Ok(())
        } else {
            self.code_const(Op::Int, Const::Int(n), Key::Int(n))
        }
    }

    fn code_const(&mut self, op: Op, c: Const, key: Key) -> Result<(), ParseError> {
        let index = self.intern(c, key)?;
        self.prog.asm(mk_order(op, index));
        Ok(())
    }

    fn intern(&mut self, c: Const, key: Key) -> Result<u32, ParseError> {
        if let Some(&i) = self.vals.get(&key) {
            return Ok(i);
        }
        let i = self.prog.consts.len() as u32;
        if i >= INDEX_TOP {
            return Err(ParseError::plain(ParseErrorKind::TooManyVals));
        }
        self.prog.consts.push(c);
        self.vals.insert(key, i);
        Ok(i)
    }
}

/// Fold slice components to constants. Parenthesised expressions in slice
/// positions must reduce to a number at compile time.
fn fold_slice(sl: &Slice) -> Result<Bounds, ParseError> {
    Ok(Bounds {
        start: fold_bound(&sl.start)?,
        end: fold_bound(&sl.end)?,
        stride: fold_bound(&sl.stride)?,
    })
}

fn fold_bound(b: &Option<Bound>) -> Result<Option<i64>, ParseError> {
    match b {
        None => Ok(None),
        Some(Bound::Int(n)) => Ok(Some(*n)),
        Some(Bound::Expr(e)) => match const_eval(e) {
            Some(v @ (Val::Int(_) | Val::Float(_))) => Ok(Some(cvi(&v))),
            _ => Err(ParseError::plain(ParseErrorKind::NonConstSlice)),
        },
    }
}

/// Evaluate a constant expression, sharing the machine's arithmetic rules;
/// anything that needs a document yields None.
fn const_eval(e: &Expr) -> Option<Val> {
    match e {
        Expr::Int(n) => Some(Val::Int(*n)),
        Expr::Real(f) => Some(Val::Float(*f)),
        Expr::Str(s) => Some(Val::str(s.clone())),
        Expr::Bool(b) => Some(Val::Bool(*b)),
        Expr::Null => Some(Val::Null),
        Expr::Inner(Op::Neg, kids) => match const_eval(kids.first()?)? {
            Val::Int(n) => Some(Val::Int(n.wrapping_neg())),
            Val::Float(f) => Some(Val::Float(-f)),
            _ => None,
        },
        Expr::Inner(op @ (Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod), kids) => {
            let a = const_eval(kids.first()?)?;
            let b = const_eval(kids.get(1)?)?;
            arith(&a, &b, *op)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::parse::path;

    fn disasm(s: &str) -> String {
        path(s).unwrap().compile().unwrap().to_string()
    }

    #[test]
    fn members_and_selects() {
        assert_eq!(disasm("$"), "");
        assert_eq!(
            disasm("$.books[0].author"),
            "books author Id[0] Member.1 Int(0) Select.1 Id[1] Member.1"
        );
        assert_eq!(disasm("$.a.a"), "a Id[0] Member.1 Id[0] Member.1");
        assert_eq!(disasm("$[*]"), "Wild");
        assert_eq!(disasm("$['a b']"), "\"a b\" String[0] Select.1");
    }

    #[test]
    fn unions() {
        assert_eq!(disasm("$[0,1]"), "Int(0) Int(1) Union.2");
        assert_eq!(
            disasm("$[a,'b',-1]"),
            "a \"b\" Id[0] String[1] Int(-1) Union.3"
        );
    }

    #[test]
    fn slices() {
        assert_eq!(disasm("$[1:4]"), "[1:4] Bounds[0] Select.1");
        assert_eq!(disasm("$[::-1]"), "[::-1] Bounds[0] Select.1");
        assert_eq!(disasm("$[:]"), "[:] Bounds[0] Select.1");
        // slice bounds fold at compile time
        assert_eq!(disasm("$[(6/2):(2*2)]"), "[3:4] Bounds[0] Select.1");
        assert!(path("$[(@.n):]").unwrap().compile().is_err());
    }

    #[test]
    fn loops() {
        assert_eq!(disasm("$..title"), "title Nest.4 Id[0] NestMember.1 Rep.1");
        assert_eq!(disasm("$[?(@)]"), "For.4 Current Filter.1 Rep.1");
        assert_eq!(
            disasm("$.books[?(@.author=='Adam Smith')].title"),
            "books author \"Adam Smith\" title \
             Id[0] Member.1 For.10 Current Id[1] Dot.2 String[2] Eq.2 Filter.1 Rep.3 \
             Id[3] Member.1"
        );
    }

    #[test]
    fn expressions() {
        assert_eq!(
            disasm("$.books[(@.length-1)].title"),
            "books length title \
             Id[0] Member.1 Current Id[1] Dot.2 Int(1) Sub.2 Select.1 Id[2] Member.1"
        );
        assert_eq!(disasm("$[(1.5)]"), "1.5 Real[0] Select.1");
        assert_eq!(
            disasm("$[?(@.a in [1,true,null])]"),
            "a For.11 Current Id[0] Dot.2 Int(1) Bool(1) Null Array.3 In.2 Filter.1 Rep.1"
        );
    }

    #[test]
    fn inline_integer_width() {
        // 2^22 - 1 still fits inline, 2^22 goes to the pool
        assert_eq!(disasm("$[4194303]"), "Int(4194303) Select.1");
        assert_eq!(disasm("$[4194304]"), "4194304 Int[0] Select.1");
        assert_eq!(disasm("$[-4194304]"), "Int(-4194304) Select.1");
        assert_eq!(disasm("$[-4194305]"), "-4194305 Int[0] Select.1");
    }
}
