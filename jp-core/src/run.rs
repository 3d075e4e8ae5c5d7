//! The virtual machine.
//!
//! The machine is a stack evaluator over a compiled program. Its output
//! set starts as the document root and every path step filters or
//! transforms it; script expressions run on the expression stack, and the
//! looping steps (`For`, `Nest`, `Rep`) drive value sequences kept on an
//! iteration stack. All machine state is per evaluation, so one program
//! may be evaluated from several threads at once.

use crate::error::Error;
use crate::fns;
use crate::json::{arith, cvf, cvi, eq_val, is_simple, Val};
use crate::ops::Op;
use crate::program::{Bounds, Const, Program};
use std::borrow::Cow;
use std::sync::Arc;

/// A value on the expression stack: a JSON value or value set, an
/// identifier, a compiled regex, slice bounds, or the "nothing" sentinel
/// that models a failed lookup (JavaScript's undefined).
#[derive(Clone, Debug)]
enum Cell {
    Nothing,
    Json(Val),
    Name(Arc<String>),
    Regex(Arc<crate::path::Regexp>),
    Bounds(Bounds),
}

impl Cell {
    fn is_nothing(&self) -> bool {
        matches!(self, Cell::Nothing)
    }

    fn truthy(&self) -> bool {
        match self {
            Cell::Nothing => false,
            Cell::Json(v) => v.truthy(),
            _ => true,
        }
    }
}

fn cell_of(c: &Const) -> Cell {
    match c {
        Const::Int(n) => Cell::Json(Val::Int(*n)),
        Const::Float(f) => Cell::Json(Val::Float(*f)),
        Const::Str(s) => Cell::Json(Val::Str(s.clone())),
        Const::Name(s) => Cell::Name(s.clone()),
        Const::Regex(re) => Cell::Regex(re.clone()),
        Const::Bounds(b) => Cell::Bounds(*b),
    }
}

/// Materialise a cell as a JSON value, for array literals and function
/// arguments. Values with no JSON form become null.
fn cell_to_val(c: Cell) -> Val {
    match c {
        Cell::Json(v) => v,
        Cell::Name(s) => Val::Str(s),
        Cell::Nothing | Cell::Regex(_) | Cell::Bounds(_) => Val::Null,
    }
}

/// A cell's shape, for fatal-error messages.
fn describe(c: &Cell) -> String {
    match c {
        Cell::Nothing => "nothing".into(),
        Cell::Json(v) => v.kind().into(),
        Cell::Name(_) => "identifier".into(),
        Cell::Regex(_) => "regular expression".into(),
        Cell::Bounds(_) => "slice".into(),
    }
}

/// A lazy sequence of values driven by a loop.
enum Stream {
    Step(std::vec::IntoIter<Val>),
    Walk(Walker),
}

impl Iterator for Stream {
    type Item = Val;
    fn next(&mut self) -> Option<Val> {
        match self {
            Stream::Step(it) => it.next(),
            Stream::Walk(w) => w.next(),
        }
    }
}

/// One level of iteration for `For`: the members of objects and elements
/// of arrays in the output set, in source order.
fn stepping(out: &[Val]) -> Stream {
    let mut vals = Vec::new();
    for v in out {
        vals_wild(&mut vals, v);
    }
    Stream::Step(vals.into_iter())
}

/// Pre-order descent for `Nest`: each node yields itself, then each of its
/// children's subtrees in definition order (objects) or index order
/// (arrays). Primitive nodes yield themselves and have no descendants.
struct Walker {
    stack: Vec<Val>,
}

impl Walker {
    fn new(out: &[Val]) -> Stream {
        Stream::Walk(Walker {
            stack: out.iter().rev().cloned().collect(),
        })
    }
}

impl Iterator for Walker {
    type Item = Val;
    fn next(&mut self) -> Option<Val> {
        let v = self.stack.pop()?;
        match &v {
            Val::Arr(a) => self.stack.extend(a.iter().rev().cloned()),
            Val::Obj(o) => self.stack.extend(o.values().rev().cloned()),
            _ => (),
        }
        Some(v)
    }
}

struct Machine<'a> {
    prog: &'a Program,
    root: &'a Val,
    out: Vec<Val>,
    dot: Val,
    stack: Vec<Cell>,
    iters: Vec<Stream>,
    pc: usize,
}

impl Program {
    /// Evaluate the program against the root of a document, returning the
    /// list of selected values.
    ///
    /// Each call gets fresh machine state, so a program may be evaluated
    /// concurrently. Propagating failures (missing keys, bad indices, type
    /// mismatches) select nothing; only the fatal stratum returns `Err`.
    pub fn eval(&self, root: &Val) -> Result<Vec<Val>, Error> {
        let mut m = Machine {
            prog: self,
            root,
            out: vec![root.clone()],
            dot: Val::Null,
            stack: Vec::new(),
            iters: Vec::new(),
            pc: 0,
        };
        m.run()?;
        Ok(m.out)
    }
}

impl Machine<'_> {
    fn push(&mut self, c: Cell) {
        self.stack.push(c);
    }

    fn pop(&mut self) -> Cell {
        self.stack.pop().expect("stack underflow")
    }

    fn popn(&mut self, n: usize) -> Vec<Cell> {
        if self.stack.len() < n {
            panic!("stack underflow");
        }
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    fn branch(&mut self, pc: usize) {
        if pc == 0 || pc > self.prog.orders.len() {
            panic!("branch pc out of range: {} at pc {}", pc, self.pc - 1);
        }
        self.pc = pc;
    }

    /// Begin an iteration: empty the output set and position on the first
    /// value, or branch straight to the loop exit if there is none.
    fn loop_top(&mut self, mut s: Stream, exit: usize) {
        self.out = Vec::new();
        match s.next() {
            Some(v) => {
                self.dot = v;
                self.iters.push(s);
            }
            None => self.branch(exit),
        }
    }

    fn run(&mut self) -> Result<(), Error> {
        while self.pc < self.prog.orders.len() {
            let ord = self.prog.orders[self.pc];
            self.pc += 1;
            match ord.op() {
                // leaf values
                Op::Int if ord.is_small() => self.push(Cell::Json(Val::Int(ord.small()))),
                Op::Int | Op::Real | Op::Str | Op::Regex | Op::Bounds | Op::Id => {
                    let c = cell_of(&self.prog.consts[ord.index() as usize]);
                    self.push(c);
                }
                Op::Bool => self.push(Cell::Json(Val::Bool(ord.small() != 0))),
                Op::Null => self.push(Cell::Json(Val::Null)),
                Op::Root => self.push(Cell::Json(self.root.clone())),
                Op::Current => {
                    // inside a loop, @ is the value being iterated; in a
                    // subscript expression it is the current input, defined
                    // only when the selection has a single candidate
                    let c = if !self.iters.is_empty() {
                        Cell::Json(self.dot.clone())
                    } else if self.out.len() == 1 {
                        Cell::Json(self.out[0].clone())
                    } else {
                        Cell::Nothing
                    };
                    self.push(c);
                }

                // path operations, on every member of the output set
                Op::Wild => {
                    let mut vals = Vec::new();
                    for v in &self.out {
                        vals_wild(&mut vals, v);
                    }
                    self.out = vals;
                }
                Op::Member | Op::Select => {
                    // only the bracket form indexes from the end of an array
                    let neg = ord.op() == Op::Select;
                    let sel = self.pop();
                    let mut vals = Vec::new();
                    if !sel.is_nothing() {
                        for v in &self.out {
                            vals_by_key(&mut vals, v, &sel, neg);
                        }
                    }
                    self.out = vals;
                }
                Op::Union => {
                    // a union yields a bag, not a set
                    let sels = self.popn(ord.small() as usize);
                    let mut vals = Vec::new();
                    for v in &self.out {
                        for sel in &sels {
                            if !sel.is_nothing() {
                                vals_by_key(&mut vals, v, sel, true);
                            }
                        }
                    }
                    self.out = vals;
                }

                // path operations, on the value in dot
                Op::Filter | Op::NestFilter => {
                    let v = self.pop();
                    if v.truthy() {
                        self.out.push(self.dot.clone());
                    }
                }
                Op::NestWild => {
                    let dot = self.dot.clone();
                    vals_wild(&mut self.out, &dot);
                }
                Op::NestMember | Op::NestSelect => {
                    let neg = ord.op() == Op::NestSelect;
                    let sel = self.pop();
                    if !sel.is_nothing() {
                        let dot = self.dot.clone();
                        vals_by_key(&mut self.out, &dot, &sel, neg);
                    }
                }
                Op::NestUnion => {
                    let sels = self.popn(ord.small() as usize);
                    let dot = self.dot.clone();
                    for sel in &sels {
                        if !sel.is_nothing() {
                            vals_by_key(&mut self.out, &dot, sel, true);
                        }
                    }
                }

                // iteration over the output set and over its descendants
                Op::For => {
                    let s = stepping(&self.out);
                    self.loop_top(s, ord.pc());
                }
                Op::Nest => {
                    let s = Walker::new(&self.out);
                    self.loop_top(s, ord.pc());
                }
                Op::Rep => {
                    let it = self.iters.last_mut().expect("iteration stack underflow");
                    match it.next() {
                        Some(v) => {
                            self.dot = v;
                            self.branch(ord.pc());
                        }
                        None => {
                            self.iters.pop();
                            self.dot = Val::Null;
                        }
                    }
                }

                // expression operators
                Op::Dot => {
                    let sel = self.pop();
                    let val = self.pop();
                    if sel.is_nothing() || val.is_nothing() {
                        self.push(Cell::Nothing);
                        continue;
                    }
                    let name = match &sel {
                        Cell::Name(s) => s.clone(),
                        _ => panic!("dot selector must be a name"),
                    };
                    let c = dot_select(&val, &name);
                    self.push(c);
                }
                Op::Index => {
                    let index = self.pop();
                    let val = self.pop();
                    if index.is_nothing() || val.is_nothing() {
                        self.push(Cell::Nothing);
                        continue;
                    }
                    let c = index_select(&val, &index);
                    self.push(c);
                }
                Op::Or => {
                    let b = self.pop();
                    let a = self.pop();
                    if a.is_nothing() && b.is_nothing() {
                        self.push(Cell::Nothing);
                    } else if !a.is_nothing() && a.truthy() {
                        self.push(a);
                    } else {
                        self.push(b);
                    }
                }
                Op::And => {
                    let b = self.pop();
                    let a = self.pop();
                    if a.is_nothing() || !a.truthy() {
                        self.push(a);
                    } else {
                        self.push(b);
                    }
                }
                op @ (Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod) => {
                    let b = self.pop();
                    let a = self.pop();
                    let c = match (&a, &b) {
                        (Cell::Json(x), Cell::Json(y)) => match arith(x, y, op) {
                            Some(v) => Cell::Json(v),
                            None => Cell::Nothing,
                        },
                        _ => Cell::Nothing,
                    };
                    self.push(c);
                }
                Op::Neg => {
                    let c = match self.pop() {
                        Cell::Json(Val::Float(f)) => Cell::Json(Val::Float(-f)),
                        Cell::Json(v) => Cell::Json(Val::Int(cvi(&v).wrapping_neg())),
                        _ => Cell::Nothing,
                    };
                    self.push(c);
                }
                Op::Not => {
                    let v = self.pop();
                    self.push(Cell::Json(Val::Bool(!v.truthy())));
                }
                op @ (Op::Lt | Op::Le | Op::Ge | Op::Gt) => {
                    let b = self.pop();
                    let a = self.pop();
                    let c = relation(&a, &b, op);
                    self.push(c);
                }
                op @ (Op::Eq | Op::Ne) => {
                    let b = self.pop();
                    let a = self.pop();
                    let eq = eq_cell(&a, &b);
                    self.push(Cell::Json(Val::Bool(eq == (op == Op::Eq))));
                }
                Op::Array => {
                    let cells = self.popn(ord.small() as usize);
                    let vals = cells.into_iter().map(cell_to_val).collect();
                    self.push(Cell::Json(Val::arr(vals)));
                }
                Op::Match => {
                    let b = self.pop();
                    let a = self.pop();
                    if a.is_nothing() || b.is_nothing() {
                        self.push(Cell::Nothing);
                        continue;
                    }
                    let hit = match (&a, &b) {
                        (Cell::Json(Val::Str(s)), Cell::Regex(re)) => re.prog.is_match(s),
                        (Cell::Json(Val::Str(s)), Cell::Json(Val::Str(pat))) => {
                            // compiled at run time, so failure is fatal
                            let re = regex::Regex::new(pat)
                                .map_err(|e| Error::Regex(e.to_string()))?;
                            re.is_match(s)
                        }
                        (_, Cell::Regex(_) | Cell::Json(Val::Str(_))) => {
                            return Err(Error::MatchOperand("string left", describe(&a)))
                        }
                        _ => {
                            return Err(Error::MatchOperand(
                                "string or /re/ right",
                                describe(&b),
                            ))
                        }
                    };
                    self.push(Cell::Json(Val::Bool(hit)));
                }
                op @ (Op::In | Op::Nin) => {
                    let b = self.pop();
                    let a = self.pop();
                    if a.is_nothing() || b.is_nothing() {
                        self.push(Cell::Nothing);
                        continue;
                    }
                    let arr = match &b {
                        Cell::Json(Val::Arr(arr)) => arr,
                        _ => return Err(Error::InOperand(op, describe(&b))),
                    };
                    let found = match &a {
                        Cell::Json(av) => arr.iter().any(|el| eq_val(el, av)),
                        _ => false,
                    };
                    self.push(Cell::Json(Val::Bool(found == (op == Op::In))));
                }
                Op::Call => self.call(ord.small() as usize)?,

                op => panic!("unexpected op {} at pc {}", op.name(), self.pc - 1),
            }
        }
        Ok(())
    }

    /// Function dispatch: the first operand names the function, the rest
    /// are its arguments. A nothing argument propagates; an unknown name
    /// or a wrong argument count is fatal.
    fn call(&mut self, n: usize) -> Result<(), Error> {
        let mut cells = self.popn(n);
        let name = match cells.remove(0) {
            Cell::Name(s) => s,
            _ => panic!("call requires a function name"),
        };
        if cells.iter().any(Cell::is_nothing) {
            self.push(Cell::Nothing);
            return Ok(());
        }
        let f = fns::lookup(&name).ok_or_else(|| Error::UnknownFunction((*name).clone()))?;
        if let fns::Arity::Exact(k) = f.arity {
            if k != cells.len() {
                return Err(Error::Arity((*name).clone(), cells.len()));
            }
        }
        let args: Vec<Val> = cells.into_iter().map(cell_to_val).collect();
        match (f.run)(&args)? {
            Some(v) => self.push(Cell::Json(v)),
            None => self.push(Cell::Nothing),
        }
        Ok(())
    }
}

/// Add to `vals` the object members and array elements of `src`.
fn vals_wild(vals: &mut Vec<Val>, src: &Val) {
    match src {
        Val::Arr(a) => vals.extend(a.iter().cloned()),
        Val::Obj(o) => vals.extend(o.values().cloned()),
        _ => (),
    }
}

/// Add to `vals` the values of `src` selected by `key`: a member name, an
/// array index, or slice bounds. Absence contributes nothing.
fn vals_by_key(vals: &mut Vec<Val>, src: &Val, key: &Cell, neg_index: bool) {
    if let Cell::Bounds(b) = key {
        if let Val::Arr(a) = src {
            slice_into(vals, a, b);
        }
        return;
    }
    match src {
        Val::Arr(a) => {
            // only an integer selects from an array
            if let Cell::Json(Val::Int(n)) = key {
                if let Some(v) = index_array(a, *n, neg_index) {
                    vals.push(v);
                }
            }
        }
        Val::Obj(o) => {
            if let Some(k) = map_key(key) {
                if let Some(v) = o.get(k.as_ref()) {
                    vals.push(v.clone());
                }
            }
        }
        _ => (),
    }
}

fn index_array(a: &[Val], mut n: i64, neg_index: bool) -> Option<Val> {
    if neg_index && n < 0 {
        n += a.len() as i64;
    }
    if (0..a.len() as i64).contains(&n) {
        Some(a[n as usize].clone())
    } else {
        None
    }
}

/// Convert a selector into the string form used to index an object.
/// A float here is the result of a subscript expression, and a member
/// name requires an integer.
fn map_key(key: &Cell) -> Option<Cow<str>> {
    match key {
        Cell::Name(s) | Cell::Json(Val::Str(s)) => Some(Cow::Borrowed(s.as_str())),
        Cell::Json(Val::Int(n)) => Some(Cow::Owned(n.to_string())),
        Cell::Json(Val::Float(f)) => Some(Cow::Owned((*f as i64).to_string())),
        Cell::Json(Val::Bool(b)) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

/// Field selection in an expression. The pseudo-field `length` measures
/// strings in code points, and arrays and objects by element and member
/// count.
fn dot_select(val: &Cell, name: &str) -> Cell {
    if name == "length" {
        let n = match val {
            Cell::Json(Val::Str(s)) => s.chars().count(),
            Cell::Json(Val::Arr(a)) => a.len(),
            Cell::Json(Val::Obj(o)) => o.len(),
            _ => return Cell::Nothing,
        };
        return Cell::Json(Val::Int(n as i64));
    }
    match val {
        Cell::Json(Val::Obj(o)) => match o.get(name) {
            Some(v) => Cell::Json(v.clone()),
            None => Cell::Nothing,
        },
        _ => Cell::Nothing,
    }
}

/// `a[e]` in an expression: arrays take any index convertible to integer,
/// counting from the end if negative; objects take a member name.
fn index_select(val: &Cell, index: &Cell) -> Cell {
    match val {
        Cell::Json(Val::Arr(a)) => {
            let n = match index {
                Cell::Json(v) => cvi(v),
                _ => return Cell::Nothing,
            };
            match index_array(a, n, true) {
                Some(v) => Cell::Json(v),
                None => Cell::Nothing,
            }
        }
        Cell::Json(Val::Obj(o)) => match map_key(index).and_then(|k| o.get(k.as_ref())) {
            Some(v) => Cell::Json(v.clone()),
            None => Cell::Nothing,
        },
        _ => Cell::Nothing,
    }
}

/// Ordering comparison: strings compare with strings, numbers promote to
/// float if either side is float, and any other shapes compare false.
fn relation(a: &Cell, b: &Cell, op: Op) -> Cell {
    if a.is_nothing() || b.is_nothing() {
        return Cell::Nothing;
    }
    let (x, y) = match (a, b) {
        (Cell::Json(x), Cell::Json(y)) if is_simple(x) && is_simple(y) => (x, y),
        _ => return Cell::Json(Val::Bool(false)),
    };
    let ok = match (x, y) {
        (Val::Str(s), Val::Str(t)) => cmp(s, t, op),
        (Val::Str(_), _) | (_, Val::Str(_)) => false,
        (Val::Float(_), _) | (_, Val::Float(_)) => cmp(&cvf(x), &cvf(y), op),
        _ => cmp(&cvi(x), &cvi(y), op),
    };
    Cell::Json(Val::Bool(ok))
}

fn cmp<T: PartialOrd>(x: &T, y: &T, op: Op) -> bool {
    match op {
        Op::Lt => x < y,
        Op::Le => x <= y,
        Op::Ge => x >= y,
        Op::Gt => x > y,
        op => panic!("not a comparison: {}", op.name()),
    }
}

/// Abstract equality over cells: nothing plays undefined, so it equals
/// itself and null; identifiers, regexes and bounds equal nothing at all.
fn eq_cell(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::Nothing, Cell::Nothing) => true,
        (Cell::Nothing, Cell::Json(Val::Null)) | (Cell::Json(Val::Null), Cell::Nothing) => true,
        (Cell::Json(x), Cell::Json(y)) => eq_val(x, y),
        _ => false,
    }
}

/// Interpret slice bounds against an array of length `l`. A negative
/// index counts from the array's end; a negative stride selects in
/// reverse order, from start down to end exclusive.
fn slice_eval(b: &Bounds, l: i64) -> (i64, i64, i64) {
    let stride = b.stride.unwrap_or(1);
    let (mut start, mut end) = if stride < 0 { (l - 1, -l - 1) } else { (0, l) };
    if let Some(s) = b.start {
        start = s;
    }
    if let Some(e) = b.end {
        end = e;
    }
    if stride < 0 {
        if start >= l {
            start = l - 1;
        } else if start < 0 {
            start += l;
            if start < 0 {
                start = -1;
            }
        }
        if end > l {
            end = l;
        } else if end < 0 {
            end += l;
            if end < 0 {
                end = -1;
            }
        }
    } else {
        if start > l {
            start = l;
        } else if start < 0 {
            start += l;
            if start < 0 {
                start = 0;
            }
        }
        if end > l {
            end = l;
        } else if end < 0 {
            end += l;
            if end < 0 {
                end = 0;
            }
        }
    }
    (start, end, stride)
}

fn slice_into(vals: &mut Vec<Val>, a: &[Val], b: &Bounds) {
    let (start, end, stride) = slice_eval(b, a.len() as i64);
    if stride > 0 {
        let mut i = start;
        while i < end {
            vals.push(a[i as usize].clone());
            i += stride;
        }
    } else if stride < 0 {
        let mut i = start;
        while i > end {
            vals.push(a[i as usize].clone());
            i += stride;
        }
    }
    // stride 0 selects nothing, in the spirit of the notation
}
