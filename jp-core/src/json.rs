//! JSON values with reference-counted sharing, and the JavaScript-flavoured
//! coercion and equality rules shared by the compiler, the machine, and the
//! built-in functions.
//!
//! Numbers are distinguished into 64-bit integers and 64-bit floats; the
//! distinction affects equality, arithmetic, and array indexing. Objects
//! preserve member order. Sharing uses `Arc` so a document and a compiled
//! program may be used from several threads at once.

use core::fmt;
use std::sync::Arc;

use crate::ops::Op;

/// Order-preserving map of object members.
pub type Map = indexmap::IndexMap<String, Val, ahash::RandomState>;

/// A JSON value.
#[derive(Clone, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub enum Val {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<String>),
    Arr(Arc<Vec<Val>>),
    Obj(Arc<Map>),
}

impl Val {
    /// Construct a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(Arc::new(s.into()))
    }

    /// Construct an array value.
    pub fn arr(v: Vec<Val>) -> Self {
        Self::Arr(Arc::new(v))
    }

    /// Construct an object value.
    pub fn obj(m: Map) -> Self {
        Self::Obj(Arc::new(m))
    }

    /// Truthiness, the JavaScript way: null, false, 0, NaN, and the empty
    /// string are falsy; everything else (arrays and objects included) is
    /// truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(n) => *n != 0,
            Val::Float(f) => *f != 0.0 && !f.is_nan(),
            Val::Str(s) => !s.is_empty(),
            Val::Arr(_) | Val::Obj(_) => true,
        }
    }

    /// A short description of the value's type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Int(_) => "integer",
            Val::Float(_) => "float",
            Val::Str(_) => "string",
            Val::Arr(_) => "array",
            Val::Obj(_) => "object",
        }
    }
}

/// True if the value is "simple": not an array or object.
pub(crate) fn is_simple(v: &Val) -> bool {
    matches!(
        v,
        Val::Bool(_) | Val::Int(_) | Val::Float(_) | Val::Str(_)
    )
}

/// Convert a value to integer, the forgiving way used for indexing and
/// integer arithmetic: unparseable strings and non-simple values are 0.
pub(crate) fn cvi(v: &Val) -> i64 {
    match v {
        Val::Bool(true) => 1,
        Val::Int(n) => *n,
        Val::Float(f) => *f as i64,
        Val::Str(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Convert a value to floating point, with the same conventions as `cvi`.
pub(crate) fn cvf(v: &Val) -> f64 {
    match v {
        Val::Bool(true) => 1.0,
        Val::Int(n) => *n as f64,
        Val::Float(f) => *f,
        Val::Str(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// JavaScript `ToNumber` for a string: empty or blank is 0, otherwise the
/// number it spells, or None if it spells none. Used by abstract equality,
/// where a failed conversion makes the comparison false rather than 0.
fn str_to_num(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse().ok()
}

/// Abstract equality (ECMA-262 5.1 §11.9.3) over JSON values, with one
/// deliberate divergence: arrays and objects of the same type compare by
/// structural value, not by reference.
///
/// The undefined-vs-null clauses live at the machine level, where the
/// "nothing" sentinel plays the role of undefined.
pub(crate) fn eq_val(a: &Val, b: &Val) -> bool {
    use Val::*;
    match (a, b) {
        // 11.9.3(1): same type
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Int(x), Float(y)) | (Float(y), Int(x)) => *x as f64 == *y,
        (Str(x), Str(y)) => x == y,
        (Arr(x), Arr(y)) => x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| eq_val(a, b)),
        (Obj(x), Obj(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| eq_val(v, w)))
        }
        // 11.9.3(6), 11.9.3(7): booleans convert to numbers first
        (Bool(x), y) | (y, Bool(x)) => eq_val(&Int(i64::from(*x)), y),
        // 11.9.3(4), 11.9.3(5): number against string
        (Int(n), Str(s)) | (Str(s), Int(n)) => str_to_num(s) == Some(*n as f64),
        (Float(f), Str(s)) | (Str(s), Float(f)) => str_to_num(s) == Some(*f),
        // 11.9.3(8), 11.9.3(9): objects against primitives, reduced to the
        // cases where equality can hold after Array.prototype.toString
        (Arr(x), y @ (Int(_) | Float(_) | Str(_))) | (y @ (Int(_) | Float(_) | Str(_)), Arr(x)) => {
            match x.len() {
                0 => match y {
                    Str(s) => s.is_empty(),
                    n => cvf(n) == 0.0,
                },
                1 => eq_val(&x[0], y),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Arithmetic with JavaScript-style promotion: float if either operand is
/// float, else 64-bit integer. Division or modulo by zero, and operands
/// that are not simple values, yield None (the "nothing" sentinel).
pub(crate) fn arith(a: &Val, b: &Val, op: Op) -> Option<Val> {
    if !is_simple(a) || !is_simple(b) {
        return None;
    }
    if matches!(a, Val::Float(_)) || matches!(b, Val::Float(_)) {
        let (x, y) = (cvf(a), cvf(b));
        let f = match op {
            Op::Add => x + y,
            Op::Sub => x - y,
            Op::Mul => x * y,
            Op::Div | Op::Mod if y == 0.0 => return None,
            Op::Div => x / y,
            Op::Mod => x % y,
            op => panic!("not arithmetic: {}", op.name()),
        };
        return Some(Val::Float(f));
    }
    let (x, y) = (cvi(a), cvi(b));
    let n = match op {
        Op::Add => x.wrapping_add(y),
        Op::Sub => x.wrapping_sub(y),
        Op::Mul => x.wrapping_mul(y),
        Op::Div | Op::Mod if y == 0 => return None,
        Op::Div => x.wrapping_div(y),
        Op::Mod => x.wrapping_rem(y),
        op => panic!("not arithmetic: {}", op.name()),
    };
    Some(Val::Int(n))
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Val::Null => f.write_str("null"),
            Val::Bool(b) => b.fmt(f),
            Val::Int(n) => n.fmt(f),
            Val::Float(x) => write!(f, "{x:?}"),
            Val::Str(s) => write!(f, "{s:?}"),
            Val::Arr(a) => {
                f.write_str("[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    v.fmt(f)?;
                }
                f.write_str("]")
            }
            Val::Obj(o) => {
                f.write_str("{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k:?}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<serde_json::Value> for Val {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Val::Null,
            Value::Bool(b) => Val::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Val::Int(i),
                None => Val::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Val::Str(Arc::new(s)),
            Value::Array(a) => Val::arr(a.into_iter().map(Val::from).collect()),
            Value::Object(o) => {
                Val::obj(o.into_iter().map(|(k, v)| (k, Val::from(v))).collect())
            }
        }
    }
}

impl From<&Val> for serde_json::Value {
    fn from(v: &Val) -> Self {
        use serde_json::Value;
        match v {
            Val::Null => Value::Null,
            Val::Bool(b) => Value::Bool(*b),
            Val::Int(n) => Value::from(*n),
            // non-finite floats have no JSON form and become null
            Val::Float(f) => Value::from(*f),
            Val::Str(s) => Value::String((**s).clone()),
            Val::Arr(a) => Value::Array(a.iter().map(Value::from).collect()),
            Val::Obj(o) => Value::Object(
                o.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{eq_val, Val};

    fn arr(vals: &[Val]) -> Val {
        Val::arr(vals.to_vec())
    }

    fn obj1(k: &str, v: Val) -> Val {
        Val::obj([(k.to_string(), v)].into_iter().collect())
    }

    /// Operand pairs and the required result, each run in both orders;
    /// equality must be symmetric.
    #[test]
    fn abstract_equality() {
        use Val::{Bool, Float, Int, Null};
        let s = Val::str;
        let pairs = [
            // 11.9.3(1)
            (Null, Null, true),
            (Int(42), Float(42.0), true),
            (Int(0), Float(0.0), true),
            (Int(0), Int(0), true),
            (Float(0.0), Float(-0.0), true),
            (Float(f64::NAN), Float(f64::NAN), false),
            (Float(1.5), Float(f64::NAN), false),
            (s(""), s(""), true),
            (s(""), s("x"), false),
            (s("abc"), s("abc"), true),
            (s("abc"), s("abd"), false),
            (s("abc"), s("abcd"), false),
            (s("áé"), s("áé"), true),
            (s("ábc"), s("abc"), false),
            (Bool(true), Bool(true), true),
            (Bool(true), Bool(false), false),
            // 11.9.3(4), (5): number against string
            (Int(42), s("42"), true),
            (Int(42), s("42a"), false),
            (Int(0), s(""), true),
            (Int(1), s(""), false),
            (Int(-42), s("-42"), true),
            (Float(42.5), s("42.5"), true),
            (Float(42.5), s("42.5a"), false),
            (Float(0.0), s(""), true),
            (Float(1.0), s(""), false),
            (Float(-42.5), s("-42.5"), true),
            (Float(-0.0), s("-"), false),
            (Float(-0.0), s("-0.0"), true),
            // 11.9.3(6), (7): boolean converts to number first
            (Bool(false), Int(0), true),
            (Bool(true), Int(1), true),
            (Bool(false), Float(0.0), true),
            (Bool(true), Float(1.0), true),
            (Bool(true), Int(2), false),
            (Bool(false), s(""), true),
            (Bool(false), s("0"), true),
            (Bool(false), s("0.0"), true),
            (Bool(false), s("false"), false),
            (Bool(false), s("true"), false),
            (Bool(true), s(""), false),
            (Bool(true), s("1"), true),
            (Bool(true), s("1.0"), true),
            (Bool(true), s("2"), false),
            (Bool(true), s("true"), false),
            (Bool(true), s("false"), false),
            // boolean against object
            (Bool(false), arr(&[]), true),
            (Bool(false), arr(&[Bool(false)]), true),
            (Bool(true), arr(&[Val::str("false")]), false),
            (Bool(false), Val::obj(Default::default()), false),
            (Bool(true), arr(&[]), false),
            (Bool(true), arr(&[Bool(true)]), true),
            (Bool(true), arr(&[Val::str("true")]), false),
            (Bool(true), Val::obj(Default::default()), false),
            // 11.9.3(8), (9): string or number against object
            (s("hello"), arr(&[Val::str("hello")]), true),
            (s(""), arr(&[Val::str("")]), true),
            (s(""), arr(&[]), true),
            (Int(42), arr(&[Val::str("42")]), true),
            (Int(42), arr(&[Int(42)]), true),
            (Int(42), obj1("42", Bool(true)), false),
            (Float(42.0), arr(&[Val::str("42.0")]), true),
            (Float(42.0), arr(&[Float(42.0)]), true),
            (Float(42.0), obj1("42.0", Bool(true)), false),
            // structural value equality, the deliberate divergence
            (arr(&[Int(1), Int(2)]), arr(&[Int(1), Int(2)]), true),
            (arr(&[Int(1), Int(2)]), arr(&[Int(2), Int(1)]), false),
            (arr(&[Int(1)]), arr(&[Int(1), Int(1)]), false),
            (obj1("a", Int(1)), obj1("a", Int(1)), true),
            (obj1("a", Int(1)), obj1("a", Int(2)), false),
            (obj1("a", Int(1)), obj1("b", Int(1)), false),
            (arr(&[Int(1), Int(2)]), s("1,2"), false),
            // null only equals null (and undefined, at the machine level)
            (Null, Int(0), false),
            (Null, Bool(false), false),
            (Null, s(""), false),
            (Null, arr(&[]), false),
        ];
        for (i, (a, b, want)) in pairs.iter().enumerate() {
            assert_eq!(eq_val(a, b), *want, "pair {i}: {a} == {b}");
            assert_eq!(eq_val(b, a), *want, "pair {i} swapped: {b} == {a}");
        }
    }

    #[test]
    fn truthiness() {
        assert!(!Val::Null.truthy());
        assert!(!Val::Bool(false).truthy());
        assert!(!Val::Int(0).truthy());
        assert!(!Val::Float(f64::NAN).truthy());
        assert!(!Val::str("").truthy());
        assert!(Val::str("0").truthy());
        // arrays and objects are always truthy, even empty
        assert!(Val::arr(vec![]).truthy());
        assert!(Val::obj(Default::default()).truthy());
    }
}
