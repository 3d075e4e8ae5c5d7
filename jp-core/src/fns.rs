//! Built-in functions, callable from script expressions.
//!
//! Each entry records its expected argument count and a body from JSON
//! values to a JSON result. A body returns `Ok(None)` for the propagating
//! "nothing" sentinel (an argument of the wrong type), and `Err` only for
//! the fatal stratum (overflow, a bad dynamic regex). The dispatcher
//! checks arity before the body runs.

use crate::error::Error;
use crate::json::{cvf, eq_val, Val};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Expected argument count.
pub(crate) enum Arity {
    Exact(usize),
    Any,
}

/// A predefined function.
pub(crate) struct Function {
    pub arity: Arity,
    pub run: fn(&[Val]) -> Result<Option<Val>, Error>,
}

/// Find a function by name.
pub(crate) fn lookup(name: &str) -> Option<&'static Function> {
    FUNCTIONS.get(name)
}

static FUNCTIONS: Lazy<HashMap<&'static str, Function>> = Lazy::new(|| {
    use Arity::{Any, Exact};
    let f = |arity, run: fn(&[Val]) -> Result<Option<Val>, Error>| Function { arity, run };
    HashMap::from([
        ("abs", f(Exact(1), abs)),
        ("avg", f(Exact(1), avg)),
        ("ceil", f(Exact(1), ceil)),
        ("contains", f(Exact(2), contains)),
        ("ends_with", f(Exact(2), ends_with)),
        ("floor", f(Exact(1), floor)),
        ("keys", f(Exact(1), keys)),
        ("length", f(Exact(1), length)),
        ("max", f(Any, max)),
        ("min", f(Any, min)),
        ("prod", f(Exact(1), prod)),
        ("starts_with", f(Exact(2), starts_with)),
        ("sum", f(Exact(1), sum)),
        ("to_number", f(Exact(1), to_number)),
        ("tokenize", f(Exact(2), tokenize)),
    ])
});

/// Arithmetic in the JavaScript sense: booleans count as numbers.
fn is_arith(v: &Val) -> bool {
    matches!(v, Val::Int(_) | Val::Float(_) | Val::Bool(_))
}

fn string_args(args: &[Val]) -> Option<(&str, &str)> {
    match args {
        [Val::Str(a), Val::Str(b)] => Some((a.as_str(), b.as_str())),
        _ => None,
    }
}

fn abs(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        Val::Int(n) => match n.checked_abs() {
            Some(n) => Ok(Some(Val::Int(n))),
            None => Err(Error::Overflow("abs")),
        },
        Val::Float(f) => Ok(Some(Val::Float(f.abs()))),
        _ => Ok(None),
    }
}

fn avg(args: &[Val]) -> Result<Option<Val>, Error> {
    let a = match &args[0] {
        Val::Arr(a) => a,
        _ => return Ok(None),
    };
    if a.is_empty() {
        return Ok(Some(Val::Null));
    }
    let mut sum = 0.0;
    for v in a.iter() {
        if !is_arith(v) {
            return Ok(None);
        }
        sum += cvf(v);
    }
    Ok(Some(Val::Float(sum / a.len() as f64)))
}

fn ceil(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        v @ Val::Int(_) => Ok(Some(v.clone())),
        Val::Float(f) => Ok(Some(Val::Float(f.ceil()))),
        _ => Ok(None),
    }
}

fn floor(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        v @ Val::Int(_) => Ok(Some(v.clone())),
        Val::Float(f) => Ok(Some(Val::Float(f.floor()))),
        _ => Ok(None),
    }
}

fn contains(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        Val::Str(a) => match &args[1] {
            Val::Str(b) => Ok(Some(Val::Bool(a.contains(b.as_str())))),
            _ => Ok(None),
        },
        Val::Arr(a) => Ok(Some(Val::Bool(a.iter().any(|v| eq_val(v, &args[1]))))),
        _ => Ok(None),
    }
}

fn ends_with(args: &[Val]) -> Result<Option<Val>, Error> {
    match string_args(args) {
        Some((a, b)) => Ok(Some(Val::Bool(a.ends_with(b)))),
        None => Ok(None),
    }
}

fn starts_with(args: &[Val]) -> Result<Option<Val>, Error> {
    match string_args(args) {
        Some((a, b)) => Ok(Some(Val::Bool(a.starts_with(b)))),
        None => Ok(None),
    }
}

fn keys(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        Val::Obj(o) => Ok(Some(Val::arr(
            o.keys().map(|k| Val::str(k.clone())).collect(),
        ))),
        _ => Ok(None),
    }
}

fn length(args: &[Val]) -> Result<Option<Val>, Error> {
    let n = match &args[0] {
        Val::Str(s) => s.chars().count(),
        Val::Arr(a) => a.len(),
        Val::Obj(o) => o.len(),
        _ => return Ok(Some(Val::Null)),
    };
    Ok(Some(Val::Int(n as i64)))
}

fn max(args: &[Val]) -> Result<Option<Val>, Error> {
    min_max(args, true)
}

fn min(args: &[Val]) -> Result<Option<Val>, Error> {
    min_max(args, false)
}

/// `min`/`max` take either a single array or any number of scalars, and
/// compare all-numeric or all-string sequences.
fn min_max(args: &[Val], want_max: bool) -> Result<Option<Val>, Error> {
    let vals: &[Val] = match args {
        [] => return Ok(Some(Val::Null)),
        [Val::Arr(a)] => a,
        [_] => return Ok(None),
        args => args,
    };
    if vals.is_empty() {
        return Ok(Some(Val::Null));
    }
    match &vals[0] {
        Val::Int(_) | Val::Float(_) | Val::Bool(_) => {
            let mut best = cvf(&vals[0]);
            for v in &vals[1..] {
                if !is_arith(v) {
                    return Ok(None);
                }
                let x = cvf(v);
                if (x > best) == want_max && x != best {
                    best = x;
                }
            }
            Ok(Some(Val::Float(best)))
        }
        Val::Str(_) => {
            let mut best = match &vals[0] {
                Val::Str(s) => s,
                _ => unreachable!(),
            };
            for v in &vals[1..] {
                let s = match v {
                    Val::Str(s) => s,
                    _ => return Ok(None),
                };
                if (s > best) == want_max && s != best {
                    best = s;
                }
            }
            Ok(Some(Val::Str(best.clone())))
        }
        _ => Ok(None),
    }
}

fn prod(args: &[Val]) -> Result<Option<Val>, Error> {
    fold_arith(args, 1.0, |acc, x| acc * x)
}

fn sum(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        Val::Arr(a) if a.is_empty() => Ok(Some(Val::Float(0.0))),
        _ => fold_arith(args, 0.0, |acc, x| acc + x),
    }
}

fn fold_arith(args: &[Val], init: f64, f: fn(f64, f64) -> f64) -> Result<Option<Val>, Error> {
    let a = match &args[0] {
        Val::Arr(a) => a,
        _ => return Ok(None),
    };
    if a.is_empty() {
        return Ok(Some(Val::Null));
    }
    let mut acc = init;
    for v in a.iter() {
        if !is_arith(v) {
            return Ok(None);
        }
        acc = f(acc, cvf(v));
    }
    Ok(Some(Val::Float(acc)))
}

fn to_number(args: &[Val]) -> Result<Option<Val>, Error> {
    match &args[0] {
        v @ (Val::Int(_) | Val::Float(_)) => Ok(Some(v.clone())),
        Val::Str(s) => Ok(s.trim().parse().ok().map(Val::Float)),
        _ => Ok(None),
    }
}

fn tokenize(args: &[Val]) -> Result<Option<Val>, Error> {
    let (s, pat) = match string_args(args) {
        Some(p) => p,
        None => return Ok(None),
    };
    let re = regex::Regex::new(pat).map_err(|e| Error::Regex(e.to_string()))?;
    Ok(Some(Val::arr(re.split(s).map(Val::str).collect())))
}

#[cfg(test)]
mod tests {
    use super::lookup;
    use crate::error::Error;
    use crate::json::Val;

    fn call(name: &str, args: &[Val]) -> Result<Option<Val>, Error> {
        (lookup(name).unwrap().run)(args)
    }

    #[test]
    fn numeric() {
        assert_eq!(call("abs", &[Val::Int(-3)]), Ok(Some(Val::Int(3))));
        assert_eq!(call("abs", &[Val::Float(-2.5)]), Ok(Some(Val::Float(2.5))));
        assert_eq!(call("abs", &[Val::Int(i64::MIN)]), Err(Error::Overflow("abs")));
        assert_eq!(call("abs", &[Val::str("x")]), Ok(None));
        assert_eq!(call("ceil", &[Val::Float(1.2)]), Ok(Some(Val::Float(2.0))));
        assert_eq!(call("floor", &[Val::Float(1.8)]), Ok(Some(Val::Float(1.0))));
        assert_eq!(call("ceil", &[Val::Int(7)]), Ok(Some(Val::Int(7))));
    }

    #[test]
    fn aggregates() {
        let a = Val::arr([1, 2, 3].map(Val::Int).to_vec());
        assert_eq!(call("sum", &[a.clone()]), Ok(Some(Val::Float(6.0))));
        assert_eq!(call("avg", &[a.clone()]), Ok(Some(Val::Float(2.0))));
        assert_eq!(call("prod", &[a.clone()]), Ok(Some(Val::Float(6.0))));
        assert_eq!(call("sum", &[Val::arr(vec![])]), Ok(Some(Val::Float(0.0))));
        assert_eq!(call("avg", &[Val::arr(vec![])]), Ok(Some(Val::Null)));
        assert_eq!(call("sum", &[Val::Int(1)]), Ok(None));

        assert_eq!(call("min", &[a.clone()]), Ok(Some(Val::Float(1.0))));
        assert_eq!(call("max", &[a]), Ok(Some(Val::Float(3.0))));
        assert_eq!(
            call("max", &[Val::Int(2), Val::Int(9), Val::Int(4)]),
            Ok(Some(Val::Float(9.0)))
        );
        assert_eq!(
            call("min", &[Val::str("b"), Val::str("a")]),
            Ok(Some(Val::str("a")))
        );
        assert_eq!(call("min", &[]), Ok(Some(Val::Null)));
    }

    #[test]
    fn strings() {
        assert_eq!(
            call("contains", &[Val::str("hello"), Val::str("ell")]),
            Ok(Some(Val::Bool(true)))
        );
        assert_eq!(
            call("contains", &[Val::arr(vec![Val::Int(2)]), Val::Int(2)]),
            Ok(Some(Val::Bool(true)))
        );
        assert_eq!(
            call("starts_with", &[Val::str("hello"), Val::str("he")]),
            Ok(Some(Val::Bool(true)))
        );
        assert_eq!(
            call("ends_with", &[Val::str("hello"), Val::str("lo")]),
            Ok(Some(Val::Bool(true)))
        );
        assert_eq!(call("ends_with", &[Val::str("x"), Val::Int(1)]), Ok(None));
        assert_eq!(call("length", &[Val::str("नमस्ते")]), Ok(Some(Val::Int(6))));
        assert_eq!(call("length", &[Val::Int(5)]), Ok(Some(Val::Null)));
        assert_eq!(
            call("to_number", &[Val::str("42.5")]),
            Ok(Some(Val::Float(42.5)))
        );
        assert_eq!(call("to_number", &[Val::str("x")]), Ok(None));
    }

    #[test]
    fn tokenizing() {
        assert_eq!(
            call("tokenize", &[Val::str("a b  c"), Val::str(r"\s+")]),
            Ok(Some(Val::arr(vec![
                Val::str("a"),
                Val::str("b"),
                Val::str("c")
            ])))
        );
        assert!(matches!(
            call("tokenize", &[Val::str("a"), Val::str("(")]),
            Err(Error::Regex(_))
        ));
    }

    #[test]
    fn object_keys() {
        let o = Val::obj(
            [("b".to_string(), Val::Int(1)), ("a".to_string(), Val::Int(2))]
                .into_iter()
                .collect(),
        );
        // insertion order is preserved
        assert_eq!(
            call("keys", &[o]),
            Ok(Some(Val::arr(vec![Val::str("b"), Val::str("a")])))
        );
    }
}
