use jp_core::{compile, Val};
use serde_json::Value;

/// Compile `path` and evaluate it against `doc`, as serde values.
pub fn eval(doc: Value, path: &str) -> Vec<Value> {
    let prog = compile(path).unwrap_or_else(|e| panic!("path {path}: {e}"));
    let root = Val::from(doc);
    let out = prog.eval(&root).unwrap_or_else(|e| panic!("path {path}: {e}"));
    out.iter().map(Value::from).collect()
}

pub fn give(doc: Value, path: &str, want: Value) {
    gives(doc, path, [want]);
}

pub fn gives<const N: usize>(doc: Value, path: &str, want: [Value; N]) {
    assert_eq!(eval(doc, path), want, "path {path}");
}
