//! Evaluation scenarios, mostly over the standard "books" document.

mod common;

use common::{eval, give, gives};
use jp_core::{compile, Val};
use serde_json::{json, Value};

fn books() -> Value {
    json!({"books": [
        {"title": "Decline and Fall", "author": "Evelyn Waugh", "date": 1928},
        {"title": "Wealth of Nations", "author": "Adam Smith", "date": 1776},
    ]})
}

#[test]
fn root() {
    give(books(), "$", books());
    give(json!(42), "$", json!(42));
}

#[test]
fn members() {
    give(books(), "$.books[0].author", json!("Evelyn Waugh"));
    give(books(), "$.books[1].author", json!("Adam Smith"));
    gives(books(), "$.books[2].author", []);
    gives(books(), "$.nothing.here", []);
    give(json!({"a b": 1}), "$['a b']", json!(1));
    give(json!({"-1": "x"}), "$.-1", json!("x"));
}

#[test]
fn wildcards() {
    gives(
        books(),
        "$.books[*].title",
        [json!("Decline and Fall"), json!("Wealth of Nations")],
    );
    gives(json!({"a": 1, "b": 2}), "$.*", [json!(1), json!(2)]);
    gives(json!([1, [2, 3]]), "$[*]", [json!(1), json!([2, 3])]);
}

#[test]
fn negative_indices() {
    // only the bracket form counts from the end
    give(books(), "$.books[-1].title", json!("Wealth of Nations"));
    gives(books(), "$.books.-1", []);
    gives(json!([1, 2, 3]), "$[-4]", []);
}

#[test]
fn filters() {
    gives(
        books(),
        "$.books[?(@.author=='Adam Smith')].title",
        [json!("Wealth of Nations")],
    );
    gives(
        books(),
        "$.books[?(@.date < 1900)].title",
        [json!("Wealth of Nations")],
    );
    gives(books(), "$.books[?(@.date > 2000)].title", []);
    gives(
        books(),
        "$.books[?(@.author=='Adam Smith' || @.date==1928)].date",
        [json!(1928), json!(1776)],
    );
    // a filter runs over the members of each candidate, one level deep
    gives(json!({"a": {"x": 1}, "b": {"x": 2}}), "$[?(@.x > 1)]", [json!({"x": 2})]);
}

#[test]
fn subscript_expressions() {
    give(books(), "$.books[(@.length-1)].title", json!("Wealth of Nations"));
    give(books(), "$.books[(0)].date", json!(1928));
    give(json!({"2": "two"}), "$[(1+1)]", json!("two"));
}

#[test]
fn nesting() {
    gives(
        books(),
        "$..title",
        [json!("Decline and Fall"), json!("Wealth of Nations")],
    );
    gives(
        books(),
        "$..[?(@.date==1776)].title",
        [json!("Wealth of Nations")],
    );
    // pre-order: the node itself, then each child's subtree
    let doc = json!({"a": {"b": 1}, "c": [2, 3]});
    gives(
        doc.clone(),
        "$..[*]",
        [json!({"b": 1}), json!([2, 3]), json!(1), json!(2), json!(3)],
    );
    gives(
        json!({"b": 0, "a": {"b": 1, "c": {"b": 2}}}),
        "$..b",
        [json!(0), json!(1), json!(2)],
    );
}

#[test]
fn slices() {
    let a = json!([0, 1, 2, 3, 4]);
    gives(a.clone(), "$[1:4]", [json!(1), json!(2), json!(3)]);
    gives(
        a.clone(),
        "$[::-1]",
        [json!(4), json!(3), json!(2), json!(1), json!(0)],
    );
    gives(a.clone(), "$[-2:]", [json!(3), json!(4)]);
    gives(a.clone(), "$[::0]", []);
    gives(a.clone(), "$[::2]", [json!(0), json!(2), json!(4)]);
    gives(a.clone(), "$[3:0:-2]", [json!(3), json!(1)]);
    gives(a, "$[(6/3):(2*2)]", [json!(2), json!(3)]);
    // slicing anything but an array selects nothing
    gives(json!({"a": 1}), "$[0:1]", []);
}

#[test]
fn unions() {
    let doc = json!({"a": 1, "b": 2});
    // a union is a bag: order preserved, duplicates kept
    gives(doc.clone(), "$[b,a]", [json!(2), json!(1)]);
    gives(doc.clone(), "$['a','a']", [json!(1), json!(1)]);
    let mut both = eval(doc.clone(), "$.a");
    both.extend(eval(doc.clone(), "$.b"));
    assert_eq!(eval(doc, "$[a,b]"), both);
    gives(
        json!([0, 1, 2, 3]),
        "$[1:3, 0, 'x']",
        [json!(1), json!(2), json!(0)],
    );
}

#[test]
fn equality() {
    gives(json!([42]), "$[?(@ == '42')]", [json!(42)]);
    gives(json!([""]), "$[?(@ == 0)]", [json!("")]);
    gives(json!([[1]]), "$[?(@ == true)]", [json!([1])]);
    gives(json!([[1, 2]]), "$[?(@ == [1,2])]", [json!([1, 2])]);
    gives(json!([[1, 2]]), "$[?(@ == [2,1])]", []);
    gives(json!([{"a": null}]), "$[?(@.a == null)]", [json!({"a": null})]);
    // an absent member is undefined, which equals null
    gives(json!([{"a": null}]), "$[?(@.missing == null)]", [json!({"a": null})]);
    gives(json!([{"a": null}]), "$[?(@.missing == @.also_missing)]", [json!({"a": null})]);
    gives(json!([1]), "$[?(@ != 2)]", [json!(1)]);
}

#[test]
fn arithmetic_and_logic() {
    let doc = json!([{"n": 10}]);
    gives(doc.clone(), "$[?(@.n * 2 == 20)]", [json!({"n": 10})]);
    gives(doc.clone(), "$[?(@.n % 3 == 1)]", [json!({"n": 10})]);
    gives(doc.clone(), "$[?(@.n / 4 == 2)]", [json!({"n": 10})]);
    gives(doc.clone(), "$[?(@.n / 4.0 == 2.5)]", [json!({"n": 10})]);
    // division by zero is nothing, which is falsy
    gives(doc.clone(), "$[?(@.n / 0 == @.n / 0)]", []);
    gives(doc.clone(), "$[?(-@.n == -10)]", [json!({"n": 10})]);
    gives(doc.clone(), "$[?(!(@.n < 5))]", [json!({"n": 10})]);
    // && and || return an operand, not a coerced boolean
    gives(doc.clone(), "$[?(@.n && 0)]", []);
    gives(doc.clone(), "$[?(0 || @.n)]", [json!({"n": 10})]);
    gives(doc, "$[?(@.missing || @.n)]", [json!({"n": 10})]);
}

#[test]
fn matching() {
    let doc = json!([{"name": "alpha"}, {"name": "beta"}]);
    gives(
        doc.clone(),
        "$[?(@.name =~ /^a/)].name",
        [json!("alpha")],
    );
    gives(
        doc.clone(),
        "$[?(@.name =~ 'ta$')].name",
        [json!("beta")],
    );
    gives(doc, "$[?(@.name in ['beta','gamma'])].name", [json!("beta")]);
    gives(
        json!([{"n": 1}, {"n": 2}]),
        "$[?(@.n nin [2])].n",
        [json!(1)],
    );
}

#[test]
fn length_pseudo_field() {
    let doc = json!([{"s": "नमस्ते", "a": [1, 2], "o": {"k": 1}}]);
    gives(doc.clone(), "$[?(@.s.length == 6)].s", [json!("नमस्ते")]);
    gives(doc.clone(), "$[?(@.a.length == 2)].s", [json!("नमस्ते")]);
    gives(doc.clone(), "$[?(@.o.length == 1)].s", [json!("नमस्ते")]);
    gives(doc, "$[?(@.missing.length == 0)]", []);
}

#[test]
fn functions_in_queries() {
    gives(
        books(),
        "$.books[?(starts_with(@.title, 'W'))].title",
        [json!("Wealth of Nations")],
    );
    gives(
        books(),
        "$.books[?(contains(@.author, 'Smith'))].date",
        [json!(1776)],
    );
    gives(
        json!([{"a": [1, 2, 3]}]),
        "$[?(sum(@.a) == 6.0)].a",
        [json!([1, 2, 3])],
    );
    gives(
        json!([{"s": "a,b"}]),
        "$[?(tokenize(@.s, ',') == ['a','b'])].s",
        [json!("a,b")],
    );
    // nothing arguments propagate, never abort
    gives(json!([{"a": 1}]), "$[?(abs(@.missing) == 1)]", []);
}

#[test]
fn fatal_errors() {
    let prog = compile("$[?(@ =~ 5)]").unwrap();
    let doc = Val::from(json!(["x"]));
    assert!(prog.eval(&doc).is_err());

    let prog = compile("$[?('x' =~ @.re)]").unwrap();
    let doc = Val::from(json!([{"re": "("}]));
    assert!(prog.eval(&doc).is_err());

    let prog = compile("$[?(1 in @)]").unwrap();
    let doc = Val::from(json!(["not an array"]));
    assert!(prog.eval(&doc).is_err());

    let prog = compile("$[?(no_such_fn(@) == 1)]").unwrap();
    let doc = Val::from(json!([1]));
    assert!(prog.eval(&doc).is_err());

    let prog = compile("$[?(length(@, @) == 1)]").unwrap();
    let doc = Val::from(json!([1]));
    assert!(prog.eval(&doc).is_err());
}

#[test]
fn parallel_evaluations_agree() {
    let prog = compile("$..[?(@.date < 1900)].title").unwrap();
    let doc = Val::from(books());
    let outs: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| prog.eval(&doc).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for out in &outs[1..] {
        assert_eq!(out, &outs[0]);
    }
    assert_eq!(outs[0], [Val::str("Wealth of Nations")]);
}
