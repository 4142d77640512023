//! End-to-end tests for the maskpath engine.
//!
//! Exercises compile + lookup, compile + delete, and compile + redact
//! through the public one-shot entry points, including the engine laws:
//! compile determinism, lookup purity, root round-trip, negative-index
//! equivalence, recursive-descent completeness, delete idempotence, and
//! scan window arithmetic.

use maskpath::{
    compile, delete_matching, lookup, redact_matching, CompileError, Error, EvalError,
};
use serde_json::{json, Value};

fn store() -> Value {
    json!({
        "store": {
            "book": [
                {"category": "reference", "author": "Nigel Rees", "price": 8.95},
                {"category": "fiction", "author": "Evelyn Waugh", "price": 12.99},
                {"category": "fiction", "author": "Herman Melville", "isbn": "0-553-21311-3", "price": 8.99},
                {"category": "fiction", "author": "J. R. R. Tolkien", "isbn": "0-395-19395-8", "price": 22.99}
            ],
            "bicycle": {"color": "red", "price": 19.95}
        },
        "expensive": 10
    })
}

#[test]
fn test_lookup_negative_index() {
    let doc = json!({"a": {"b": [10, 20, 30]}});
    assert_eq!(lookup(&doc, "$.a.b[-1]").unwrap(), json!(30));
}

#[test]
fn test_lookup_filtered_prices() {
    let doc = json!({"store": {"book": [{"price": 8}, {"price": 12}, {"price": 5}]}});
    let cheap = lookup(&doc, "$.store.book[?(@.price < 10)].price").unwrap();
    assert_eq!(cheap, json!([8, 5]));
}

#[test]
fn test_delete_index_list() {
    let mut doc = json!({"users": [{"n": "A"}, {"n": "B"}, {"n": "C"}]});
    delete_matching(&mut doc, "$.users[0,2]").unwrap();
    assert_eq!(doc, json!({"users": [{"n": "B"}]}));
}

#[test]
fn test_redact_phone() {
    let mut doc = json!({"u": {"phone": "13800001111"}});
    redact_matching(&mut doc, "$.u.phone", "phone").unwrap();
    assert_eq!(doc, json!({"u": {"phone": "138****1111"}}));
}

#[test]
fn test_redact_recursive_window_masks_first_two() {
    let mut doc = json!({"a": [{"name": "张三"}, {"name": "李四"}, {"name": "王五"}]});
    redact_matching(&mut doc, "$..name[0:1]", "name").unwrap();
    assert_eq!(
        doc,
        json!({"a": [{"name": "张*"}, {"name": "李*"}, {"name": "王五"}]})
    );
}

#[test]
fn test_compile_requires_marker() {
    assert!(matches!(
        compile("foo.bar"),
        Err(CompileError::BadStart)
    ));
    assert!(matches!(
        lookup(&json!({}), "foo.bar"),
        Err(Error::Compile(CompileError::BadStart))
    ));
}

#[test]
fn test_compile_is_deterministic() {
    for path in [
        "$",
        "$.store.book[0]",
        "$.store.book[?(@.price < $.expensive)].title",
        "$..price[0:2]",
        "$['store']['book'][-1]",
    ] {
        assert_eq!(compile(path).unwrap(), compile(path).unwrap());
    }
}

#[test]
fn test_lookup_is_pure() {
    let doc = store();
    let snapshot = doc.clone();
    for path in [
        "$.store.book[*]",
        "$.store.book[?(@.price < $.expensive)]",
        "$..price",
        "$.store.book.isbn",
    ] {
        let _ = lookup(&doc, path).unwrap();
        assert_eq!(doc, snapshot, "lookup of {path} mutated its input");
    }
}

#[test]
fn test_root_round_trip() {
    let doc = store();
    assert_eq!(lookup(&doc, "$").unwrap(), doc);
}

#[test]
fn test_negative_and_positive_ranges_agree() {
    let doc = json!({"v": [0, 1, 2, 3, 4, 5]});
    let len = 6i64;
    for (a, b) in [(-6, -1), (-4, -2), (-3, -3), (-2, -1)] {
        let negative = lookup(&doc, &format!("$.v[{a}:{b}]")).unwrap();
        let positive = lookup(&doc, &format!("$.v[{}:{}]", len + a, len + b)).unwrap();
        assert_eq!(negative, positive, "[{a}:{b}] disagrees with its shift");
    }
}

#[test]
fn test_recursive_descent_completeness() {
    let doc = json!({
        "k": 1,
        "x": {"k": 2, "y": [{"k": 3}, {"z": {"k": 4}}]},
        "w": {"k": 5}
    });
    let found = lookup(&doc, "$..k").unwrap();
    assert_eq!(found, json!([1, 2, 3, 4, 5]));
}

#[test]
fn test_delete_is_idempotent() {
    let mut doc = json!({
        "secret": "a",
        "inner": {"secret": "b", "list": [{"secret": "c", "keep": 1}]}
    });
    delete_matching(&mut doc, "$..secret").unwrap();
    let once = doc.clone();
    delete_matching(&mut doc, "$..secret").unwrap();
    assert_eq!(doc, once);

    let mut doc = json!({"book": [{"p": 1}, {"p": 20}]});
    delete_matching(&mut doc, "$.book[?(@.p < 10)]").unwrap();
    let once = doc.clone();
    delete_matching(&mut doc, "$.book[?(@.p < 10)]").unwrap();
    assert_eq!(doc, once);
}

#[test]
fn test_scan_window_mutation_count() {
    // window [i, j] over n occurrences mutates
    // min(j, n-1) - max(i, 0) + 1 sites when non-negative
    let n = 6usize;
    for (i, j) in [(0usize, 0usize), (0, 2), (2, 4), (3, 9), (5, 5)] {
        let items: Vec<Value> = (0..n).map(|_| json!({"k": "x"})).collect();
        let mut doc = json!({"a": items});
        delete_matching(&mut doc, &format!("$..k[{i}:{j}]")).unwrap();
        let remaining = lookup(&doc, "$..k").unwrap().as_array().unwrap().len();
        let expected_removed = j.min(n - 1).saturating_sub(i) + 1;
        assert_eq!(
            n - remaining,
            expected_removed,
            "window [{i}:{j}] removed the wrong number of occurrences"
        );
    }
}

#[test]
fn test_scan_window_past_end_mutates_nothing() {
    // the window starts past the last occurrence, so both are skipped
    let mut doc = json!({"a": [{"k": 1}, {"k": 2}]});
    delete_matching(&mut doc, "$..k[5:9]").unwrap();
    assert_eq!(doc, json!({"a": [{"k": 1}, {"k": 2}]}));
}

#[test]
fn test_lookup_recursive_with_selector() {
    let doc = store();
    let first = lookup(&doc, "$..price[0]").unwrap();
    assert_eq!(first, json!([8.95]));
    let slice = lookup(&doc, "$..price[1:2]").unwrap();
    assert_eq!(slice, json!([12.99, 8.99]));
}

#[test]
fn test_lookup_gathers_names_across_list() {
    let doc = store();
    let authors = lookup(&doc, "$.store.book.author").unwrap();
    assert_eq!(authors.as_array().unwrap().len(), 4);
}

#[test]
fn test_filter_with_root_reference() {
    let doc = store();
    let pricey = lookup(&doc, "$.store.book[?(@.price > $.expensive)].author").unwrap();
    assert_eq!(pricey, json!(["Evelyn Waugh", "J. R. R. Tolkien"]));
}

#[test]
fn test_filter_membership() {
    let doc = store();
    let refs = lookup(&doc, "$.store.book[?(@.category in {reference})].price").unwrap();
    assert_eq!(refs, json!([8.95]));
    let fiction = lookup(&doc, "$.store.book[?(@.category noin {reference})].price").unwrap();
    assert_eq!(fiction, json!([12.99, 8.99, 22.99]));
}

#[test]
fn test_filter_regex() {
    let doc = store();
    let rees = lookup(&doc, "$.store.book[?(@.author =~ /Rees$/)].price").unwrap();
    assert_eq!(rees, json!([8.95]));
}

#[test]
fn test_delete_whole_branch() {
    let mut doc = store();
    delete_matching(&mut doc, "$.store.bicycle").unwrap();
    assert!(lookup(&doc, "$.store.bicycle").is_err());
    assert_eq!(lookup(&doc, "$..price").unwrap().as_array().unwrap().len(), 4);
}

#[test]
fn test_redact_id_card_and_plate() {
    let mut doc = json!({
        "driver": {
            "id": "110101199003074518",
            "plate": "京A12345"
        }
    });
    redact_matching(&mut doc, "$.driver.id", "id_card").unwrap();
    redact_matching(&mut doc, "$.driver.plate", "car_number").unwrap();
    assert_eq!(
        doc,
        json!({
            "driver": {
                "id": "110101********4518",
                "plate": "京***345"
            }
        })
    );
}

#[test]
fn test_error_taxonomy_surface() {
    let doc = store();

    assert!(matches!(
        lookup(&doc, "$.nope"),
        Err(Error::Eval(EvalError::KeyNotFound(_)))
    ));
    assert!(matches!(
        lookup(&doc, "$.store.book[9]"),
        Err(Error::Eval(EvalError::IndexOutOfRange { .. }))
    ));
    assert!(matches!(
        lookup(&doc, "$.expensive[0]"),
        Err(Error::Eval(EvalError::NotAnArray))
    ));
    assert!(matches!(
        lookup(&json!(null), "$.a"),
        Err(Error::Eval(EvalError::NullObject))
    ));

    let mut doc = store();
    assert!(matches!(
        redact_matching(&mut doc, "$.store.book[0:1]", "name"),
        Err(Error::Eval(EvalError::RedactOnSlice))
    ));
    assert!(matches!(
        redact_matching(&mut doc, "$.store.book[?(@.isbn)]", "name"),
        Err(Error::Eval(EvalError::RedactOnFilter))
    ));
    assert!(matches!(
        redact_matching(&mut doc, "$.store.bicycle.color", "no-such-rule"),
        Err(Error::Eval(EvalError::RuleNotFound(_)))
    ));
}

#[test]
fn test_program_is_reusable() {
    let program = compile("$.store.book[?(@.price < 10)].price").unwrap();
    let doc = store();
    assert_eq!(program.lookup(&doc).unwrap(), json!([8.95, 8.99]));
    assert_eq!(program.lookup(&doc).unwrap(), json!([8.95, 8.99]));

    let other = json!({"store": {"book": [{"price": 3}]}});
    assert_eq!(program.lookup(&other).unwrap(), json!([3]));
}
