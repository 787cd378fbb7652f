// tests/builtin_tests.rs

use aq_lang::{ErrorKind, Query, RuntimeError, Value};

fn run(query: &str, input: Value) -> Result<Vec<Value>, RuntimeError> {
    Query::compile(query)
        .unwrap_or_else(|e| panic!("failed to compile {:?}: {}", query, e))
        .run(input)
        .collect()
}

fn doc(text: &str) -> Value {
    let mut outputs = run(text, Value::Null).unwrap();
    assert_eq!(outputs.len(), 1, "document literal {:?}", text);
    outputs.remove(0)
}

/// Runs a query that must produce exactly one output.
fn one(query: &str, input: &str) -> Value {
    let mut outputs = run(query, doc(input)).unwrap_or_else(|e| panic!("{:?} failed: {}", query, e));
    assert_eq!(outputs.len(), 1, "{:?} produced {:?}", query, outputs);
    outputs.remove(0)
}

fn error_kind(query: &str, input: &str) -> ErrorKind {
    match run(query, doc(input)) {
        Ok(outputs) => panic!("expected {:?} to fail, got {:?}", query, outputs),
        Err(e) => e.kind,
    }
}

fn ints(values: &[i64]) -> Value {
    Value::Array(values.iter().copied().map(Value::Integer).collect())
}

fn strings(values: &[&str]) -> Value {
    Value::Array(values.iter().copied().map(Value::from).collect())
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn test_length() {
    assert_eq!(one("length", "\"héllo\""), Value::Integer(5));
    assert_eq!(one("length", "[1, 2, 3]"), Value::Integer(3));
    assert_eq!(one("length", r#"{"a": 1, "b": 2}"#), Value::Integer(2));
    assert_eq!(one("length", "null"), Value::Integer(0));
    assert_eq!(one("length", "-4"), Value::Integer(4));
    assert_eq!(one("h\"00 01\" | length", "null"), Value::Integer(2));
    assert!(matches!(error_kind("length", "true"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_keys_and_values() {
    assert_eq!(one("keys", r#"{"b": 1, "a": 2}"#), strings(&["b", "a"]));
    assert_eq!(one("keys", "[5, 6]"), ints(&[0, 1]));
    assert_eq!(one("values", r#"{"b": 1, "a": 2}"#), ints(&[1, 2]));
    assert_eq!(one("values", "[3]"), ints(&[3]));
    assert!(matches!(error_kind("keys", "1"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_type() {
    let cases = [
        ("null", "null"),
        ("true", "boolean"),
        ("1", "integer"),
        ("1.5", "float"),
        ("\"s\"", "string"),
        ("h\"00\"", "bytes"),
        ("[]", "array"),
        ("{}", "object"),
        ("Option::None", "variant"),
    ];
    for (input, expected) in cases {
        assert_eq!(one("type", input), Value::from(expected), "input: {}", input);
    }
}

#[test]
fn test_has() {
    assert_eq!(one("has(\"a\")", r#"{"a": null}"#), Value::Boolean(true));
    assert_eq!(one("has(\"b\")", r#"{"a": null}"#), Value::Boolean(false));
    assert_eq!(one("has(1)", "[0, 1]"), Value::Boolean(true));
    assert_eq!(one("has(2)", "[0, 1]"), Value::Boolean(false));
    assert!(matches!(error_kind("has(0)", r#"{"a": 1}"#), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_variant_accessors() {
    assert_eq!(one("payload", "Option::None"), Value::Null);
    assert!(matches!(error_kind("tag", "1"), ErrorKind::TypeMismatch(_)));
}

// ============================================================================
// Streams
// ============================================================================

#[test]
fn test_empty() {
    assert_eq!(run("empty", Value::Null).unwrap(), vec![]);
    assert_eq!(one("[1, empty, 2]", "null"), ints(&[1, 2]));
}

#[test]
fn test_error() {
    assert_eq!(
        error_kind("error(\"bad input\")", "null"),
        ErrorKind::UserError(Value::from("bad input"))
    );
    let err = run("error(\"bad input\")", Value::Null).unwrap_err();
    assert_eq!(err.to_string(), format!("bad input at {}", err.position));
}

#[test]
fn test_range() {
    assert_eq!(one("[range(0; 4)]", "null"), ints(&[0, 1, 2, 3]));
    assert_eq!(one("[range(3; 1)]", "null"), ints(&[]));
    assert_eq!(one("[range(0; 10; 3)]", "null"), ints(&[0, 3, 6, 9]));
    assert_eq!(one("[range(5; 0; -2)]", "null"), ints(&[5, 3, 1]));
    assert_eq!(
        one("[range(0; 1; 0.5)]", "null"),
        Value::Array(vec![Value::Float(0.0), Value::Float(0.5)])
    );
}

#[test]
fn test_range_fractional_bound_keeps_integers() {
    assert_eq!(one("[range(0; 2.5)]", "null"), ints(&[0, 1, 2]));
    assert_eq!(one("[range(3; 0.5; -1)]", "null"), ints(&[3, 2, 1]));
    assert_eq!(one("[range(0; 2.0)]", "null"), ints(&[0, 1]));
    assert_eq!(
        one("[range(0.5; 2)]", "null"),
        Value::Array(vec![Value::Float(0.5), Value::Float(1.5)])
    );
}

#[test]
fn test_range_arguments_fan_out() {
    assert_eq!(one("[range((0, 1); 2)]", "null"), ints(&[0, 1, 1]));
}

#[test]
fn test_range_errors() {
    assert!(matches!(
        error_kind("[range(0; 5; 0)]", "null"),
        ErrorKind::InvalidArgument { .. }
    ));
    assert!(matches!(
        error_kind("[range(\"a\"; 5)]", "null"),
        ErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_limit() {
    assert_eq!(one("[limit(2; .[])]", "[1, 2, 3]"), ints(&[1, 2]));
    assert_eq!(one("[limit(0; .[])]", "[1, 2, 3]"), ints(&[]));
    assert_eq!(one("[limit(5; .[])]", "[1]"), ints(&[1]));
}

#[test]
fn test_first_and_last() {
    assert_eq!(one("first", "[1, 2, 3]"), Value::Integer(1));
    assert_eq!(one("last", "[1, 2, 3]"), Value::Integer(3));
    assert_eq!(one("first", "[]"), Value::Null);
    assert_eq!(one("first(.[] | select(. > 1))", "[1, 2, 3]"), Value::Integer(2));
    assert_eq!(one("last(.[])", "[1, 2, 3]"), Value::Integer(3));
    assert_eq!(run("last(empty)", Value::Null).unwrap(), vec![]);
}

#[test]
fn test_recurse() {
    assert_eq!(
        one("[recurse]", "[[1], 2]"),
        Value::Array(vec![
            doc("[[1], 2]"),
            ints(&[1]),
            Value::Integer(1),
            Value::Integer(2),
        ])
    );
    assert_eq!(
        one("[recurse(if . < 3 then . + 1 else empty end)]", "0"),
        ints(&[0, 1, 2, 3])
    );
    assert_eq!(
        one("[recurse(.children[]) | .name]", r#"{"name": "a", "children": [{"name": "b", "children": []}]}"#),
        strings(&["a", "b"])
    );
}

// ============================================================================
// Filtering and mapping
// ============================================================================

#[test]
fn test_map() {
    assert_eq!(one("map(. * 2)", "[1, 2, 3]"), ints(&[2, 4, 6]));
    assert_eq!(one("map(.a)", r#"[{"a": 1}, {"a": 2}]"#), ints(&[1, 2]));
    assert_eq!(one("map((., .))", "[1, 2]"), ints(&[1, 1, 2, 2]));
    assert_eq!(one("map(. + 1)", r#"{"a": 1, "b": 2}"#), ints(&[2, 3]));
    assert!(matches!(error_kind("map(.)", "1"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_map_propagates_errors() {
    assert_eq!(
        error_kind("map(.a)", r#"[{"a": 1}, {}]"#),
        ErrorKind::MissingKey("a".into())
    );
}

#[test]
fn test_select() {
    assert_eq!(one("map(select(. > 2))", "[1, 2, 3, 4]"), ints(&[3, 4]));
    assert_eq!(one("[.[] | select(.active)]", r#"[{"active": true}, {"active": null}]"#),
        doc(r#"[{"active": true}]"#));
    assert_eq!(one("[.[] | filter(. != 2)]", "[1, 2, 3]"), ints(&[1, 3]));
}

#[test]
fn test_select_keeps_input_per_truthy_output() {
    assert_eq!(one("[select((true, false, 1))]", "5"), ints(&[5, 5]));
}

#[test]
fn test_any_and_all() {
    assert_eq!(one("any", "[false, null, 1]"), Value::Boolean(true));
    assert_eq!(one("any", "[]"), Value::Boolean(false));
    assert_eq!(one("all", "[1, true]"), Value::Boolean(true));
    assert_eq!(one("all", "[]"), Value::Boolean(true));
    assert_eq!(one("any(. > 2)", "[1, 3]"), Value::Boolean(true));
    assert_eq!(one("all(. > 2)", "[1, 3]"), Value::Boolean(false));
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_add() {
    assert_eq!(one("add", "[1, 2, 3]"), Value::Integer(6));
    assert_eq!(one("add", "[1, 2.5]"), Value::Float(3.5));
    assert_eq!(one("add", "[\"a\", \"b\"]"), Value::from("ab"));
    assert_eq!(one("add", "[[1], [2]]"), ints(&[1, 2]));
    assert_eq!(one("add", "[]"), Value::Null);
    assert_eq!(one("add", "null"), Value::Null);
    assert!(matches!(error_kind("add", "[1, \"a\"]"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_min_max() {
    assert_eq!(one("min", "[3, 1, 2]"), Value::Integer(1));
    assert_eq!(one("max", "[3, 1, 2]"), Value::Integer(3));
    assert_eq!(one("min", "[]"), Value::Null);
    assert_eq!(one("max", "[1, \"a\", null]"), Value::from("a"));
}

#[test]
fn test_sort() {
    assert_eq!(one("sort", "[3, 1, 2]"), ints(&[1, 2, 3]));
    assert_eq!(
        one("sort", "[\"b\", 2, null, true, [1], 1.5]"),
        doc("[null, true, 1.5, 2, \"b\", [1]]")
    );
    assert!(matches!(error_kind("sort", r#"{"a": 1}"#), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_sort_by_is_stable() {
    let input = r#"[{"n": "x", "k": 2}, {"n": "y", "k": 1}, {"n": "z", "k": 2}]"#;
    assert_eq!(one("sort_by(.k) | map(.n)", input), strings(&["y", "x", "z"]));
}

#[test]
fn test_group_by() {
    let input = r#"[{"t": "b", "v": 1}, {"t": "a", "v": 2}, {"t": "b", "v": 3}]"#;
    assert_eq!(
        one("group_by(.t) | map(map(.v))", input),
        Value::Array(vec![ints(&[2]), ints(&[1, 3])])
    );
    assert_eq!(one("group_by(.)", "[]"), ints(&[]));
}

#[test]
fn test_unique_reverse_flatten() {
    assert_eq!(one("unique", "[2, 1, 2, 1]"), ints(&[1, 2]));
    assert_eq!(one("unique", "[1, 1.0]"), Value::Array(vec![Value::Integer(1), Value::Float(1.0)]));
    assert_eq!(
        one("unique", "[1, 1.0, 1]"),
        Value::Array(vec![Value::Integer(1), Value::Float(1.0)])
    );
    assert_eq!(
        one("unique", "[1.0, 2, 1, 1.0, 1]"),
        Value::Array(vec![Value::Float(1.0), Value::Integer(1), Value::Integer(2)])
    );
    assert_eq!(one("reverse", "[1, 2, 3]"), ints(&[3, 2, 1]));
    assert_eq!(one("reverse", "\"abc\""), Value::from("cba"));
    assert_eq!(one("flatten", "[1, [2, [3, [4]]]]"), ints(&[1, 2, 3, 4]));
    assert_eq!(one("flatten(1)", "[1, [2, [3]]]"), doc("[1, 2, [3]]"));
    assert!(matches!(
        error_kind("flatten(-1)", "[]"),
        ErrorKind::InvalidArgument { .. }
    ));
}

// ============================================================================
// Objects
// ============================================================================

#[test]
fn test_entries() {
    assert_eq!(
        one("to_entries", r#"{"a": 1, "b": 2}"#),
        doc(r#"[{"key": "a", "value": 1}, {"key": "b", "value": 2}]"#)
    );
    assert_eq!(
        one("from_entries", r#"[{"key": "a", "value": 1}, {"k": "b", "v": 2}, {"name": "c"}]"#),
        doc(r#"{"a": 1, "b": 2, "c": null}"#)
    );
}

#[test]
fn test_with_entries() {
    assert_eq!(
        one("with_entries({key: (.key | upper), value: (.value * 10)})", r#"{"a": 1, "b": 2}"#),
        doc(r#"{"A": 10, "B": 20}"#)
    );
    assert_eq!(
        one("with_entries(select(.value > 1))", r#"{"a": 1, "b": 2}"#),
        doc(r#"{"b": 2}"#)
    );
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_join_and_split() {
    assert_eq!(one("join(\"-\")", "[\"a\", 1, null, true]"), Value::from("a-1--true"));
    assert_eq!(one("split(\",\")", "\"a,b,,c\""), strings(&["a", "b", "", "c"]));
    assert_eq!(one("split(\"\")", "\"héj\""), strings(&["h", "é", "j"]));
    assert!(matches!(error_kind("join(\",\")", "[[1]]"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_case_and_trim() {
    assert_eq!(one("upper", "\"abc\""), Value::from("ABC"));
    assert_eq!(one("lower", "\"ÀB\""), Value::from("àb"));
    assert_eq!(one("trim", "\"  x \""), Value::from("x"));
    assert!(matches!(error_kind("upper", "1"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_prefix_suffix() {
    assert_eq!(one("startswith(\"ab\")", "\"abc\""), Value::Boolean(true));
    assert_eq!(one("endswith(\"ab\")", "\"abc\""), Value::Boolean(false));
}

#[test]
fn test_contains() {
    assert_eq!(one("contains(\"bar\")", "\"foobar\""), Value::Boolean(true));
    assert_eq!(one("contains([2])", "[1, 2]"), Value::Boolean(true));
    assert_eq!(
        one("contains({a: {b: 1}})", r#"{"a": {"b": 1, "c": 2}, "d": 3}"#),
        Value::Boolean(true)
    );
    assert_eq!(one("contains({x: 1})", r#"{"a": 1}"#), Value::Boolean(false));
    assert!(matches!(error_kind("contains(\"a\")", "1"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_regex() {
    assert_eq!(one("test(\"^a.c$\")", "\"abc\""), Value::Boolean(true));
    assert_eq!(one("test(\"[0-9]+\")", "\"abc\""), Value::Boolean(false));
    assert!(matches!(
        error_kind("test(\"(\")", "\"abc\""),
        ErrorKind::InvalidArgument { .. }
    ));
}

// ============================================================================
// Conversion
// ============================================================================

#[test]
fn test_to_text() {
    assert_eq!(one("to_text", "\"s\""), Value::from("s"));
    assert_eq!(one("to_text", "1"), Value::from("1"));
    assert_eq!(one("to_text", "1.5"), Value::from("1.5"));
    assert_eq!(one("to_text", "[1, \"a\"]"), Value::from("[1,\"a\"]"));
    assert_eq!(one("tostring", "null"), Value::from("null"));
}

#[test]
fn test_to_number() {
    assert_eq!(one("to_number", "\"42\""), Value::Integer(42));
    assert_eq!(one("to_number", "\" 2.5 \""), Value::Float(2.5));
    assert_eq!(one("to_number", "7"), Value::Integer(7));
    assert_eq!(one("tonumber", "\"-3\""), Value::Integer(-3));
    assert!(matches!(
        error_kind("to_number", "\"abc\""),
        ErrorKind::InvalidArgument { .. }
    ));
    assert!(matches!(error_kind("to_number", "[]"), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_to_bytes() {
    assert_eq!(one("to_bytes", "\"hi\""), Value::Bytes(b"hi".to_vec()));
    assert_eq!(one("to_bytes", "[1, 255]"), Value::Bytes(vec![1, 255]));
    assert!(matches!(
        error_kind("to_bytes", "[256]"),
        ErrorKind::InvalidArgument { .. }
    ));
}
