use xapi::{entrypoint, Annotation, Entrypoint, Value, Xapi, XapiError};

fn run(function: xapi::Function, argv: &[&str]) -> Result<Value, XapiError> {
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .entrypoint(Entrypoint::from_function(function)?);
    app.run_from(std::iter::once("prog").chain(argv.iter().copied()))
}

#[entrypoint]
fn no_args() -> i64 {
    32423
}

#[entrypoint]
fn any_arg(value: Value) -> Value {
    value
}

#[entrypoint]
fn int_arg(value: i64) -> i64 {
    value
}

#[entrypoint]
fn var_arg(#[varargs] values: Vec<i64>) -> i64 {
    values.iter().sum()
}

#[entrypoint]
fn list_any(value: Vec<Value>) -> String {
    value.iter().map(|v| v.to_string()).collect()
}

#[entrypoint]
fn list_int(value: Vec<i64>) -> i64 {
    value.iter().sum()
}

#[entrypoint]
fn bare_tuple(#[arg(annotation = Annotation::Tuple { items: vec![], open: false })] value: Value) -> String {
    value.to_string()
}

#[entrypoint]
fn typed_tuple(value: (String, i64)) -> String {
    format!("{}: {}", value.0, value.1)
}

#[entrypoint]
fn literal(#[arg(annotation = Annotation::literal(["min", "max"]))] value: String) -> String {
    value
}

#[entrypoint]
fn letter(#[arg(annotation = Annotation::enumeration("Letter", ["a", "b", "c"]))] value: String) -> String {
    value
}

#[entrypoint]
fn toggle(value: bool) -> bool {
    value
}

#[entrypoint]
fn around(first: String, #[varargs] middle: Vec<i64>, last: String) -> String {
    format!("{}{}{}", first, middle.iter().sum::<i64>(), last)
}

#[entrypoint]
fn add_floats(a: f64, b: f64) -> f64 {
    a + b
}

#[entrypoint]
fn two_lists(first: Vec<i64>, second: Vec<i64>) -> String {
    format!("{:?} {:?}", first, second)
}

#[entrypoint]
fn three_lists(first: Vec<i64>, second: Vec<i64>, third: Vec<i64>) -> i64 {
    first.len() as i64 + second.len() as i64 + third.len() as i64
}

#[entrypoint]
fn list_then_required(values: Vec<i64>, last: i64) -> String {
    format!("{:?} {}", values, last)
}

#[entrypoint]
fn tuple_then_positional(pair: (String, i64), tail: String) -> String {
    format!("({}, {}) {}", pair.0, pair.1, tail)
}

#[test]
fn test_no_args() {
    assert_eq!(run(no_args__function(), &["no_args"]).unwrap(), Value::Int(32423));
}

#[test]
fn test_unannotated_arg_passes_through() {
    assert_eq!(run(any_arg__function(), &["any_arg", "abc"]).unwrap(), Value::from("abc"));
}

#[test]
fn test_annotated_arg() {
    assert_eq!(run(int_arg__function(), &["int_arg", "549"]).unwrap(), Value::Int(549));
}

#[test]
fn test_annotated_arg_rejects_garbage() {
    let err = run(int_arg__function(), &["int_arg", "five"]).unwrap_err();
    assert!(matches!(err, XapiError::Conversion(_)));
    assert_eq!(err.exit_code(), 10);
}

#[test]
fn test_var_arg() {
    assert_eq!(
        run(var_arg__function(), &["var_arg", "12", "14", "52"]).unwrap(),
        Value::Int(78)
    );
    assert_eq!(run(var_arg__function(), &["var_arg"]).unwrap(), Value::Int(0));
}

#[test]
fn test_list_of_any() {
    assert_eq!(
        run(list_any__function(), &["list_any", "13", "14", "52"]).unwrap(),
        Value::from("131452")
    );
}

#[test]
fn test_list_int() {
    assert_eq!(
        run(list_int__function(), &["list_int", "13", "14", "52"]).unwrap(),
        Value::Int(79)
    );
}

#[test]
fn test_list_empty() {
    assert_eq!(run(list_int__function(), &["list_int"]).unwrap(), Value::Int(0));
}

#[test]
fn test_bare_tuple() {
    assert_eq!(
        run(bare_tuple__function(), &["bare_tuple", "13", "14", "52"]).unwrap(),
        Value::from("(13, 14, 52)")
    );
}

#[test]
fn test_typed_tuple() {
    assert_eq!(
        run(typed_tuple__function(), &["typed_tuple", "abc", "123"]).unwrap(),
        Value::from("abc: 123")
    );
}

#[test]
fn test_typed_tuple_wrong_arity_is_usage_error() {
    let err = run(typed_tuple__function(), &["typed_tuple", "abc"]).unwrap_err();
    assert!(matches!(err, XapiError::Parse(_)));
}

#[test]
fn test_literal_choices() {
    assert_eq!(run(literal__function(), &["literal", "min"]).unwrap(), Value::from("min"));
    assert_eq!(run(literal__function(), &["literal", "max"]).unwrap(), Value::from("max"));
}

#[test]
fn test_literal_other_rejected_by_parser() {
    let err = run(literal__function(), &["literal", "blah"]).unwrap_err();
    assert!(matches!(err, XapiError::Parse(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_enum_member() {
    assert_eq!(run(letter__function(), &["letter", "a"]).unwrap(), Value::from("a"));
    assert!(run(letter__function(), &["letter", "d"]).is_err());
}

#[test]
fn test_required_bool_is_a_flag() {
    assert_eq!(run(toggle__function(), &["toggle", "--value"]).unwrap(), Value::Bool(true));
    assert_eq!(run(toggle__function(), &["toggle"]).unwrap(), Value::Bool(false));
    assert!(run(toggle__function(), &["toggle", "true"]).is_err());
    assert!(run(toggle__function(), &["toggle", "--value", "true"]).is_err());
}

#[test]
fn test_required_after_varargs() {
    assert_eq!(
        run(around__function(), &["around", "<", "1", "2", "3", ">"]).unwrap(),
        Value::from("<6>")
    );
}

#[test]
fn test_negative_numbers_are_values() {
    assert_eq!(run(add_floats__function(), &["add_floats", "-3", "4"]).unwrap(), Value::Float(1.0));
    assert_eq!(
        run(add_floats__function(), &["add_floats", "1", "-2.5"]).unwrap(),
        Value::Float(-1.5)
    );
    assert_eq!(
        run(list_int__function(), &["list_int", "-1", "5", "-10"]).unwrap(),
        Value::Int(-6)
    );
}

#[test]
fn test_two_list_positionals() {
    assert_eq!(
        run(two_lists__function(), &["two_lists", "1", "2"]).unwrap(),
        Value::from("[1, 2] []")
    );
    assert_eq!(
        run(two_lists__function(), &["two_lists", "1", "2", "--", "3"]).unwrap(),
        Value::from("[1, 2] [3]")
    );
}

#[test]
fn test_unseparable_positionals_are_a_wiring_error() {
    let err = run(three_lists__function(), &["three_lists", "1"]).unwrap_err();
    assert!(matches!(err, XapiError::Translation { .. }));
    assert_eq!(err.exit_code(), 20);
}

#[test]
fn test_list_then_required() {
    assert_eq!(
        run(list_then_required__function(), &["list_then_required", "1", "2", "3"]).unwrap(),
        Value::from("[1, 2] 3")
    );
}

#[test]
fn test_tuple_then_positional() {
    assert_eq!(
        run(tuple_then_positional__function(), &["tuple_then_positional", "x", "1", "z"]).unwrap(),
        Value::from("(x, 1) z")
    );
}
