use super::*;
use serde_json::json;

fn convert(value: Value, target: &str) -> AssemblyResult<Value> {
    let ty = TypeDescriptor::parse(target).expect("parse type");
    DefaultConverter::new().convert(value, &ty)
}

#[test]
fn type_descriptor_parses_nested_lists_and_records() {
    assert_eq!(
        TypeDescriptor::parse("list<list<integer>>").unwrap(),
        TypeDescriptor::list_of(TypeDescriptor::list_of(TypeDescriptor::Integer))
    );
    assert_eq!(
        TypeDescriptor::parse("UserView").unwrap(),
        TypeDescriptor::record("UserView")
    );
    assert!(TypeDescriptor::parse("list<").is_err());
    assert_eq!(
        TypeDescriptor::parse("list<string>").unwrap().to_string(),
        "list<string>"
    );
}

#[test]
fn scalars_coerce_between_text_and_numbers() {
    assert_eq!(convert(json!("42"), "integer").unwrap(), json!(42));
    assert_eq!(convert(json!(3.0), "integer").unwrap(), json!(3));
    assert_eq!(convert(json!(7), "string").unwrap(), json!("7"));
    assert_eq!(convert(json!("2.5"), "float").unwrap(), json!(2.5));
    assert_eq!(convert(json!("yes"), "bool").unwrap(), json!(true));
    assert_eq!(convert(json!(0), "bool").unwrap(), json!(false));
}

#[test]
fn incompatible_values_fail_with_conversion_error() {
    let err = convert(json!("abc"), "integer").unwrap_err();
    assert_eq!(err.code(), "CONVERSION");
    assert!(convert(json!(2.5), "integer").is_err());
    assert!(convert(json!({"a": 1}), "string").is_err());
    assert!(convert(json!(5), "Address").is_err());
}

#[test]
fn out_of_range_integers_are_rejected_not_saturated() {
    assert_eq!(convert(json!("1e3"), "integer").unwrap(), json!(1000));
    for value in [json!("1e30"), json!("-1e30"), json!(1e30), json!("9223372036854775808")] {
        let err = convert(value.clone(), "integer").unwrap_err();
        assert_eq!(err.code(), "CONVERSION", "{value}");
    }
    assert_eq!(
        convert(json!("9223372036854775807"), "integer").unwrap(),
        json!(i64::MAX)
    );
}

#[test]
fn lists_convert_element_wise_and_scalars_wrap() {
    assert_eq!(
        convert(json!(["1", "2", 3]), "list<integer>").unwrap(),
        json!([1, 2, 3])
    );
    assert_eq!(convert(json!("a"), "list<string>").unwrap(), json!(["a"]));
    assert!(convert(json!(["1", "x"]), "list<integer>").is_err());
}

#[test]
fn lists_join_into_string_fields() {
    assert_eq!(convert(json!(["A", "B", 3]), "string").unwrap(), json!("A,B,3"));
    let piped = DefaultConverter::new()
        .with_list_separator("|")
        .convert(json!(["A", "B"]), &TypeDescriptor::String)
        .unwrap();
    assert_eq!(piped, json!("A|B"));
}

#[test]
fn null_and_any_pass_through() {
    assert_eq!(convert(Value::Null, "integer").unwrap(), Value::Null);
    let object = json!({"name": "A"});
    assert_eq!(convert(object.clone(), "any").unwrap(), object);
    assert_eq!(convert(object.clone(), "Address").unwrap(), object);
}
