use super::*;
use serde_json::json;

fn path(text: &str) -> PropertyPath {
    PropertyPath::parse(text).expect("parse path")
}

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::new()
            .with_type(
                RecordType::new("Order")
                    .field("id", TypeDescriptor::Integer)
                    .field("customer", TypeDescriptor::record("Customer"))
                    .field("tags", TypeDescriptor::list_of(TypeDescriptor::String))
                    .field("payer", TypeDescriptor::record("Party")),
            )
            .with_type(
                RecordType::new("Customer")
                    .field("name", TypeDescriptor::String)
                    .field("address", TypeDescriptor::record("Address")),
            )
            .with_type(RecordType::new("Address").field("city", TypeDescriptor::String))
            .with_type(
                RecordType::new("Party")
                    .field("name", TypeDescriptor::String)
                    .abstract_type(),
            ),
    )
}

fn order(schema: &Schema) -> Record {
    let mut order = schema.instantiate("Order").expect("instantiate order");
    order.set_value("id", json!(7)).unwrap();
    order
}

#[test]
fn set_instantiates_missing_intermediate_records() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let mut target = order(&schema);

    accessor
        .set(&mut target, &path("customer.address.city"), json!("Oslo"))
        .expect("set nested city");

    let customer = target.nested("customer").expect("customer instantiated");
    assert_eq!(customer.type_name(), "Customer");
    let address = customer.nested("address").expect("address instantiated");
    assert_eq!(address.value("city"), Some(&json!("Oslo")));
    assert_eq!(
        accessor
            .get(&target, &path("customer.address.city"))
            .unwrap(),
        Some(json!("Oslo"))
    );
}

#[test]
fn get_is_absent_through_unset_intermediates() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let target = order(&schema);
    assert_eq!(accessor.get(&target, &path("customer.name")).unwrap(), None);
    assert_eq!(accessor.get(&target, &path("id")).unwrap(), Some(json!(7)));
}

#[test]
fn abstract_intermediate_cannot_be_instantiated_and_target_is_untouched() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let mut target = order(&schema);
    let before = target.clone();

    let err = accessor
        .set(&mut target, &path("payer.name"), json!("ACME"))
        .unwrap_err();
    assert_eq!(err.code(), "PATH_RESOLUTION");
    assert_eq!(target, before);
}

#[test]
fn scalar_field_cannot_be_traversed() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let mut target = order(&schema);
    assert!(accessor
        .set(&mut target, &path("id.value"), json!(1))
        .is_err());
    assert!(accessor.get(&target, &path("unknown")).is_err());
}

#[test]
fn whole_object_written_to_record_field_becomes_nested_record() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let mut target = order(&schema);

    accessor
        .set(
            &mut target,
            &path("customer"),
            json!({"name": "A", "address": {"city": "Bergen"}}),
        )
        .expect("set whole customer");

    let customer = target.nested("customer").expect("customer record");
    assert_eq!(customer.value("name"), Some(&json!("A")));
    assert_eq!(
        target.to_value(),
        json!({"id": 7, "customer": {"name": "A", "address": {"city": "Bergen"}}})
    );
}

#[test]
fn unknown_fields_in_written_object_are_rejected() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let mut target = order(&schema);
    let err = accessor
        .set(&mut target, &path("customer"), json!({"nickname": "A"}))
        .unwrap_err();
    assert_eq!(err.code(), "PATH_RESOLUTION");
    assert!(target.nested("customer").is_none());
}

#[test]
fn declared_type_follows_the_resolved_field() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let target = order(&schema);
    assert_eq!(
        accessor.declared_type(&target, &path("tags")).unwrap(),
        TypeDescriptor::list_of(TypeDescriptor::String)
    );
    assert_eq!(
        accessor
            .declared_type(&target, &path("customer.address"))
            .unwrap(),
        TypeDescriptor::record("Address")
    );
}

#[test]
fn records_outside_the_schema_are_rejected_instead_of_misread() {
    let schema = schema();
    let accessor = RecordAccessor::new(Arc::clone(&schema));
    let registered = order(&schema);
    assert_eq!(accessor.get(&registered, &path("id")).unwrap(), Some(json!(7)));

    let mut lookalike = Record::new(Arc::new(
        RecordType::new("Order").field("tags", TypeDescriptor::String),
    ));
    lookalike.set_value("tags", json!("x")).unwrap();
    for field in ["id", "payer", "tags"] {
        let err = accessor.get(&lookalike, &path(field)).unwrap_err();
        assert_eq!(err.code(), "PATH_RESOLUTION", "{field}");
    }
    let err = accessor
        .set(&mut lookalike, &path("id"), json!(1))
        .unwrap_err();
    assert_eq!(err.code(), "PATH_RESOLUTION");
    assert_eq!(lookalike.value("tags"), Some(&json!("x")));
    assert!(accessor.declared_type(&lookalike, &path("id")).is_err());
}
