use super::*;
use crate::accessor::JsonAccessor;
use crate::config::{AssemblyConfig, OperationConfig};
use crate::convert::DefaultConverter;
use crate::plan::AssemblyPlan;
use crate::rule::RuleDecl;
use crate::splitter::DelimiterSplitter;
use serde_json::json;

fn compile(operation: OperationConfig) -> AssemblyOperation {
    let plan = AssemblyPlan::build(&AssemblyConfig::new().operation("T", operation));
    plan.target("T").expect("target").operations[0].clone()
}

fn lookup(entries: Vec<(Key, SourceData)>) -> Lookup {
    let mut lookup = Lookup::new();
    for (key, data) in entries {
        lookup.insert(key, data);
    }
    lookup
}

fn run(
    operation: &AssemblyOperation,
    options: EngineOptions,
    target: &mut Value,
    keys: &[Key],
    lookup: &Lookup,
) -> AssemblyReport {
    let accessor = JsonAccessor::new();
    let converter = DefaultConverter::new();
    let applier = Applier::new(&accessor, &converter, &options);
    let mut report = AssemblyReport::new("T", 1);
    applier.apply(operation, target, 0, keys, lookup, &mut report);
    report
}

#[test]
fn one_to_one_keys_follow_key_type_then_natural_kind() {
    let op = compile(OperationConfig::one_to_one("users", "user_id"));
    let keys = extract_keys(&op, Some(&json!("7")), None, Some(KeyKind::Integer));
    assert_eq!(keys.keys, vec![Key::Int(7)]);
    let keys = extract_keys(&op, Some(&json!("abc")), None, Some(KeyKind::Integer));
    assert_eq!(keys.keys, vec![Key::from("abc")]);
    assert!(extract_keys(&op, Some(&Value::Null), None, None).keys.is_empty());
    assert!(extract_keys(&op, None, None, None).keys.is_empty());

    let typed = compile(OperationConfig::one_to_one("users", "user_id").key_type(KeyKind::Integer));
    let keys = extract_keys(&typed, Some(&json!("abc")), None, None);
    assert!(keys.keys.is_empty());
    assert_eq!(keys.invalid[0].code(), "INVALID_KEY");

    let keys = extract_keys(&op, Some(&json!([1, 2])), None, None);
    assert_eq!(keys.invalid.len(), 1);
}

#[test]
fn batch_keys_from_strings_arrays_and_scalars() {
    let op = compile(OperationConfig::batch("tags", "tag_ids"));
    let comma = DelimiterSplitter::new(",");
    let keys = extract_keys(&op, Some(&json!("1, 2,3")), Some(&comma), Some(KeyKind::Integer));
    assert_eq!(keys.keys, vec![Key::Int(1), Key::Int(2), Key::Int(3)]);

    let raw_tokens = extract_keys(&op, Some(&json!("a,b")), Some(&comma), None);
    assert_eq!(raw_tokens.keys, vec![Key::from("a"), Key::from("b")]);

    let array = extract_keys(&op, Some(&json!([1, null, "2", {"x": 1}])), None, Some(KeyKind::Integer));
    assert_eq!(array.keys, vec![Key::Int(1), Key::Int(2)]);
    assert_eq!(array.invalid.len(), 1);

    let scalar = extract_keys(&op, Some(&json!(5)), Some(&comma), None);
    assert_eq!(scalar.keys, vec![Key::Int(5)]);
}

#[test]
fn one_to_one_copies_named_fields_and_leaves_others_untouched() {
    let op = compile(
        OperationConfig::one_to_one("users", "user_id")
            .prop(RuleDecl::map("name", "user_name"))
            .prop(RuleDecl::map("missing", "nothing")),
    );
    let data = lookup(vec![(Key::Int(1), SourceData::One(json!({"name": "A", "age": 3})))]);
    let mut target = json!({"user_id": 1, "other": true});
    let report = run(&op, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target, json!({"user_id": 1, "other": true, "user_name": "A"}));
    assert_eq!(report.writes, 1);
    assert!(report.is_complete());
}

#[test]
fn whole_object_fallbacks() {
    let data = lookup(vec![(Key::Int(1), SourceData::One(json!({"name": "A"})))]);

    let to_ref = compile(OperationConfig::one_to_one("users", "user_id").prop(RuleDecl::whole_to("user")));
    let mut target = json!({"user_id": 1});
    run(&to_ref, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target["user"], json!({"name": "A"}));

    let to_key = compile(OperationConfig::one_to_one("users", "user").prop(RuleDecl::Explicit(
        crate::rule::RuleSpec::default(),
    )));
    let mut target = json!({"user": 1});
    run(&to_key, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target["user"], json!({"name": "A"}));

    let src_to_key = compile(OperationConfig::one_to_one("users", "user").prop(RuleDecl::into_key("name")));
    let mut target = json!({"user": 1});
    run(&src_to_key, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target["user"], json!("A"));
}

#[test]
fn one_to_one_rejects_collection_results() {
    let op = compile(OperationConfig::one_to_one("users", "user_id").prop("name"));
    let data = lookup(vec![(
        Key::Int(1),
        SourceData::Many(vec![json!({"name": "A"}), json!({"name": "B"})]),
    )]);
    let mut target = json!({"user_id": 1});
    let report = run(&op, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target, json!({"user_id": 1}));
    assert_eq!(report.codes(), vec!["SHAPE_MISMATCH"]);
    assert!(report.has_errors());
}

#[test]
fn batch_aggregates_in_key_order_and_drops_missing_keys() {
    let op = compile(OperationConfig::batch("tags", "tag_ids").prop(RuleDecl::map("name", "names")));
    let data = lookup(vec![
        (Key::Int(1), SourceData::One(json!({"name": "A"}))),
        (Key::Int(3), SourceData::One(json!({"name": "C"}))),
        (Key::Int(2), SourceData::One(json!({"name": "B"}))),
    ]);
    let keys = [Key::Int(3), Key::Int(9), Key::Int(1)];

    let mut target = json!({"tag_ids": "3,9,1"});
    run(&op, EngineOptions::default(), &mut target, &keys, &data);
    assert_eq!(target["names"], json!(["C", "A"]));

    let mut target = json!({"tag_ids": "3,9,1"});
    let options = EngineOptions::default().with_missing_key(MissingKeyPolicy::Placeholder);
    run(&op, options, &mut target, &keys, &data);
    assert_eq!(target["names"], json!(["C", null, "A"]));
}

#[test]
fn batch_flattens_many_to_many_one_level() {
    let op = compile(OperationConfig::batch("roles", "role_groups").prop(RuleDecl::whole_to("roles")));
    let data = lookup(vec![
        (Key::from("admin"), SourceData::Many(vec![json!({"r": 1}), json!({"r": 2})])),
        (Key::from("guest"), SourceData::One(json!({"r": 3}))),
    ]);
    let mut target = json!({});
    run(
        &op,
        EngineOptions::default(),
        &mut target,
        &[Key::from("admin"), Key::from("guest")],
        &data,
    );
    assert_eq!(target["roles"], json!([{"r": 1}, {"r": 2}, {"r": 3}]));
}

#[test]
fn batch_without_any_resolved_object_writes_nothing() {
    let op = compile(OperationConfig::batch("tags", "tag_ids").prop(RuleDecl::map("name", "names")));
    let mut target = json!({"tag_ids": "1,2"});
    let options = EngineOptions::default().with_missing_key(MissingKeyPolicy::Placeholder);
    let report = run(&op, options, &mut target, &[Key::Int(1), Key::Int(2)], &Lookup::new());
    assert_eq!(target, json!({"tag_ids": "1,2"}));
    assert_eq!(report.writes, 0);
}

#[test]
fn per_key_failures_are_warnings_and_degrade_to_absent() {
    let op = compile(OperationConfig::batch("tags", "tag_ids").prop(RuleDecl::map("name", "names")));
    let mut data = lookup(vec![(Key::Int(1), SourceData::One(json!({"name": "A"})))]);
    data.fail(Key::Int(2), "timeout");
    let mut target = json!({});
    let report = run(&op, EngineOptions::default(), &mut target, &[Key::Int(1), Key::Int(2)], &data);
    assert_eq!(target["names"], json!(["A"]));
    assert_eq!(report.codes(), vec!["CONTAINER_LOOKUP"]);
    assert!(!report.has_errors());
}

#[test]
fn strategies_guard_existing_values() {
    let data = lookup(vec![(Key::Int(1), SourceData::One(json!({"name": "A", "nick": null})))]);
    let keep = compile(
        OperationConfig::one_to_one("users", "id")
            .prop("name")
            .strategy(MappingStrategy::KeepExisting),
    );
    let mut target = json!({"id": 1, "name": "kept"});
    run(&keep, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target["name"], json!("kept"));

    let not_null = compile(
        OperationConfig::one_to_one("users", "id")
            .prop(RuleDecl::whole_to("profile"))
            .prop(RuleDecl::map("name", "name"))
            .strategy(MappingStrategy::OverwriteNotNull),
    );
    let mut target = json!({"id": 1, "name": "old"});
    run(&not_null, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target["name"], json!("A"));
}

#[test]
fn path_resolution_failures_skip_only_that_field() {
    let op = compile(
        OperationConfig::one_to_one("users", "id")
            .prop(RuleDecl::map("name", "blocked.name"))
            .prop(RuleDecl::map("name", "ok")),
    );
    let data = lookup(vec![(Key::Int(1), SourceData::One(json!({"name": "A"})))]);
    let mut target = json!({"id": 1, "blocked": 5});
    let report = run(&op, EngineOptions::default(), &mut target, &[Key::Int(1)], &data);
    assert_eq!(target, json!({"id": 1, "blocked": 5, "ok": "A"}));
    assert_eq!(report.codes(), vec!["PATH_RESOLUTION"]);
}
