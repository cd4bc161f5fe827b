use super::*;
use serde_json::json;

#[test]
fn stub_round_trips_and_validates() {
    let stub = config_stub().expect("stub");
    let parsed = parse_config(&stub).expect("parse stub");
    assert_eq!(parsed, example_config());
    validate_config(&parsed).expect("stub is valid");
}

#[test]
fn operation_defaults_apply_when_fields_are_omitted() {
    let config: AssemblyConfig = serde_json::from_value(json!({
        "schema_version": 1,
        "targets": {"User": {"operations": [{"container": "roles", "key": "role_id"}]}}
    }))
    .expect("parse");
    let op = &config.targets["User"].operations[0];
    assert_eq!(op.handler, HandlerKind::OneToOne);
    assert_eq!(op.strategy, MappingStrategy::Overwrite);
    assert!(op.props.is_empty() && op.templates.is_empty() && op.groups.is_empty());
    assert_eq!(op.splitter, None);
    assert_eq!(op.label(), "role_id@roles");
}

#[test]
fn full_operation_shape_parses() {
    let config = parse_config(
        &json!({
            "schema_version": 1,
            "templates": {"names": ["name"]},
            "targets": {"Post": {"operations": [{
                "container": "tags",
                "key": "tag_ids",
                "handler": "batch",
                "props": [{"src": "label", "ref": "labels"}, {"template": "names"}],
                "templates": ["names"],
                "splitter": "pipe",
                "key_type": "integer",
                "strategy": "keep_existing",
                "groups": ["listing"]
            }]}}
        })
        .to_string(),
    )
    .expect("parse");
    let op = &config.targets["Post"].operations[0];
    assert_eq!(op.handler, HandlerKind::Batch);
    assert_eq!(op.key_type, Some(KeyKind::Integer));
    assert_eq!(op.strategy, MappingStrategy::KeepExisting);
    assert_eq!(op.props[1], PropItem::template("names"));
    validate_config(&config).expect("valid");
}

#[test]
fn unknown_fields_are_rejected() {
    let err = parse_config(r#"{"schema_version": 1, "target": {}}"#).unwrap_err();
    assert!(format!("{err:#}").contains("target"), "{err:#}");
}

#[test]
fn validate_rejects_bad_schema_version_and_paths() {
    let mut config = example_config();
    config.schema_version = 2;
    assert!(validate_config(&config)
        .unwrap_err()
        .to_string()
        .contains("schema_version 2"));

    let config = AssemblyConfig::new().operation(
        "User",
        OperationConfig::one_to_one("users", "owner..id"),
    );
    let err = validate_config(&config).unwrap_err();
    assert!(format!("{err:#}").contains("User.operations[0]: key"), "{err:#}");
}

#[test]
fn validate_reports_template_problems() {
    let cyclic = AssemblyConfig::new()
        .template("a", [PropItem::template("b")])
        .template("b", [PropItem::template("a")]);
    let err = validate_config(&cyclic).unwrap_err();
    assert!(err.to_string().contains("a -> b -> a"), "{err}");

    let missing = AssemblyConfig::new().operation(
        "User",
        OperationConfig::one_to_one("users", "id").template("nope"),
    );
    let err = validate_config(&missing).unwrap_err();
    assert!(format!("{err:#}").contains("unknown template 'nope'"), "{err:#}");
}

#[test]
fn write_then_load_preserves_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("assembly.json");
    let config = example_config();
    write_config(&path, &config).expect("write");
    assert_eq!(load_config(&path).expect("load"), config);
    assert!(load_config(&dir.path().join("missing.json")).is_err());
}
