mod common;

use common::model_json;
use model_api::config::{from_json_str, SortDirection};
use model_api::{resolve, ConfigError, FieldType, PopulateMode};
use serde_json::{json, Value};

fn resolve_value(v: Value) -> Result<model_api::ResolvedModel, ConfigError> {
    resolve(&from_json_str(&v.to_string())?)
}

/// The shared model with one edit applied to the `post` resource.
fn with_post(edit: impl FnOnce(&mut Value)) -> Value {
    let mut v = model_json(false);
    edit(&mut v["resources"][1]);
    v
}

#[test]
fn shared_model_resolves() {
    let model = resolve_value(model_json(false)).unwrap();
    let post = model.entity_by_path("posts").unwrap();
    assert_eq!(post.name, "post");
    assert_eq!(post.table.qualified_name(), "public.posts");
    assert_eq!(post.filters.len(), 3);
    assert!(post.filters[1].operator.is_none());
    assert_eq!(post.default_order[0].direction, SortDirection::Asc);
    assert_eq!(post.serializer.mode(), PopulateMode::Lenient);
    assert_eq!(post.serializer.attribute("views").map(|a| a.field_type), Some(FieldType::Int));
    let tags = &post.relationships()["tags"];
    assert!(tags.split && tags.force_create);
    assert_eq!(tags.through.position_column, "position");

    let strict = resolve_value(model_json(true)).unwrap();
    assert_eq!(strict.entity("post").unwrap().serializer.mode(), PopulateMode::Strict);
}

#[test]
fn malformed_attribute_schemas_fail_at_load() {
    for bad in [
        json!({"title": "str"}),
        json!([["title", "str"]]),
        json!([["title", "text", null]]),
        json!([["", "str", null]]),
        json!([["title", "str", ["required"]]]),
        json!([["title", "str", {"requried": true}]]),
        json!([["title", "str", null], ["title", "int", null]]),
    ] {
        let err = resolve_value(with_post(|p| p["attributes"] = bad.clone())).unwrap_err();
        assert!(matches!(err, ConfigError::AttributeSchema(_)), "{} gave {:?}", bad, err);
    }
}

#[test]
fn attributes_must_map_to_columns_or_relationships() {
    let err = resolve_value(with_post(|p| {
        p["attributes"] = json!([["subtitle", "str", null], ["tags", "str", null], ["related", "str", null]])
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigError::MissingReference { .. }));
}

#[test]
fn references_are_checked() {
    let err = resolve_value(with_post(|p| p["relationships"]["tags"]["model"] = json!("label"))).unwrap_err();
    assert!(matches!(err, ConfigError::MissingReference { kind: "resource", .. }));

    let err = resolve_value(with_post(|p| p["relationships"]["tags"]["model_field"] = json!("label"))).unwrap_err();
    assert!(matches!(err, ConfigError::MissingReference { .. }));

    let err = resolve_value(with_post(|p| p["filters"][0]["column"] = json!("body"))).unwrap_err();
    assert!(matches!(err, ConfigError::MissingReference { kind: "filter column", .. }));

    let err = resolve_value(with_post(|p| p["default_order"] = json!(["rank"]))).unwrap_err();
    assert!(matches!(err, ConfigError::MissingReference { kind: "sort column", .. }));
}

#[test]
fn filters_and_ordering_are_checked() {
    let err = resolve_value(with_post(|p| p["filters"][0]["kind"] = json!("between"))).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    let err = resolve_value(with_post(|p| p["filters"][0]["expr"] = json!("%{}%{}"))).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    let err = resolve_value(with_post(|p| p["default_order"] = json!(["id,sideways"]))).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn names_and_keys_are_checked() {
    let err = resolve_value(with_post(|p| p["path_segment"] = json!("tags"))).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicatePathSegment(_)));

    let err = resolve_value(with_post(|p| p["name"] = json!("tag"))).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateResource(_)));

    let err = resolve_value(with_post(|p| p["table"] = json!("posts; drop"))).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidIdentifier(_)));

    for reserved in ["health", "ready", "version"] {
        let err = resolve_value(with_post(|p| p["path_segment"] = json!(reserved))).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{} gave {:?}", reserved, err);
    }

    let err = resolve_value(with_post(|p| p["primary_key"] = json!("title"))).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPrimaryKey { .. }));
}

#[test]
fn unparseable_file_is_a_load_error() {
    assert!(matches!(from_json_str("{not json"), Err(ConfigError::Load(_))));
}
