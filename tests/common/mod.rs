#![allow(dead_code)]

use model_api::config::from_json_str;
use model_api::{resolve, AppState, MemoryStore, PopulateContext, ResolvedEntity, ResolvedModel, Store};
use serde_json::{json, Value};
use std::sync::Arc;

/// Posts with tags (split, created on demand) and an id-linked `related` relationship.
pub fn model_json(strict: bool) -> Value {
    json!({
        "resources": [
            {
                "name": "tag",
                "path_segment": "tags",
                "table": "tags",
                "columns": [
                    {"name": "id", "type": "int"},
                    {"name": "name", "type": "str"}
                ],
                "attributes": [["name", "str", null]],
                "filters": [{"column": "name", "type": "str"}]
            },
            {
                "name": "post",
                "path_segment": "posts",
                "table": "posts",
                "columns": [
                    {"name": "id", "type": "int"},
                    {"name": "title", "type": "str"},
                    {"name": "views", "type": "int"},
                    {"name": "published", "type": "bool"}
                ],
                "attributes": [
                    ["title", "str", null],
                    ["views", "int", {"default": 0}],
                    ["published", "bool", null],
                    ["tags", "str", null],
                    ["related", "str", null]
                ],
                "relationships": {
                    "tags": {
                        "model": "tag",
                        "model_field": "name",
                        "split": true,
                        "force_create": true,
                        "through": {"table": "post_tags", "source_column": "post_id", "target_column": "tag_id"}
                    },
                    "related": {
                        "model": "tag",
                        "split": true,
                        "through": {"table": "post_related", "source_column": "post_id", "target_column": "tag_id"}
                    }
                },
                "filters": [
                    {"column": "title", "type": "str", "kind": "ilike", "expr": "%{}%"},
                    {"column": "published", "type": "bool"},
                    {"column": "views", "type": "int", "kind": "ge", "expr": "{}"}
                ],
                "default_order": ["id"],
                "strict": strict
            }
        ]
    })
}

pub fn model(strict: bool) -> ResolvedModel {
    let config = from_json_str(&model_json(strict).to_string()).unwrap();
    resolve(&config).unwrap()
}

pub fn entity<'a>(model: &'a ResolvedModel, name: &str) -> &'a ResolvedEntity {
    model.entity(name).unwrap()
}

pub fn ctx<'a>(store: &'a MemoryStore, model: &'a ResolvedModel) -> PopulateContext<'a> {
    PopulateContext { store, model }
}

/// Insert one post directly through the store.
pub async fn seed_post(store: &MemoryStore, model: &ResolvedModel, title: &str, views: i64, published: bool) -> i64 {
    let mut r = model_api::Record::new();
    r.set("title", json!(title));
    r.set("views", json!(views));
    r.set("published", json!(published));
    store.save(entity(model, "post"), &mut r).await.unwrap();
    r.id("id").unwrap()
}

pub fn state(store: Arc<MemoryStore>, model: ResolvedModel) -> AppState {
    AppState::new(store, model)
}
