mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::{model, seed_post, state};
use model_api::{entity_routes, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(store: Arc<MemoryStore>) -> Router {
    entity_routes(state(store, model(false)))
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn list_wraps_records_in_an_envelope() {
    let store = Arc::new(MemoryStore::new());
    let model = model(false);
    seed_post(&store, &model, "alpha", 3, true).await;
    seed_post(&store, &model, "beta", 9, false).await;
    seed_post(&store, &model, "gamma", 1, true).await;

    let (status, body) = send(app(store.clone()), Method::GET, "/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "3 records found");
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    let (_, body) = send(
        app(store.clone()),
        Method::GET,
        "/posts?published=1&_sorted=views,desc&_limit=1",
        None,
    )
    .await;
    assert_eq!(body["message"], "1 records found");
    assert_eq!(body["data"][0]["title"], "alpha");

    let (_, body) = send(app(store), Method::GET, "/posts?_sorted=views&_sorted=title&_offset=1", None).await;
    let titles: Vec<&str> = body["data"].as_array().unwrap().iter().filter_map(|p| p["title"].as_str()).collect();
    assert_eq!(titles, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn list_rejects_bad_input() {
    let store = Arc::new(MemoryStore::new());
    let (status, body) = send(app(store.clone()), Method::GET, "/posts?views=lots", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = send(app(store.clone()), Method::GET, "/posts?_limit=ten", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(store), Method::GET, "/posts?_sorted=nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_then_read_with_tags() {
    let store = Arc::new(MemoryStore::new());
    let (status, body) = send(
        app(store.clone()),
        Method::POST,
        "/posts",
        Some(json!({"title": "hello", "tags": "rust, web"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "New item added");
    assert_eq!(body["data"]["views"], 0);
    assert_eq!(body["data"]["tags"][1]["name"], "web");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(app(store.clone()), Method::GET, &format!("/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Item found");
    assert_eq!(body["data"]["title"], "hello");
    assert_eq!(body["data"]["tags"][0]["name"], "rust");

    let (_, body) = send(app(store), Method::GET, "/tags?name=web", None).await;
    assert_eq!(body["message"], "1 records found");
}

#[tokio::test]
async fn update_is_partial_by_default() {
    let store = Arc::new(MemoryStore::new());
    let model = model(false);
    let id = seed_post(&store, &model, "draft", 4, false).await;

    let (status, body) = send(
        app(store.clone()),
        Method::PUT,
        &format!("/posts/{}", id),
        Some(json!({"published": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Item updated");
    assert_eq!(body["data"]["title"], "draft");
    assert_eq!(body["data"]["views"], 4);
    assert_eq!(body["data"]["published"], true);

    let (_, body) = send(
        app(store),
        Method::PUT,
        &format!("/posts/{}?_partial=false", id),
        Some(json!({"title": "final"})),
    )
    .await;
    assert_eq!(body["data"]["title"], "final");
    assert_eq!(body["data"]["views"], 0);
    assert_eq!(body["data"]["published"], Value::Null);
}

#[tokio::test]
async fn partial_flag_uses_the_general_boolean_rule() {
    let store = Arc::new(MemoryStore::new());
    let model = model(false);
    let id = seed_post(&store, &model, "kept", 6, true).await;

    let (status, body) = send(
        app(store.clone()),
        Method::PUT,
        &format!("/posts/{}?_partial=1", id),
        Some(json!({"title": "renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["views"], 6);
    assert_eq!(body["data"]["published"], true);

    let (status, body) = send(
        app(store),
        Method::PUT,
        &format!("/posts/{}?_partial=0", id),
        Some(json!({"title": "reset"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["title"], "reset");
    assert_eq!(body["data"]["views"], 0);
    assert_eq!(body["data"]["published"], Value::Null);
}

#[tokio::test]
async fn missing_items_answer_not_found() {
    let store = Arc::new(MemoryStore::new());
    for (method, uri) in [
        (Method::GET, "/posts/7"),
        (Method::PUT, "/posts/7"),
        (Method::DELETE, "/posts/7"),
        (Method::GET, "/widgets"),
    ] {
        let (status, body) = send(app(store.clone()), method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["message"], "Item not found");
        assert_eq!(body["status"], "error");
    }
    assert_eq!(store.delete_count(), 0);

    let (status, _) = send(app(store), Method::GET, "/posts/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_the_item() {
    let store = Arc::new(MemoryStore::new());
    let model = model(false);
    let id = seed_post(&store, &model, "bye", 1, true).await;

    let (status, body) = send(app(store.clone()), Method::DELETE, &format!("/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Item removed");
    assert_eq!(body["data"], json!({}));
    assert_eq!(store.delete_count(), 1);

    let (status, _) = send(app(store), Method::GET, &format!("/posts/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strict_resources_answer_unprocessable() {
    let store = Arc::new(MemoryStore::new());
    let router = entity_routes(state(store, model(true)));
    let (status, body) = send(router, Method::POST, "/posts", Some(json!({"title": "t", "related": "12"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn non_object_bodies_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let (status, _) = send(app(store), Method::POST, "/posts", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
