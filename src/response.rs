//! Standard response envelope helpers: `{status, data, message}`.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

pub const NOT_FOUND_MESSAGE: &str = "Item not found";

#[derive(Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
    pub message: String,
}

fn success<T: Serialize>(status: StatusCode, data: T, message: impl Into<String>) -> (StatusCode, Json<Envelope<T>>) {
    (
        status,
        Json(Envelope {
            status: "success",
            data,
            message: message.into(),
        }),
    )
}

/// 200 with a single item.
pub fn success_one_ok<T: Serialize>(data: T, message: impl Into<String>) -> (StatusCode, Json<Envelope<T>>) {
    success(StatusCode::OK, data, message)
}

/// 201 with a single item (create and update both answer 201).
pub fn success_one<T: Serialize>(data: T, message: impl Into<String>) -> (StatusCode, Json<Envelope<T>>) {
    success(StatusCode::CREATED, data, message)
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<Envelope<Vec<T>>>) {
    let count = data.len();
    success(StatusCode::OK, data, format!("{} records found", count))
}

/// 200 with an empty object as data, used by delete.
pub fn success_empty(message: impl Into<String>) -> (StatusCode, Json<Envelope<Value>>) {
    success(StatusCode::OK, Value::Object(Default::default()), message)
}

pub fn error_body(message: String) -> Envelope<Value> {
    Envelope {
        status: "error",
        data: Value::Object(Default::default()),
        message,
    }
}
