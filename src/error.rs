//! Typed errors and HTTP mapping.

use crate::response::{error_body, NOT_FOUND_MESSAGE};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: resource {resource} column {column}")]
    InvalidPrimaryKey { resource: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),
    #[error("attribute schema: {0}")]
    AttributeSchema(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad filter value for '{column}': '{value}' is not a valid {expected}")]
    BadFilterValue {
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("store: {0}")]
    Store(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadFilterValue { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        };
        let message = if status == StatusCode::NOT_FOUND {
            tracing::debug!(error = %self, "not found");
            NOT_FOUND_MESSAGE.to_string()
        } else {
            if status.is_server_error() {
                tracing::error!(error = %self, "request failed");
            }
            self.to_string()
        };
        (status, Json(error_body(message))).into_response()
    }
}
