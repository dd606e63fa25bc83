//! Resource CRUD routes. Parameterized paths let one handler set serve every resource;
//! handlers resolve the resource by its path segment.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body, in bytes.
pub const BODY_LIMIT: usize = 1024 * 1024;

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route("/:path_segment/:id", get(read).put(update).delete(delete_handler))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .with_state(state)
}
