//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<ResolvedModel>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, model: ResolvedModel) -> Self {
        AppState {
            store,
            model: Arc::new(model),
        }
    }
}
