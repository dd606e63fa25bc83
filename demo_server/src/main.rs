//! Demo server: loads a model file and serves its resources.
//!
//! Run from repo root: `cargo run -p demo-server`
//! With no database: `STORE=memory MODEL_CONFIG=demo_server/model.json cargo run -p demo-server`

use model_api::{
    common_routes_with_ready, connect, entity_routes, load_from_path, resolve, AppState, MemoryStore, PgStore,
    Settings, Store, StoreKind,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("model_api=info,demo_server=info")),
        )
        .init();

    let config = load_from_path(&settings.model_config).await?;
    let model = resolve(&config)?;
    tracing::info!(resources = model.entities.len(), path = %settings.model_config.display(), "model loaded");

    let store: Arc<dyn Store> = match settings.store {
        StoreKind::Postgres => Arc::new(PgStore::new(connect(&settings).await?)),
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    let state = AppState::new(store, model);

    let app = common_routes_with_ready(state.clone()).merge(entity_routes(state));
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Demo server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
