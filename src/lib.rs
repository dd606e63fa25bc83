//! Model API: a declarative REST layer over relational resources.
//!
//! Resources, their filters and their attribute schemas come from a JSON model file.
//! The [`service::QueryEngine`] answers list, get and delete; the [`service::Serializer`]
//! populates records on create and update, resolving to-many relationships.

pub mod args;
pub mod coerce;
pub mod config;
pub mod error;
pub mod handlers;
pub mod record;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use args::{ArgParser, Argument, ParsedArgs};
pub use coerce::FieldType;
pub use config::{load_from_path, resolve, ModelConfig, ResolvedEntity, ResolvedModel, Settings, StoreKind};
pub use error::{AppError, ConfigError};
pub use record::Record;
pub use response::{error_body, success_many, success_one};
pub use routes::{common_routes_with_ready, entity_routes};
pub use service::{PopulateContext, PopulateMode, QueryEngine, Serializer};
pub use state::AppState;
pub use store::{connect, MemoryStore, PgStore, Store};
