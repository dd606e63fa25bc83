//! Core services: the query engine for reads and deletes, the serializer for writes.

mod query;
mod serializer;
pub use query::{DeleteOutcome, ListResult, QueryEngine};
pub use serializer::{AttributeSpec, PopulateContext, PopulateMode, RelationshipSpec, Serializer};
