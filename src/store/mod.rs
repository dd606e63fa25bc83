//! Persistence seam: the transactional store the query engine and serializer talk to.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{connect, PgStore};

use crate::config::{FilterOp, ResolvedEntity, SortSpec};
use crate::error::AppError;
use crate::record::Record;
use async_trait::async_trait;
use serde_json::Value;

/// One WHERE condition: `column <op> value`.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Collection read: conditions ANDed in order, explicit ordering (empty means store order),
/// then offset and limit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub conditions: Vec<Condition>,
    pub order: Vec<SortSpec>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Every write method commits before returning; there is no outer transaction.
#[async_trait]
pub trait Store: Send + Sync {
    /// Round trip used by readiness checks.
    async fn ping(&self) -> Result<(), AppError>;

    /// Records matching `query`, with relationship collections loaded.
    async fn fetch_list(&self, entity: &ResolvedEntity, query: &ListQuery) -> Result<Vec<Record>, AppError>;

    async fn fetch_by_id(&self, entity: &ResolvedEntity, id: i64) -> Result<Option<Record>, AppError>;

    /// First record (lowest identity) whose `column` equals `value`.
    async fn fetch_first_by(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
    ) -> Result<Option<Record>, AppError>;

    /// Insert (no identity yet) or update, rewrite touched relationship links, commit.
    /// On return `record.values` reflect the stored row.
    async fn save(&self, entity: &ResolvedEntity, record: &mut Record) -> Result<(), AppError>;

    /// Delete the row with this identity directly, without loading it. Returns rows affected.
    async fn delete_by_id(&self, entity: &ResolvedEntity, id: i64) -> Result<u64, AppError>;
}
