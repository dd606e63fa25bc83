//! PostgreSQL store: generic statements from the SQL builder executed through sqlx.

use super::{ListQuery, Store};
use crate::config::{ResolvedEntity, Settings};
use crate::error::AppError;
use crate::record::Record;
use crate::sql::{
    bind_all, cell_to_value, delete, delete_links, insert, insert_link, row_to_record, select_by_id, select_first_by,
    select_links, select_list, update, QueryBuf, LINK_SOURCE_ALIAS,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

/// Open a pool from settings.
pub async fn connect(settings: &Settings) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<PgRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<PgRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    /// Attach every relationship collection of `entity` to `records` with one query per relationship.
    async fn load_relations(&self, entity: &ResolvedEntity, records: &mut [Record]) -> Result<(), AppError> {
        let pk = &entity.table.primary_key;
        let ids: Vec<i64> = records.iter().filter_map(|r| r.id(pk)).collect();
        if ids.is_empty() {
            return Ok(());
        }
        for (name, rel) in entity.relationships() {
            let q = select_links(&rel.through, &rel.target_table, &ids);
            let rows = self.query_many(&q).await?;
            let mut by_source: HashMap<i64, Vec<Option<Record>>> = HashMap::new();
            for row in &rows {
                let source = cell_to_value(row, LINK_SOURCE_ALIAS, crate::coerce::FieldType::Int)?
                    .as_i64()
                    .unwrap_or_default();
                let target = row_to_record(row, &rel.target_table)?;
                let linked = target.id(&rel.target_table.primary_key).map(|_| target);
                by_source.entry(source).or_default().push(linked);
            }
            for r in records.iter_mut() {
                let Some(id) = r.id(pk) else { continue };
                r.load_relation(name, by_source.remove(&id).unwrap_or_default());
            }
        }
        Ok(())
    }
}

async fn execute_returning_one_tx(tx: &mut PgConnection, q: &QueryBuf) -> Result<Option<PgRow>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
    let row = bind_all(sqlx::query(&q.sql), &q.params).fetch_optional(&mut *tx).await?;
    Ok(row)
}

async fn execute_tx(tx: &mut PgConnection, q: &QueryBuf) -> Result<u64, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute (tx)");
    let done = bind_all(sqlx::query(&q.sql), &q.params).execute(&mut *tx).await?;
    Ok(done.rows_affected())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn fetch_list(&self, entity: &ResolvedEntity, query: &ListQuery) -> Result<Vec<Record>, AppError> {
        let q = select_list(&entity.table, query);
        let rows = self.query_many(&q).await?;
        let mut records = rows
            .iter()
            .map(|r| row_to_record(r, &entity.table))
            .collect::<Result<Vec<_>, _>>()?;
        self.load_relations(entity, &mut records).await?;
        Ok(records)
    }

    async fn fetch_by_id(&self, entity: &ResolvedEntity, id: i64) -> Result<Option<Record>, AppError> {
        let q = select_by_id(&entity.table, id);
        let Some(row) = self.query_optional(&q).await? else { return Ok(None) };
        let mut records = vec![row_to_record(&row, &entity.table)?];
        self.load_relations(entity, &mut records).await?;
        Ok(records.pop())
    }

    async fn fetch_first_by(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
    ) -> Result<Option<Record>, AppError> {
        let q = select_first_by(&entity.table, column, value);
        let Some(row) = self.query_optional(&q).await? else { return Ok(None) };
        let mut records = vec![row_to_record(&row, &entity.table)?];
        self.load_relations(entity, &mut records).await?;
        Ok(records.pop())
    }

    async fn save(&self, entity: &ResolvedEntity, record: &mut Record) -> Result<(), AppError> {
        let table = &entity.table;
        let mut tx = self.pool.begin().await?;
        let q = match record.id(&table.primary_key) {
            Some(id) => update(table, id, &record.values),
            None => insert(table, &record.values),
        };
        let row = execute_returning_one_tx(&mut tx, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        let stored = row_to_record(&row, table)?;
        let id = stored
            .id(&table.primary_key)
            .ok_or_else(|| AppError::Store(format!("{} row has no identity", table.qualified_name())))?;

        let touched: Vec<String> = record.touched_relations().map(str::to_string).collect();
        for name in touched {
            let Some(rel) = entity.relationships().get(&name) else { continue };
            execute_tx(&mut tx, &delete_links(&rel.through, id)).await?;
            for (position, related) in record.relation(&name).iter().enumerate() {
                let target = related.as_ref().and_then(|r| r.id(&rel.target_table.primary_key));
                execute_tx(&mut tx, &insert_link(&rel.through, id, target, position as i64)).await?;
            }
        }
        tx.commit().await?;

        record.values = stored.values;
        record.mark_clean();
        Ok(())
    }

    async fn delete_by_id(&self, entity: &ResolvedEntity, id: i64) -> Result<u64, AppError> {
        let q = delete(&entity.table, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let done = bind_all(sqlx::query(&q.sql), &q.params).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}
