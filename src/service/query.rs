//! Query engine: filtered, sorted, paginated reads plus identity lookup and delete.

use crate::coerce::display_value;
use crate::config::{FilterOp, ResolvedEntity, SortSpec, EXPR_SLOT};
use crate::error::AppError;
use crate::record::Record;
use crate::store::{Condition, ListQuery, Store};
use std::collections::HashMap;

#[derive(Debug)]
pub struct ListResult {
    pub records: Vec<Record>,
    pub count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub found: bool,
}

pub struct QueryEngine;

impl QueryEngine {
    /// Translate the entity's declared filters, the caller's raw arguments and paging into a
    /// store query. Filters whose argument is absent or empty impose nothing.
    pub fn build_query(
        entity: &ResolvedEntity,
        raw_args: &HashMap<String, String>,
        sort_override: Option<&[String]>,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<ListQuery, AppError> {
        let mut conditions = Vec::new();
        for f in &entity.filters {
            let Some(raw) = raw_args.get(&f.column).filter(|s| !s.is_empty()) else { continue };
            let value = f.value_type.coerce_filter(raw).map_err(|e| AppError::BadFilterValue {
                column: f.column.clone(),
                value: raw.clone(),
                expected: e.expected,
            })?;
            conditions.push(match &f.operator {
                Some((op, expr)) => Condition {
                    column: f.column.clone(),
                    op: *op,
                    value: expr.replacen(EXPR_SLOT, &display_value(&value), 1).into(),
                },
                None => Condition {
                    column: f.column.clone(),
                    op: FilterOp::Eq,
                    value,
                },
            });
        }

        let order = match sort_override.filter(|s| !s.is_empty()) {
            Some(tokens) => tokens
                .iter()
                .map(|t| SortSpec::parse(t, &entity.table).map_err(AppError::BadRequest))
                .collect::<Result<Vec<_>, _>>()?,
            None => entity.default_order.clone(),
        };

        for (name, n) in [("_offset", offset), ("_limit", limit)] {
            if matches!(n, Some(n) if n < 0) {
                return Err(AppError::BadRequest(format!("{} must not be negative", name)));
            }
        }

        Ok(ListQuery {
            conditions,
            order,
            offset,
            limit,
        })
    }

    pub async fn list(
        store: &dyn Store,
        entity: &ResolvedEntity,
        raw_args: &HashMap<String, String>,
        sort_override: Option<&[String]>,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<ListResult, AppError> {
        let query = Self::build_query(entity, raw_args, sort_override, offset, limit)?;
        let records = store.fetch_list(entity, &query).await?;
        let count = records.len();
        Ok(ListResult { records, count })
    }

    /// Absence is `Ok(None)`, not an error.
    pub async fn get_by_identity(store: &dyn Store, entity: &ResolvedEntity, id: i64) -> Result<Option<Record>, AppError> {
        store.fetch_by_id(entity, id).await
    }

    /// Look the row up first; only an existing row is deleted (directly, by identity).
    pub async fn delete_by_identity(store: &dyn Store, entity: &ResolvedEntity, id: i64) -> Result<DeleteOutcome, AppError> {
        if store.fetch_by_id(entity, id).await?.is_none() {
            return Ok(DeleteOutcome { found: false });
        }
        store.delete_by_id(entity, id).await?;
        Ok(DeleteOutcome { found: true })
    }
}
