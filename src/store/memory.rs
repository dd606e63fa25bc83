//! In-process store with the same observable semantics as the PostgreSQL one.
//! Used by the test suite and by the demo server when no database is configured.

use super::{Condition, ListQuery, Store};
use crate::coerce::display_value;
use crate::config::{FilterOp, ResolvedEntity, SortDirection, TableRef};
use crate::error::AppError;
use crate::record::Record;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Map<String, Value>>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Table>,
    /// Link table name -> source id -> ordered target ids.
    links: HashMap<String, BTreeMap<i64, Vec<Option<i64>>>>,
    commits: u64,
    deletes: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner.lock().map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    /// Number of committed writes (saves and deletes).
    pub fn commit_count(&self) -> u64 {
        self.inner.lock().map(|i| i.commits).unwrap_or_default()
    }

    /// Number of store-level deletes executed.
    pub fn delete_count(&self) -> u64 {
        self.inner.lock().map(|i| i.deletes).unwrap_or_default()
    }

    /// Number of rows currently held for an entity.
    pub fn row_count(&self, entity: &ResolvedEntity) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|i| i.tables.get(&entity.table.qualified_name()).map(|t| t.rows.len()))
            .unwrap_or_default()
    }
}

impl Inner {
    fn row(&self, table: &TableRef, id: i64) -> Option<&Map<String, Value>> {
        self.tables.get(&table.qualified_name()).and_then(|t| t.rows.get(&id))
    }

    fn materialise(&self, entity: &ResolvedEntity, values: &Map<String, Value>) -> Record {
        let mut record = Record::from_values(values.clone());
        let Some(id) = record.id(&entity.table.primary_key) else { return record };
        for (name, rel) in entity.relationships() {
            let targets = self
                .links
                .get(&rel.through.qualified_name())
                .and_then(|l| l.get(&id))
                .map(|ids| {
                    ids.iter()
                        .map(|t| {
                            t.and_then(|t| self.row(&rel.target_table, t))
                                .map(|v| Record::from_values(v.clone()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            record.load_relation(name, targets);
        }
        record
    }
}

/// SQL LIKE pattern as an anchored regex: `%` any run, `_` one char, `\` escapes.
fn like_regex(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    let mut re = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Ascending order with NULLs last, as PostgreSQL does.
fn order_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

fn row_matches(table: &TableRef, row: &Map<String, Value>, cond: &Condition) -> bool {
    let Some(col) = table.column(&cond.column) else { return true };
    let cell = match row.get(&col.name) {
        Some(v) if !v.is_null() => v,
        _ => return false,
    };
    if cond.op.is_pattern() {
        let ci = matches!(cond.op, FilterOp::ILike | FilterOp::NotILike);
        let Some(re) = like_regex(&display_value(&cond.value), ci) else { return false };
        let hit = re.is_match(&display_value(cell));
        return match cond.op {
            FilterOp::NotLike | FilterOp::NotILike => !hit,
            _ => hit,
        };
    }
    let Ok(target) = col.field_type.coerce(&cond.value) else { return false };
    let Some(ord) = compare_values(cell, &target) else { return false };
    match cond.op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Ne => ord != Ordering::Equal,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Le => ord != Ordering::Greater,
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Ge => ord != Ordering::Less,
        _ => false,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn fetch_list(&self, entity: &ResolvedEntity, query: &ListQuery) -> Result<Vec<Record>, AppError> {
        let inner = self.lock()?;
        let table = &entity.table;
        let mut rows: Vec<&Map<String, Value>> = inner
            .tables
            .get(&table.qualified_name())
            .map(|t| t.rows.values().collect())
            .unwrap_or_default();
        rows.retain(|row| query.conditions.iter().all(|c| row_matches(table, row, c)));
        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                for s in &query.order {
                    let ord = order_cells(a.get(&s.column), b.get(&s.column));
                    let ord = match s.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map(|n| n.max(0) as usize).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| inner.materialise(entity, row))
            .collect())
    }

    async fn fetch_by_id(&self, entity: &ResolvedEntity, id: i64) -> Result<Option<Record>, AppError> {
        let inner = self.lock()?;
        Ok(inner.row(&entity.table, id).map(|row| inner.materialise(entity, row)))
    }

    async fn fetch_first_by(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
    ) -> Result<Option<Record>, AppError> {
        let inner = self.lock()?;
        let cond = Condition {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.clone(),
        };
        Ok(inner
            .tables
            .get(&entity.table.qualified_name())
            .and_then(|t| t.rows.values().find(|row| row_matches(&entity.table, row, &cond)))
            .map(|row| inner.materialise(entity, row)))
    }

    async fn save(&self, entity: &ResolvedEntity, record: &mut Record) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        let table_ref = &entity.table;
        let pk = &table_ref.primary_key;
        let table = inner.tables.entry(table_ref.qualified_name()).or_default();

        let id = match record.id(pk) {
            Some(id) if table.rows.contains_key(&id) => id,
            Some(id) => {
                table.rows.insert(id, Map::new());
                id
            }
            None => {
                let id = table.next_id.max(table.rows.keys().next_back().copied().unwrap_or(0)) + 1;
                table.rows.insert(id, Map::new());
                id
            }
        };
        table.next_id = table.next_id.max(id);
        let row = table.rows.entry(id).or_default();
        for c in &table_ref.columns {
            if c.name == *pk {
                row.insert(c.name.clone(), Value::from(id));
            } else if let Some(v) = record.values.get(&c.name) {
                row.insert(c.name.clone(), v.clone());
            } else {
                row.entry(c.name.clone()).or_insert(Value::Null);
            }
        }
        record.values = row.clone();

        let touched: Vec<String> = record.touched_relations().map(str::to_string).collect();
        for name in touched {
            let Some(rel) = entity.relationships().get(&name) else { continue };
            let targets = record
                .relation(&name)
                .iter()
                .map(|r| r.as_ref().and_then(|r| r.id(&rel.target_table.primary_key)))
                .collect();
            inner
                .links
                .entry(rel.through.qualified_name())
                .or_default()
                .insert(id, targets);
        }
        record.mark_clean();
        inner.commits += 1;
        tracing::debug!(table = %table_ref.qualified_name(), id, "memory save");
        Ok(())
    }

    async fn delete_by_id(&self, entity: &ResolvedEntity, id: i64) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let removed = inner
            .tables
            .get_mut(&entity.table.qualified_name())
            .and_then(|t| t.rows.remove(&id))
            .is_some();
        inner.deletes += 1;
        inner.commits += 1;
        Ok(removed as u64)
    }
}
