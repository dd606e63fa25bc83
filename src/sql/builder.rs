//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved table.

use crate::config::{LinkTable, SortDirection, TableRef};
use crate::sql::PgBindValue;
use crate::store::ListQuery;
use serde_json::{Map, Value};

/// Alias of the link source column in link selects.
pub const LINK_SOURCE_ALIAS: &str = "__source";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }

    /// Push a value and return its placeholder cast to `pg_type`.
    fn placeholder(&mut self, v: &Value, pg_type: &str) -> String {
        let n = self.push_param(PgBindValue::from_json(v));
        format!("${}::{}", n, pg_type)
    }
}

/// SELECT list: every column cast to its type's canonical PostgreSQL type, so decoding is exact.
fn select_column_list(table: &TableRef, alias: Option<&str>) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            match alias {
                Some(a) => format!("{}.{}::{} AS {}", a, q, c.field_type.pg_type(), q),
                None => format!("{}::{} AS {}", q, c.field_type.pg_type(), q),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT list with conditions in declaration order, explicit ORDER BY, optional OFFSET/LIMIT.
/// Pattern operators compare the column as text; comparisons cast the bound value to the column type.
pub fn select_list(table: &TableRef, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for cond in &query.conditions {
        let Some(col) = table.column(&cond.column) else { continue };
        if cond.op.is_pattern() {
            let ph = q.placeholder(&cond.value, "text");
            where_parts.push(format!("{}::text {} {}", quoted(&col.name), cond.op.sql(), ph));
        } else {
            let ph = q.placeholder(&cond.value, col.field_type.pg_type());
            where_parts.push(format!("{} {} {}", quoted(&col.name), cond.op.sql(), ph));
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = if query.order.is_empty() {
        String::new()
    } else {
        let parts: Vec<String> = query
            .order
            .iter()
            .map(|s| match s.direction {
                SortDirection::Asc => format!("{} ASC", quoted(&s.column)),
                SortDirection::Desc => format!("{} DESC", quoted(&s.column)),
            })
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(table, None),
        qualified_table(&table.schema, &table.table),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT by primary key.
pub fn select_by_id(table: &TableRef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list(table, None),
        qualified_table(&table.schema, &table.table),
        quoted(&table.primary_key),
        n
    );
    q
}

/// First row (by primary key) whose `column` equals `value`.
pub fn select_first_by(table: &TableRef, column: &str, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pg_type = table.column(column).map(|c| c.field_type.pg_type()).unwrap_or("text");
    let ph = q.placeholder(value, pg_type);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {} LIMIT 1",
        select_column_list(table, None),
        qualified_table(&table.schema, &table.table),
        quoted(column),
        ph,
        quoted(&table.primary_key)
    );
    q
}

/// INSERT: declared columns present in `values`; the primary key only when set.
pub fn insert(table: &TableRef, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let Some(val) = values.get(&c.name) else { continue };
        if c.name == table.primary_key && val.is_null() {
            continue;
        }
        placeholders.push(q.placeholder(val, c.field_type.pg_type()));
        cols.push(quoted(&c.name));
    }
    let target = qualified_table(&table.schema, &table.table);
    let returning = select_column_list(table, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET every declared non-key column present in `values`.
/// With nothing to set it degrades to a SELECT by id.
pub fn update(table: &TableRef, id: i64, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &table.columns {
        if c.name == table.primary_key {
            continue;
        }
        let Some(val) = values.get(&c.name) else { continue };
        let ph = q.placeholder(val, c.field_type.pg_type());
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(table, id);
    }
    let id_param = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        qualified_table(&table.schema, &table.table),
        sets.join(", "),
        quoted(&table.primary_key),
        id_param,
        select_column_list(table, None)
    );
    q
}

/// DELETE by id; no RETURNING, callers use rows_affected.
pub fn delete(table: &TableRef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}",
        qualified_table(&table.schema, &table.table),
        quoted(&table.primary_key),
        n
    );
    q
}

/// Linked target rows for a set of source ids, in link position order. Null links come back
/// with every target column NULL.
pub fn select_links(link: &LinkTable, target: &TableRef, source_ids: &[i64]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let placeholders: Vec<String> = source_ids
        .iter()
        .map(|id| format!("${}", q.push_param(PgBindValue::I64(*id))))
        .collect();
    let link_table = qualified_table(&link.schema, &link.table);
    let target_table = qualified_table(&target.schema, &target.table);
    q.sql = format!(
        "SELECT l.{src}::int8 AS {alias}, {cols} FROM {link_table} l LEFT JOIN {target_table} t ON t.{pk} = l.{dst} WHERE l.{src} IN ({ids}) ORDER BY l.{src}, l.{pos}",
        src = quoted(&link.source_column),
        alias = quoted(LINK_SOURCE_ALIAS),
        cols = select_column_list(target, Some("t")),
        link_table = link_table,
        target_table = target_table,
        pk = quoted(&target.primary_key),
        dst = quoted(&link.target_column),
        ids = placeholders.join(", "),
        pos = quoted(&link.position_column),
    );
    q
}

pub fn delete_links(link: &LinkTable, source_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(source_id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}",
        qualified_table(&link.schema, &link.table),
        quoted(&link.source_column),
        n
    );
    q
}

pub fn insert_link(link: &LinkTable, source_id: i64, target_id: Option<i64>, position: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.push_param(PgBindValue::I64(source_id));
    q.push_param(target_id.map(PgBindValue::I64).unwrap_or(PgBindValue::Null));
    q.push_param(PgBindValue::I64(position));
    q.sql = format!(
        "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2::int8, $3)",
        qualified_table(&link.schema, &link.table),
        quoted(&link.source_column),
        quoted(&link.target_column),
        quoted(&link.position_column)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::FieldType;
    use crate::config::{ColumnInfo, FilterOp, SortSpec};
    use crate::store::Condition;
    use serde_json::json;

    fn people() -> TableRef {
        TableRef {
            schema: "public".into(),
            table: "people".into(),
            primary_key: "id".into(),
            columns: vec![
                ColumnInfo { name: "id".into(), field_type: FieldType::Int },
                ColumnInfo { name: "name".into(), field_type: FieldType::Str },
                ColumnInfo { name: "active".into(), field_type: FieldType::Bool },
            ],
        }
    }

    const COLS: &str = "\"id\"::int8 AS \"id\", \"name\"::text AS \"name\", \"active\"::bool AS \"active\"";

    #[test]
    fn list_with_conditions_order_and_paging() {
        let query = ListQuery {
            conditions: vec![
                Condition { column: "name".into(), op: FilterOp::ILike, value: json!("%ann%") },
                Condition { column: "active".into(), op: FilterOp::Eq, value: json!(true) },
            ],
            order: vec![SortSpec { column: "name".into(), direction: SortDirection::Desc }],
            offset: Some(2),
            limit: Some(1),
        };
        let q = select_list(&people(), &query);
        assert_eq!(
            q.sql,
            format!(
                "SELECT {} FROM \"public\".\"people\" WHERE \"name\"::text ILIKE $1::text AND \"active\" = $2::bool ORDER BY \"name\" DESC LIMIT 1 OFFSET 2",
                COLS
            )
        );
        assert_eq!(q.params, vec![PgBindValue::Text("%ann%".into()), PgBindValue::Bool(true)]);
    }

    #[test]
    fn list_without_anything_has_no_clauses() {
        let q = select_list(&people(), &ListQuery::default());
        assert_eq!(q.sql, format!("SELECT {} FROM \"public\".\"people\"", COLS));
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_skips_null_key_and_absent_columns() {
        let values = json!({"id": null, "name": "Ann"});
        let q = insert(&people(), values.as_object().unwrap());
        assert_eq!(
            q.sql,
            format!("INSERT INTO \"public\".\"people\" (\"name\") VALUES ($1::text) RETURNING {}", COLS)
        );
        let q = insert(&people(), &Map::new());
        assert!(q.sql.starts_with("INSERT INTO \"public\".\"people\" DEFAULT VALUES"));
    }

    #[test]
    fn update_sets_non_key_columns_and_binds_id_last() {
        let values = json!({"id": 7, "name": "Bo", "active": null});
        let q = update(&people(), 7, values.as_object().unwrap());
        assert_eq!(
            q.sql,
            format!(
                "UPDATE \"public\".\"people\" SET \"name\" = $1::text, \"active\" = $2::bool WHERE \"id\" = $3 RETURNING {}",
                COLS
            )
        );
        assert_eq!(q.params.last(), Some(&PgBindValue::I64(7)));
        assert!(update(&people(), 7, &Map::new()).sql.starts_with("SELECT"));
    }

    #[test]
    fn link_statements() {
        let link = LinkTable {
            schema: "public".into(),
            table: "people_tags".into(),
            source_column: "person_id".into(),
            target_column: "tag_id".into(),
            position_column: "position".into(),
        };
        let q = insert_link(&link, 1, None, 0);
        assert_eq!(q.params[1], PgBindValue::Null);
        assert!(q.sql.contains("$2::int8"));
        let q = select_links(&link, &people(), &[1, 2]);
        assert!(q.sql.contains("LEFT JOIN \"public\".\"people\" t ON t.\"id\" = l.\"tag_id\""));
        assert!(q.sql.contains("IN ($1, $2)"));
        assert!(q.sql.ends_with("ORDER BY l.\"person_id\", l.\"position\""));
    }
}
