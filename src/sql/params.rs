//! Convert serde_json::Value to values sqlx can bind, and decode rows back to JSON.

use crate::coerce::FieldType;
use crate::config::TableRef;
use crate::error::AppError;
use crate::record::Record;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::Row;

/// A value that can be bound to a PostgreSQL query. Placeholders in generated SQL carry
/// a cast to the column type, so datetime and uuid values travel as text.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Text(v.to_string()),
        }
    }
}

/// Bind params in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [PgBindValue],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            PgBindValue::Null => query.bind(None::<String>),
            PgBindValue::Bool(b) => query.bind(*b),
            PgBindValue::I64(n) => query.bind(*n),
            PgBindValue::F64(n) => query.bind(*n),
            PgBindValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Decode one cell by its declared type. Select lists cast every column to the type's
/// canonical PostgreSQL type, so each decode is exact.
pub fn cell_to_value(row: &PgRow, name: &str, field_type: FieldType) -> Result<Value, AppError> {
    Ok(match field_type {
        FieldType::Int => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        FieldType::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        FieldType::Str => row.try_get::<Option<String>, _>(name)?.map(Value::String),
        FieldType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        FieldType::Datetime => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339())),
        FieldType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string())),
    }
    .unwrap_or(Value::Null))
}

pub fn row_to_record(row: &PgRow, table: &TableRef) -> Result<Record, AppError> {
    let mut values = Map::new();
    for c in &table.columns {
        values.insert(c.name.clone(), cell_to_value(row, &c.name, c.field_type)?);
    }
    Ok(Record::from_values(values))
}
