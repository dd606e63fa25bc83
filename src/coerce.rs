//! Primitive field types and the coercion rules applied to request values.
//!
//! Three distinct paths exist and they intentionally differ:
//! - [`FieldType::coerce`] converts an already-parsed JSON value when populating a record.
//! - [`FieldType::parse_raw`] converts a raw query-string value for the argument parser.
//! - [`FieldType::coerce_filter`] converts a raw filter value; booleans follow the `"0"` rule.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    Str,
    Bool,
    Datetime,
    Uuid,
}

/// A value could not be converted to the requested type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoercionError {
    pub expected: &'static str,
    pub found: String,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {}", self.found, self.expected)
    }
}

impl std::error::Error for CoercionError {}

impl FieldType {
    pub fn from_name(name: &str) -> Option<FieldType> {
        Some(match name {
            "int" | "integer" => FieldType::Int,
            "float" => FieldType::Float,
            "str" | "string" => FieldType::Str,
            "bool" | "boolean" => FieldType::Bool,
            "datetime" => FieldType::Datetime,
            "uuid" => FieldType::Uuid,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Str => "str",
            FieldType::Bool => "bool",
            FieldType::Datetime => "datetime",
            FieldType::Uuid => "uuid",
        }
    }

    /// PostgreSQL type used for casts in generated SQL.
    pub fn pg_type(self) -> &'static str {
        match self {
            FieldType::Int => "int8",
            FieldType::Float => "float8",
            FieldType::Str => "text",
            FieldType::Bool => "bool",
            FieldType::Datetime => "timestamptz",
            FieldType::Uuid => "uuid",
        }
    }

    fn error(self, found: &Value) -> CoercionError {
        CoercionError {
            expected: self.name(),
            found: match found {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Convert a JSON value to this type's canonical JSON representation.
    /// Null never coerces; callers decide what a failure means.
    pub fn coerce(self, v: &Value) -> Result<Value, CoercionError> {
        match (self, v) {
            (_, Value::Null) => Err(self.error(v)),
            (FieldType::Int, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite())
                        .map(|f| Value::from(f.trunc() as i64))
                        .ok_or_else(|| self.error(v))
                }
            }
            (FieldType::Int, Value::Bool(b)) => Ok(Value::from(*b as i64)),
            (FieldType::Int, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| self.error(v)),
            (FieldType::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| self.error(v)),
            (FieldType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| self.error(v)),
            (FieldType::Str, Value::String(s)) => Ok(Value::String(s.clone())),
            (FieldType::Str, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (FieldType::Str, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (FieldType::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (FieldType::Bool, Value::Number(n)) => Ok(Value::Bool(n.as_f64() != Some(0.0))),
            (FieldType::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool).ok_or_else(|| self.error(v)),
            (FieldType::Datetime, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(|d| Value::String(d.with_timezone(&chrono::Utc).to_rfc3339()))
                .map_err(|_| self.error(v)),
            (FieldType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s.trim())
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| self.error(v)),
            _ => Err(self.error(v)),
        }
    }

    /// Parse a raw query-string value.
    pub fn parse_raw(self, raw: &str) -> Result<Value, CoercionError> {
        self.coerce(&Value::String(raw.to_string()))
    }

    /// Coerce a raw filter value. For `bool` only the literal `"0"` is false; any other
    /// non-empty string is true, so `"false"` filters on `true`.
    pub fn coerce_filter(self, raw: &str) -> Result<Value, CoercionError> {
        match self {
            FieldType::Bool => Ok(Value::Bool(raw != "0")),
            _ => self.parse_raw(raw),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Render a coerced value for substitution into a filter expression.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_bool_only_zero_is_false() {
        assert_eq!(FieldType::Bool.coerce_filter("0").unwrap(), json!(false));
        assert_eq!(FieldType::Bool.coerce_filter("1").unwrap(), json!(true));
        assert_eq!(FieldType::Bool.coerce_filter("false").unwrap(), json!(true));
        assert_eq!(FieldType::Bool.coerce_filter("no").unwrap(), json!(true));
    }

    #[test]
    fn int_coercion() {
        assert_eq!(FieldType::Int.coerce(&json!(" 42 ")).unwrap(), json!(42));
        assert_eq!(FieldType::Int.coerce(&json!(3.9)).unwrap(), json!(3));
        assert!(FieldType::Int.coerce(&json!("abc")).is_err());
        assert!(FieldType::Int.coerce(&Value::Null).is_err());
    }

    #[test]
    fn str_coercion_stringifies_scalars() {
        assert_eq!(FieldType::Str.coerce(&json!(7)).unwrap(), json!("7"));
        assert!(FieldType::Str.coerce(&json!(["a"])).is_err());
    }

    #[test]
    fn datetime_and_uuid_normalise() {
        let v = FieldType::Datetime.coerce(&json!("2024-01-02T03:04:05+02:00")).unwrap();
        assert_eq!(v, json!("2024-01-02T01:04:05+00:00"));
        let u = FieldType::Uuid.coerce(&json!("67E55044-10B1-426F-9247-BB680E5FE0C8")).unwrap();
        assert_eq!(u, json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
    }

    #[test]
    fn names_round_trip() {
        for t in [FieldType::Int, FieldType::Float, FieldType::Str, FieldType::Bool, FieldType::Datetime, FieldType::Uuid] {
            assert_eq!(FieldType::from_name(t.name()), Some(t));
        }
        assert_eq!(FieldType::from_name("list"), None);
    }
}
