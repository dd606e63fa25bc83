//! Raw config types matching the JSON model file.

use crate::coerce::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
}

/// One filter declaration: `column`, value `type`, optional operator `kind` and template `expr`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    pub column: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub expr: Option<String>,
}

/// Association table backing a to-many relationship.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThroughConfig {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub source_column: String,
    pub target_column: String,
    #[serde(default = "default_position_column")]
    pub position_column: String,
}

fn default_position_column() -> String {
    "position".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    /// Name of the target resource.
    pub model: String,
    #[serde(default)]
    pub model_field: Option<String>,
    /// Presence alone enables splitting, whatever the value.
    #[serde(default)]
    pub split: Option<serde_json::Value>,
    #[serde(default)]
    pub force_create: bool,
    pub through: ThroughConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub path_segment: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    /// Attribute schema: array of `[name, type, params]`. Validated when the model is resolved.
    #[serde(default = "empty_array")]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    /// Sort tokens (`column` or `column,direction`) used when a request has no `_sorted`.
    #[serde(default)]
    pub default_order: Vec<String>,
    #[serde(default)]
    pub strict: bool,
}

fn default_primary_key() -> String {
    "id".into()
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

/// Whole model file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub default_schema: Option<String>,
    pub resources: Vec<ResourceConfig>,
}
