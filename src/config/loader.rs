//! Load the JSON model file and resolve it into runtime entity descriptors.

use crate::config::resolved::{ColumnInfo, FilterSpec, LinkTable, ResolvedEntity, ResolvedModel, SortSpec, TableRef};
use crate::config::types::*;
use crate::config::{validate, FilterOp};
use crate::error::ConfigError;
use crate::service::{PopulateMode, RelationshipSpec, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const DEFAULT_SCHEMA: &str = "public";

/// Build resolved model from config (validates first).
pub fn resolve(config: &ModelConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_schema = config.default_schema.as_deref().unwrap_or(DEFAULT_SCHEMA);

    let tables: HashMap<&str, TableRef> = config
        .resources
        .iter()
        .map(|r| (r.name.as_str(), table_ref(r, default_schema)))
        .collect();

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();
    let mut entity_by_name = HashMap::new();

    for r in &config.resources {
        let table = tables[r.name.as_str()].clone();

        let filters = r
            .filters
            .iter()
            .map(|f| FilterSpec {
                column: f.column.clone(),
                value_type: f.type_,
                operator: match (f.kind.as_deref().and_then(FilterOp::from_name), &f.expr) {
                    (Some(op), Some(expr)) => Some((op, expr.clone())),
                    _ => None,
                },
            })
            .collect();

        let default_order = r
            .default_order
            .iter()
            .map(|t| SortSpec::parse(t, &table).map_err(|e| ConfigError::Validation(format!("resource {}: {}", r.name, e))))
            .collect::<Result<Vec<_>, _>>()?;

        let mut relationships = BTreeMap::new();
        for (name, rel) in &r.relationships {
            let target_table = tables
                .get(rel.model.as_str())
                .cloned()
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "resource",
                    id: rel.model.clone(),
                })?;
            relationships.insert(
                name.clone(),
                RelationshipSpec {
                    target: rel.model.clone(),
                    model_field: rel.model_field.clone(),
                    split: rel.split.is_some(),
                    force_create: rel.force_create,
                    through: LinkTable {
                        schema: rel.through.schema.clone().unwrap_or_else(|| default_schema.to_string()),
                        table: rel.through.table.clone(),
                        source_column: rel.through.source_column.clone(),
                        target_column: rel.through.target_column.clone(),
                        position_column: rel.through.position_column.clone(),
                    },
                    target_table,
                },
            );
        }

        let mode = if r.strict { PopulateMode::Strict } else { PopulateMode::Lenient };
        let serializer = Serializer::new(&r.attributes)
            .map_err(|e| match e {
                ConfigError::AttributeSchema(m) => ConfigError::AttributeSchema(format!("resource {}: {}", r.name, m)),
                other => other,
            })?
            .with_relationships(relationships)
            .with_mode(mode);
        serializer.check_fields(&table)?;

        let entity = ResolvedEntity {
            name: r.name.clone(),
            path_segment: r.path_segment.clone(),
            table,
            filters,
            default_order,
            serializer,
        };
        entity_by_path.insert(entity.path_segment.clone(), entity.clone());
        entity_by_name.insert(entity.name.clone(), entity.clone());
        entities.push(entity);
    }

    tracing::debug!(count = entities.len(), "model resolved");
    Ok(ResolvedModel {
        entities,
        entity_by_path,
        entity_by_name,
    })
}

fn table_ref(r: &ResourceConfig, default_schema: &str) -> TableRef {
    TableRef {
        schema: r.schema.clone().unwrap_or_else(|| default_schema.to_string()),
        table: r.table.clone(),
        primary_key: r.primary_key.clone(),
        columns: r
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                field_type: c.type_,
            })
            .collect(),
    }
}

pub fn from_json_str(s: &str) -> Result<ModelConfig, ConfigError> {
    serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and parse the model file.
pub async fn load_from_path(path: &Path) -> Result<ModelConfig, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json_str(&text)
}
