//! Config validation: identifiers, referential integrity and filter/sort consistency.
//! Attribute schemas are validated by the serializer when the model is resolved.

use crate::config::{FilterOp, ModelConfig, ResourceConfig, EXPR_SLOT};
use crate::coerce::FieldType;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Path segments taken by the common routes.
pub const RESERVED_PATH_SEGMENTS: [&str; 3] = ["health", "ready", "version"];

struct Identifiers(Regex);

impl Identifiers {
    fn new() -> Result<Self, ConfigError> {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map(Identifiers)
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    fn check(&self, s: &str) -> Result<(), ConfigError> {
        if self.0.is_match(s) {
            Ok(())
        } else {
            Err(ConfigError::InvalidIdentifier(s.to_string()))
        }
    }
}

pub fn validate(config: &ModelConfig) -> Result<(), ConfigError> {
    let ident = Identifiers::new()?;
    if let Some(schema) = &config.default_schema {
        ident.check(schema)?;
    }

    let mut names = HashSet::new();
    let mut path_segments = HashSet::new();
    for r in &config.resources {
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicateResource(r.name.clone()));
        }
        if r.path_segment.is_empty() || r.path_segment.contains('/') {
            return Err(ConfigError::Validation(format!(
                "resource {}: invalid path segment '{}'",
                r.name, r.path_segment
            )));
        }
        if RESERVED_PATH_SEGMENTS.contains(&r.path_segment.as_str()) {
            return Err(ConfigError::Validation(format!(
                "resource {}: path segment '{}' is reserved",
                r.name, r.path_segment
            )));
        }
        if !path_segments.insert(r.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(r.path_segment.clone()));
        }
    }

    let by_name: HashMap<&str, &ResourceConfig> = config.resources.iter().map(|r| (r.name.as_str(), r)).collect();
    for r in &config.resources {
        validate_resource(&ident, r, &by_name)?;
    }
    Ok(())
}

fn validate_resource(
    ident: &Identifiers,
    r: &ResourceConfig,
    by_name: &HashMap<&str, &ResourceConfig>,
) -> Result<(), ConfigError> {
    if let Some(schema) = &r.schema {
        ident.check(schema)?;
    }
    ident.check(&r.table)?;

    let mut columns: HashMap<&str, FieldType> = HashMap::new();
    for c in &r.columns {
        ident.check(&c.name)?;
        if columns.insert(c.name.as_str(), c.type_).is_some() {
            return Err(ConfigError::Validation(format!(
                "resource {}: duplicate column '{}'",
                r.name, c.name
            )));
        }
    }
    if columns.get(r.primary_key.as_str()) != Some(&FieldType::Int) {
        return Err(ConfigError::InvalidPrimaryKey {
            resource: r.name.clone(),
            column: r.primary_key.clone(),
        });
    }

    for f in &r.filters {
        if !columns.contains_key(f.column.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "filter column",
                id: format!("{}.{}", r.name, f.column),
            });
        }
        if let Some(kind) = &f.kind {
            if FilterOp::from_name(kind).is_none() {
                return Err(ConfigError::Validation(format!(
                    "resource {}: unknown filter kind '{}'",
                    r.name, kind
                )));
            }
        }
        if let Some(expr) = &f.expr {
            if expr.matches(EXPR_SLOT).count() != 1 {
                return Err(ConfigError::Validation(format!(
                    "resource {}: filter expression '{}' must contain exactly one {}",
                    r.name, expr, EXPR_SLOT
                )));
            }
        }
    }

    for token in &r.default_order {
        let column = token.split(',').next().unwrap_or_default().trim();
        if !columns.contains_key(column) {
            return Err(ConfigError::MissingReference {
                kind: "sort column",
                id: format!("{}.{}", r.name, column),
            });
        }
    }

    for (name, rel) in &r.relationships {
        let target = by_name.get(rel.model.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "resource",
            id: rel.model.clone(),
        })?;
        if let Some(field) = &rel.model_field {
            if !target.columns.iter().any(|c| c.name == *field) {
                return Err(ConfigError::MissingReference {
                    kind: "relationship model_field",
                    id: format!("{}.{}", rel.model, field),
                });
            }
        }
        if rel.force_create && rel.model_field.is_none() {
            tracing::warn!(resource = %r.name, relationship = %name, "force_create has no effect without model_field");
        }
        if let Some(schema) = &rel.through.schema {
            ident.check(schema)?;
        }
        ident.check(&rel.through.table)?;
        ident.check(&rel.through.source_column)?;
        ident.check(&rel.through.target_column)?;
        ident.check(&rel.through.position_column)?;
    }
    Ok(())
}
