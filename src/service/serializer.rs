//! Serializer: a declared attribute schema for one resource, exposed to the argument
//! parser and applied onto records, including to-many relationship resolution.

use crate::args::{ArgParams, ArgParser, Argument, ParsedArgs};
use crate::coerce::{display_value, FieldType};
use crate::config::{LinkTable, ResolvedEntity, ResolvedModel, TableRef};
use crate::error::{AppError, ConfigError};
use crate::record::Record;
use crate::store::Store;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// How populate reacts to values it cannot use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PopulateMode {
    /// Unconvertible plain values become null; unresolved relationship tokens become null links.
    #[default]
    Lenient,
    /// Both cases fail the request with a validation error.
    Strict,
}

/// One request-bindable field: `(name, type, params)`.
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    pub name: String,
    pub field_type: FieldType,
    pub params: Option<ArgParams>,
}

/// How a to-many attribute resolves tokens to rows of another resource.
#[derive(Clone, Debug)]
pub struct RelationshipSpec {
    /// Target resource name.
    pub target: String,
    /// Natural lookup column on the target; identity lookup when absent.
    pub model_field: Option<String>,
    /// Input is a comma-separated string.
    pub split: bool,
    /// Create missing targets keyed by `model_field`.
    pub force_create: bool,
    pub through: LinkTable,
    pub target_table: TableRef,
}

/// Store and model a populate call reads from and writes to.
pub struct PopulateContext<'a> {
    pub store: &'a dyn Store,
    pub model: &'a ResolvedModel,
}

#[derive(Clone, Debug, Default)]
pub struct Serializer {
    attrs: Vec<AttributeSpec>,
    relationships: BTreeMap<String, RelationshipSpec>,
    mode: PopulateMode,
}

fn schema_error(msg: impl Into<String>) -> ConfigError {
    ConfigError::AttributeSchema(msg.into())
}

/// One `[name, type, params]` entry.
fn parse_attribute(index: usize, item: &Value) -> Result<AttributeSpec, ConfigError> {
    let parts = match item {
        Value::Array(parts) if parts.len() == 3 => parts,
        _ => return Err(schema_error(format!("entry {}: expected [name, type, params]", index))),
    };
    let name = match &parts[0] {
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return Err(schema_error(format!("entry {}: name must be a non-empty string", index))),
    };
    let field_type = parts[1]
        .as_str()
        .and_then(FieldType::from_name)
        .ok_or_else(|| schema_error(format!("entry {} ({}): unknown type {}", index, name, parts[1])))?;
    let params = match &parts[2] {
        Value::Null => None,
        Value::Object(_) => Some(
            serde_json::from_value::<ArgParams>(parts[2].clone())
                .map_err(|e| schema_error(format!("entry {} ({}): {}", index, name, e)))?,
        ),
        _ => return Err(schema_error(format!("entry {} ({}): params must be an object or null", index, name))),
    };
    Ok(AttributeSpec {
        name,
        field_type,
        params,
    })
}

fn is_clear_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn split_tokens(s: &str) -> impl Iterator<Item = Value> + '_ {
    s.split(',').map(|t| Value::String(t.trim().to_string()))
}

/// Lookup tokens in input order.
fn tokens(rel: &RelationshipSpec, value: &Value) -> Vec<Value> {
    match (value, rel.split) {
        (Value::Array(items), false) => items.clone(),
        (Value::Array(items), true) => items
            .iter()
            .flat_map(|v| split_tokens(&display_value(v)).collect::<Vec<_>>())
            .collect(),
        (other, true) => split_tokens(&display_value(other)).collect(),
        (other, false) => vec![other.clone()],
    }
}

impl Serializer {
    /// Validate a JSON attribute schema: an array of `[name, type, params]` entries.
    pub fn new(attributes: &Value) -> Result<Self, ConfigError> {
        let Value::Array(items) = attributes else {
            return Err(schema_error("attributes must be an array"));
        };
        let attrs = items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_attribute(i, item))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_specs(attrs)
    }

    pub fn from_specs(attrs: Vec<AttributeSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for a in &attrs {
            if a.name.is_empty() {
                return Err(schema_error("attribute name must be non-empty"));
            }
            if !seen.insert(a.name.as_str()) {
                return Err(schema_error(format!("duplicate attribute '{}'", a.name)));
            }
        }
        Ok(Serializer {
            attrs,
            ..Default::default()
        })
    }

    pub fn with_relationships(mut self, relationships: BTreeMap<String, RelationshipSpec>) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn with_mode(mut self, mode: PopulateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attrs
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn relationships(&self) -> &BTreeMap<String, RelationshipSpec> {
        &self.relationships
    }

    pub fn mode(&self) -> PopulateMode {
        self.mode
    }

    /// Every plain attribute must name a column; every relationship must be a declared
    /// attribute that is not also a column.
    pub fn check_fields(&self, table: &TableRef) -> Result<(), ConfigError> {
        for a in &self.attrs {
            if !self.relationships.contains_key(&a.name) && !table.has_column(&a.name) {
                return Err(ConfigError::MissingReference {
                    kind: "attribute column",
                    id: format!("{}.{}", table.table, a.name),
                });
            }
        }
        for name in self.relationships.keys() {
            if self.attribute(name).is_none() {
                return Err(ConfigError::Validation(format!(
                    "relationship '{}' is not a declared attribute",
                    name
                )));
            }
            if table.has_column(name) {
                return Err(ConfigError::Validation(format!(
                    "relationship '{}' collides with a column of {}",
                    name, table.table
                )));
            }
        }
        Ok(())
    }

    /// Register every attribute with the parser.
    pub fn expose_to(&self, parser: &mut ArgParser) {
        for a in &self.attrs {
            parser.add_argument(Argument::new(a.name.clone(), a.field_type).with_params(a.params.clone().unwrap_or_default()));
        }
    }

    /// Apply parsed arguments onto `record`. With `partial`, keys the caller did not submit are left alone.
    pub async fn populate(
        &self,
        ctx: &PopulateContext<'_>,
        record: &mut Record,
        args: &ParsedArgs,
        partial: bool,
    ) -> Result<(), AppError> {
        for (key, value) in args.iter() {
            let Some(attr) = self.attribute(key) else { continue };
            if partial && !args.was_submitted(key) {
                continue;
            }
            if let Some(rel) = self.relationships.get(key) {
                self.populate_relationship(ctx, record, key, rel, value).await?;
                continue;
            }
            if value.is_null() {
                record.set(key, Value::Null);
                continue;
            }
            match attr.field_type.coerce(value) {
                Ok(v) => record.set(key, v),
                Err(e) if self.mode == PopulateMode::Strict => {
                    return Err(AppError::Validation(format!("{}: {}", key, e)));
                }
                Err(e) => {
                    tracing::debug!(attribute = %key, error = %e, "coercion failed, storing null");
                    record.set(key, Value::Null);
                }
            }
        }
        Ok(())
    }

    async fn populate_relationship(
        &self,
        ctx: &PopulateContext<'_>,
        record: &mut Record,
        key: &str,
        rel: &RelationshipSpec,
        value: &Value,
    ) -> Result<(), AppError> {
        record.clear_relation(key);
        if is_clear_value(value) {
            return Ok(());
        }
        let target = ctx.model.entity(&rel.target).ok_or_else(|| ConfigError::MissingReference {
            kind: "resource",
            id: rel.target.clone(),
        })?;
        for token in tokens(rel, value) {
            let related = resolve_token(ctx, target, rel, &token).await?;
            if related.is_none() {
                if self.mode == PopulateMode::Strict {
                    return Err(AppError::Validation(format!(
                        "{}: no {} matches '{}'",
                        key,
                        rel.target,
                        display_value(&token)
                    )));
                }
                tracing::warn!(relationship = %key, token = %display_value(&token), "unresolved token linked as null");
            }
            record.push_relation(key, related);
        }
        Ok(())
    }
}

/// Find the target row for one token, creating it when `force_create` allows.
/// A created row is committed before returning so later tokens can find it.
async fn resolve_token(
    ctx: &PopulateContext<'_>,
    target: &ResolvedEntity,
    rel: &RelationshipSpec,
    token: &Value,
) -> Result<Option<Record>, AppError> {
    let Some(field) = rel.model_field.as_deref() else {
        return match FieldType::Int.coerce(token).ok().and_then(|v| v.as_i64()) {
            Some(id) => ctx.store.fetch_by_id(target, id).await,
            None => Ok(None),
        };
    };
    let field_type = target.table.column(field).map(|c| c.field_type).unwrap_or(FieldType::Str);
    let Ok(key) = field_type.coerce(token) else { return Ok(None) };
    if let Some(found) = ctx.store.fetch_first_by(target, field, &key).await? {
        return Ok(Some(found));
    }
    if !rel.force_create {
        return Ok(None);
    }
    let mut created = Record::new();
    created.set(field, key);
    ctx.store.save(target, &mut created).await?;
    tracing::info!(resource = %target.name, field = %field, id = ?created.id(&target.table.primary_key), "created related row");
    Ok(Some(created))
}
