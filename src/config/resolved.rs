//! Resolved entity model: config validated and flattened for runtime use.

use crate::coerce::FieldType;
use crate::service::{RelationshipSpec, Serializer};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub field_type: FieldType,
}

/// Physical table plus its column registry. Field access by name goes through here.
#[derive(Clone, Debug)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableRef {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Key used by stores that address tables by name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Association table for a to-many relationship.
#[derive(Clone, Debug)]
pub struct LinkTable {
    pub schema: String,
    pub table: String,
    pub source_column: String,
    pub target_column: String,
    pub position_column: String,
}

impl LinkTable {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Comparison or pattern operator a filter applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
    NotLike,
    NotILike,
}

impl FilterOp {
    pub fn from_name(name: &str) -> Option<FilterOp> {
        Some(match name {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "lt" => FilterOp::Lt,
            "le" => FilterOp::Le,
            "gt" => FilterOp::Gt,
            "ge" => FilterOp::Ge,
            "like" => FilterOp::Like,
            "ilike" => FilterOp::ILike,
            "notlike" => FilterOp::NotLike,
            "notilike" => FilterOp::NotILike,
            _ => return None,
        })
    }

    pub fn is_pattern(self) -> bool {
        matches!(self, FilterOp::Like | FilterOp::ILike | FilterOp::NotLike | FilterOp::NotILike)
    }

    pub fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Like => "LIKE",
            FilterOp::ILike => "ILIKE",
            FilterOp::NotLike => "NOT LIKE",
            FilterOp::NotILike => "NOT ILIKE",
        }
    }
}

/// Placeholder filled by the coerced filter value in a filter expression.
pub const EXPR_SLOT: &str = "{}";

#[derive(Clone, Debug)]
pub struct FilterSpec {
    pub column: String,
    pub value_type: FieldType,
    /// Operator and template; both present or the filter is plain equality.
    pub operator: Option<(FilterOp, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parse `column` or `column,direction` against a table's columns.
    pub fn parse(token: &str, table: &TableRef) -> Result<SortSpec, String> {
        let mut parts = token.split(',');
        let column = parts.next().unwrap_or_default().trim();
        let direction = match parts.next().map(str::trim) {
            None => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(d) => return Err(format!("unknown sort direction '{}' in '{}'", d, token)),
        };
        if !table.has_column(column) {
            return Err(format!("unknown sort column '{}'", column));
        }
        Ok(SortSpec {
            column: column.to_string(),
            direction,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub path_segment: String,
    pub table: TableRef,
    pub filters: Vec<FilterSpec>,
    pub default_order: Vec<SortSpec>,
    pub serializer: Serializer,
}

impl ResolvedEntity {
    pub fn relationships(&self) -> &BTreeMap<String, RelationshipSpec> {
        self.serializer.relationships()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
    pub entity_by_name: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }

    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entity_by_name.get(name)
    }
}
