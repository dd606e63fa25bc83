//! In-memory entity instance: column values plus to-many relationship collections.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    /// Column values keyed by column name.
    pub values: Map<String, Value>,
    /// Relationship collections; `None` entries are links that resolved to nothing.
    relations: BTreeMap<String, Vec<Option<Record>>>,
    /// Relationships replaced since the record was loaded.
    touched: BTreeSet<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Map<String, Value>) -> Self {
        Record {
            values,
            ..Self::default()
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }

    /// Integer identity under `primary_key`, if assigned.
    pub fn id(&self, primary_key: &str) -> Option<i64> {
        self.values.get(primary_key).and_then(Value::as_i64)
    }

    pub fn relation(&self, name: &str) -> &[Option<Record>] {
        self.relations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Empties a relationship collection and marks it for rewrite on save.
    pub fn clear_relation(&mut self, name: &str) {
        self.relations.insert(name.to_string(), Vec::new());
        self.touched.insert(name.to_string());
    }

    pub fn push_relation(&mut self, name: &str, related: Option<Record>) {
        self.relations.entry(name.to_string()).or_default().push(related);
        self.touched.insert(name.to_string());
    }

    /// Used by stores when materialising a loaded record.
    pub fn load_relation(&mut self, name: &str, related: Vec<Option<Record>>) {
        self.relations.insert(name.to_string(), related);
    }

    pub fn touched_relations(&self) -> impl Iterator<Item = &str> {
        self.touched.iter().map(String::as_str)
    }

    pub fn mark_clean(&mut self) {
        self.touched.clear();
    }

    /// Response payload: columns, then each relationship as an array of related
    /// column objects (null for unresolved links).
    pub fn to_json(&self) -> Value {
        let mut out = self.values.clone();
        for (name, related) in &self.relations {
            let items = related
                .iter()
                .map(|r| r.as_ref().map(|r| Value::Object(r.values.clone())).unwrap_or(Value::Null))
                .collect();
            out.insert(name.clone(), Value::Array(items));
        }
        Value::Object(out)
    }
}
