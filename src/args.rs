//! Request-argument parsing: named, typed arguments read from the JSON body and the query string.

use crate::coerce::FieldType;
use crate::error::AppError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Keep the first value found.
    #[default]
    Store,
    /// Collect every value found (repeated query keys, JSON arrays).
    Append,
}

/// Per-argument parser options, the `params` element of an attribute declaration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgParams {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub help: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Argument {
    pub name: String,
    pub field_type: FieldType,
    pub params: ArgParams,
}

impl Argument {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Argument {
            name: name.into(),
            field_type,
            params: ArgParams::default(),
        }
    }

    pub fn with_params(mut self, params: ArgParams) -> Self {
        self.params = params;
        self
    }

    pub fn default_value(mut self, v: Value) -> Self {
        self.params.default = Some(v);
        self
    }

    pub fn append(mut self) -> Self {
        self.params.action = Action::Append;
        self
    }

    fn failure(&self, detail: String) -> AppError {
        let msg = self.params.help.clone().unwrap_or(detail);
        AppError::BadRequest(format!("{}: {}", self.name, msg))
    }

    fn parse(&self, query: &[(String, String)], body: Option<&Map<String, Value>>) -> Result<Value, AppError> {
        let mut found = Vec::new();
        if let Some(v) = body.and_then(|b| b.get(&self.name)) {
            match (self.params.action, v) {
                (Action::Append, Value::Array(items)) => found.extend(items.iter().cloned()),
                _ => found.push(v.clone()),
            }
        }
        found.extend(
            query
                .iter()
                .filter(|(k, _)| *k == self.name)
                .map(|(_, raw)| Value::String(raw.clone())),
        );

        if found.is_empty() {
            if self.params.required {
                return Err(self.failure("Missing required parameter in the JSON body or the query string".into()));
            }
            return Ok(self.params.default.clone().unwrap_or(Value::Null));
        }

        let mut coerced = Vec::with_capacity(found.len());
        for v in &found {
            if v.is_null() {
                coerced.push(Value::Null);
                continue;
            }
            let c = self.field_type.coerce(v).map_err(|e| self.failure(e.to_string()))?;
            if let Some(choices) = &self.params.choices {
                if !choices.contains(&c) {
                    return Err(self.failure(format!("{} is not a valid choice", c)));
                }
            }
            coerced.push(c);
        }

        Ok(match self.params.action {
            Action::Append => Value::Array(coerced),
            Action::Store => coerced.swap_remove(0),
        })
    }
}

/// Ordered set of argument declarations.
#[derive(Clone, Debug, Default)]
pub struct ArgParser {
    args: Vec<Argument>,
}

impl ArgParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an argument; a later registration with the same name replaces the earlier one.
    pub fn add_argument(&mut self, arg: Argument) -> &mut Self {
        if let Some(existing) = self.args.iter_mut().find(|a| a.name == arg.name) {
            *existing = arg;
        } else {
            self.args.push(arg);
        }
        self
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.args
    }

    /// Parse every registered argument. JSON body values take precedence over query values
    /// for `store` arguments; `append` arguments collect both.
    pub fn parse(&self, query: &[(String, String)], body: Option<&Map<String, Value>>) -> Result<ParsedArgs, AppError> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push((arg.name.clone(), arg.parse(query, body)?));
        }
        let mut submitted: HashSet<String> = query.iter().map(|(k, _)| k.clone()).collect();
        if let Some(b) = body {
            submitted.extend(b.keys().cloned());
        }
        Ok(ParsedArgs { values, submitted })
    }
}

/// Parser output: every registered argument with its coerced value (or default / null),
/// plus the set of keys the caller actually sent.
#[derive(Clone, Debug, Default)]
pub struct ParsedArgs {
    values: Vec<(String, Value)>,
    submitted: HashSet<String>,
}

impl ParsedArgs {
    pub fn from_parts(values: Vec<(String, Value)>, submitted: HashSet<String>) -> Self {
        ParsedArgs { values, submitted }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn was_submitted(&self, name: &str) -> bool {
        self.submitted.contains(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// String values of an `append` argument; empty when absent.
    pub fn get_strings(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn body_wins_over_query_for_store() {
        let mut p = ArgParser::new();
        p.add_argument(Argument::new("age", FieldType::Int));
        let body = json!({"age": 9});
        let parsed = p.parse(&q(&[("age", "3")]), body.as_object()).unwrap();
        assert_eq!(parsed.get_i64("age"), Some(9));
        assert!(parsed.was_submitted("age"));
    }

    #[test]
    fn missing_uses_default_or_null() {
        let mut p = ArgParser::new();
        p.add_argument(Argument::new("_partial", FieldType::Bool).default_value(json!(true)));
        p.add_argument(Argument::new("name", FieldType::Str));
        let parsed = p.parse(&[], None).unwrap();
        assert_eq!(parsed.get_bool("_partial"), Some(true));
        assert_eq!(parsed.get("name"), Some(&Value::Null));
        assert!(!parsed.was_submitted("name"));
    }

    #[test]
    fn append_collects_repeats() {
        let mut p = ArgParser::new();
        p.add_argument(Argument::new("_sorted", FieldType::Str).append());
        let parsed = p.parse(&q(&[("_sorted", "name,desc"), ("_sorted", "id")]), None).unwrap();
        assert_eq!(parsed.get_strings("_sorted"), vec!["name,desc", "id"]);
    }

    #[test]
    fn required_and_bad_values_are_bad_requests() {
        let mut p = ArgParser::new();
        p.add_argument(Argument::new("name", FieldType::Str).with_params(ArgParams {
            required: true,
            ..Default::default()
        }));
        assert!(matches!(p.parse(&[], None), Err(AppError::BadRequest(_))));

        let mut p = ArgParser::new();
        p.add_argument(Argument::new("_limit", FieldType::Int).with_params(ArgParams {
            help: Some("must be an integer".into()),
            ..Default::default()
        }));
        match p.parse(&q(&[("_limit", "ten")]), None) {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "_limit: must be an integer"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn choices_are_enforced() {
        let mut p = ArgParser::new();
        p.add_argument(Argument::new("color", FieldType::Str).with_params(ArgParams {
            choices: Some(vec![json!("red"), json!("blue")]),
            ..Default::default()
        }));
        assert!(p.parse(&q(&[("color", "red")]), None).is_ok());
        assert!(p.parse(&q(&[("color", "green")]), None).is_err());
    }

    #[test]
    fn unknown_params_are_rejected() {
        let err = serde_json::from_value::<ArgParams>(json!({"requried": true}));
        assert!(err.is_err());
    }
}
