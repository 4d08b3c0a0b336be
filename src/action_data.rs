//! Action form values.
//!
//! Each field keeps the raw text the user typed plus the declared ABI type;
//! `parse_field` turns that pair into a typed value with fixed rules per
//! type instead of sniffing the text.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::types::{AbiField, ActionSchema};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(Number),
    Bool(bool),
    Structured(Value),
    Text(String),
}

impl FieldValue {
    pub fn into_json(self) -> Value {
        match self {
            FieldValue::Number(n) => Value::Number(n),
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Structured(v) => v,
            FieldValue::Text(s) => Value::String(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionFieldValue {
    pub name: String,
    pub declared_type: String,
    pub raw_value: String,
}

impl ActionFieldValue {
    pub fn parse(&self) -> FieldValue {
        parse_field(&self.declared_type, &self.raw_value)
    }
}

fn is_numeric_type(declared: &str) -> bool {
    declared.starts_with("uint")
        || declared.starts_with("int")
        || declared == "float32"
        || declared == "float64"
}

fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    // An empty numeric field submits as zero.
    if trimmed.is_empty() {
        return Some(Number::from(0));
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = trimmed.parse::<u64>() {
        return Some(Number::from(n));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}

/// `uint*`/`int*`/`float32`/`float64` become numbers when they parse,
/// `bool` is true for `"true"` or `"1"`, text opening with `[` or `{` is
/// JSON when it parses, everything else stays text.
pub fn parse_field(declared_type: &str, raw: &str) -> FieldValue {
    let declared = declared_type.trim();
    if is_numeric_type(declared) {
        return match parse_number(raw) {
            Some(n) => FieldValue::Number(n),
            None => FieldValue::Text(raw.to_string()),
        };
    }
    if declared == "bool" {
        return FieldValue::Bool(raw == "true" || raw == "1");
    }
    if raw.starts_with('[') || raw.starts_with('{') {
        if let Ok(v) = serde_json::from_str::<Value>(raw) {
            return FieldValue::Structured(v);
        }
    }
    FieldValue::Text(raw.to_string())
}

/// Form state for one action schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionForm {
    pub account: String,
    pub action: String,
    pub fields: Vec<ActionFieldValue>,
}

impl ActionForm {
    /// Fields start empty unless the schema carries initial values (from a
    /// `field_<name>` link parameter).
    pub fn from_schema(schema: &ActionSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|AbiField { name, type_name }| ActionFieldValue {
                name: name.clone(),
                declared_type: type_name.clone(),
                raw_value: schema.initial_values.get(name).cloned().unwrap_or_default(),
            })
            .collect();
        Self {
            account: schema.account_name.clone(),
            action: schema.action_name.clone(),
            fields,
        }
    }

    /// Sets a field's raw text. Unknown names are ignored.
    pub fn set(&mut self, name: &str, raw: impl Into<String>) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.raw_value = raw.into();
                true
            }
            None => false,
        }
    }

    pub fn raw_values(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.raw_value.clone()))
            .collect()
    }

    /// Action `data` object in field declaration order.
    pub fn data(&self) -> Value {
        let mut map = Map::new();
        for field in &self.fields {
            map.insert(field.name.clone(), field.parse().into_json());
        }
        Value::Object(map)
    }

    /// `cleos push action` preview. `signer` is `(actor, permission)`.
    pub fn cleos_command(&self, endpoint: Option<&str>, signer: Option<(&str, &str)>) -> String {
        let url = endpoint
            .filter(|e| !e.is_empty())
            .map(|e| format!(" -u {e}"))
            .unwrap_or_default();
        let perm = match signer {
            Some((actor, permission)) if !actor.is_empty() => {
                let permission = if permission.is_empty() { "active" } else { permission };
                format!("{actor}@{permission}")
            }
            _ => "<account>@active".to_string(),
        };
        format!(
            "cleos{url} push action {} {} '{}' -p {perm}",
            self.account,
            self.action,
            self.data()
        )
    }
}
