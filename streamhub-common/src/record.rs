use crate::{Result, StreamHubError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// flat key -> value record as it arrives from the source stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(s)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(StreamHubError::InvalidRecord(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// text view of a scalar field; numbers and booleans are rendered as text
    pub fn get_str(&self, field: &str) -> Result<Cow<'_, str>> {
        match self.fields.get(field) {
            Some(Value::String(s)) => Ok(Cow::Borrowed(s.as_str())),
            Some(Value::Number(n)) => Ok(Cow::Owned(n.to_string())),
            Some(Value::Bool(b)) => Ok(Cow::Owned(b.to_string())),
            Some(other) => Err(StreamHubError::field_type(
                field,
                format!("expected a scalar, got {}", kind_of(other)),
            )),
            None => Err(StreamHubError::field_type(field, "missing from record")),
        }
    }

    /// numeric view of a field; strings are accepted when they parse as a float
    pub fn get_f64(&self, field: &str) -> Result<f64> {
        match self.fields.get(field) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| StreamHubError::field_type(field, "number out of range")),
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                StreamHubError::field_type(field, format!("'{s}' is not a number"))
            }),
            Some(other) => Err(StreamHubError::field_type(
                field,
                format!("expected a number, got {}", kind_of(other)),
            )),
            None => Err(StreamHubError::field_type(field, "missing from record")),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
