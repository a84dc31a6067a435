use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Typed field values. Business records arrive as loosely typed JSON, but the
/// detector needs to know which fields are numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON value. Nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    /// Missing means absent, JSON null, or a NaN float.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value. Text is parsed; booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Boolean(_) | FieldValue::Null => None,
        }
    }

    /// Extract as string, returning None for Null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// One structured business record: field name -> value, in source order.
pub type Record = IndexMap<String, FieldValue>;

/// What a caller hands to the detector: one record or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionInput {
    Record(Record),
    Table(Vec<Record>),
}

impl DetectionInput {
    /// Build input from arbitrary JSON.
    ///
    /// Objects become a single record, arrays of objects become a table.
    /// Anything else is rejected with [`CoreError::UnsupportedInput`].
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(DetectionInput::Record(record_from_map(&map))),
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(map) => rows.push(record_from_map(map)),
                        other => {
                            return Err(CoreError::UnsupportedInput(format!(
                                "row {} is {}, expected an object",
                                i,
                                json_kind(other)
                            )))
                        }
                    }
                }
                Ok(DetectionInput::Table(rows))
            }
            other => Err(CoreError::UnsupportedInput(format!(
                "expected an object or an array of objects, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Canonical JSON form. Field names are sorted, so two records that
    /// differ only in field order produce the same value.
    pub fn to_json(&self) -> Value {
        match self {
            DetectionInput::Record(r) => record_to_json(r),
            DetectionInput::Table(rows) => Value::Array(rows.iter().map(record_to_json).collect()),
        }
    }

    /// Normalize to rows; a single record is a one-row table.
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            DetectionInput::Record(r) => vec![r],
            DetectionInput::Table(rows) => rows,
        }
    }
}

impl From<Record> for DetectionInput {
    fn from(r: Record) -> Self {
        DetectionInput::Record(r)
    }
}

impl From<Vec<Record>> for DetectionInput {
    fn from(rows: Vec<Record>) -> Self {
        DetectionInput::Table(rows)
    }
}

fn record_to_json(record: &Record) -> Value {
    let mut fields: Vec<(&String, &FieldValue)> = record.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let map: serde_json::Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                FieldValue::Null => Value::Null,
                FieldValue::Boolean(b) => Value::Bool(*b),
                FieldValue::Integer(i) => Value::from(*i),
                FieldValue::Float(f) => Value::from(*f),
                FieldValue::Text(t) => Value::String(t.clone()),
            };
            (k.clone(), v)
        })
        .collect();
    Value::Object(map)
}

fn record_from_map(map: &serde_json::Map<String, Value>) -> Record {
    map.iter()
        .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
        .collect()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
