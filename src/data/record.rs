//! Cell values and per-patient records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed string → integer encodings for known categorical fields.
pub const CATEGORY_ENCODINGS: &[(&str, &[(&str, f64)])] = &[
    ("gender", &[("M", 1.0), ("F", 0.0)]),
    ("smoking", &[("Yes", 1.0), ("No", 0.0)]),
    ("air_conditioner_use", &[("Yes", 1.0), ("No", 0.0)]),
    ("contact_lenses", &[("Yes", 1.0), ("No", 0.0)]),
];

/// Look up the fixed encoding for `text` in `column`, if the column has one.
pub fn encode_category(column: &str, text: &str) -> Option<f64> {
    CATEGORY_ENCODINGS
        .iter()
        .find(|(name, _)| *name == column)
        .and_then(|(_, mapping)| mapping.iter().find(|(k, _)| *k == text))
        .map(|(_, v)| *v)
}

/// A single cell: JSON numbers, booleans, strings and `null` map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Flag(bool),
    Text(String),
    Missing,
}

impl Value {
    /// Parse a raw CSV cell: empty → missing, numeric text → number, else text.
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na") {
            return Value::Missing;
        }
        match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Number(v),
            _ => Value::Text(cell.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(_) | Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Text form used for categorical columns and reports.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Number(v) => Some(format_number(*v)),
            Value::Flag(b) => Some(b.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Missing => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Render whole numbers without a fractional part ("1" rather than "1.0").
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Feature name → value mapping for one patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientRecord {
    fields: BTreeMap<String, Value>,
}

impl PatientRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.get(name).map_or(false, |v| !v.is_missing())
    }

    /// Numeric reading of a field; known categorical text goes through the fixed encodings.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .or_else(|| encode_category(name, s.trim())),
            other => other.as_number(),
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for PatientRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
