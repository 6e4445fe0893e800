//! Record module - one extracted case and its field values
//!
//! LLMs do not reliably emit the `{"value": .., "confidence": ..}` shape for
//! every field. A field may arrive as a bare scalar, a list, or an object with
//! a missing confidence. [`FieldValue`] keeps those shapes apart so every
//! consumer has to match on them explicitly instead of assuming an object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// A JSON scalar as it appeared in LLM output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// Integral JSON number
    Integer(i64),
    /// Non-integral (or out of i64 range) JSON number
    Float(f64),
    /// JSON string
    Text(String),
}

impl Scalar {
    /// Convert a JSON value into a scalar; arrays and objects yield `None`
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Scalar::Integer(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert back into a JSON value (non-finite floats become `null`)
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Integer(i) => Value::Number((*i).into()),
            Scalar::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }

    /// Textual rendering used for comparisons and pattern matching
    ///
    /// `Null` renders as the empty string.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// True for `null` and whitespace-only strings
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// The value stored under one field of a [`Record`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// The expected `{value, confidence}` pair
    Structured {
        /// Extracted value
        value: Scalar,
        /// Model-reported confidence on the job's scale
        confidence: i64,
    },

    /// A bare scalar where a `{value, confidence}` object was expected
    Scalar(Scalar),

    /// Any other shape, kept as a textual rendering
    Unknown(String),
}

impl FieldValue {
    /// Build a structured value
    pub fn structured(value: impl Into<Scalar>, confidence: i64) -> Self {
        FieldValue::Structured {
            value: value.into(),
            confidence,
        }
    }

    /// Coerce an arbitrary JSON value into a field value
    ///
    /// Coercion rules:
    /// - object with a scalar `value` and a numeric `confidence` → `Structured`
    ///   (a list `value` of scalars is joined with `", "`; a numeric-string
    ///   or float confidence is rounded)
    /// - any other object → `Unknown` holding the compact JSON
    /// - list → `Unknown` holding the elements' text joined by spaces
    /// - scalar → `Scalar`
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let scalar = map.get("value").and_then(scalar_or_joined_list);
                let confidence = map.get("confidence").and_then(parse_confidence);
                match (scalar, confidence) {
                    (Some(value), Some(confidence)) => FieldValue::Structured { value, confidence },
                    _ => FieldValue::Unknown(value.to_string()),
                }
            }
            Value::Array(items) => FieldValue::Unknown(
                items
                    .iter()
                    .map(render_text)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            other => FieldValue::Scalar(Scalar::from_json(other).unwrap_or(Scalar::Null)),
        }
    }

    /// Convert to the JSON shape the LLM is asked to produce
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Structured { value, confidence } => {
                let mut map = Map::new();
                map.insert("value".to_string(), value.to_json());
                map.insert("confidence".to_string(), Value::Number((*confidence).into()));
                Value::Object(map)
            }
            FieldValue::Scalar(s) => s.to_json(),
            FieldValue::Unknown(raw) => Value::String(raw.clone()),
        }
    }

    /// Text content of the field, whatever its shape
    pub fn text(&self) -> String {
        match self {
            FieldValue::Structured { value, .. } => value.as_text(),
            FieldValue::Scalar(s) => s.as_text(),
            FieldValue::Unknown(raw) => raw.clone(),
        }
    }

    /// The scalar payload, if the field has one
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Structured { value, .. } => Some(value),
            FieldValue::Scalar(s) => Some(s),
            FieldValue::Unknown(_) => None,
        }
    }

    /// The confidence, present only on structured values
    pub fn confidence(&self) -> Option<i64> {
        match self {
            FieldValue::Structured { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }

    /// True when the field carries no usable value
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Structured { value, .. } | FieldValue::Scalar(value) => value.is_blank(),
            FieldValue::Unknown(raw) => raw.trim().is_empty(),
        }
    }

    /// Short description of the shape, for diagnostics
    pub fn shape_name(&self) -> &'static str {
        match self {
            FieldValue::Structured { .. } => "structured",
            FieldValue::Scalar(_) => "bare scalar",
            FieldValue::Unknown(_) => "unrecognized shape",
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

fn scalar_or_joined_list(value: &Value) -> Option<Scalar> {
    match value {
        Value::Array(items) => {
            let parts: Option<Vec<String>> = items
                .iter()
                .map(|item| Scalar::from_json(item).map(|s| s.as_text()))
                .collect();
            parts.map(|p| Scalar::Text(p.join(", ")))
        }
        other => Scalar::from_json(other),
    }
}

fn parse_confidence(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.round() as i64),
        _ => None,
    }
}

fn render_text(value: &Value) -> String {
    match Scalar::from_json(value) {
        Some(s) => s.as_text(),
        None => value.to_string(),
    }
}

/// One extracted case: an ordered mapping from field name to value
///
/// Records are treated as immutable values. The builder-style methods take
/// `self` and hand back a new record rather than editing one in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(name, value)` pairs; a repeated name keeps its
    /// first position and its last value
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        fields
            .into_iter()
            .fold(Self::new(), |record, (name, value)| record.with_field(name, value))
    }

    /// Coerce a JSON object into a record, field by field
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        Self {
            fields: object
                .iter()
                .map(|(name, value)| (name.clone(), FieldValue::from_json(value)))
                .collect(),
        }
    }

    /// Coerce a JSON value into a record; non-objects yield `None`
    pub fn from_json(value: &Value) -> Option<Self> {
        value.as_object().map(Self::from_json_object)
    }

    /// Return a copy of this record with `name` set to `value`
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Whether the record carries a field with this name
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in their original order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Text of a single field, if present
    pub fn text_of(&self, name: &str) -> Option<String> {
        self.get(name).map(FieldValue::text)
    }

    /// Convert to a JSON object in the shape the LLM is asked to produce
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(n, v)| (n.clone(), v.to_json()))
                .collect(),
        )
    }
}
