//! Field schema - the declarative description of what a record may contain
//!
//! Schemas are configuration supplied by whoever owns the job. The engine only
//! reads them.

use serde::{Deserialize, Serialize};

/// Default name of the per-record identifier field
pub const DEFAULT_IDENTIFIER_FIELD: &str = "case_number";

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Free text, optionally constrained by a regex
    #[default]
    String,
    /// Whole number, optionally bounded
    Integer,
    /// Decimal number, optionally bounded
    Float,
    /// true/false/yes/no
    Boolean,
    /// ISO date (YYYY-MM-DD)
    Date,
    /// One of a fixed list of values
    Enum,
}

impl DataType {
    /// Lowercase name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Enum => "enum",
        }
    }
}

/// One declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name as it appears in LLM output
    pub name: String,

    /// Human-readable description, used when building prompts
    #[serde(default)]
    pub description: String,

    /// Grouping used when listing fields in prompts
    #[serde(default)]
    pub category: Option<String>,

    /// Declared type
    #[serde(default)]
    pub data_type: DataType,

    /// Whether the field may be absent
    #[serde(default)]
    pub optional: bool,

    /// Allowed values for `enum` fields
    #[serde(default)]
    pub enum_values: Option<Vec<String>>,

    /// Inclusive lower bound for numeric fields
    #[serde(default)]
    pub min: Option<f64>,

    /// Inclusive upper bound for numeric fields
    #[serde(default)]
    pub max: Option<f64>,

    /// Pattern string values must match (anchored at the start)
    #[serde(default)]
    pub validation_regex: Option<String>,
}

impl FieldDefinition {
    /// Create a required string field with no constraints
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: None,
            data_type,
            optional: false,
            enum_values: None,
            min: None,
            max: None,
            validation_regex: None,
        }
    }

    /// Mark the field optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set inclusive numeric bounds
    pub fn bounded(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the allowed enum values
    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the validation regex
    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.validation_regex = Some(pattern.into());
        self
    }
}

/// The full set of declared fields for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field that identifies a record within a document (e.g. "case_number")
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    /// Declared fields, in display order
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

fn default_identifier_field() -> String {
    DEFAULT_IDENTIFIER_FIELD.to_string()
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            identifier_field: default_identifier_field(),
            fields: Vec::new(),
        }
    }
}

impl FieldSchema {
    /// Create a schema with the default identifier field
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self {
            identifier_field: default_identifier_field(),
            fields,
        }
    }

    /// Look up a field definition by name
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that must be present on every record
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.optional)
    }
}
