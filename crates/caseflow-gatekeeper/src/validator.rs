//! Record validation logic

use crate::{GatekeeperError, ValidationConfig};
use caseflow_domain::{DataType, FieldDefinition, FieldSchema, FieldValue, Record, Scalar};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Result of record validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Whether the record passed validation
    pub is_valid: bool,

    /// Problems found, in schema order
    pub errors: Vec<ValidationIssue>,

    /// Fraction of declared fields that passed (0.0-1.0)
    pub quality_score: f64,
}

/// A single problem found while validating a record
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// Required field absent, null or empty
    MissingField {
        /// Field name
        field: String,
    },

    /// Value has the wrong shape (not a `{value, confidence}` object)
    MalformedShape {
        /// Field name
        field: String,
        /// Shape that was found
        shape: &'static str,
    },

    /// Value does not parse as the declared type
    InvalidType {
        /// Field name
        field: String,
        /// Declared type
        expected: DataType,
        /// Offending value
        value: String,
    },

    /// Numeric value outside its declared bounds
    OutOfRange {
        /// Field name
        field: String,
        /// Parsed value
        value: f64,
        /// Inclusive lower bound
        min: Option<f64>,
        /// Inclusive upper bound
        max: Option<f64>,
    },

    /// Value not among the declared enum values
    NotInEnum {
        /// Field name
        field: String,
        /// Offending value
        value: String,
        /// Allowed values
        allowed: Vec<String>,
    },

    /// String value does not match the field's pattern
    PatternMismatch {
        /// Field name
        field: String,
        /// Offending value
        value: String,
        /// Pattern from the schema
        pattern: String,
    },

    /// The field's pattern is not a valid regex
    InvalidPattern {
        /// Field name
        field: String,
        /// Pattern from the schema
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// Confidence outside the job's scale
    ConfidenceOutOfRange {
        /// Field name
        field: String,
        /// Reported confidence
        confidence: i64,
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },
}

impl ValidationIssue {
    /// Name of the field the issue concerns
    pub fn field(&self) -> &str {
        match self {
            ValidationIssue::MissingField { field }
            | ValidationIssue::MalformedShape { field, .. }
            | ValidationIssue::InvalidType { field, .. }
            | ValidationIssue::OutOfRange { field, .. }
            | ValidationIssue::NotInEnum { field, .. }
            | ValidationIssue::PatternMismatch { field, .. }
            | ValidationIssue::InvalidPattern { field, .. }
            | ValidationIssue::ConfidenceOutOfRange { field, .. } => field,
        }
    }
}

fn fmt_bound(bound: Option<f64>) -> String {
    bound.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "Required field '{}' is missing", field)
            }
            ValidationIssue::MalformedShape { field, shape } => write!(
                f,
                "Field '{}' is a {}; expected {{\"value\": .., \"confidence\": ..}}",
                field, shape
            ),
            ValidationIssue::InvalidType {
                field,
                expected,
                value,
            } => write!(
                f,
                "Field '{}' value '{}' is not a valid {}",
                field,
                value,
                expected.as_str()
            ),
            ValidationIssue::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "Field '{}' value {} is outside [{}, {}]",
                field,
                value,
                fmt_bound(*min),
                fmt_bound(*max)
            ),
            ValidationIssue::NotInEnum {
                field,
                value,
                allowed,
            } => write!(
                f,
                "Field '{}' value '{}' is not one of: {}",
                field,
                value,
                allowed.join(", ")
            ),
            ValidationIssue::PatternMismatch {
                field,
                value,
                pattern,
            } => write!(
                f,
                "Field '{}' value '{}' does not match pattern '{}'",
                field, value, pattern
            ),
            ValidationIssue::InvalidPattern {
                field,
                pattern,
                message,
            } => write!(
                f,
                "Field '{}' has invalid validation pattern '{}': {}",
                field, pattern, message
            ),
            ValidationIssue::ConfidenceOutOfRange {
                field,
                confidence,
                min,
                max,
            } => write!(
                f,
                "Field '{}' confidence {} is outside [{}, {}]",
                field, confidence, min, max
            ),
        }
    }
}

/// Validates records against a field schema
///
/// Compiled validation patterns are cached per pattern string, so a single
/// validator can be shared across documents and schemas.
pub struct CaseValidator {
    config: ValidationConfig,
    patterns: Mutex<HashMap<String, Result<Regex, String>>>,
}

impl fmt::Debug for CaseValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CaseValidator {
    /// Create a validator with the given configuration
    ///
    /// # Errors
    ///
    /// Returns `GatekeeperError::Config` if the confidence range is empty.
    pub fn new(config: ValidationConfig) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self {
            config,
            patterns: Mutex::new(HashMap::new()),
        })
    }

    /// The active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a record against the schema
    ///
    /// Never fails: every problem, including a broken schema pattern, is
    /// reported as a [`ValidationIssue`].
    pub fn validate(&self, record: &Record, schema: &FieldSchema) -> ValidationResult {
        let mut errors = Vec::new();
        let mut passed = 0usize;

        // 1. Declared fields, in schema order
        for def in &schema.fields {
            let before = errors.len();
            self.validate_field(def, record.get(&def.name), &mut errors);
            if errors.len() == before {
                passed += 1;
            }
        }

        // 2. Undeclared fields only get the confidence check
        for (name, value) in record.iter() {
            if schema.field(name).is_none() {
                if let Some(issue) = self.check_confidence(name, value) {
                    errors.push(issue);
                }
            }
        }

        let quality_score = if schema.fields.is_empty() {
            1.0
        } else {
            passed as f64 / schema.fields.len() as f64
        };

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            quality_score,
        }
    }

    fn validate_field(
        &self,
        def: &FieldDefinition,
        value: Option<&FieldValue>,
        errors: &mut Vec<ValidationIssue>,
    ) {
        let value = match value {
            Some(v) if !v.is_blank() => v,
            _ => {
                if !def.optional {
                    errors.push(ValidationIssue::MissingField {
                        field: def.name.clone(),
                    });
                }
                return;
            }
        };

        let scalar = match value {
            FieldValue::Structured { value: scalar, .. } => {
                if let Some(issue) = self.check_confidence(&def.name, value) {
                    errors.push(issue);
                }
                scalar.clone()
            }
            FieldValue::Scalar(_) | FieldValue::Unknown(_) if self.config.require_structured => {
                errors.push(ValidationIssue::MalformedShape {
                    field: def.name.clone(),
                    shape: value.shape_name(),
                });
                return;
            }
            FieldValue::Scalar(scalar) => scalar.clone(),
            FieldValue::Unknown(raw) => Scalar::Text(raw.clone()),
        };

        if let Some(issue) = self.check_value(def, &scalar) {
            errors.push(issue);
        }
    }

    fn check_confidence(&self, field: &str, value: &FieldValue) -> Option<ValidationIssue> {
        let confidence = value.confidence()?;
        if confidence < self.config.min_confidence || confidence > self.config.max_confidence {
            return Some(ValidationIssue::ConfidenceOutOfRange {
                field: field.to_string(),
                confidence,
                min: self.config.min_confidence,
                max: self.config.max_confidence,
            });
        }
        None
    }

    fn check_value(&self, def: &FieldDefinition, scalar: &Scalar) -> Option<ValidationIssue> {
        let invalid_type = || ValidationIssue::InvalidType {
            field: def.name.clone(),
            expected: def.data_type,
            value: scalar.as_text(),
        };

        match def.data_type {
            DataType::Integer => match parse_integer(scalar) {
                Some(n) => check_bounds(def, n as f64),
                None => Some(invalid_type()),
            },
            DataType::Float => match parse_float(scalar) {
                Some(n) => check_bounds(def, n),
                None => Some(invalid_type()),
            },
            DataType::Boolean => (!is_boolean(scalar)).then(invalid_type),
            DataType::Date => {
                let text = scalar.as_text();
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .is_err()
                    .then(invalid_type)
            }
            DataType::Enum => {
                let allowed = def.enum_values.as_deref().unwrap_or_default();
                let text = scalar.as_text();
                if allowed.is_empty() || allowed.iter().any(|a| a == text.trim()) {
                    None
                } else {
                    Some(ValidationIssue::NotInEnum {
                        field: def.name.clone(),
                        value: text,
                        allowed: allowed.to_vec(),
                    })
                }
            }
            DataType::String => {
                let pattern = def.validation_regex.as_deref()?;
                let text = scalar.as_text();
                match self.matches(pattern, &text) {
                    Ok(true) => None,
                    Ok(false) => Some(ValidationIssue::PatternMismatch {
                        field: def.name.clone(),
                        value: text,
                        pattern: pattern.to_string(),
                    }),
                    Err(message) => Some(ValidationIssue::InvalidPattern {
                        field: def.name.clone(),
                        pattern: pattern.to_string(),
                        message,
                    }),
                }
            }
        }
    }

    /// Match `text` against `pattern`, anchored at the start
    fn matches(&self, pattern: &str, text: &str) -> Result<bool, String> {
        let mut cache = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        let compiled = cache
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(&format!("^(?:{})", pattern)).map_err(|e| e.to_string()));

        match compiled {
            Ok(re) => Ok(re.is_match(text)),
            Err(message) => Err(message.clone()),
        }
    }
}

fn check_bounds(def: &FieldDefinition, n: f64) -> Option<ValidationIssue> {
    let below = def.min.is_some_and(|min| n < min);
    let above = def.max.is_some_and(|max| n > max);
    (below || above).then(|| ValidationIssue::OutOfRange {
        field: def.name.clone(),
        value: n,
        min: def.min,
        max: def.max,
    })
}

fn parse_integer(scalar: &Scalar) -> Option<i64> {
    match scalar {
        Scalar::Integer(n) => Some(*n),
        Scalar::Float(f) => integral(*f),
        Scalar::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Scalar::Null | Scalar::Bool(_) => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_float(scalar: &Scalar) -> Option<f64> {
    match scalar {
        Scalar::Integer(n) => Some(*n as f64),
        Scalar::Float(f) => Some(*f),
        Scalar::Text(s) => s.trim().parse::<f64>().ok(),
        Scalar::Null | Scalar::Bool(_) => None,
    }
    .filter(|f| f.is_finite())
}

fn is_boolean(scalar: &Scalar) -> bool {
    match scalar {
        Scalar::Bool(_) => true,
        Scalar::Text(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "false" | "yes" | "no"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldDefinition::new("case_number", DataType::String),
            FieldDefinition::new("age", DataType::Integer).bounded(Some(0.0), Some(120.0)),
            FieldDefinition::new("weight_kg", DataType::Float).optional(),
            FieldDefinition::new("sex", DataType::Enum).with_enum_values(["male", "female"]),
            FieldDefinition::new("diagnosed_on", DataType::Date).optional(),
            FieldDefinition::new("recovered", DataType::Boolean).optional(),
            FieldDefinition::new("icd_code", DataType::String)
                .optional()
                .with_regex(r"[A-Z]\d{2}"),
        ])
    }

    fn valid_record() -> Record {
        Record::new()
            .with_field("case_number", FieldValue::structured("Case 1", 95))
            .with_field("age", FieldValue::structured(42i64, 90))
            .with_field("sex", FieldValue::structured("female", 99))
    }

    fn validator() -> CaseValidator {
        CaseValidator::new(ValidationConfig::percent_scale()).unwrap()
    }

    #[test]
    fn test_valid_record() {
        let result = validator().validate(&valid_record(), &schema());

        assert!(result.is_valid, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
        assert_eq!(result.quality_score, 1.0);
    }

    #[test]
    fn test_missing_required_field() {
        let record = Record::new()
            .with_field("case_number", FieldValue::structured("Case 1", 95))
            .with_field("sex", FieldValue::structured("male", 99));

        let result = validator().validate(&record, &schema());

        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![ValidationIssue::MissingField {
                field: "age".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_and_null_count_as_missing() {
        let record = valid_record()
            .with_field("age", FieldValue::structured(Scalar::Null, 50))
            .with_field("sex", FieldValue::structured("", 50));

        let result = validator().validate(&record, &schema());

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field()).collect();
        assert_eq!(fields, vec!["age", "sex"]);
        assert!(result
            .errors
            .iter()
            .all(|e| matches!(e, ValidationIssue::MissingField { .. })));
    }

    #[test]
    fn test_missing_optional_field_is_fine() {
        let record = valid_record().with_field("weight_kg", FieldValue::structured("", 10));
        assert!(validator().validate(&record, &schema()).is_valid);
    }

    #[test]
    fn test_integer_parsing() {
        let v = validator();
        for ok in [
            FieldValue::structured(42i64, 90),
            FieldValue::structured(42.0, 90),
            FieldValue::structured("42", 90),
        ] {
            let record = valid_record().with_field("age", ok);
            assert!(v.validate(&record, &schema()).is_valid);
        }

        let record = valid_record().with_field("age", FieldValue::structured("forty", 90));
        let result = v.validate(&record, &schema());
        assert!(matches!(
            result.errors[0],
            ValidationIssue::InvalidType {
                expected: DataType::Integer,
                ..
            }
        ));
    }

    #[test]
    fn test_integer_out_of_range() {
        let record = valid_record().with_field("age", FieldValue::structured(150i64, 90));
        let result = validator().validate(&record, &schema());

        match &result.errors[0] {
            ValidationIssue::OutOfRange { value, max, .. } => {
                assert_eq!(*value, 150.0);
                assert_eq!(*max, Some(120.0));
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_float_field() {
        let v = validator();
        let ok = valid_record().with_field("weight_kg", FieldValue::structured("71.5", 80));
        assert!(v.validate(&ok, &schema()).is_valid);

        let bad = valid_record().with_field("weight_kg", FieldValue::structured("heavy", 80));
        assert!(!v.validate(&bad, &schema()).is_valid);
    }

    #[test]
    fn test_enum_membership() {
        let record = valid_record().with_field("sex", FieldValue::structured("unknown", 90));
        let result = validator().validate(&record, &schema());

        assert!(matches!(&result.errors[0], ValidationIssue::NotInEnum { value, .. } if value == "unknown"));
    }

    #[test]
    fn test_boolean_forms() {
        let v = validator();
        for ok in [
            FieldValue::structured(true, 90),
            FieldValue::structured("Yes", 90),
            FieldValue::structured("FALSE", 90),
        ] {
            assert!(v.validate(&valid_record().with_field("recovered", ok), &schema()).is_valid);
        }

        let bad = valid_record().with_field("recovered", FieldValue::structured("maybe", 90));
        assert!(!v.validate(&bad, &schema()).is_valid);
    }

    #[test]
    fn test_date_format() {
        let v = validator();
        let ok = valid_record().with_field("diagnosed_on", FieldValue::structured("2021-03-15", 90));
        assert!(v.validate(&ok, &schema()).is_valid);

        let bad = valid_record().with_field("diagnosed_on", FieldValue::structured("15/03/2021", 90));
        assert!(!v.validate(&bad, &schema()).is_valid);

        let impossible =
            valid_record().with_field("diagnosed_on", FieldValue::structured("2021-02-30", 90));
        assert!(!v.validate(&impossible, &schema()).is_valid);
    }

    #[test]
    fn test_regex_anchored_at_start() {
        let v = validator();
        let ok = valid_record().with_field("icd_code", FieldValue::structured("C34.1", 90));
        assert!(v.validate(&ok, &schema()).is_valid);

        let bad = valid_record().with_field("icd_code", FieldValue::structured("see C34", 90));
        let result = v.validate(&bad, &schema());
        assert!(matches!(result.errors[0], ValidationIssue::PatternMismatch { .. }));
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let schema = FieldSchema::new(vec![
            FieldDefinition::new("case_number", DataType::String).with_regex("(unclosed")
        ]);
        let record = Record::new().with_field("case_number", FieldValue::structured("x", 50));

        let v = validator();
        let result = v.validate(&record, &schema);
        assert!(!result.is_valid);
        assert!(matches!(result.errors[0], ValidationIssue::InvalidPattern { .. }));

        // Cached failure is reported again on the next record
        let again = v.validate(&record, &schema);
        assert_eq!(again.errors.len(), 1);
    }

    #[test]
    fn test_confidence_scale() {
        let record = valid_record().with_field("age", FieldValue::structured(42i64, 4));

        let percent = validator().validate(&record, &schema());
        assert!(percent.is_valid);

        let five_point = CaseValidator::new(ValidationConfig::five_point_scale()).unwrap();
        let result = five_point.validate(&valid_record(), &schema());
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .all(|e| matches!(e, ValidationIssue::ConfidenceOutOfRange { max: 5, .. })));
    }

    #[test]
    fn test_malformed_shapes() {
        let record = valid_record()
            .with_field("age", FieldValue::Scalar(Scalar::Integer(42)))
            .with_field("sex", FieldValue::Unknown("[\"female\"]".to_string()));

        let result = validator().validate(&record, &schema());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].to_string().contains("bare scalar"));
        assert!(result.errors[1].to_string().contains("unrecognized shape"));
    }

    #[test]
    fn test_lenient_accepts_bare_scalars() {
        let v = CaseValidator::new(ValidationConfig::percent_scale().lenient()).unwrap();
        let record = valid_record().with_field("age", FieldValue::Scalar(Scalar::Integer(42)));
        assert!(v.validate(&record, &schema()).is_valid);

        let out_of_range = valid_record().with_field("age", FieldValue::Scalar(Scalar::Integer(300)));
        assert!(!v.validate(&out_of_range, &schema()).is_valid);
    }

    #[test]
    fn test_undeclared_fields_only_check_confidence() {
        let ok = valid_record().with_field("extra", FieldValue::Unknown("anything".to_string()));
        assert!(validator().validate(&ok, &schema()).is_valid);

        let bad = valid_record().with_field("extra", FieldValue::structured("x", 250));
        let result = validator().validate(&bad, &schema());
        assert!(matches!(&result.errors[0], ValidationIssue::ConfidenceOutOfRange { field, .. } if field == "extra"));
        assert_eq!(result.quality_score, 1.0);
    }

    #[test]
    fn test_quality_score_fraction() {
        let record = valid_record().with_field("age", FieldValue::structured("old", 90));
        let result = validator().validate(&record, &schema());
        let expected = 6.0 / 7.0;
        assert!((result.quality_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_inverted_config() {
        let config = ValidationConfig {
            min_confidence: 5,
            max_confidence: 1,
            require_structured: true,
        };
        assert!(matches!(
            CaseValidator::new(config),
            Err(GatekeeperError::Config(_))
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn validate_never_panics(
                text in ".{0,40}",
                confidence in any::<i64>(),
                pattern in ".{0,12}",
            ) {
                let schema = FieldSchema::new(vec![
                    FieldDefinition::new("case_number", DataType::String).with_regex(pattern),
                    FieldDefinition::new("age", DataType::Integer).bounded(Some(0.0), Some(1.0)),
                    FieldDefinition::new("when", DataType::Date),
                ]);
                let record = Record::new()
                    .with_field("case_number", FieldValue::structured(text.as_str(), confidence))
                    .with_field("age", FieldValue::structured(text.as_str(), confidence))
                    .with_field("when", FieldValue::Unknown(text.clone()));

                let result = validator().validate(&record, &schema);
                prop_assert_eq!(result.is_valid, result.errors.is_empty());
                prop_assert!((0.0..=1.0).contains(&result.quality_score));
            }
        }
    }
}
