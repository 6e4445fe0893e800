//! Caseflow Gatekeeper
//!
//! Validates extracted records against a job's field schema before they are
//! accepted.
//!
//! The Gatekeeper checks:
//! - Required fields are present and non-empty
//! - Values parse as their declared type and respect bounds, enums and patterns
//! - Field confidences lie on the job's confidence scale
//! - Field values have the expected `{value, confidence}` shape
//!
//! # Examples
//!
//! ```
//! use caseflow_domain::{DataType, FieldDefinition, FieldSchema, FieldValue, Record};
//! use caseflow_gatekeeper::{CaseValidator, ValidationConfig};
//!
//! let schema = FieldSchema::new(vec![
//!     FieldDefinition::new("case_number", DataType::String),
//!     FieldDefinition::new("age", DataType::Integer).bounded(Some(0.0), Some(120.0)),
//! ]);
//! let record = Record::new()
//!     .with_field("case_number", FieldValue::structured("Case 1", 95))
//!     .with_field("age", FieldValue::structured(42i64, 90));
//!
//! let validator = CaseValidator::new(ValidationConfig::percent_scale()).unwrap();
//! assert!(validator.validate(&record, &schema).is_valid);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod validator;

pub use config::ValidationConfig;
pub use error::GatekeeperError;
pub use validator::{CaseValidator, ValidationIssue, ValidationResult};
