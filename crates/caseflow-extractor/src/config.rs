//! Configuration for the Extractor

use crate::citation::CitationPolicy;
use crate::error::ExtractorError;
use caseflow_domain::{FieldSchema, GenerationConfig};
use caseflow_gatekeeper::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// LLM round-trips allowed per document per processing round
    pub max_attempts: u32,

    /// Similarity at or above which records count as duplicates
    pub dedup_threshold: f64,

    /// Key holding the record list in the LLM's JSON output
    pub records_key: String,

    /// Records with fewer fields than this are dropped as sparse
    ///
    /// The default of 1 only drops empty objects, so identifier-only
    /// records survive.
    pub min_record_fields: usize,

    /// Generation parameters passed to the LLM client
    pub generation: GenerationConfig,

    /// Confidence scale and shape strictness
    pub validation: ValidationConfig,

    /// Citation weights and thresholds
    pub citation: CitationPolicy,
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_attempts: 5,
            dedup_threshold: 0.8,
            records_key: "case_results".to_string(),
            min_record_fields: 1,
            generation: GenerationConfig::default(),
            validation: ValidationConfig::percent_scale(),
            citation: CitationPolicy::default(),
        }
    }
}

impl ExtractorConfig {
    /// Strict preset: fewer attempts, more aggressive deduplication
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            dedup_threshold: 0.7,
            min_record_fields: 2,
            ..Self::default()
        }
    }

    /// Lenient preset: more attempts, accepts bare field values
    pub fn lenient() -> Self {
        Self {
            max_attempts: 8,
            dedup_threshold: 0.9,
            min_record_fields: 0,
            validation: ValidationConfig::percent_scale().lenient(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if !(self.dedup_threshold > 0.0 && self.dedup_threshold <= 1.0) {
            return Err("dedup_threshold must be in (0, 1]".to_string());
        }
        if self.records_key.trim().is_empty() {
            return Err("records_key must not be empty".to_string());
        }
        if self.generation.max_output_tokens == 0 {
            return Err("generation.max_output_tokens must be greater than 0".to_string());
        }
        if self.generation.timeout_secs == 0 {
            return Err("generation.timeout_secs must be greater than 0".to_string());
        }
        self.validation.validate()?;
        self.citation.validate()?;
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExtractorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExtractorError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content).map_err(ExtractorError::Config)?;
        config.validate().map_err(ExtractorError::Config)?;
        Ok(config)
    }
}

/// Parse a field schema from TOML
pub fn schema_from_toml(content: &str) -> Result<FieldSchema, ExtractorError> {
    toml::from_str(content).map_err(|e| ExtractorError::Schema(format!("Failed to parse TOML: {}", e)))
}

/// Parse a field schema from JSON
pub fn schema_from_json(content: &str) -> Result<FieldSchema, ExtractorError> {
    serde_json::from_str(content)
        .map_err(|e| ExtractorError::Schema(format!("Failed to parse JSON: {}", e)))
}

/// Load a field schema, choosing the format by file extension
///
/// `.json` files are read as JSON; anything else as TOML.
pub fn load_schema(path: impl AsRef<Path>) -> Result<FieldSchema, ExtractorError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ExtractorError::Schema(format!("{}: {}", path.display(), e)))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        schema_from_json(&content)
    } else {
        schema_from_toml(&content)
    }
}
