//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Lowest acceptable field confidence (inclusive)
    pub min_confidence: i64,

    /// Highest acceptable field confidence (inclusive)
    pub max_confidence: i64,

    /// Reject bare scalars and unrecognized shapes in declared fields
    pub require_structured: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::percent_scale()
    }
}

impl ValidationConfig {
    /// Confidences reported as percentages, `[0, 100]`
    pub fn percent_scale() -> Self {
        Self {
            min_confidence: 0,
            max_confidence: 100,
            require_structured: true,
        }
    }

    /// Confidences reported on a five-point scale, `[1, 5]`
    pub fn five_point_scale() -> Self {
        Self {
            min_confidence: 1,
            max_confidence: 5,
            require_structured: true,
        }
    }

    /// Accept any field shape, keeping the confidence bounds
    pub fn lenient(mut self) -> Self {
        self.require_structured = false;
        self
    }

    /// Check that the bounds describe a non-empty range
    pub fn validate(&self) -> Result<(), String> {
        if self.min_confidence > self.max_confidence {
            return Err(format!(
                "min_confidence ({}) must not exceed max_confidence ({})",
                self.min_confidence, self.max_confidence
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config, ValidationConfig::percent_scale());
        assert!(config.require_structured);
    }

    #[test]
    fn test_five_point_scale() {
        let config = ValidationConfig::five_point_scale();
        assert_eq!((config.min_confidence, config.max_confidence), (1, 5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds() {
        let config = ValidationConfig {
            min_confidence: 10,
            max_confidence: 1,
            require_structured: true,
        };
        assert!(config.validate().is_err());
    }
}
