//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur while setting up or driving an extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Document store error
    #[error("Store error: {0}")]
    Store(String),

    /// Document not present in the store
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Schema file could not be read or understood
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a document stopped making progress
///
/// Every variant except `RetryBudgetExhausted` and `Cancelled` leaves the
/// document in `error`; those two leave it `processed` so it can be resumed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionFailure {
    /// The LLM client returned an error
    #[error("LLM call failed: {0}")]
    Transport(String),

    /// A complete (untruncated) response could not be parsed
    #[error("Failed to parse JSON from a complete response")]
    Parse,

    /// A truncated response produced no new records
    #[error("Response still truncated after attempt {attempt} with no new records")]
    StuckTruncation {
        /// Attempt that made no progress
        attempt: u32,
    },

    /// The attempt budget ran out while the output was still truncated
    #[error("Still truncated after {attempts} attempts; needs continuation")]
    RetryBudgetExhausted {
        /// Attempts spent in this round
        attempts: u32,
    },

    /// The store could not read or persist state
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Cancellation was requested between attempts
    #[error("Cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts spent before cancellation
        attempts: u32,
    },
}

impl ExtractionFailure {
    /// Whether the document can be picked up again from its cursor
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            ExtractionFailure::RetryBudgetExhausted { .. } | ExtractionFailure::Cancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumable_failures() {
        assert!(ExtractionFailure::RetryBudgetExhausted { attempts: 5 }.is_resumable());
        assert!(ExtractionFailure::Cancelled { attempts: 1 }.is_resumable());
        assert!(!ExtractionFailure::Parse.is_resumable());
        assert!(!ExtractionFailure::StuckTruncation { attempt: 2 }.is_resumable());
        assert!(!ExtractionFailure::Transport("boom".into()).is_resumable());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            ExtractionFailure::Parse.to_string(),
            "Failed to parse JSON from a complete response"
        );
        assert!(ExtractionFailure::Transport("timeout".into())
            .to_string()
            .contains("timeout"));
    }

    #[test]
    fn test_extractor_error_kinds() {
        let errors = [
            ExtractorError::Store("locked".into()),
            ExtractorError::DocumentNotFound("abc".into()),
            ExtractorError::Schema("bad field".into()),
            ExtractorError::Config("max_attempts must be greater than 0".into()),
        ];
        for error in &errors {
            // every kind is raised by setup or store access
            let prefix = match error {
                ExtractorError::Store(_) => "Store error",
                ExtractorError::DocumentNotFound(_) => "Document not found",
                ExtractorError::Schema(_) => "Schema error",
                ExtractorError::Config(_) => "Configuration error",
            };
            assert!(error.to_string().starts_with(prefix));
        }
    }
}
