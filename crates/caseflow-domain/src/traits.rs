//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the engine and infrastructure.
//! Implementations live in caseflow-llm and caseflow-store.

use serde::{Deserialize, Serialize};

use crate::{Document, DocumentId, ExtractionAttempt, JobId};

/// Generation parameters passed through to the LLM client on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound on output tokens per response
    pub max_output_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff
    pub top_k: Option<u32>,

    /// Per-call timeout in seconds; enforcing it is the client's job
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 0.1,
            top_p: None,
            top_k: None,
            timeout_secs: 300,
        }
    }
}

/// Raw output of one LLM call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LlmResponse {
    /// Generated text, unmodified
    pub text: String,

    /// The provider stopped because it hit the output token limit
    pub is_truncated_by_token_limit: bool,
}

impl LlmResponse {
    /// A response that finished normally
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_truncated_by_token_limit: false,
        }
    }

    /// A response cut off by the token limit
    pub fn truncated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_truncated_by_token_limit: true,
        }
    }
}

/// Trait for LLM client operations
///
/// Implemented by the infrastructure layer (caseflow-llm). Calls are
/// synchronous; the engine runs them on a blocking thread.
pub trait LlmClient {
    /// Error type for LLM operations
    type Error: std::fmt::Display;

    /// Send a prompt together with the document bytes
    fn call(
        &self,
        prompt: &str,
        document: &[u8],
        config: &GenerationConfig,
    ) -> Result<LlmResponse, Self::Error>;
}

/// Trait for persisting documents and their attempt logs
///
/// Implemented by the infrastructure layer (caseflow-store)
pub trait DocumentStore {
    /// Error type for store operations
    type Error: std::fmt::Display;

    /// Get a document by ID
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error>;

    /// Insert or replace a document
    fn save_document(&mut self, document: &Document) -> Result<(), Self::Error>;

    /// List a job's documents in creation order
    fn list_documents(&self, job_id: JobId) -> Result<Vec<Document>, Self::Error>;

    /// Append an attempt to a document's log
    fn append_attempt(
        &mut self,
        document_id: DocumentId,
        attempt: &ExtractionAttempt,
    ) -> Result<(), Self::Error>;

    /// List a document's attempts in insertion order
    fn list_attempts(&self, document_id: DocumentId) -> Result<Vec<ExtractionAttempt>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_output_tokens, 8192);
        assert!((config.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_generation_config_partial_toml_fields() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"max_output_tokens": 65536}"#).unwrap();
        assert_eq!(config.max_output_tokens, 65536);
        assert_eq!(config.timeout_secs, 300);
    }
}
