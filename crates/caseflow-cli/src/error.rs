//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extraction engine error
    #[error(transparent)]
    Extractor(#[from] caseflow_extractor::ExtractorError),

    /// LLM client error
    #[error("LLM error: {0}")]
    Llm(#[from] caseflow_llm::LlmError),

    /// Storage error
    #[error("Store error: {0}")]
    Store(#[from] caseflow_store::StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
