//! Caseflow LLM Client Layer
//!
//! Implementations of the `LlmClient` trait from `caseflow-domain`.
//!
//! # Clients
//!
//! - `MockProvider`: scripted, deterministic client for tests
//! - `GeminiProvider`: Gemini `generateContent` API with inline documents
//!
//! # Examples
//!
//! ```
//! use caseflow_llm::MockProvider;
//! use caseflow_domain::{GenerationConfig, LlmClient};
//!
//! let provider = MockProvider::new(r#"{"case_results": []}"#);
//! let response = provider.call("extract", b"%PDF", &GenerationConfig::default()).unwrap();
//! assert_eq!(response.text, r#"{"case_results": []}"#);
//! assert!(!response.is_truncated_by_token_limit);
//! ```

#![warn(missing_docs)]

pub mod gemini;

use caseflow_domain::{GenerationConfig, LlmClient, LlmResponse};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub use gemini::GeminiProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider is missing required configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

type Scripted = Result<LlmResponse, String>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted LLM client for deterministic testing
///
/// Queued responses are returned in order, one per call. Once the queue is
/// empty every call returns the default response as a complete (not
/// truncated) answer. Every prompt is captured so tests can inspect what the
/// engine asked for.
///
/// Clones share the queue, the call count and the captured prompts.
///
/// # Examples
///
/// ```
/// use caseflow_llm::MockProvider;
/// use caseflow_domain::{GenerationConfig, LlmClient};
///
/// let provider = MockProvider::default();
/// provider.push_truncated(r#"{"case_results": [{"a": 1"#);
/// provider.push_error("quota exhausted");
///
/// let config = GenerationConfig::default();
/// assert!(provider.call("p1", b"", &config).unwrap().is_truncated_by_token_limit);
/// assert!(provider.call("p2", b"", &config).is_err());
/// assert_eq!(provider.prompts(), vec!["p1", "p2"]);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockProvider {
    /// Create a MockProvider with a fixed fallback response
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue an arbitrary response
    pub fn push_response(&self, response: LlmResponse) {
        lock(&self.script).push_back(Ok(response));
    }

    /// Queue a response that finished normally
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_response(LlmResponse::complete(text));
    }

    /// Queue a response the provider reports as cut off by the token limit
    pub fn push_truncated(&self, text: impl Into<String>) {
        self.push_response(LlmResponse::truncated(text));
    }

    /// Queue a transport failure
    pub fn push_error(&self, message: impl Into<String>) {
        lock(&self.script).push_back(Err(message.into()));
    }

    /// Number of scripted entries not yet consumed
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// Get the number of times call was invoked
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Reset the call count and captured prompts
    pub fn reset_call_count(&self) {
        *lock(&self.call_count) = 0;
        lock(&self.prompts).clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmClient for MockProvider {
    type Error = LlmError;

    fn call(
        &self,
        prompt: &str,
        _document: &[u8],
        _config: &GenerationConfig,
    ) -> Result<LlmResponse, Self::Error> {
        *lock(&self.call_count) += 1;
        lock(&self.prompts).push(prompt.to_string());

        match lock(&self.script).pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(LlmError::Communication(message)),
            None => Ok(LlmResponse::complete(self.default_response.clone())),
        }
    }
}
