//! Gemini Provider Implementation
//!
//! Sends a prompt plus the raw document (base64, inline) to the Gemini
//! `generateContent` endpoint and reports whether generation stopped at the
//! output token limit.
//!
//! # Features
//!
//! - Async HTTP communication via reqwest
//! - Retry logic with exponential backoff on transport and 5xx/429 errors
//! - Per-call timeout taken from `GenerationConfig`
//! - Blocking `LlmClient` facade for the engine's worker threads
//!
//! # Examples
//!
//! ```no_run
//! use caseflow_llm::GeminiProvider;
//!
//! let provider = GeminiProvider::new("gemini-1.5-pro", "my-api-key").unwrap();
//! ```

use crate::LlmError;
use base64::Engine as _;
use caseflow_domain::{GenerationConfig, LlmClient, LlmResponse};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Gemini API base URL
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default MIME type of the inline document
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

const MAX_TOKENS_REASON: &str = "MAX_TOKENS";

/// Gemini API provider
pub struct GeminiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    mime_type: String,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: RequestGenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

impl From<&GenerationConfig> for RequestGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_llm_response(self) -> Result<LlmResponse, LlmError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::InvalidResponse(format!(
                "Empty response from Gemini: {}",
                reason
            )));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let is_truncated_by_token_limit =
            candidate.finish_reason.as_deref() == Some(MAX_TOKENS_REASON);

        if text.is_empty() && !is_truncated_by_token_limit {
            return Err(LlmError::InvalidResponse(format!(
                "Candidate has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(LlmResponse {
            text,
            is_truncated_by_token_limit,
        })
    }
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// # Parameters
    ///
    /// - `model`: Model to use (e.g., "gemini-1.5-pro")
    /// - `api_key`: API key sent as the `key` query parameter
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        // A fresh runtime may drive each call, so pooled connections are not kept.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a provider reading the API key from `GEMINI_API_KEY`
    pub fn from_env(model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| LlmError::Configuration(format!("{} is not set", API_KEY_ENV)))?;
        if api_key.trim().is_empty() {
            return Err(LlmError::Configuration(format!("{} is empty", API_KEY_ENV)));
        }
        Self::new(model, api_key)
    }

    /// Override the API base URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the maximum number of retry attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the MIME type of the inline document
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// Generate a response for `prompt` over `document`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The API is unreachable after all retries
    /// - The model does not exist
    /// - The response has no usable candidate
    pub async fn generate(
        &self,
        prompt: &str,
        document: &[u8],
        config: &GenerationConfig,
    ) -> Result<LlmResponse, LlmError> {
        let mut parts = vec![Part::Text(prompt)];
        if !document.is_empty() {
            parts.push(Part::InlineData(InlineData {
                mime_type: &self.mime_type,
                data: base64::engine::general_purpose::STANDARD.encode(document),
            }));
        }

        let request_body = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: config.into(),
        };

        let url = self.url();
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            debug!(model = %self.model, attempt = attempts + 1, "Sending Gemini request");

            match self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .timeout(timeout)
                .json(&request_body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.json::<GenerateResponse>().await.map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        })?;
                        return body.into_llm_response();
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        let error_text: String = error_text.chars().take(2000).collect();
                        let error = LlmError::Communication(format!("HTTP {}: {}", status, error_text));
                        if status.is_client_error() {
                            return Err(error);
                        }
                        last_error = Some(error);
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 2s, 4s, 8s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts));
                warn!(
                    attempt = attempts,
                    max_retries = self.max_retries,
                    delay_secs = delay.as_secs(),
                    "Gemini request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

/// Drive a future to completion from synchronous code
///
/// Reuses the ambient runtime when called from a blocking worker thread,
/// otherwise spins up a current-thread runtime for the call.
fn block_on<F: Future>(future: F) -> Result<F::Output, LlmError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LlmError::Other(format!("Failed to start runtime: {}", e)))?;
            Ok(runtime.block_on(future))
        }
    }
}

impl LlmClient for GeminiProvider {
    type Error = LlmError;

    /// Blocking wrapper; must not be called from inside an async task.
    fn call(
        &self,
        prompt: &str,
        document: &[u8],
        config: &GenerationConfig,
    ) -> Result<LlmResponse, Self::Error> {
        block_on(self.generate(prompt, document, config))?
    }
}
