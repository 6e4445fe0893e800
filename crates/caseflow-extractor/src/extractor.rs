//! Core Extractor implementation

use crate::config::ExtractorConfig;
use crate::error::{ExtractionFailure, ExtractorError};
use crate::job::JobContext;
use crate::parser::{extract_records, extract_with_strategy};
use crate::prompt::{ContinuationPromptBuilder, PromptBuilder};
use crate::screen::Screener;
use crate::truncation::is_truncated;
use crate::types::{AttemptSummary, DocumentOutcome};
use caseflow_domain::traits::{DocumentStore, LlmClient};
use caseflow_domain::{Document, DocumentId, DocumentStatus, ExtractionAttempt, JobId, LlmResponse};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// The Extractor drives documents through the LLM extraction loop
///
/// Each call to [`Extractor::process_document`] runs one processing round:
/// up to `max_attempts` LLM round-trips, continuing after truncated output
/// from the document's committed-record cursor.
pub struct Extractor<L, S>
where
    L: LlmClient,
    S: DocumentStore,
{
    llm: Arc<L>,
    store: Arc<Mutex<S>>,
    screener: Screener,
    config: ExtractorConfig,
}

impl<L, S> Extractor<L, S>
where
    L: LlmClient + Send + Sync + 'static,
    S: DocumentStore,
{
    /// Create a new Extractor
    ///
    /// Fails when the configuration is invalid or a citation pattern does
    /// not compile.
    pub fn new(llm: L, store: S, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::with_shared_store(Arc::new(llm), Arc::new(Mutex::new(store)), config)
    }

    /// Create an Extractor over an LLM client and store shared with the caller
    pub fn with_shared_store(
        llm: Arc<L>,
        store: Arc<Mutex<S>>,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        let screener = Screener::new(&config)?;

        Ok(Self {
            llm,
            store,
            screener,
            config,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// The shared document store
    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    /// Insert or replace a document
    pub fn add_document(&self, document: &Document) -> Result<(), ExtractorError> {
        self.with_store(|store| store.save_document(document))
    }

    /// Get a document by ID
    pub fn get_document(&self, id: DocumentId) -> Result<Document, ExtractorError> {
        self.with_store(|store| store.get_document(id))?
            .ok_or_else(|| ExtractorError::DocumentNotFound(id.to_string()))
    }

    /// List a job's documents in creation order
    pub fn list_documents(&self, job_id: JobId) -> Result<Vec<Document>, ExtractorError> {
        self.with_store(|store| store.list_documents(job_id))
    }

    /// A document's attempt log
    pub fn list_attempts(&self, id: DocumentId) -> Result<Vec<ExtractionAttempt>, ExtractorError> {
        self.with_store(|store| store.list_attempts(id))
    }

    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut S) -> Result<T, S::Error>,
    ) -> Result<T, ExtractorError> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| ExtractorError::Store(format!("Store lock error: {}", e)))?;
        op(&mut *store).map_err(|e| ExtractorError::Store(e.to_string()))
    }

    /// Run one processing round for a document
    ///
    /// Never fails: every problem ends up in the returned outcome and in the
    /// document's stored status. Documents already `complete` or `error` are
    /// returned untouched; `processed` documents resume from their cursor.
    pub async fn process_document(
        &self,
        document_id: DocumentId,
        context: &JobContext,
    ) -> DocumentOutcome {
        let document = match self.with_store(|store| store.get_document(document_id)) {
            Ok(Some(document)) => document,
            Ok(None) => {
                return self.unavailable(
                    document_id,
                    context,
                    ExtractionFailure::Storage(format!("document {} not found", document_id)),
                )
            }
            Err(e) => {
                return self.unavailable(
                    document_id,
                    context,
                    ExtractionFailure::Storage(e.to_string()),
                )
            }
        };

        if document.status.is_terminal() {
            debug!("Document {} already {}, skipping", document_id, document.status);
            return DocumentOutcome::from_document(&document);
        }

        self.run_round(document, context).await
    }

    fn unavailable(
        &self,
        document_id: DocumentId,
        context: &JobContext,
        failure: ExtractionFailure,
    ) -> DocumentOutcome {
        error!("Document {} unavailable: {}", document_id, failure);
        if let Some(tracker) = &context.tracker {
            tracker.record_settled(document_id, DocumentStatus::Error);
        }
        DocumentOutcome::unavailable(document_id, failure)
    }

    async fn run_round(&self, mut document: Document, context: &JobContext) -> DocumentOutcome {
        let document_id = document.id;
        let mut round = Round::default();

        document.status = DocumentStatus::Processing;
        document.error = None;
        if let Some(tracker) = &context.tracker {
            tracker.mark_processing(document_id);
        }

        let history = match self
            .with_store(|store| store.save_document(&document))
            .and_then(|_| self.with_store(|store| store.list_attempts(document_id)))
        {
            Ok(history) => history,
            Err(e) => {
                return self.finish(
                    document,
                    round,
                    Some(ExtractionFailure::Storage(e.to_string())),
                    context,
                )
            }
        };

        let base_prompt = PromptBuilder::new(&context.schema)
            .with_records_key(self.config.records_key.as_str())
            .with_confidence_range(
                self.config.validation.min_confidence,
                self.config.validation.max_confidence,
            )
            .build();

        let first_index = history.last().map(|a| a.attempt_index).unwrap_or(0) + 1;
        let mut previous_raw = if document.last_successful_record_index > 0 {
            history.last().map(|a| a.raw_text.clone())
        } else {
            None
        };
        let content: Arc<[u8]> = Arc::from(document.content.as_slice());

        info!(
            "Processing document {} ({}) from cursor {}",
            document_id, document.name, document.last_successful_record_index
        );

        let failure = loop {
            if round.attempts_used >= self.config.max_attempts {
                break Some(ExtractionFailure::RetryBudgetExhausted {
                    attempts: round.attempts_used,
                });
            }
            if context.cancel.is_cancelled() {
                break Some(ExtractionFailure::Cancelled {
                    attempts: round.attempts_used,
                });
            }

            let attempt_index = first_index + round.attempts_used;
            round.attempts_used += 1;
            let cursor = document.last_successful_record_index;

            let prompt = if cursor == 0 {
                base_prompt.clone()
            } else {
                let mut builder = ContinuationPromptBuilder::new(base_prompt.as_str())
                    .with_records_key(self.config.records_key.as_str());
                if let Some(previous) = &previous_raw {
                    builder = builder.with_previous_response(previous);
                }
                builder.build(cursor)
            };
            debug!(
                "Document {} attempt {}: prompt {} chars, cursor {}",
                document_id,
                attempt_index,
                prompt.len(),
                cursor
            );

            let response = match self.call_llm(prompt, Arc::clone(&content)).await {
                Ok(response) => response,
                Err(message) => {
                    warn!(
                        "Document {} attempt {}: LLM call failed: {}",
                        document_id, attempt_index, message
                    );
                    let attempt = ExtractionAttempt {
                        attempt_index,
                        cursor,
                        raw_text: String::new(),
                        parsed: None,
                        is_truncated: false,
                        error: Some(message.clone()),
                        created_at: now(),
                    };
                    if let Err(e) = self.with_store(|store| store.append_attempt(document_id, &attempt)) {
                        warn!("Failed to log attempt {} for document {}: {}", attempt_index, document_id, e);
                    }
                    break Some(ExtractionFailure::Transport(message));
                }
            };

            let truncated = response.is_truncated_by_token_limit || is_truncated(&response.text);
            let recovery = extract_with_strategy(&response.text);
            let strategy = recovery.as_ref().map(|r| r.strategy);
            let parsed = recovery
                .as_ref()
                .and_then(|r| extract_records(&r.object, &self.config.records_key));

            let attempt = ExtractionAttempt {
                attempt_index,
                cursor,
                raw_text: response.text.clone(),
                parsed: parsed.clone(),
                is_truncated: truncated,
                error: parsed.is_none().then(|| {
                    format!("no '{}' list recovered from response", self.config.records_key)
                }),
                created_at: now(),
            };
            if let Err(e) = self.with_store(|store| store.append_attempt(document_id, &attempt)) {
                break Some(ExtractionFailure::Storage(e.to_string()));
            }
            previous_raw = Some(response.text);

            let mut summary = AttemptSummary::new(attempt_index, truncated, strategy);
            let records = match parsed {
                Some(records) => records,
                None => {
                    round.summaries.push(summary);
                    if truncated {
                        warn!(
                            "Document {} attempt {}: truncated response could not be parsed",
                            document_id, attempt_index
                        );
                        break Some(ExtractionFailure::StuckTruncation {
                            attempt: attempt_index,
                        });
                    }
                    break Some(ExtractionFailure::Parse);
                }
            };

            let screening =
                self.screener.screen(records, &context.schema, &document.accumulated_records);
            summary.parsed_count = screening.parsed_count;
            summary.rejected = screening.rejected;
            summary.filtering = screening.filtering;
            summary.sparse_count = screening.sparse_count;
            summary.duplicate_count = screening.duplicate_count;
            summary.accepted_count = screening.accepted.len();

            let gained = screening.accepted.len();
            document.accumulated_records.extend(screening.accepted);
            document.last_successful_record_index += gained;
            round.summaries.push(summary);

            if let Err(e) = self.with_store(|store| store.save_document(&document)) {
                break Some(ExtractionFailure::Storage(e.to_string()));
            }

            info!(
                "Document {} attempt {}: {} new records (total {}), truncated: {}",
                document_id,
                attempt_index,
                gained,
                document.accumulated_records.len(),
                truncated
            );

            if !truncated {
                break None;
            }
            if gained == 0 {
                break Some(ExtractionFailure::StuckTruncation {
                    attempt: attempt_index,
                });
            }
        };

        self.finish(document, round, failure, context)
    }

    fn finish(
        &self,
        mut document: Document,
        round: Round,
        mut failure: Option<ExtractionFailure>,
        context: &JobContext,
    ) -> DocumentOutcome {
        let document_id = document.id;
        document.status = status_for(failure.as_ref());
        document.error = failure.as_ref().map(|f| f.to_string());

        if let Err(e) = self.with_store(|store| store.save_document(&document)) {
            error!("Failed to persist final state of document {}: {}", document_id, e);
            let storage = ExtractionFailure::Storage(e.to_string());
            document.status = DocumentStatus::Error;
            document.error = Some(storage.to_string());
            failure = Some(storage);
        }

        match &failure {
            None => info!(
                "Document {} complete: {} records in {} attempts",
                document_id,
                document.accumulated_records.len(),
                round.attempts_used
            ),
            Some(f) if f.is_resumable() => warn!(
                "Document {} needs continuation after {} records: {}",
                document_id,
                document.last_successful_record_index,
                f
            ),
            Some(f) => error!("Document {} failed: {}", document_id, f),
        }

        if let Some(tracker) = &context.tracker {
            tracker.record_settled(document_id, document.status);
        }

        DocumentOutcome {
            document_id,
            status: document.status,
            records: document.accumulated_records,
            attempts_used: round.attempts_used,
            message: document.error,
            failure,
            attempts: round.summaries,
        }
    }

    /// Call the LLM on a blocking thread
    async fn call_llm(&self, prompt: String, content: Arc<[u8]>) -> Result<LlmResponse, String> {
        let llm = Arc::clone(&self.llm);
        let generation = self.config.generation.clone();

        tokio::task::spawn_blocking(move || {
            llm.call(&prompt, &content, &generation)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("Task join error: {}", e))?
    }
}

/// Per-round bookkeeping
#[derive(Default)]
struct Round {
    attempts_used: u32,
    summaries: Vec<AttemptSummary>,
}

fn status_for(failure: Option<&ExtractionFailure>) -> DocumentStatus {
    match failure {
        None => DocumentStatus::Complete,
        Some(f) if f.is_resumable() => DocumentStatus::Processed,
        Some(_) => DocumentStatus::Error,
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_llm::MockProvider;
    use caseflow_store::MemoryStore;

    #[test]
    fn test_status_for_failures() {
        assert_eq!(status_for(None), DocumentStatus::Complete);
        assert_eq!(
            status_for(Some(&ExtractionFailure::RetryBudgetExhausted { attempts: 5 })),
            DocumentStatus::Processed
        );
        assert_eq!(
            status_for(Some(&ExtractionFailure::Parse)),
            DocumentStatus::Error
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ExtractorConfig::default();
        config.max_attempts = 0;
        let result = Extractor::new(MockProvider::default(), MemoryStore::new(), config);
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_bad_citation_pattern_rejected() {
        let mut config = ExtractorConfig::default();
        config
            .citation
            .citation_patterns
            .push(crate::citation::WeightedPattern::new("(unclosed", 1.0));
        let result = Extractor::new(MockProvider::default(), MemoryStore::new(), config);
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_get_missing_document() {
        let extractor =
            Extractor::new(MockProvider::default(), MemoryStore::new(), ExtractorConfig::default())
                .unwrap();
        assert!(matches!(
            extractor.get_document(DocumentId::new()),
            Err(ExtractorError::DocumentNotFound(_))
        ));
    }
}
