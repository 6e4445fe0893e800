//! Types reported back from document processing

use crate::error::ExtractionFailure;
use crate::parser::Strategy;
use caseflow_domain::{Document, DocumentId, DocumentStatus, Record};
use caseflow_gatekeeper::ValidationIssue;

/// A parsed record that failed schema validation
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Position of the record in its parsed batch (0-based)
    pub position: usize,
    /// The record as parsed
    pub record: Record,
    /// Everything wrong with it
    pub issues: Vec<ValidationIssue>,
}

/// Counts reported by the citation filter for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilteringMetadata {
    /// Records that reached the filter
    pub original_count: usize,
    /// Records the filter kept
    pub filtered_count: usize,
    /// Records excluded as cited material
    pub excluded_count: usize,
}

/// What happened to the records of one LLM round-trip
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    /// Attempt number within the document's log (1-based)
    pub attempt_index: u32,
    /// Whether the response was judged truncated
    pub is_truncated: bool,
    /// Parser strategy that recovered the JSON, if any
    pub strategy: Option<Strategy>,
    /// Records found in the response
    pub parsed_count: usize,
    /// Records failing schema validation
    pub rejected: Vec<RejectedRecord>,
    /// Citation filter counts
    pub filtering: FilteringMetadata,
    /// Records dropped for having too few fields
    pub sparse_count: usize,
    /// Records dropped as duplicates of earlier ones
    pub duplicate_count: usize,
    /// Records newly committed to the document
    pub accepted_count: usize,
}

impl AttemptSummary {
    pub(crate) fn new(attempt_index: u32, is_truncated: bool, strategy: Option<Strategy>) -> Self {
        Self {
            attempt_index,
            is_truncated,
            strategy,
            parsed_count: 0,
            rejected: Vec::new(),
            filtering: FilteringMetadata::default(),
            sparse_count: 0,
            duplicate_count: 0,
            accepted_count: 0,
        }
    }
}

/// Result of driving one document through the attempt loop
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    /// The processed document
    pub document_id: DocumentId,
    /// Status the document was left in
    pub status: DocumentStatus,
    /// Every record accumulated so far, across rounds
    pub records: Vec<Record>,
    /// LLM calls made in this round
    pub attempts_used: u32,
    /// Human-readable explanation for non-complete outcomes
    pub message: Option<String>,
    /// Why the document stopped short of `complete`
    pub failure: Option<ExtractionFailure>,
    /// Per-attempt accounting for this round
    pub attempts: Vec<AttemptSummary>,
}

impl DocumentOutcome {
    /// Outcome reflecting a document's stored state
    pub(crate) fn from_document(document: &Document) -> Self {
        Self {
            document_id: document.id,
            status: document.status,
            records: document.accumulated_records.clone(),
            attempts_used: 0,
            message: document.error.clone(),
            failure: None,
            attempts: Vec::new(),
        }
    }

    /// Outcome for a document that could not even be loaded
    pub(crate) fn unavailable(document_id: DocumentId, failure: ExtractionFailure) -> Self {
        Self {
            document_id,
            status: DocumentStatus::Error,
            records: Vec::new(),
            attempts_used: 0,
            message: Some(failure.to_string()),
            failure: Some(failure),
            attempts: Vec::new(),
        }
    }

    /// Whether an operator should trigger a continuation
    pub fn needs_continuation(&self) -> bool {
        self.status.needs_continuation()
    }

    /// Citation filter counts summed over this round's attempts
    pub fn filtering(&self) -> FilteringMetadata {
        self.attempts
            .iter()
            .fold(FilteringMetadata::default(), |acc, a| FilteringMetadata {
                original_count: acc.original_count + a.filtering.original_count,
                filtered_count: acc.filtered_count + a.filtering.filtered_count,
                excluded_count: acc.excluded_count + a.filtering.excluded_count,
            })
    }

    /// Validation failures across this round's attempts
    pub fn rejected(&self) -> impl Iterator<Item = &RejectedRecord> {
        self.attempts.iter().flat_map(|a| a.rejected.iter())
    }
}
