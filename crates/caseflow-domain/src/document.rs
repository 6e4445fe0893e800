//! Document module - a source file moving through extraction

use crate::{DocumentId, JobId, Record};

/// Status of a document in the extraction state machine
///
/// ```text
/// pending → processing → { complete | processed | error }
/// ```
///
/// `Processed` means the last response was still truncated when the attempt
/// budget ran out; the document can be resumed from its cursor later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    /// Waiting to be picked up
    Pending,

    /// A worker is currently driving attempts
    Processing,

    /// Truncated output remains; needs continuation
    Processed,

    /// All records extracted
    Complete,

    /// Terminal failure
    Error,
}

impl DocumentStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Complete => "complete",
            DocumentStatus::Error => "error",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(DocumentStatus::Pending),
            "processing" => Some(DocumentStatus::Processing),
            "processed" => Some(DocumentStatus::Processed),
            "complete" => Some(DocumentStatus::Complete),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }

    /// Whether the document has stopped for the current processing round
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Processed | DocumentStatus::Complete | DocumentStatus::Error
        )
    }

    /// Whether the document is finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Complete | DocumentStatus::Error)
    }

    /// Whether an operator should trigger a continuation
    pub fn needs_continuation(&self) -> bool {
        matches!(self, DocumentStatus::Processed)
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid document status: {}", s))
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source document and its extraction progress
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,

    /// Owning job
    pub job_id: JobId,

    /// Display name (usually the file name)
    pub name: String,

    /// Raw document bytes sent alongside each prompt
    pub content: Vec<u8>,

    /// Current state
    pub status: DocumentStatus,

    /// Number of records already committed; the continuation cursor
    pub last_successful_record_index: usize,

    /// Records committed so far, in arrival order
    pub accumulated_records: Vec<Record>,

    /// Last terminal or informational error message
    pub error: Option<String>,
}

impl Document {
    /// Create a pending document with no progress
    pub fn new(job_id: JobId, name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            id: DocumentId::new(),
            job_id,
            name: name.into(),
            content,
            status: DocumentStatus::Pending,
            last_successful_record_index: 0,
            accumulated_records: Vec::new(),
            error: None,
        }
    }
}

/// Outcome of one LLM round-trip, appended to the document's attempt log
///
/// Attempts are never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionAttempt {
    /// 1-based index of the attempt within the current run
    pub attempt_index: u32,

    /// Continuation cursor the prompt was built from
    pub cursor: usize,

    /// Raw model output
    pub raw_text: String,

    /// Records recovered from the output, if parsing succeeded
    pub parsed: Option<Vec<Record>>,

    /// Whether the response was judged truncated
    pub is_truncated: bool,

    /// Error recorded for this attempt, if any
    pub error: Option<String>,

    /// Unix timestamp (seconds) when the attempt finished
    pub created_at: u64,
}
