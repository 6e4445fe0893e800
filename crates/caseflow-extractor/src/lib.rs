//! Caseflow Extractor
//!
//! Recovers structured case records from raw LLM output and drives documents
//! through a bounded continuation loop when that output is cut off.
//!
//! # Overview
//!
//! LLM responses arrive wrapped in prose and markdown fences, with comments,
//! trailing commas and typographic quotes, and are frequently truncated by
//! the output token limit. The extractor turns each response into records
//! the job can trust and asks the model to continue where it stopped.
//!
//! # Architecture
//!
//! ```text
//! Document → Prompt → LLM → Truncation check → JSON recovery
//!          → CaseValidator → CitationFilter → Dedup → DocumentStore
//! ```
//!
//! # Key Features
//!
//! - **Truncation Detection**: tail heuristics ORed with the client's own flag
//! - **Resilient Parsing**: four recovery strategies, from a direct scan to
//!   closing off a truncated object
//! - **Continuation**: resumes after the last committed record, bounded by
//!   `max_attempts`
//! - **Screening**: schema validation, cited-case filtering, deduplication
//! - **Job Runner**: processes a job's documents concurrently and folds their
//!   statuses into the job's
//!
//! # Example Usage
//!
//! ```no_run
//! use caseflow_domain::{Document, FieldSchema, JobId};
//! use caseflow_extractor::{Extractor, ExtractorConfig, JobContext};
//! use caseflow_llm::MockProvider;
//! use caseflow_store::SqliteStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = MockProvider::new(r#"{"case_results": []}"#);
//! let store = SqliteStore::new(":memory:")?;
//! let extractor = Extractor::new(llm, store, ExtractorConfig::default())?;
//!
//! let document = Document::new(JobId::new(), "report.pdf", b"%PDF".to_vec());
//! extractor.add_document(&document)?;
//!
//! let context = JobContext::new(Arc::new(FieldSchema::default()));
//! let outcome = extractor.process_document(document.id, &context).await;
//!
//! println!("{}: {} records", outcome.status, outcome.records.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cancel;
pub mod citation;
pub mod dedup;
pub mod parser;
pub mod prompt;
pub mod screen;
pub mod truncation;

mod config;
mod error;
mod extractor;
mod job;
mod types;

#[cfg(test)]
mod tests;

pub use cancel::CancellationToken;
pub use citation::{CitationFilter, CitationPolicy, CitationReport, Exclusion, WeightedPattern};
pub use config::{load_schema, schema_from_json, schema_from_toml, ExtractorConfig};
pub use dedup::RecordDeduplicator;
pub use error::{ExtractionFailure, ExtractorError};
pub use extractor::Extractor;
pub use job::{JobContext, JobReport, JobRunner, JobTracker};
pub use parser::Strategy;
pub use screen::{Screener, Screening};
pub use types::{AttemptSummary, DocumentOutcome, FilteringMetadata, RejectedRecord};
