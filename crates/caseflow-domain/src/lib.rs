//! Caseflow Domain Layer
//!
//! Core data model for recovering structured case records from LLM output.
//! Everything here is plain data plus the trait seams the engine talks through;
//! parsing, validation and orchestration live in other crates.
//!
//! ## Key Concepts
//!
//! - **Record**: one extracted "case", an ordered mapping from field name to a
//!   [`FieldValue`] (normally a `{value, confidence}` pair)
//! - **FieldSchema**: declarative description of the fields a record may carry
//! - **Document**: one source file moving through the extraction state machine
//! - **ExtractionAttempt**: the immutable log entry of a single LLM round-trip
//! - **Job**: a batch of documents whose status is a fold over theirs
//!
//! ## Architecture
//!
//! - Infrastructure (LLM clients, storage) implements the traits in [`traits`]
//! - The extractor crate drives documents through those traits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod ids;
pub mod job;
pub mod record;
pub mod schema;
pub mod traits;

// Re-exports for convenience
pub use document::{Document, DocumentStatus, ExtractionAttempt};
pub use ids::{DocumentId, JobId};
pub use job::{Job, JobStatus};
pub use record::{FieldValue, Record, Scalar};
pub use schema::{DataType, FieldDefinition, FieldSchema, DEFAULT_IDENTIFIER_FIELD};
pub use traits::{DocumentStore, GenerationConfig, LlmClient, LlmResponse};
