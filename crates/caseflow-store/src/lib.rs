//! Caseflow Storage Layer
//!
//! Implements the `DocumentStore` trait from `caseflow-domain`.
//!
//! # Backends
//!
//! - `SqliteStore`: SQLite file (or `:memory:`) holding documents and their
//!   append-only attempt logs
//! - `MemoryStore`: process-local maps, for tests and one-shot CLI runs
//!
//! # Examples
//!
//! ```no_run
//! use caseflow_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for document operations
//! ```

#![warn(missing_docs)]

pub mod memory;

use caseflow_domain::traits::DocumentStore;
use caseflow_domain::{Document, DocumentId, DocumentStatus, ExtractionAttempt, JobId, Record};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// SQLite-based implementation of DocumentStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store between workers by
/// wrapping it in a mutex, as the extractor does.
pub struct SqliteStore {
    conn: Connection,
}

const DOCUMENT_COLUMNS: &str = "id, job_id, name, content, status, last_successful_record_index, accumulated_records, error";

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use caseflow_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("caseflow.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn id_to_bytes(value: u128) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            StoreError::InvalidData(format!("Expected 16 bytes for id, got {}", bytes.len()))
        })?;
        Ok(u128::from_be_bytes(arr))
    }

    fn conversion_error(column: usize, err: StoreError) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Blob, Box::new(err))
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let job_bytes: Vec<u8> = row.get(1)?;
        let status_str: String = row.get(4)?;
        let records_json: String = row.get(6)?;

        let id = Self::bytes_to_id(&id_bytes).map_err(|e| Self::conversion_error(0, e))?;
        let job_id = Self::bytes_to_id(&job_bytes).map_err(|e| Self::conversion_error(1, e))?;
        let status = DocumentStatus::parse(&status_str).ok_or_else(|| {
            Self::conversion_error(4, StoreError::InvalidData(format!("Unknown status: {}", status_str)))
        })?;
        let accumulated_records: Vec<Record> = serde_json::from_str(&records_json)
            .map_err(|e| Self::conversion_error(6, StoreError::Serialization(e)))?;

        Ok(Document {
            id: DocumentId::from_value(id),
            job_id: JobId::from_value(job_id),
            name: row.get(2)?,
            content: row.get(3)?,
            status,
            last_successful_record_index: row.get::<_, i64>(5)? as usize,
            accumulated_records,
            error: row.get(7)?,
        })
    }

    fn row_to_attempt(row: &Row<'_>) -> rusqlite::Result<ExtractionAttempt> {
        let parsed_json: Option<String> = row.get(3)?;
        let parsed = parsed_json
            .map(|json| serde_json::from_str::<Vec<Record>>(&json))
            .transpose()
            .map_err(|e| Self::conversion_error(3, StoreError::Serialization(e)))?;

        Ok(ExtractionAttempt {
            attempt_index: row.get::<_, i64>(0)? as u32,
            cursor: row.get::<_, i64>(1)? as usize,
            raw_text: row.get(2)?,
            parsed,
            is_truncated: row.get(4)?,
            error: row.get(5)?,
            created_at: row.get::<_, i64>(6)? as u64,
        })
    }

    /// Delete a document and its attempt log
    pub fn delete_document(&mut self, id: DocumentId) -> Result<(), StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![Self::id_to_bytes(id.value())],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    type Error = StoreError;

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error> {
        let document = self
            .conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![Self::id_to_bytes(id.value())],
                Self::row_to_document,
            )
            .optional()?;

        Ok(document)
    }

    fn save_document(&mut self, document: &Document) -> Result<(), Self::Error> {
        let records_json = serde_json::to_string(&document.accumulated_records)?;

        self.conn.execute(
            "INSERT INTO documents (id, job_id, name, content, status, last_successful_record_index, accumulated_records, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
             job_id = excluded.job_id, name = excluded.name, content = excluded.content,
             status = excluded.status,
             last_successful_record_index = excluded.last_successful_record_index,
             accumulated_records = excluded.accumulated_records, error = excluded.error",
            params![
                Self::id_to_bytes(document.id.value()),
                Self::id_to_bytes(document.job_id.value()),
                &document.name,
                &document.content,
                document.status.as_str(),
                document.last_successful_record_index as i64,
                records_json,
                &document.error,
            ],
        )?;

        Ok(())
    }

    fn list_documents(&self, job_id: JobId) -> Result<Vec<Document>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM documents WHERE job_id = ?1 ORDER BY id",
            DOCUMENT_COLUMNS
        ))?;

        let documents = stmt
            .query_map(params![Self::id_to_bytes(job_id.value())], Self::row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn append_attempt(
        &mut self,
        document_id: DocumentId,
        attempt: &ExtractionAttempt,
    ) -> Result<(), Self::Error> {
        let parsed_json = attempt
            .parsed
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = self.conn.execute(
            "INSERT INTO attempts (document_id, attempt_index, cursor, raw_text, parsed, is_truncated, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Self::id_to_bytes(document_id.value()),
                attempt.attempt_index as i64,
                attempt.cursor as i64,
                &attempt.raw_text,
                parsed_json,
                attempt.is_truncated,
                &attempt.error,
                attempt.created_at as i64,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::NotFound(document_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_attempts(&self, document_id: DocumentId) -> Result<Vec<ExtractionAttempt>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT attempt_index, cursor, raw_text, parsed, is_truncated, error, created_at
             FROM attempts WHERE document_id = ?1 ORDER BY seq",
        )?;

        let attempts = stmt
            .query_map(params![Self::id_to_bytes(document_id.value())], Self::row_to_attempt)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(attempts)
    }
}
