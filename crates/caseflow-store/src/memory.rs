//! In-memory document store

use crate::StoreError;
use caseflow_domain::traits::DocumentStore;
use caseflow_domain::{Document, DocumentId, ExtractionAttempt, JobId};
use std::collections::HashMap;

/// Process-local `DocumentStore`
///
/// Documents list back in id order, which for UUIDv7 ids is creation order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: HashMap<DocumentId, Document>,
    attempts: HashMap<DocumentId, Vec<ExtractionAttempt>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    type Error = StoreError;

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error> {
        Ok(self.documents.get(&id).cloned())
    }

    fn save_document(&mut self, document: &Document) -> Result<(), Self::Error> {
        self.documents.insert(document.id, document.clone());
        Ok(())
    }

    fn list_documents(&self, job_id: JobId) -> Result<Vec<Document>, Self::Error> {
        let mut documents: Vec<Document> = self
            .documents
            .values()
            .filter(|d| d.job_id == job_id)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    fn append_attempt(
        &mut self,
        document_id: DocumentId,
        attempt: &ExtractionAttempt,
    ) -> Result<(), Self::Error> {
        if !self.documents.contains_key(&document_id) {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        self.attempts
            .entry(document_id)
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    fn list_attempts(&self, document_id: DocumentId) -> Result<Vec<ExtractionAttempt>, Self::Error> {
        Ok(self.attempts.get(&document_id).cloned().unwrap_or_default())
    }
}
