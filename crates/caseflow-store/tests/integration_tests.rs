//! Integration tests for caseflow-store
//!
//! These tests verify the document and attempt-log cycle against SQLite.

use caseflow_domain::traits::DocumentStore;
use caseflow_domain::{
    Document, DocumentId, DocumentStatus, ExtractionAttempt, FieldValue, JobId, Record,
};
use caseflow_store::{SqliteStore, StoreError};

fn sample_record(case: &str) -> Record {
    Record::new()
        .with_field("case_number", FieldValue::structured(case, 95))
        .with_field("age", FieldValue::structured(42i64, 80))
        .with_field("notes", FieldValue::Unknown("a b".to_string()))
}

fn attempt(index: u32, parsed: Option<Vec<Record>>) -> ExtractionAttempt {
    ExtractionAttempt {
        attempt_index: index,
        cursor: 0,
        raw_text: format!("raw {}", index),
        parsed,
        is_truncated: index == 1,
        error: None,
        created_at: 1_700_000_000 + index as u64,
    }
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_save_and_get_document() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut doc = Document::new(JobId::new(), "paper.pdf", b"%PDF-1.7".to_vec());
    doc.status = DocumentStatus::Processed;
    doc.last_successful_record_index = 1;
    doc.accumulated_records = vec![sample_record("Case 1")];
    doc.error = Some("needs continuation".to_string());

    store.save_document(&doc).unwrap();

    let retrieved = store.get_document(doc.id).unwrap();
    assert_eq!(retrieved, Some(doc));
}

#[test]
fn test_get_missing_document() {
    let store = SqliteStore::new(":memory:").unwrap();
    assert!(store.get_document(DocumentId::new()).unwrap().is_none());
}

#[test]
fn test_save_document_updates_in_place() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let mut doc = Document::new(JobId::new(), "paper.pdf", vec![]);
    store.save_document(&doc).unwrap();

    doc.status = DocumentStatus::Complete;
    doc.accumulated_records.push(sample_record("Case 1"));
    doc.last_successful_record_index = 1;
    store.save_document(&doc).unwrap();

    let retrieved = store.get_document(doc.id).unwrap().unwrap();
    assert_eq!(retrieved.status, DocumentStatus::Complete);
    assert_eq!(retrieved.accumulated_records.len(), 1);
    assert_eq!(store.list_documents(doc.job_id).unwrap().len(), 1);
}

#[test]
fn test_list_documents_by_job() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let job = JobId::new();
    let other = JobId::new();

    let first = Document::new(job, "a.pdf", vec![]);
    let second = Document::new(job, "b.pdf", vec![]);
    let foreign = Document::new(other, "c.pdf", vec![]);
    for doc in [&second, &foreign, &first] {
        store.save_document(doc).unwrap();
    }

    let names: Vec<String> = store
        .list_documents(job)
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);
}

#[test]
fn test_attempt_log_round_trip() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let doc = Document::new(JobId::new(), "paper.pdf", vec![]);
    store.save_document(&doc).unwrap();

    let first = attempt(1, Some(vec![sample_record("Case 1")]));
    let second = ExtractionAttempt {
        error: Some("Failed to parse JSON".to_string()),
        ..attempt(2, None)
    };

    store.append_attempt(doc.id, &first).unwrap();
    store.append_attempt(doc.id, &second).unwrap();

    let attempts = store.list_attempts(doc.id).unwrap();
    assert_eq!(attempts, vec![first, second]);
}

#[test]
fn test_attempt_for_unknown_document() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let result = store.append_attempt(DocumentId::new(), &attempt(1, None));
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[test]
fn test_delete_document_cascades() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let doc = Document::new(JobId::new(), "paper.pdf", vec![]);
    store.save_document(&doc).unwrap();
    store.append_attempt(doc.id, &attempt(1, None)).unwrap();

    store.delete_document(doc.id).unwrap();

    assert!(store.get_document(doc.id).unwrap().is_none());
    assert!(store.list_attempts(doc.id).unwrap().is_empty());
    assert!(matches!(
        store.delete_document(doc.id),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn test_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caseflow.db");
    let doc = Document::new(JobId::new(), "paper.pdf", vec![1, 2, 3]);

    {
        let mut store = SqliteStore::new(&path).unwrap();
        store.save_document(&doc).unwrap();
        store.append_attempt(doc.id, &attempt(1, None)).unwrap();
    }

    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.get_document(doc.id).unwrap(), Some(doc.clone()));
    assert_eq!(store.list_attempts(doc.id).unwrap().len(), 1);
}
