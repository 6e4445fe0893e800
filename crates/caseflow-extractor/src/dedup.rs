//! Record deduplication across continuation attempts
//!
//! A continuation response frequently repeats records the previous response
//! already delivered, usually with a different case number. Records are
//! compared field by field, ignoring the identifier.

use caseflow_domain::{Record, DEFAULT_IDENTIFIER_FIELD};
use tracing::debug;

/// Similarity at or above which two records count as duplicates
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Greedy, order-preserving deduplicator
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDeduplicator {
    threshold: f64,
    identifier_field: String,
}

impl Default for RecordDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_IDENTIFIER_FIELD)
    }
}

impl RecordDeduplicator {
    /// Create a deduplicator
    pub fn new(threshold: f64, identifier_field: impl Into<String>) -> Self {
        Self {
            threshold,
            identifier_field: identifier_field.into(),
        }
    }

    /// The configured threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Fraction of compared fields whose values match
    ///
    /// Fields are the union of both records' keys minus the identifier. A
    /// field matches when both records have it and the values' text is equal
    /// ignoring case; a field present on one side only counts as a mismatch.
    /// Returns 0.0 when there is nothing to compare.
    pub fn similarity(&self, a: &Record, b: &Record) -> f64 {
        let mut total = 0usize;
        let mut matches = 0usize;

        let union = a
            .field_names()
            .chain(b.field_names().filter(|name| !a.contains(name)));

        for name in union {
            if name == self.identifier_field {
                continue;
            }
            total += 1;
            if let (Some(x), Some(y)) = (a.get(name), b.get(name)) {
                if x.text().to_lowercase() == y.text().to_lowercase() {
                    matches += 1;
                }
            }
        }

        if total == 0 {
            0.0
        } else {
            matches as f64 / total as f64
        }
    }

    fn is_duplicate_of_any<'a, I>(&self, candidate: &Record, accepted: I) -> bool
    where
        I: IntoIterator<Item = &'a Record>,
    {
        accepted
            .into_iter()
            .any(|existing| self.similarity(candidate, existing) >= self.threshold)
    }

    /// Drop records similar to an earlier record in the list
    ///
    /// The first record is always kept; order is preserved.
    pub fn dedup(&self, records: Vec<Record>) -> Vec<Record> {
        self.dedup_against(&[], records)
    }

    /// Drop candidates similar to an existing record or an earlier candidate
    pub fn dedup_against(&self, existing: &[Record], candidates: Vec<Record>) -> Vec<Record> {
        let incoming = candidates.len();
        let mut unique: Vec<Record> = Vec::with_capacity(incoming);

        for candidate in candidates {
            if self.is_duplicate_of_any(&candidate, existing.iter().chain(unique.iter())) {
                continue;
            }
            unique.push(candidate);
        }

        if unique.len() < incoming {
            debug!(
                "Dropped {} duplicate records (threshold {})",
                incoming - unique.len(),
                self.threshold
            );
        }
        unique
    }
}

/// Deduplicate with the default identifier field
pub fn dedup(records: Vec<Record>, threshold: f64) -> Vec<Record> {
    RecordDeduplicator::new(threshold, DEFAULT_IDENTIFIER_FIELD).dedup(records)
}

/// Drop records with fewer than `min_fields` fields
///
/// Returns the surviving records and how many were dropped.
pub fn prune_sparse(records: Vec<Record>, min_fields: usize) -> (Vec<Record>, usize) {
    let before = records.len();
    let kept: Vec<Record> = records.into_iter().filter(|r| r.len() >= min_fields).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
