//! Screening of parsed records
//!
//! Every batch recovered from an LLM response goes through the same steps
//! before it is committed: schema validation, cited-case filtering, sparse
//! pruning and deduplication against what the document already holds.

use crate::citation::{CitationFilter, Exclusion};
use crate::config::ExtractorConfig;
use crate::dedup::{prune_sparse, RecordDeduplicator};
use crate::error::ExtractorError;
use crate::types::{FilteringMetadata, RejectedRecord};
use caseflow_domain::{FieldSchema, Record, DEFAULT_IDENTIFIER_FIELD};
use caseflow_gatekeeper::CaseValidator;
use std::fmt;
use tracing::debug;

/// What screening did to one batch of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Screening {
    /// Records that went in
    pub parsed_count: usize,
    /// Records that survived every step, in input order
    pub accepted: Vec<Record>,
    /// Records failing schema validation
    pub rejected: Vec<RejectedRecord>,
    /// Records excluded as cited material
    pub excluded: Vec<Exclusion>,
    /// Citation filter counts
    pub filtering: FilteringMetadata,
    /// Records dropped for having too few fields
    pub sparse_count: usize,
    /// Records dropped as duplicates
    pub duplicate_count: usize,
}

/// Validates, filters and deduplicates parsed records
pub struct Screener {
    validator: CaseValidator,
    citation: CitationFilter,
    dedup_threshold: f64,
    min_record_fields: usize,
}

impl fmt::Debug for Screener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screener")
            .field("validator", &self.validator)
            .field("dedup_threshold", &self.dedup_threshold)
            .field("min_record_fields", &self.min_record_fields)
            .finish_non_exhaustive()
    }
}

impl Screener {
    /// Build the screening steps from an extractor configuration
    ///
    /// Fails when the confidence scale is empty or a citation pattern does
    /// not compile.
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractorError> {
        let validator = CaseValidator::new(config.validation.clone())
            .map_err(|e| ExtractorError::Config(e.to_string()))?;
        let citation = CitationFilter::new(config.citation.clone(), DEFAULT_IDENTIFIER_FIELD)
            .map_err(ExtractorError::Config)?;

        Ok(Self {
            validator,
            citation,
            dedup_threshold: config.dedup_threshold,
            min_record_fields: config.min_record_fields,
        })
    }

    /// Screen one batch
    ///
    /// `accumulated` holds the records already committed for the document;
    /// candidates similar to any of them are dropped as duplicates.
    pub fn screen(
        &self,
        records: Vec<Record>,
        schema: &FieldSchema,
        accumulated: &[Record],
    ) -> Screening {
        let mut screening = Screening {
            parsed_count: records.len(),
            ..Screening::default()
        };

        let mut valid = Vec::with_capacity(records.len());
        for (position, record) in records.into_iter().enumerate() {
            let result = self.validator.validate(&record, schema);
            if result.is_valid {
                valid.push(record);
            } else {
                debug!("Rejected record {} with {} issues", position, result.errors.len());
                screening.rejected.push(RejectedRecord {
                    position,
                    record,
                    issues: result.errors,
                });
            }
        }

        let report = self
            .citation
            .for_identifier(schema.identifier_field.as_str())
            .filter(valid);
        screening.filtering = FilteringMetadata {
            original_count: report.original_count(),
            filtered_count: report.kept.len(),
            excluded_count: report.excluded.len(),
        };
        screening.excluded = report.excluded;

        let (dense, sparse) = prune_sparse(report.kept, self.min_record_fields);
        screening.sparse_count = sparse;

        let before = dense.len();
        screening.accepted =
            RecordDeduplicator::new(self.dedup_threshold, schema.identifier_field.as_str())
                .dedup_against(accumulated, dense);
        screening.duplicate_count = before - screening.accepted.len();
        screening
    }
}
