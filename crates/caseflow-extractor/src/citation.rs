//! Citation filter - drops records quoted from other publications
//!
//! Case reports often summarize previously published cases in a literature
//! review section. The LLM extracts those too. Each record is scored against
//! weighted citation patterns and review keywords and excluded when the
//! scores cross the policy thresholds.

use caseflow_domain::Record;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A regex with the score it contributes when it matches a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPattern {
    /// Regular expression, matched case-insensitively
    pub pattern: String,
    /// Score added once per field the pattern matches
    pub weight: f64,
}

impl WeightedPattern {
    /// Create a weighted pattern
    pub fn new(pattern: impl Into<String>, weight: f64) -> Self {
        Self {
            pattern: pattern.into(),
            weight,
        }
    }
}

/// Weights and thresholds used to classify records as cited material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationPolicy {
    /// Patterns that look like bibliographic references
    pub citation_patterns: Vec<WeightedPattern>,

    /// Phrases typical of review or summary sections
    pub review_keywords: Vec<WeightedPattern>,

    /// Citation patterns at least this heavy earn the identifier bonus
    pub identifier_bonus_min_weight: f64,

    /// Extra citation score per strong pattern in the identifier field
    pub identifier_citation_bonus: f64,

    /// Extra review score per keyword in the identifier field
    pub identifier_review_bonus: f64,

    /// Citation score alone that excludes a record
    pub citation_threshold: f64,

    /// Review score alone that excludes a record
    pub review_threshold: f64,

    /// Citation score that excludes together with `combined_review_threshold`
    pub combined_citation_threshold: f64,

    /// Review score that excludes together with `combined_citation_threshold`
    pub combined_review_threshold: f64,
}

impl Default for CitationPolicy {
    fn default() -> Self {
        Self {
            citation_patterns: vec![
                WeightedPattern::new(r"\b[A-Z][a-z]+ et al\.?,? \d{4}\b", 2.0),
                WeightedPattern::new(r"\b[A-Z][a-z]+ and [A-Z][a-z]+,? \d{4}\b", 2.0),
                WeightedPattern::new(r"\[\d+(?:,\s*\d+)*\]", 1.5),
                WeightedPattern::new(r"\bRef\.?\s*\d+", 1.5),
                WeightedPattern::new(r"Table [IVXLCDM]+", 1.0),
                WeightedPattern::new(r"\(\s?\d{4}\s?\)", 0.5),
            ],
            review_keywords: vec![
                WeightedPattern::new(r"\bliterature review\b", 2.0),
                WeightedPattern::new(r"\bpublished cases?\b", 1.5),
                WeightedPattern::new(r"\breported by\b", 1.0),
                WeightedPattern::new(r"\bprevious stud(y|ies)\b", 1.0),
                WeightedPattern::new(r"\bprior cases?\b", 1.0),
                WeightedPattern::new(r"\bsummar(y|ies)\b", 0.5),
                WeightedPattern::new(r"\bcomparison\b", 0.5),
                WeightedPattern::new(r"\bcited in\b", 1.5),
            ],
            identifier_bonus_min_weight: 1.5,
            identifier_citation_bonus: 1.5,
            identifier_review_bonus: 1.0,
            citation_threshold: 2.0,
            review_threshold: 2.5,
            combined_citation_threshold: 1.0,
            combined_review_threshold: 1.5,
        }
    }
}

impl CitationPolicy {
    /// Validate weights and thresholds
    pub fn validate(&self) -> Result<(), String> {
        let weights = self
            .citation_patterns
            .iter()
            .chain(&self.review_keywords)
            .map(|p| p.weight);
        let bonuses = [
            self.identifier_citation_bonus,
            self.identifier_review_bonus,
            self.identifier_bonus_min_weight,
        ];
        if weights.chain(bonuses).any(|w| !w.is_finite() || w < 0.0) {
            return Err("citation weights and bonuses must be finite and non-negative".to_string());
        }

        let thresholds = [
            self.citation_threshold,
            self.review_threshold,
            self.combined_citation_threshold,
            self.combined_review_threshold,
        ];
        if thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err("citation thresholds must be finite and greater than 0".to_string());
        }
        Ok(())
    }

    /// Whether a pair of scores marks a record as cited material
    pub fn excludes(&self, citation_score: f64, review_score: f64) -> bool {
        citation_score >= self.citation_threshold
            || review_score >= self.review_threshold
            || (citation_score >= self.combined_citation_threshold
                && review_score >= self.combined_review_threshold)
    }
}

/// A record removed by the filter
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    /// The excluded record
    pub record: Record,
    /// Accumulated citation score
    pub citation_score: f64,
    /// Accumulated review score
    pub review_score: f64,
    /// Which pattern matched which field
    pub reasons: Vec<String>,
}

/// Outcome of filtering one batch of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationReport {
    /// Records judged to be primary cases, in input order
    pub kept: Vec<Record>,
    /// Records judged to be cited material
    pub excluded: Vec<Exclusion>,
}

impl CitationReport {
    /// Number of records that went in
    pub fn original_count(&self) -> usize {
        self.kept.len() + self.excluded.len()
    }
}

#[derive(Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
    weight: f64,
}

fn compile(patterns: &[WeightedPattern]) -> Result<Vec<CompiledPattern>, String> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(&p.pattern)
                .case_insensitive(true)
                .build()
                .map(|regex| CompiledPattern {
                    source: p.pattern.clone(),
                    regex,
                    weight: p.weight,
                })
                .map_err(|e| format!("invalid citation pattern '{}': {}", p.pattern, e))
        })
        .collect()
}

/// Scores records and separates primary cases from cited ones
#[derive(Clone)]
pub struct CitationFilter {
    policy: CitationPolicy,
    citation_patterns: Vec<CompiledPattern>,
    review_keywords: Vec<CompiledPattern>,
    identifier_field: String,
}

impl CitationFilter {
    /// Compile a policy; fails on invalid patterns or weights
    pub fn new(policy: CitationPolicy, identifier_field: impl Into<String>) -> Result<Self, String> {
        policy.validate()?;
        Ok(Self {
            citation_patterns: compile(&policy.citation_patterns)?,
            review_keywords: compile(&policy.review_keywords)?,
            identifier_field: identifier_field.into(),
            policy,
        })
    }

    /// Filter with the default policy
    pub fn with_defaults(identifier_field: impl Into<String>) -> Result<Self, String> {
        Self::new(CitationPolicy::default(), identifier_field)
    }

    /// The same compiled policy, scoring a different identifier field
    pub fn for_identifier(&self, identifier_field: impl Into<String>) -> Self {
        Self {
            identifier_field: identifier_field.into(),
            ..self.clone()
        }
    }

    /// Score a single record, returning `(citation, review, reasons)`
    pub fn score(&self, record: &Record) -> (f64, f64, Vec<String>) {
        let mut citation = 0.0;
        let mut review = 0.0;
        let mut reasons = Vec::new();

        for (name, value) in record.iter() {
            let text = value.text();
            if text.trim().is_empty() {
                continue;
            }

            for p in &self.citation_patterns {
                if p.regex.is_match(&text) {
                    citation += p.weight;
                    reasons.push(format!("citation pattern '{}' in field '{}'", p.source, name));
                }
            }
            for p in &self.review_keywords {
                if p.regex.is_match(&text) {
                    review += p.weight;
                    reasons.push(format!("review keyword '{}' in field '{}'", p.source, name));
                }
            }

            if name == self.identifier_field {
                for p in &self.citation_patterns {
                    if p.weight >= self.policy.identifier_bonus_min_weight && p.regex.is_match(&text) {
                        citation += self.policy.identifier_citation_bonus;
                        reasons.push(format!("strong citation pattern '{}' in identifier", p.source));
                    }
                }
                for p in &self.review_keywords {
                    if p.regex.is_match(&text) {
                        review += self.policy.identifier_review_bonus;
                        reasons.push(format!("review keyword '{}' in identifier", p.source));
                    }
                }
            }
        }

        (citation, review, reasons)
    }

    /// Whether a record would be excluded
    pub fn is_cited(&self, record: &Record) -> bool {
        let (citation, review, _) = self.score(record);
        self.policy.excludes(citation, review)
    }

    /// Split records into kept and excluded, preserving order
    pub fn filter(&self, records: Vec<Record>) -> CitationReport {
        let mut report = CitationReport::default();

        for record in records {
            let (citation_score, review_score, reasons) = self.score(&record);
            if self.policy.excludes(citation_score, review_score) {
                report.excluded.push(Exclusion {
                    record,
                    citation_score,
                    review_score,
                    reasons,
                });
            } else {
                report.kept.push(record);
            }
        }

        if report.excluded.is_empty() {
            debug!("No records filtered out as cited material");
        } else {
            info!(
                "Excluded {} potential cited/review records out of {}",
                report.excluded.len(),
                report.original_count()
            );
            for exclusion in &report.excluded {
                debug!(
                    "Excluded record {}: {}",
                    exclusion
                        .record
                        .text_of(&self.identifier_field)
                        .unwrap_or_else(|| "N/A".to_string()),
                    exclusion.reasons.join("; ")
                );
            }
        }

        report
    }
}
