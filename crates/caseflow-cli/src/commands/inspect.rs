//! Inspect command implementation.

use crate::cli::InspectArgs;
use crate::error::Result;
use crate::output::Formatter;
use caseflow_domain::{FieldSchema, Record};
use caseflow_extractor::parser::{extract_records, extract_with_strategy};
use caseflow_extractor::truncation::is_truncated;
use caseflow_extractor::{load_schema, ExtractorConfig, Screener};
use std::fs;

/// What one raw response yields after recovery and screening.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    /// The response looks cut off
    pub truncated: bool,
    /// Recovery strategy that succeeded
    pub strategy: Option<String>,
    /// Records found in the recovered object
    pub parsed: usize,
    /// Records failing schema validation
    pub rejected: usize,
    /// Records excluded as cited material
    pub excluded: usize,
    /// Records with too few fields
    pub sparse: usize,
    /// Records collapsed as duplicates
    pub duplicates: usize,
    /// Human-readable problems
    pub issues: Vec<String>,
    /// Records that survived screening
    pub records: Vec<Record>,
}

/// Run detection, recovery and screening over raw response text.
pub fn inspect_text(
    text: &str,
    schema: &FieldSchema,
    config: &ExtractorConfig,
) -> Result<InspectReport> {
    let mut report = InspectReport {
        truncated: is_truncated(text),
        strategy: None,
        parsed: 0,
        rejected: 0,
        excluded: 0,
        sparse: 0,
        duplicates: 0,
        issues: Vec::new(),
        records: Vec::new(),
    };

    let Some(recovery) = extract_with_strategy(text) else {
        report.issues.push("No JSON object could be recovered".to_string());
        return Ok(report);
    };
    report.strategy = Some(format!("{:?}", recovery.strategy));

    let Some(records) = extract_records(&recovery.object, &config.records_key) else {
        report
            .issues
            .push(format!("Recovered object has no '{}' list", config.records_key));
        return Ok(report);
    };
    let screening = Screener::new(config)?.screen(records, schema, &[]);
    report.parsed = screening.parsed_count;
    report.rejected = screening.rejected.len();
    for rejected in &screening.rejected {
        report.issues.extend(
            rejected
                .issues
                .iter()
                .map(|issue| format!("record {}: {}", rejected.position + 1, issue)),
        );
    }
    report.excluded = screening.excluded.len();
    report.sparse = screening.sparse_count;
    report.duplicates = screening.duplicate_count;
    report.records = screening.accepted;

    Ok(report)
}

/// Execute the inspect command.
pub fn execute_inspect(
    args: InspectArgs,
    config: &ExtractorConfig,
    formatter: &Formatter,
) -> Result<()> {
    let text = fs::read_to_string(&args.file)?;
    let schema = match &args.schema {
        Some(path) => load_schema(path)?,
        None => FieldSchema::default(),
    };

    let report = inspect_text(&text, &schema, config)?;
    println!("{}", formatter.format_inspect(&report, args.records)?);
    Ok(())
}
