//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::commands::inspect::InspectReport;
use crate::error::Result;
use caseflow_domain::{DocumentId, DocumentStatus, Record};
use caseflow_extractor::JobReport;
use colored::*;
use std::collections::HashMap;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: CliFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: CliFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the result of inspecting a raw response.
    pub fn format_inspect(&self, report: &InspectReport, with_records: bool) -> Result<String> {
        match self.format {
            CliFormat::Json => {
                let mut value = serde_json::json!({
                    "truncated": report.truncated,
                    "strategy": report.strategy,
                    "parsed": report.parsed,
                    "rejected": report.rejected,
                    "excluded": report.excluded,
                    "sparse": report.sparse,
                    "duplicates": report.duplicates,
                    "accepted": report.records.len(),
                    "issues": report.issues,
                });
                if with_records {
                    value["records"] = records_json(&report.records);
                }
                Ok(serde_json::to_string_pretty(&value)?)
            }
            CliFormat::Quiet => Ok(format!(
                "{} {}",
                report.records.len(),
                if report.truncated { "truncated" } else { "complete" }
            )),
            CliFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Check", "Result"]);
                builder.push_record([
                    "Truncated".to_string(),
                    if report.truncated { "yes" } else { "no" }.to_string(),
                ]);
                builder.push_record([
                    "Strategy".to_string(),
                    report.strategy.clone().unwrap_or_else(|| "none".to_string()),
                ]);
                builder.push_record(["Parsed".to_string(), report.parsed.to_string()]);
                builder.push_record(["Rejected".to_string(), report.rejected.to_string()]);
                builder.push_record(["Cited".to_string(), report.excluded.to_string()]);
                builder.push_record(["Sparse".to_string(), report.sparse.to_string()]);
                builder.push_record(["Duplicates".to_string(), report.duplicates.to_string()]);
                builder.push_record(["Accepted".to_string(), report.records.len().to_string()]);

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));

                let mut out = table.to_string();
                for issue in &report.issues {
                    out.push('\n');
                    out.push_str(&self.warning(issue));
                }
                if report.truncated {
                    out.push('\n');
                    out.push_str(&self.warning("Response looks truncated; a continuation is needed"));
                }
                if with_records {
                    out.push('\n');
                    out.push_str(&serde_json::to_string_pretty(&records_json(&report.records))?);
                }
                Ok(out)
            }
        }
    }

    /// Format the result of a job round.
    pub fn format_job(&self, report: &JobReport, names: &HashMap<DocumentId, String>) -> Result<String> {
        let name_of = |id: &DocumentId| names.get(id).cloned().unwrap_or_else(|| id.to_string());

        match self.format {
            CliFormat::Json => {
                let outcomes: Vec<serde_json::Value> = report
                    .outcomes
                    .iter()
                    .map(|o| {
                        serde_json::json!({
                            "document_id": o.document_id.to_string(),
                            "name": name_of(&o.document_id),
                            "status": o.status.as_str(),
                            "records": o.records.len(),
                            "attempts": o.attempts_used,
                            "message": o.message,
                        })
                    })
                    .collect();
                let value = serde_json::json!({
                    "job_id": report.job.id.to_string(),
                    "status": report.job.status.as_str(),
                    "processed_count": report.job.processed_count,
                    "total_count": report.job.total_count,
                    "documents": outcomes,
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            CliFormat::Quiet => Ok(report.job.status.to_string()),
            CliFormat::Table => {
                let mut out = String::new();
                if report.outcomes.is_empty() {
                    out.push_str(&self.warning("No documents needed processing."));
                } else {
                    let mut builder = Builder::default();
                    builder.push_record(["Document", "Status", "Records", "Attempts", "Message"]);
                    for outcome in &report.outcomes {
                        builder.push_record([
                            name_of(&outcome.document_id),
                            self.status(outcome.status),
                            outcome.records.len().to_string(),
                            outcome.attempts_used.to_string(),
                            outcome.message.clone().unwrap_or_default(),
                        ]);
                    }
                    let mut table = builder.build();
                    table
                        .with(Style::rounded())
                        .with(Modify::new(Rows::first()).with(Alignment::center()));
                    out.push_str(&table.to_string());
                }

                out.push('\n');
                let summary = format!(
                    "Job {}: {} ({}/{} documents settled)",
                    report.job.id,
                    report.job.status,
                    report.job.processed_count,
                    report.job.total_count
                );
                if report.needing_continuation().next().is_some() {
                    out.push_str(&self.warning(&summary));
                    out.push('\n');
                    out.push_str(&self.info(&format!(
                        "Re-run with --job {} to continue",
                        report.job.id
                    )));
                } else {
                    out.push_str(&self.success(&summary));
                }
                Ok(out)
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status(&self, status: DocumentStatus) -> String {
        let color = match status {
            DocumentStatus::Complete => "green",
            DocumentStatus::Processed => "yellow",
            DocumentStatus::Error => "red",
            DocumentStatus::Pending | DocumentStatus::Processing => "cyan",
        };
        self.colorize(status.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn records_json(records: &[Record]) -> serde_json::Value {
    serde_json::Value::Array(records.iter().map(Record::to_json).collect())
}
