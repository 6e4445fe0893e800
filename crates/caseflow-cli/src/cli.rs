//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Caseflow CLI - Recover and validate case records from LLM output.
#[derive(Debug, Parser)]
#[command(name = "caseflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Extractor configuration file (TOML)
    #[arg(short, long, global = true, env = "CASEFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (statuses and counts only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run recovery and screening over a saved raw LLM response
    Inspect(InspectArgs),

    /// Extract case records from every file in a directory
    Run(RunArgs),

    /// Print or write the extractor configuration
    Config(ConfigArgs),
}

/// Arguments for the inspect command.
#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// File holding the raw LLM response
    pub file: PathBuf,

    /// Field schema (TOML or JSON); identifier-only schema when omitted
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Print the recovered records as well as the summary
    #[arg(long)]
    pub records: bool,
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Directory of source documents
    pub dir: PathBuf,

    /// Field schema (TOML or JSON)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Gemini model name
    #[arg(short, long, env = "CASEFLOW_MODEL", default_value = "gemini-1.5-pro")]
    pub model: String,

    /// SQLite database holding documents and attempt logs
    #[arg(long, default_value = "caseflow.db")]
    pub db: PathBuf,

    /// Continue an existing job instead of starting a new one
    #[arg(long)]
    pub job: Option<String>,

    /// Override the attempt budget per document
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// MIME type of the source documents
    #[arg(long, default_value = "application/pdf")]
    pub mime_type: String,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Preset to start from
    #[arg(short, long, value_enum, default_value = "default")]
    pub preset: PresetArg,

    /// Write the configuration to the default location instead of printing it
    #[arg(long)]
    pub write: bool,
}

/// Configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// Fewer attempts, more aggressive deduplication
    Strict,
    /// More attempts, accepts bare field values
    Lenient,
}
