//! Locating and loading the extractor configuration.

use crate::cli::PresetArg;
use crate::error::{CliError, Result};
use caseflow_extractor::ExtractorConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file path (`~/.caseflow/config.toml`).
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".caseflow").join("config.toml"))
}

/// Resolve the configuration for a command.
///
/// An explicit path must exist. Otherwise the default location is used when
/// present, and built-in defaults when not.
pub fn load(explicit: Option<&Path>) -> Result<ExtractorConfig> {
    if let Some(path) = explicit {
        return Ok(ExtractorConfig::load(path)?);
    }

    match default_path() {
        Ok(path) if path.exists() => Ok(ExtractorConfig::load(&path)?),
        _ => Ok(ExtractorConfig::default()),
    }
}

/// Configuration for a preset.
pub fn preset(preset: PresetArg) -> ExtractorConfig {
    match preset {
        PresetArg::Default => ExtractorConfig::default(),
        PresetArg::Strict => ExtractorConfig::strict(),
        PresetArg::Lenient => ExtractorConfig::lenient(),
    }
}

/// Write a configuration file, creating parent directories.
pub fn save(config: &ExtractorConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = config.to_toml().map_err(CliError::Config)?;
    fs::write(path, contents)?;
    Ok(())
}
