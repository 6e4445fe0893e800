//! Config command implementation.

use crate::cli::ConfigArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::output::Formatter;

/// Execute the config command.
pub fn execute_config(args: ConfigArgs, formatter: &Formatter) -> Result<()> {
    let preset = config::preset(args.preset);

    if args.write {
        let path = config::default_path()?;
        config::save(&preset, &path)?;
        println!(
            "{}",
            formatter.success(&format!("Configuration written to {}", path.display()))
        );
    } else {
        print!("{}", preset.to_toml().map_err(CliError::Config)?);
    }
    Ok(())
}
