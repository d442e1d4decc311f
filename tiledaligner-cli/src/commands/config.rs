//! Config command implementation - emit an example configuration

use anyhow::{Result, Context};
use std::path::PathBuf;

use crate::config::Config;

pub fn execute(output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            Config::default()
                .save_to_file(&path)
                .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
            log::info!("Wrote example configuration to {}", path.display());
        }
        None => {
            let example = Config::example_toml().context("Failed to serialize default configuration")?;
            print!("{}", example);
        }
    }
    Ok(())
}
