//! Configuration handling for the TiledAligner CLI
//!
//! Supports loading configuration from tiledaligner.toml files with CLI argument overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tiledaligner_core::AlignerParams;

use crate::error::{CliError, CliResult};

const DEFAULT_CONFIG_FILE: &str = "tiledaligner.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub aligner: AlignerParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of threads to use
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Output format ("psl" or "json")
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Occurrences above which a tile built from the reference is marked frequent
    #[serde(default = "default_frequent_threshold")]
    pub frequent_threshold: usize,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_format() -> String { "psl".to_string() }
fn default_frequent_threshold() -> usize { 1000 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            format: default_format(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            frequent_threshold: default_frequent_threshold(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::file_not_found(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> CliResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> CliResult<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    fn validate(&self) -> CliResult<()> {
        if self.general.threads == 0 {
            return Err(CliError::validation("general.threads must be at least 1"));
        }
        if !matches!(self.general.format.to_ascii_lowercase().as_str(), "psl" | "json") {
            return Err(CliError::validation(format!(
                "general.format must be \"psl\" or \"json\", got \"{}\"",
                self.general.format
            )));
        }
        let rate = self.aligner.mismatch_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(CliError::validation(format!(
                "aligner.mismatch_rate must lie in (0, 1], got {}",
                rate
            )));
        }
        let passing = self.aligner.passing_fraction;
        if !(passing > 0.0 && passing <= 1.0) {
            return Err(CliError::validation(format!(
                "aligner.passing_fraction must lie in (0, 1], got {}",
                passing
            )));
        }
        Ok(())
    }
}
