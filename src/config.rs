//! Engine configuration loading from config.toml
//!
//! This module provides functionality to load the engine tuning knobs from a
//! TOML configuration file. Every knob has a production default, so running
//! without a config file is fully supported.

use crate::core::loader::{ASSUME_COMPLETE_THRESHOLD, INVOICE_PAGE_SIZE};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Engine tuning knobs
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Tuning knobs for the allocation engine
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Invoice records requested per page
    #[serde(default = "default_page_size")]
    pub invoice_page_size: usize,
    /// A never-paged row with strictly more than this many invoices already
    /// present is assumed fully loaded
    #[serde(default = "default_assume_loaded_threshold")]
    pub assume_loaded_threshold: usize,
    /// Extra per-record amount fields to carry into the header totals
    #[serde(default)]
    pub summary_fields: Vec<String>,
}

fn default_page_size() -> usize {
    INVOICE_PAGE_SIZE
}

fn default_assume_loaded_threshold() -> usize {
    ASSUME_COMPLETE_THRESHOLD
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            invoice_page_size: INVOICE_PAGE_SIZE,
            assume_loaded_threshold: ASSUME_COMPLETE_THRESHOLD,
            summary_fields: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Checks the knobs are usable. A zero page size would make invoice
    /// paging loop forever and a zero threshold would treat any row with a
    /// single inlined invoice as fully loaded.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when a knob is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.invoice_page_size == 0 {
            return Err(Error::Config {
                message: "invoice_page_size must be at least 1".to_string(),
            });
        }
        if self.assume_loaded_threshold == 0 {
            return Err(Error::Config {
                message: "assume_loaded_threshold must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads the engine configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Returns
/// * `Ok(Config)` - Successfully parsed configuration
/// * `Err(Error)` - Failed to read, parse, or validate the configuration file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A knob fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.engine.validate()?;
    Ok(config)
}

/// Loads the engine configuration from the default location (./config.toml)
///
/// # Errors
/// Same failure modes as [`load_config`].
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}
