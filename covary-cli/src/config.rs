//! Configuration handling for covary CLI
//!
//! Supports loading configuration from covary.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use covary_core::{CooccurMetric, Thresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Fraction of the maximum depth a pair must reach
    #[serde(default = "default_min_depth_percent")]
    pub min_depth_percent: f64,

    /// Minimum fraction of reads carrying a variant at i
    #[serde(default = "default_min_variant_fraction")]
    pub min_variant_fraction: f64,

    /// Apply the variant fraction floor at j as well
    #[serde(default)]
    pub min_variant_fraction_also_for_j: bool,

    /// Minimum absolute co-occurrence metric
    #[serde(default = "default_min_abs_metric")]
    pub min_abs_metric: f64,

    /// Treat synonymous substitutions as modal
    #[serde(default)]
    pub synonymy: bool,

    /// Metric recomputed from the synonymy-adjusted counts
    #[serde(default)]
    pub syn_metric: CooccurMetric,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding the files named in the manifest
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Which of the dataset's metric files to load
    #[serde(default)]
    pub metric_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print exported JSON
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Positions listed in the summary table
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

// Default value functions
fn default_min_depth_percent() -> f64 { Thresholds::default().min_depth_percent }
fn default_min_variant_fraction() -> f64 { Thresholds::default().min_variant_fraction }
fn default_min_abs_metric() -> f64 { Thresholds::default().min_abs_metric }
fn default_true() -> bool { true }
fn default_max_entries() -> usize { 20 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_depth_percent: default_min_depth_percent(),
            min_variant_fraction: default_min_variant_fraction(),
            min_variant_fraction_also_for_j: false,
            min_abs_metric: default_min_abs_metric(),
            synonymy: false,
            syn_metric: CooccurMetric::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            max_entries: default_max_entries(),
        }
    }
}

impl FilterConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_depth_percent: self.min_depth_percent,
            min_variant_fraction: self.min_variant_fraction,
            min_variant_fraction_also_for_j: self.min_variant_fraction_also_for_j,
            min_abs_metric: self.min_abs_metric,
            synonymy: self.synonymy,
            syn_metric: self.syn_metric,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("covary.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: covary.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the filter cannot interpret
    pub fn validate(&self) -> Result<(), CliError> {
        let filter = &self.filter;
        if !(0.0..=1.0).contains(&filter.min_depth_percent) {
            return Err(CliError::config(format!(
                "filter.min_depth_percent must be within [0, 1], got {}",
                filter.min_depth_percent
            )));
        }
        if !(0.0..=1.0).contains(&filter.min_variant_fraction) {
            return Err(CliError::config(format!(
                "filter.min_variant_fraction must be within [0, 1], got {}",
                filter.min_variant_fraction
            )));
        }
        if filter.min_abs_metric < 0.0 {
            return Err(CliError::config(format!(
                "filter.min_abs_metric must not be negative, got {}",
                filter.min_abs_metric
            )));
        }
        Ok(())
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }
}
