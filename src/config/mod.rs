pub mod estimator;
pub mod local;
pub mod toml_config;

use crate::config::estimator::EstimatorConfig;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use std::path::Path;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_feed_location, validate_path, validate_positive_number};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::time::Duration;

/// Loads estimator tables from a standalone TOML file. Keys sit at the top
/// level (`[capacity]`, `[affluence.weights]`, ...); anything missing keeps
/// its default.
pub fn load_estimator_config<P: AsRef<Path>>(path: P) -> Result<EstimatorConfig> {
    let content = std::fs::read_to_string(&path)?;
    let content = toml_config::substitute_env_vars(&content)?;
    let config: EstimatorConfig =
        toml::from_str(&content).map_err(|e| EtlError::ConfigValidationError {
            field: "estimator_config".to_string(),
            message: format!("TOML parsing error: {}", e),
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "venue-insight")]
#[command(about = "Estimate bar capacity and affluence from merged venue feeds")]
pub struct CliConfig {
    /// Venue feed: a JSON file path or an http(s) URL
    #[arg(long, default_value = "venues.json")]
    pub input: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "csv")]
    pub formats: Vec<String>,

    #[arg(long, help = "Bundle all output files into one ZIP archive")]
    pub zip: bool,

    #[arg(long, default_value = "4")]
    pub workers: usize,

    #[arg(long, help = "HTTP feed timeout in seconds")]
    pub timeout_seconds: Option<u64>,

    #[arg(long, help = "TOML file overriding the estimator tables")]
    pub estimator_config: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log per-phase timings and memory")]
    pub monitor: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[arg(skip)]
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Replaces the default estimator tables with the `--estimator-config` file, if given.
    pub fn load_estimator(&mut self) -> Result<()> {
        if let Some(path) = &self.estimator_config {
            tracing::debug!("Loading estimator tables from {}", path);
            self.estimator = load_estimator_config(path)?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn feed_location(&self) -> &str {
        &self.input
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn compress_output(&self) -> bool {
        self.zip
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn estimator(&self) -> &EstimatorConfig {
        &self.estimator
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_feed_location("input", &self.input)?;
        validate_path("output_path", &self.output_path)?;
        toml_config::validate_output_formats("formats", &self.formats)?;
        validate_positive_number("workers", self.workers, 1)?;
        self.estimator.validate()
    }
}
