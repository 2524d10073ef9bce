//! Runtime options for the force generators.
//!
//! Options are read from YAML or JSON documents; every field has a default so
//! an empty document is a valid configuration.
//!
//! ```yaml
//! log_target_point_displacements: true
//! energy_quadrature_intervals: 32
//! zero_length_tolerance: 1.0e-14
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config file extension: {0}")]
    UnsupportedFormat(String),
    #[error("invalid force generator configuration: {0}")]
    Validation(String),
}

pub const DEFAULT_ENERGY_QUADRATURE_INTERVALS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForceGenConfig {
    /// Log the largest target-point displacement |X − X₀| on every force
    /// evaluation.
    pub log_target_point_displacements: bool,
    /// Simpson sub-intervals used to integrate spring tension into energy
    /// when a force law has no closed-form energy.  Must be even.
    pub energy_quadrature_intervals: usize,
    /// Springs shorter than this have no defined direction and are skipped.
    pub zero_length_tolerance: f64,
}

impl Default for ForceGenConfig {
    fn default() -> Self {
        Self {
            log_target_point_displacements: false,
            energy_quadrature_intervals: DEFAULT_ENERGY_QUADRATURE_INTERVALS,
            zero_length_tolerance: f64::EPSILON,
        }
    }
}

impl ForceGenConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`, `.yml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.energy_quadrature_intervals == 0 || self.energy_quadrature_intervals % 2 != 0 {
            return Err(ConfigError::Validation(format!(
                "energy_quadrature_intervals must be a positive even number, got {}",
                self.energy_quadrature_intervals
            )));
        }
        if !self.zero_length_tolerance.is_finite() || self.zero_length_tolerance < 0.0 {
            return Err(ConfigError::Validation(format!(
                "zero_length_tolerance must be finite and non-negative, got {}",
                self.zero_length_tolerance
            )));
        }
        Ok(())
    }
}
