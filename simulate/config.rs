use super::SimulationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Evaluation grid shared by every experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub start: f64,
    pub end: f64,
    pub points: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            start: -4.0,
            end: 4.0,
            points: 100,
        }
    }
}

/// One distribution to sample from, e.g. `dist = "normal"`, `params = [0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dist: String,
    pub params: Vec<f64>,
}

/// Top-level simulation settings, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub sample_size: usize,
    pub base_bandwidth: f64,
    pub seed: u64,
    pub bandwidth_coefficients: Vec<f64>,
    /// Number of bias constraints; the number of bandwidth coefficients when absent.
    #[serde(default)]
    pub degree: Option<usize>,
    #[serde(default)]
    pub ridge: f64,
    #[serde(default)]
    pub singular_tolerance: f64,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    pub experiments: Vec<ExperimentConfig>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl SimulationConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SimulationError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn degree(&self) -> usize {
        self.degree.unwrap_or(self.bandwidth_coefficients.len())
    }

    /// Rejects settings that cannot produce a meaningful run. Estimator
    /// arguments (bandwidth, scales, ridge) are checked again by the engine.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.sample_size == 0 {
            return Err(SimulationError::InvalidConfig(
                "sample_size must be positive".to_string(),
            ));
        }
        if !(self.base_bandwidth.is_finite() && self.base_bandwidth > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "base_bandwidth must be a positive number, got {}",
                self.base_bandwidth
            )));
        }
        if self.bandwidth_coefficients.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "bandwidth_coefficients must not be empty".to_string(),
            ));
        }
        if self.experiments.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "at least one experiment is required".to_string(),
            ));
        }
        let grid = &self.grid;
        if grid.points < 2 {
            return Err(SimulationError::InvalidConfig(format!(
                "grid needs at least 2 points, got {}",
                grid.points
            )));
        }
        if !(grid.start.is_finite() && grid.end.is_finite() && grid.start < grid.end) {
            return Err(SimulationError::InvalidConfig(format!(
                "grid range [{}, {}] is not a finite increasing interval",
                grid.start, grid.end
            )));
        }
        Ok(())
    }
}
