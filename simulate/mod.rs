//! Simulation study driver: draws samples from known distributions, fits every
//! estimator and scores each against the true density.

pub mod config;
pub mod metrics;
pub mod runner;
pub mod sampler;

use crate::error::DensityError;
use thiserror::Error;

pub use config::{ExperimentConfig, GridConfig, SimulationConfig};
pub use metrics::{evaluation_grid, integrated_squared_error};
pub use runner::{ExperimentResult, RunOptions, SimulationReport, run_simulation};
pub use sampler::DistributionSampler;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Failed to read or write simulation file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Estimator failure: {0}")]
    Density(#[from] DensityError),
    #[error("Invalid simulation configuration: {0}")]
    InvalidConfig(String),
}
