#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{CommandFactory, Parser, Subcommand};
use mkde::coefficients::{CoefficientSpec, DEFAULT_DEGREE};
use mkde::simulate::{RunOptions, SimulationConfig, run_simulation};
use ndarray::Array1;
use std::error::Error;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "mkde",
    about = "Kernel density estimators with bias-reducing bandwidth combinations",
    long_about = "Runs simulation studies comparing standard, bias-corrected, adaptive and \
                 multi-bandwidth kernel density estimators, and solves for multi-bandwidth \
                 combination weights."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every experiment in a TOML configuration file
    #[command(about = "Run a simulation study (outputs: raw.csv, curve and sample CSVs)")]
    Simulate {
        /// Path to the simulation configuration
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        /// Write per-stage timings to profile_summary.txt
        #[arg(long)]
        profile: bool,
    },

    /// Solve for multi-bandwidth combination weights
    #[command(about = "Print combination weights and the variance factor for given scales")]
    Coef {
        /// Bandwidth scale factors, comma separated
        #[arg(long, value_name = "XI", value_delimiter = ',', num_args = 1.., required = true)]
        scales: Vec<f64>,

        /// Number of bias constraints
        #[arg(long, default_value_t = DEFAULT_DEGREE)]
        degree: usize,

        /// Ridge penalty added to the Gram matrix diagonal
        #[arg(long, default_value_t = 0.0)]
        ridge: f64,

        /// Eigenvalues with magnitude at or below this are treated as singular
        #[arg(long, default_value_t = 0.0)]
        singular_tolerance: f64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Simulate { config, profile }) => run_simulate(config, profile),
        Some(Commands::Coef {
            scales,
            degree,
            ridge,
            singular_tolerance,
        }) => run_coef(scales, degree, ridge, singular_tolerance),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_simulate(config_path: PathBuf, profile: bool) -> Result<(), Box<dyn Error>> {
    let config = SimulationConfig::load(&config_path)?;
    log::info!("Loaded configuration from {}", config_path.display());

    let report = run_simulation(
        &config,
        &RunOptions {
            profile,
            show_progress: true,
        },
    )?;

    for experiment in &report.experiments {
        let scores = experiment
            .scores
            .iter()
            .map(|s| format!("{} {:.4e}", s.method, s.ise))
            .collect::<Vec<_>>()
            .join("  ");
        println!(
            "{:>8} {:<28} {scores}",
            experiment.distribution,
            format!("{:?}", experiment.params)
        );
    }
    if let Some(path) = &report.profile_path {
        println!("{}", report.timings.summary(report.total_runtime));
        println!("Profile written to {}", path.display());
    }
    if report.numeric_issues > 0 {
        println!(
            "{} non-finite or floored values were reported; see the log for locations",
            report.numeric_issues
        );
    }
    println!("Results written to {}", report.raw_path.display());
    Ok(())
}

fn run_coef(
    scales: Vec<f64>,
    degree: usize,
    ridge: f64,
    singular_tolerance: f64,
) -> Result<(), Box<dyn Error>> {
    let spec = CoefficientSpec::new(Array1::from(scales))
        .with_degree(degree)
        .with_ridge(ridge)
        .with_singular_tolerance(singular_tolerance);
    let coefficients = spec.coefficients()?;
    let variance = spec.variance_of(coefficients.view());

    println!("{:>10}  {:>14}", "scale", "weight");
    for (xi, c) in spec.scales.iter().zip(coefficients.iter()) {
        println!("{xi:>10.4}  {c:>14.8}");
    }
    println!("sum of weights: {:.8}", coefficients.sum());
    println!("variance factor: {variance:.8}");
    Ok(())
}
