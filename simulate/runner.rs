//! Runs every configured experiment and writes the results.
//!
//! Per experiment: draw a seeded sample, build the four estimators, evaluate
//! each and the true density on the shared grid, and score each estimator by
//! integrated squared error. Experiments are independent and run on the rayon
//! pool. Outputs under `output_dir`:
//!
//! * `raw.csv`: one row per (experiment, method) with its ISE.
//! * `curve_<nn>_<dist>.csv`: grid, true density and every estimate.
//! * `sample_<nn>_<dist>.csv`: the drawn sample.
//! * `profile_summary.txt`: per-stage timings, only when profiling.

use super::config::{ExperimentConfig, SimulationConfig};
use super::metrics::{evaluation_grid, integrated_squared_error};
use super::sampler::DistributionSampler;
use super::SimulationError;
use crate::adaptive::AdaptiveKde;
use crate::coefficients::CoefficientSpec;
use crate::estimator::DensityEstimator;
use crate::kde::{Kde, PluginKde};
use crate::multi::MultiKde;
use crate::observe::{NumericIssue, NumericObserver};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Method labels, in output column order.
pub const METHODS: [&str; 4] = ["KDE", "DDE", "AKDE", "MKDE"];

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Write `profile_summary.txt` with per-stage timings.
    pub profile: bool,
    /// Draw a progress bar on stderr when it is a terminal.
    pub show_progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodScore {
    pub method: &'static str,
    pub ise: f64,
}

#[derive(Debug, Clone)]
pub struct ExperimentResult {
    pub index: usize,
    pub distribution: String,
    pub params: Vec<f64>,
    pub scores: Vec<MethodScore>,
    pub curve_path: PathBuf,
    pub sample_path: PathBuf,
}

impl ExperimentResult {
    pub fn ise(&self, method: &str) -> Option<f64> {
        self.scores.iter().find(|s| s.method == method).map(|s| s.ise)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub experiments: Vec<ExperimentResult>,
    pub raw_path: PathBuf,
    pub profile_path: Option<PathBuf>,
    /// Numeric issues seen across every build and evaluation.
    pub numeric_issues: usize,
    pub timings: StageTimings,
    pub total_runtime: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SamplerInit,
    DataGen,
    WriteData,
    KdeBuild,
    DdeBuild,
    AkdeBuild,
    MkdeBuild,
    EvalTrue,
    EvalKde,
    EvalDde,
    EvalAkde,
    EvalMkde,
    Ise,
    WriteCurves,
}

const STAGE_COUNT: usize = 14;

impl Stage {
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::SamplerInit,
        Stage::DataGen,
        Stage::WriteData,
        Stage::KdeBuild,
        Stage::DdeBuild,
        Stage::AkdeBuild,
        Stage::MkdeBuild,
        Stage::EvalTrue,
        Stage::EvalKde,
        Stage::EvalDde,
        Stage::EvalAkde,
        Stage::EvalMkde,
        Stage::Ise,
        Stage::WriteCurves,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::SamplerInit => "sampler_init",
            Stage::DataGen => "data_gen",
            Stage::WriteData => "write_data",
            Stage::KdeBuild => "kde_build",
            Stage::DdeBuild => "dde_build",
            Stage::AkdeBuild => "akde_build",
            Stage::MkdeBuild => "mkde_build",
            Stage::EvalTrue => "eval_true",
            Stage::EvalKde => "eval_kde",
            Stage::EvalDde => "eval_dde",
            Stage::EvalAkde => "eval_akde",
            Stage::EvalMkde => "eval_mkde",
            Stage::Ise => "ise",
            Stage::WriteCurves => "write_curves",
        }
    }
}

/// Wall-clock time spent per stage, summed over experiments.
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    totals: [Duration; STAGE_COUNT],
    experiments: usize,
}

impl StageTimings {
    pub fn get(&self, stage: Stage) -> Duration {
        self.totals[stage as usize]
    }

    pub fn experiments(&self) -> usize {
        self.experiments
    }

    fn time<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.totals[stage as usize] += start.elapsed();
        out
    }

    fn merge(mut self, other: StageTimings) -> Self {
        for (total, extra) in self.totals.iter_mut().zip(other.totals) {
            *total += extra;
        }
        self.experiments += other.experiments;
        self
    }

    /// Human-readable summary, slowest stage first.
    pub fn summary(&self, total_runtime: Duration) -> String {
        let mut stages = Stage::ALL.to_vec();
        stages.sort_by(|a, b| self.get(*b).cmp(&self.get(*a)));
        let mut lines = vec![
            format!("[PROFILE] Total runtime: {:.6} seconds", total_runtime.as_secs_f64()),
            "[PROFILE] Per-stage times summed over workers (total / per-experiment):".to_string(),
        ];
        for stage in stages {
            let total = self.get(stage).as_secs_f64();
            let average = if self.experiments > 0 {
                total / self.experiments as f64
            } else {
                f64::NAN
            };
            lines.push(format!(
                "  {:12}: total = {total:.6}s, avg/exp = {average:.6}s",
                stage.label()
            ));
        }
        lines.join("\n") + "\n"
    }
}

/// Logs every issue and keeps a running count.
#[derive(Debug, Default)]
struct RunObserver {
    count: AtomicUsize,
}

impl NumericObserver for RunObserver {
    fn observe(&self, issue: &NumericIssue) {
        self.count.fetch_add(1, Ordering::Relaxed);
        log::warn!("{issue}");
    }
}

#[derive(Debug, Serialize)]
struct RawRow<'a> {
    #[serde(rename = "Distribution")]
    distribution: &'a str,
    #[serde(rename = "Parameters")]
    parameters: String,
    #[serde(rename = "Method")]
    method: &'a str,
    #[serde(rename = "ISE")]
    ise: f64,
}

/// Shared, read-only inputs for every experiment.
struct Plan<'a> {
    config: &'a SimulationConfig,
    spec: CoefficientSpec,
    grid: Array1<f64>,
    dx: f64,
    observer: RunObserver,
}

fn create_progress_bar(len: u64, message: &str, visible: bool) -> ProgressBar {
    let draw_target = if visible && std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    match ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        Ok(style) => pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  ")),
        Err(e) => log::debug!("Falling back to the default progress style: {e}"),
    }
    pb.set_message(message.to_string());
    pb
}

/// Runs every experiment in `config` and writes all outputs.
///
/// # Errors
///
/// Fails on an invalid configuration, an unknown distribution or invalid
/// distribution parameters, an estimator that cannot be built (for example
/// a singular coefficient system), or any I/O failure. The first failing
/// experiment aborts the run.
pub fn run_simulation(
    config: &SimulationConfig,
    options: &RunOptions,
) -> Result<SimulationReport, SimulationError> {
    let started = Instant::now();
    config.validate()?;

    let spec = CoefficientSpec::new(Array1::from(config.bandwidth_coefficients.clone()))
        .with_degree(config.degree())
        .with_ridge(config.ridge)
        .with_singular_tolerance(config.singular_tolerance);
    let weights = spec.coefficients()?;
    log::debug!("Combination weights for {:?}: {weights:?}", config.bandwidth_coefficients);
    let (grid, dx) = evaluation_grid(config.grid.start, config.grid.end, config.grid.points)?;
    fs::create_dir_all(&config.output_dir)?;

    log::info!(
        "Running {} experiments: n = {}, h = {}, scales = {:?}, degree = {}, ridge = {}",
        config.experiments.len(),
        config.sample_size,
        config.base_bandwidth,
        config.bandwidth_coefficients,
        spec.degree,
        spec.ridge
    );

    let plan = Plan {
        config,
        spec,
        grid,
        dx,
        observer: RunObserver::default(),
    };
    let pb = create_progress_bar(
        config.experiments.len() as u64,
        "Experiments",
        options.show_progress,
    );

    let outcomes = config
        .experiments
        .par_iter()
        .enumerate()
        .map(|(index, experiment)| {
            let outcome = run_experiment(&plan, index, experiment);
            pb.inc(1);
            outcome
        })
        .collect::<Result<Vec<_>, _>>()?;
    pb.finish_and_clear();

    let mut experiments = Vec::with_capacity(outcomes.len());
    let mut timings = StageTimings::default();
    for (result, experiment_timings) in outcomes {
        experiments.push(result);
        timings = timings.merge(experiment_timings);
    }

    let raw_path = config.output_dir.join("raw.csv");
    write_raw(&raw_path, &experiments)?;

    let numeric_issues = plan.observer.count.load(Ordering::Relaxed);
    if numeric_issues > 0 {
        log::warn!("{numeric_issues} numeric issues were reported during the run");
    }

    let total_runtime = started.elapsed();
    let profile_path = if options.profile {
        let summary = timings.summary(total_runtime);
        let path = config.output_dir.join("profile_summary.txt");
        fs::write(&path, &summary)?;
        log::info!("Profile summary written to {}\n{summary}", path.display());
        Some(path)
    } else {
        None
    };

    log::info!(
        "Finished {} experiments in {:.3}s; results in {}",
        experiments.len(),
        total_runtime.as_secs_f64(),
        raw_path.display()
    );

    Ok(SimulationReport {
        experiments,
        raw_path,
        profile_path,
        numeric_issues,
        timings,
        total_runtime,
    })
}

fn run_experiment(
    plan: &Plan<'_>,
    index: usize,
    experiment: &ExperimentConfig,
) -> Result<(ExperimentResult, StageTimings), SimulationError> {
    let config = plan.config;
    let h = config.base_bandwidth;
    let observer = &plan.observer;
    let grid = plan.grid.view();
    let mut timings = StageTimings {
        experiments: 1,
        ..StageTimings::default()
    };

    let sampler = timings.time(Stage::SamplerInit, || {
        DistributionSampler::new(&experiment.dist, &experiment.params)
    })?;
    let sample = timings.time(Stage::DataGen, || {
        sampler.generate_samples(config.sample_size, config.seed)
    });
    let stem = format!("{index:02}_{}", sampler.name());
    let sample_path = config.output_dir.join(format!("sample_{stem}.csv"));
    timings.time(Stage::WriteData, || write_sample(&sample_path, sample.view()))?;

    let standard = timings.time(Stage::KdeBuild, || Kde::new(h, sample.view()))?;
    let plugin = timings.time(Stage::DdeBuild, || PluginKde::new(h, sample.view()))?;
    let adaptive = timings.time(Stage::AkdeBuild, || {
        AdaptiveKde::with_observer(h, sample.view(), observer)
    })?;
    let multi = timings.time(Stage::MkdeBuild, || {
        MultiKde::new(h, sample.view(), &plan.spec).map(MultiKde::non_negative)
    })?;

    let truth = timings.time(Stage::EvalTrue, || sampler.pdf_grid(grid));
    let estimates = [
        timings.time(Stage::EvalKde, || standard.evaluate_observed(grid, observer)),
        timings.time(Stage::EvalDde, || plugin.evaluate_observed(grid, observer)),
        timings.time(Stage::EvalAkde, || adaptive.evaluate_observed(grid, observer)),
        timings.time(Stage::EvalMkde, || multi.evaluate_observed(grid, observer)),
    ];

    let scores = timings.time(Stage::Ise, || {
        METHODS
            .iter()
            .zip(&estimates)
            .map(|(&method, estimate)| {
                integrated_squared_error(estimate.view(), truth.view(), plan.dx)
                    .map(|ise| MethodScore { method, ise })
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let curve_path = config.output_dir.join(format!("curve_{stem}.csv"));
    timings.time(Stage::WriteCurves, || {
        write_curves(&curve_path, grid, truth.view(), &estimates)
    })?;

    log::debug!(
        "Experiment {index} ({} {:?}): {}",
        sampler.name(),
        sampler.params(),
        scores
            .iter()
            .map(|s| format!("{} = {:.6e}", s.method, s.ise))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok((
        ExperimentResult {
            index,
            distribution: sampler.name().to_string(),
            params: sampler.params().to_vec(),
            scores,
            curve_path,
            sample_path,
        },
        timings,
    ))
}

fn write_sample(path: &Path, sample: ArrayView1<f64>) -> Result<(), SimulationError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["value"])?;
    for value in sample {
        writer.write_record([value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_curves(
    path: &Path,
    grid: ArrayView1<f64>,
    truth: ArrayView1<f64>,
    estimates: &[Array1<f64>; 4],
) -> Result<(), SimulationError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["x", "truth"];
    header.extend(METHODS);
    writer.write_record(&header)?;
    for (i, (&x, &t)) in grid.iter().zip(truth.iter()).enumerate() {
        let mut record = vec![x.to_string(), t.to_string()];
        record.extend(estimates.iter().map(|e| e[i].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_raw(path: &Path, experiments: &[ExperimentResult]) -> Result<(), SimulationError> {
    let mut writer = csv::Writer::from_path(path)?;
    for experiment in experiments {
        let parameters = format!("{:?}", experiment.params);
        for score in &experiment.scores {
            writer.serialize(RawRow {
                distribution: &experiment.distribution,
                parameters: parameters.clone(),
                method: score.method,
                ise: score.ise,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}
