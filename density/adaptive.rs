//! Adaptive-bandwidth kernel density estimation.
//!
//! A pilot [`Kde`] is evaluated at every sample point. Each point then gets its
//! own bandwidth `λᵢh` with `λᵢ = sqrt(G / f₀(xᵢ))`, where `G` is the geometric
//! mean of the pilot values. Points in sparse regions get wide kernels and
//! points in dense regions narrow ones. The local scales are computed once and
//! fixed for the lifetime of the estimator.

use crate::error::DensityError;
use crate::estimator::DensityEstimator;
use crate::kde::Kde;
use crate::kernel::kernel;
use crate::observe::{IgnoreNumericIssues, NumericIssue, NumericIssueKind, NumericObserver};
use ndarray::{Array1, ArrayView1, Axis};

/// Pilot densities below this value are raised to it before taking logs.
pub const PILOT_DENSITY_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct AdaptiveKde {
    sample: Array1<f64>,
    /// `λᵢh` for every sample point.
    local_bandwidths: Array1<f64>,
}

impl AdaptiveKde {
    /// Builds the estimator, discarding pilot-floor notifications.
    pub fn new(bandwidth: f64, sample: ArrayView1<f64>) -> Result<Self, DensityError> {
        Self::with_observer(bandwidth, sample, &IgnoreNumericIssues)
    }

    /// Builds the estimator, reporting every floored pilot density to `observer`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Kde::new`].
    pub fn with_observer(
        bandwidth: f64,
        sample: ArrayView1<f64>,
        observer: &dyn NumericObserver,
    ) -> Result<Self, DensityError> {
        let pilot = Kde::new(bandwidth, sample)?;
        let raw = pilot.evaluate(pilot.sample());

        let mut floored = 0usize;
        let pilot_values = Array1::from_iter(raw.iter().zip(sample.iter()).enumerate().map(
            |(index, (&value, &x))| {
                if value < PILOT_DENSITY_FLOOR {
                    floored += 1;
                    observer.observe(&NumericIssue {
                        estimator: "adaptive_kde",
                        kind: NumericIssueKind::PilotFloored,
                        index,
                        location: x,
                        value,
                    });
                    PILOT_DENSITY_FLOOR
                } else {
                    value
                }
            },
        ));
        if floored > 0 {
            log::debug!(
                "Adaptive KDE: {floored} of {} pilot densities raised to {PILOT_DENSITY_FLOOR:e}",
                pilot_values.len()
            );
        }

        let n = pilot_values.len() as f64;
        let geometric_mean = (pilot_values.mapv(f64::ln).sum() / n).exp();
        let local_bandwidths = pilot_values.mapv(|p| (geometric_mean / p).sqrt() * bandwidth);
        log::trace!(
            "Adaptive KDE: geometric mean pilot density {geometric_mean:.6e}, local bandwidths in [{:.4e}, {:.4e}]",
            local_bandwidths.fold(f64::INFINITY, |acc, &v| acc.min(v)),
            local_bandwidths.fold(0.0_f64, |acc, &v| acc.max(v)),
        );

        Ok(Self {
            sample: sample.to_owned(),
            local_bandwidths,
        })
    }

    /// The per-point bandwidths `λᵢh`, in sample order.
    pub fn local_bandwidths(&self) -> ArrayView1<f64> {
        self.local_bandwidths.view()
    }
}

impl DensityEstimator for AdaptiveKde {
    fn name(&self) -> &'static str {
        "adaptive_kde"
    }

    fn sample_len(&self) -> usize {
        self.sample.len()
    }

    fn density(&self, y: f64) -> f64 {
        let mut total = 0.0;
        for (&xi, &width) in self.sample.iter().zip(self.local_bandwidths.iter()) {
            total += kernel((y - xi) / width) / width;
        }
        total / self.sample.len() as f64
    }

    fn evaluate_block(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        let queries = ys.insert_axis(Axis(1));
        let points = self.sample.view().insert_axis(Axis(0));
        let widths = self.local_bandwidths.view().insert_axis(Axis(0));
        let u = (&queries - &points) / &widths;
        let contributions = u.mapv(kernel) / &widths;
        contributions.sum_axis(Axis(1)) / self.sample.len() as f64
    }
}

/// Builds an [`AdaptiveKde`]. See [`Kde::new`] for the error contract.
pub fn adaptive_kde(bandwidth: f64, sample: ArrayView1<f64>) -> Result<AdaptiveKde, DensityError> {
    AdaptiveKde::new(bandwidth, sample)
}
