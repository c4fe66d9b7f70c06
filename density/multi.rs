//! Multi-bandwidth KDE: a weighted sum of standard KDEs at scaled bandwidths.
//!
//! `f(y) = Σ cᵢ · KDE(ξᵢh)(y)` with `c` from [`CoefficientSpec::coefficients`].
//! Some weights are negative, so the raw combination can dip below zero. The
//! non-negative variant clips each output at zero.

use crate::coefficients::CoefficientSpec;
use crate::error::{DensityError, require_bandwidth, require_sample};
use crate::estimator::{DensityEstimator, evaluate_in_blocks, report_non_finite};
use crate::kde::{gaussian_sum, gaussian_sum_block};
use crate::observe::NumericObserver;
use ndarray::{Array1, ArrayView1};

#[derive(Debug, Clone)]
pub struct MultiKde {
    sample: Array1<f64>,
    /// `ξᵢh` for every scale, aligned with `coefficients`.
    bandwidths: Array1<f64>,
    coefficients: Array1<f64>,
    clip_negative: bool,
}

impl MultiKde {
    /// Solves for the weights once and keeps one bandwidth per scale.
    ///
    /// # Errors
    ///
    /// The [`Kde::new`](crate::kde::Kde::new) contract applies to `bandwidth`
    /// and `sample`, the [`CoefficientSpec::validate`] contract to `spec`, and
    /// singular Gram or constraint matrices surface as [`DensityError::Linalg`].
    pub fn new(
        bandwidth: f64,
        sample: ArrayView1<f64>,
        spec: &CoefficientSpec,
    ) -> Result<Self, DensityError> {
        let bandwidth = require_bandwidth(bandwidth)?;
        require_sample(sample)?;
        let coefficients = spec.coefficients()?;
        let bandwidths = spec.scales.mapv(|xi| xi * bandwidth);
        for &width in &bandwidths {
            require_bandwidth(width)?;
        }
        Ok(Self {
            sample: sample.to_owned(),
            bandwidths,
            coefficients,
            clip_negative: false,
        })
    }

    /// The same estimator with every output clipped to `max(f, 0)`.
    pub fn non_negative(mut self) -> Self {
        self.clip_negative = true;
        self
    }

    pub fn coefficients(&self) -> ArrayView1<f64> {
        self.coefficients.view()
    }

    /// Component bandwidths `ξᵢh`.
    pub fn bandwidths(&self) -> ArrayView1<f64> {
        self.bandwidths.view()
    }

    pub fn is_non_negative(&self) -> bool {
        self.clip_negative
    }

    /// The weighted sum before any clipping.
    fn combined_block(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        let mut total = Array1::<f64>::zeros(ys.len());
        for (&c, &width) in self.coefficients.iter().zip(&self.bandwidths) {
            total.scaled_add(c, &gaussian_sum_block(self.sample.view(), width, ys));
        }
        total
    }

    fn clip(&self, values: &mut Array1<f64>) {
        if self.clip_negative {
            values.mapv_inplace(|v| v.max(0.0));
        }
    }
}

impl DensityEstimator for MultiKde {
    fn name(&self) -> &'static str {
        if self.clip_negative {
            "multi_kde_nonneg"
        } else {
            "multi_kde"
        }
    }

    fn sample_len(&self) -> usize {
        self.sample.len()
    }

    fn density(&self, y: f64) -> f64 {
        let mut total = 0.0;
        for (&c, &width) in self.coefficients.iter().zip(&self.bandwidths) {
            total += c * gaussian_sum(self.sample.view(), width, y);
        }
        if self.clip_negative { total.max(0.0) } else { total }
    }

    fn evaluate_block(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        let mut total = self.combined_block(ys);
        self.clip(&mut total);
        total
    }

    fn evaluate_observed(
        &self,
        ys: ArrayView1<f64>,
        observer: &dyn NumericObserver,
    ) -> Array1<f64> {
        // Non-finite sums are reported before clipping maps NaN to zero.
        let mut total = evaluate_in_blocks(self.sample.len(), ys, |block| self.combined_block(block));
        report_non_finite(self.name(), ys, &total, observer);
        self.clip(&mut total);
        total
    }
}

/// Builds a [`MultiKde`] from scales `ξ`, `degree` bias constraints and ridge penalty `ridge`.
pub fn multi_kde(
    bandwidth: f64,
    sample: ArrayView1<f64>,
    scales: ArrayView1<f64>,
    degree: usize,
    ridge: f64,
) -> Result<MultiKde, DensityError> {
    let spec = CoefficientSpec::new(scales.to_owned())
        .with_degree(degree)
        .with_ridge(ridge);
    MultiKde::new(bandwidth, sample, &spec)
}

/// Like [`multi_kde`], with outputs clipped at zero.
pub fn multi_kde_nonneg(
    bandwidth: f64,
    sample: ArrayView1<f64>,
    scales: ArrayView1<f64>,
    degree: usize,
    ridge: f64,
) -> Result<MultiKde, DensityError> {
    Ok(multi_kde(bandwidth, sample, scales, degree, ridge)?.non_negative())
}
