//! Fixed-bandwidth Gaussian kernel density estimators.
//!
//! [`Kde`] is the textbook estimator `f(y) = (1/nh) Σ K((y - xᵢ)/h)`.
//! [`PluginKde`] subtracts half the kernel's second derivative,
//! `f(y) = (1/nh) Σ [K(u) - ½K''(u)]`, which cancels the leading `h²` bias
//! term at the price of a larger variance and possibly negative values in
//! sparse regions. No clipping happens here.

use crate::error::{DensityError, require_bandwidth, require_sample};
use crate::estimator::{DensityEstimator, scaled_differences};
use crate::kernel::{kernel, kernel_array, kernel_d2};
use ndarray::{Array1, ArrayView1, Axis};

/// Standard Gaussian kernel density estimator.
#[derive(Debug, Clone)]
pub struct Kde {
    sample: Array1<f64>,
    bandwidth: f64,
}

impl Kde {
    /// Captures `sample` and `bandwidth`.
    ///
    /// # Errors
    ///
    /// `InvalidArgumentType` when the bandwidth or a sample entry is not finite,
    /// `InvalidArgumentValue` when the bandwidth is not positive or the sample is empty.
    pub fn new(bandwidth: f64, sample: ArrayView1<f64>) -> Result<Self, DensityError> {
        let bandwidth = require_bandwidth(bandwidth)?;
        require_sample(sample)?;
        Ok(Self {
            sample: sample.to_owned(),
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn sample(&self) -> ArrayView1<f64> {
        self.sample.view()
    }
}

impl DensityEstimator for Kde {
    fn name(&self) -> &'static str {
        "kde"
    }

    fn sample_len(&self) -> usize {
        self.sample.len()
    }

    fn density(&self, y: f64) -> f64 {
        gaussian_sum(self.sample.view(), self.bandwidth, y)
    }

    fn evaluate_block(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        gaussian_sum_block(self.sample.view(), self.bandwidth, ys)
    }
}

/// `(1/nh) Σ K((y - xᵢ)/h)` accumulated one sample point at a time.
pub(crate) fn gaussian_sum(sample: ArrayView1<f64>, bandwidth: f64, y: f64) -> f64 {
    let norm = sample.len() as f64 * bandwidth;
    let mut total = 0.0;
    for &xi in sample.iter() {
        total += kernel((y - xi) / bandwidth) / norm;
    }
    total
}

/// [`gaussian_sum`] at every query in `ys`, as one broadcast.
pub(crate) fn gaussian_sum_block(
    sample: ArrayView1<f64>,
    bandwidth: f64,
    ys: ArrayView1<f64>,
) -> Array1<f64> {
    let norm = sample.len() as f64 * bandwidth;
    let u = scaled_differences(ys, sample, bandwidth);
    kernel_array(&u).sum_axis(Axis(1)) / norm
}

/// Plug-in (bias-corrected) Gaussian kernel density estimator.
#[derive(Debug, Clone)]
pub struct PluginKde {
    sample: Array1<f64>,
    bandwidth: f64,
}

impl PluginKde {
    /// Same construction contract as [`Kde::new`].
    pub fn new(bandwidth: f64, sample: ArrayView1<f64>) -> Result<Self, DensityError> {
        let base = Kde::new(bandwidth, sample)?;
        Ok(Self {
            sample: base.sample,
            bandwidth: base.bandwidth,
        })
    }
}

/// `K(u) - ½K''(u)`, written out so the scalar and array paths share one expression.
#[inline]
fn corrected_kernel(u: f64) -> f64 {
    kernel(u) - 0.5 * kernel_d2(u)
}

impl DensityEstimator for PluginKde {
    fn name(&self) -> &'static str {
        "plugin_kde"
    }

    fn sample_len(&self) -> usize {
        self.sample.len()
    }

    fn density(&self, y: f64) -> f64 {
        let norm = self.sample.len() as f64 * self.bandwidth;
        let mut total = 0.0;
        for &xi in self.sample.iter() {
            total += corrected_kernel((y - xi) / self.bandwidth) / norm;
        }
        total
    }

    fn evaluate_block(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        let norm = self.sample.len() as f64 * self.bandwidth;
        let u = scaled_differences(ys, self.sample.view(), self.bandwidth);
        u.mapv(corrected_kernel).sum_axis(Axis(1)) / norm
    }
}

/// Builds a [`Kde`]. See [`Kde::new`].
pub fn kde(bandwidth: f64, sample: ArrayView1<f64>) -> Result<Kde, DensityError> {
    Kde::new(bandwidth, sample)
}

/// Builds a [`PluginKde`]. See [`Kde::new`] for the error contract.
pub fn plugin_kde(bandwidth: f64, sample: ArrayView1<f64>) -> Result<PluginKde, DensityError> {
    PluginKde::new(bandwidth, sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::INV_SQRT_2PI;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{Array1, array};

    #[test]
    fn single_point_kde_is_a_scaled_normal_density() {
        let sample = array![1.0];
        let f = kde(0.5, sample.view()).unwrap();
        assert_abs_diff_eq!(f.density(1.0), INV_SQRT_2PI / 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(
            f.density(2.0),
            INV_SQRT_2PI * (-2.0_f64).exp() / 0.5,
            epsilon = 1e-14
        );
    }

    #[test]
    fn broadcast_and_loop_agree() {
        let sample = array![-1.2, -0.3, 0.0, 0.4, 0.9, 2.5];
        let grid = Array1::linspace(-3.0, 3.0, 31);
        let f = kde(0.4, sample.view()).unwrap();
        let g = plugin_kde(0.4, sample.view()).unwrap();
        let fy = f.evaluate(grid.view());
        let gy = g.evaluate(grid.view());
        for (i, &y) in grid.iter().enumerate() {
            assert_relative_eq!(fy[i], f.density(y), max_relative = 1e-10, epsilon = 1e-14);
            assert_relative_eq!(gy[i], g.density(y), max_relative = 1e-10, epsilon = 1e-14);
        }
    }

    #[test]
    fn kde_integrates_to_one() {
        let sample = array![0.0, 1.0, 1.5, 4.0];
        let f = kde(0.7, sample.view()).unwrap();
        let grid = Array1::linspace(-8.0, 12.0, 4001);
        let dx = grid[1] - grid[0];
        let mass = f.evaluate(grid.view()).sum() * dx;
        assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn plugin_kde_integrates_to_one_and_can_go_negative() {
        let sample = array![-3.0, 3.0];
        let g = plugin_kde(0.5, sample.view()).unwrap();
        let grid = Array1::linspace(-10.0, 10.0, 4001);
        let dx = grid[1] - grid[0];
        let values = g.evaluate(grid.view());
        assert_abs_diff_eq!(values.sum() * dx, 1.0, epsilon = 1e-6);
        // K - ½K'' is negative for |u| > sqrt(3); between two far-apart points it dips below zero.
        assert!(g.density(-3.0 + 0.5 * 2.0) < 0.0);
    }

    #[test]
    fn construction_rejects_bad_bandwidth_and_sample() {
        let sample = array![1.0, 2.0];
        assert!(matches!(
            kde(0.0, sample.view()),
            Err(DensityError::InvalidArgumentValue { argument: "bandwidth", .. })
        ));
        assert!(matches!(
            plugin_kde(-1.0, sample.view()),
            Err(DensityError::InvalidArgumentValue { argument: "bandwidth", .. })
        ));
        assert!(matches!(
            kde(f64::NAN, sample.view()),
            Err(DensityError::InvalidArgumentType { argument: "bandwidth", .. })
        ));
        let empty = Array1::<f64>::zeros(0);
        assert!(matches!(
            kde(1.0, empty.view()),
            Err(DensityError::InvalidArgumentValue { argument: "sample", .. })
        ));
        let poisoned = array![1.0, f64::INFINITY];
        assert!(matches!(
            plugin_kde(1.0, poisoned.view()),
            Err(DensityError::InvalidArgumentType { argument: "sample", .. })
        ));
    }

    #[test]
    fn non_contiguous_sample_views_are_accepted() {
        let wide = array![[0.0, 9.0], [1.0, 9.0], [2.0, 9.0]];
        let f = kde(1.0, wide.column(0)).unwrap();
        assert_eq!(f.sample_len(), 3);
        assert_eq!(f.bandwidth(), 1.0);
        assert_eq!(f.sample(), array![0.0, 1.0, 2.0].view());
    }
}
