//! Weights for combining Gaussian KDEs at several bandwidth scales.
//!
//! Given scales `ξ₁..ξ_d` applied to a base bandwidth `h`, the combination
//! `Σ cᵢ · KDE(ξᵢh)` has bias whose expansion in powers of `h²` carries the
//! factors `Σ cᵢ ξᵢ^(2k)`. The weights are chosen so that
//!
//! * `Σ cᵢ = 1` (the combination is still a density estimate),
//! * `Σ cᵢ ξᵢ^(2k) = 0` for `k = 1..degree-1` (leading bias terms cancel),
//!
//! while minimising the variance factor `cᵀBc`, where
//! `B[i][j] = 1/sqrt(2π(ξᵢ² + ξⱼ²))` is the overlap integral of two Gaussian
//! kernels of widths `ξᵢ` and `ξⱼ`. With design matrix `X[i][k] = ξᵢ^(2k)` the
//! constrained minimiser is `c = B⁻¹X (XᵀB⁻¹X)⁻¹ e₀`.

use crate::error::{DensityError, require_finite};
use crate::linalg::invert_symmetric_matrix_with_tolerance;
use ndarray::{Array1, Array2, ArrayView1};

/// Default number of bias constraints.
pub const DEFAULT_DEGREE: usize = 2;

/// The inputs to the coefficient solver.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSpec {
    /// Bandwidth scale factors `ξ`, each strictly positive.
    pub scales: Array1<f64>,
    /// Number of moment constraints, including the unit-mass constraint.
    pub degree: usize,
    /// Ridge penalty added to the diagonal of the Gram matrix.
    pub ridge: f64,
    /// Eigenvalues with magnitude at or below this are treated as zero when
    /// inverting. Zero reproduces the exact-zero singularity test.
    pub singular_tolerance: f64,
}

impl CoefficientSpec {
    pub fn new(scales: Array1<f64>) -> Self {
        Self {
            scales,
            degree: DEFAULT_DEGREE,
            ridge: 0.0,
            singular_tolerance: 0.0,
        }
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    pub fn with_singular_tolerance(mut self, tolerance: f64) -> Self {
        self.singular_tolerance = tolerance;
        self
    }

    /// Checks every field against the solver's preconditions.
    pub fn validate(&self) -> Result<(), DensityError> {
        if self.scales.is_empty() {
            return Err(DensityError::out_of_range(
                "scales",
                "at least one bandwidth scale is required",
            ));
        }
        for (index, &xi) in self.scales.iter().enumerate() {
            if !xi.is_finite() {
                return Err(DensityError::wrong_type(
                    "scales",
                    format!("scale {index} is not a finite number ({xi})"),
                ));
            }
            if xi <= 0.0 {
                return Err(DensityError::out_of_range(
                    "scales",
                    format!("scale {index} must be strictly positive, got {xi}"),
                ));
            }
        }
        if self.degree == 0 {
            return Err(DensityError::out_of_range(
                "degree",
                "degree should be greater than 0",
            ));
        }
        if self.degree > self.scales.len() {
            return Err(DensityError::out_of_range(
                "degree",
                format!(
                    "{} constraints cannot be met with only {} bandwidth scales",
                    self.degree,
                    self.scales.len()
                ),
            ));
        }
        let ridge = require_finite("ridge", self.ridge)?;
        if ridge < 0.0 {
            return Err(DensityError::out_of_range(
                "ridge",
                format!("lambda should be non-negative, got {ridge}"),
            ));
        }
        let tolerance = require_finite("singular_tolerance", self.singular_tolerance)?;
        if tolerance < 0.0 {
            return Err(DensityError::out_of_range(
                "singular_tolerance",
                format!("tolerance should be non-negative, got {tolerance}"),
            ));
        }
        Ok(())
    }

    /// Solves for the combination weights, one per scale.
    pub fn coefficients(&self) -> Result<Array1<f64>, DensityError> {
        self.validate()?;
        let n = self.scales.len();

        let mut b = gram_matrix(self.scales.view());
        b.diag_mut().mapv_inplace(|v| v + self.ridge);
        let x = design_matrix(self.scales.view(), self.degree);

        let b_inv = invert_symmetric_matrix_with_tolerance(&b, self.singular_tolerance)?;
        let b_inv_x = b_inv.dot(&x);
        let projected = x.t().dot(&b_inv_x);
        let m = invert_symmetric_matrix_with_tolerance(&projected, self.singular_tolerance)?;
        let c = b_inv_x.dot(&m.column(0));

        log::debug!(
            "Solved {n} combination weights for degree {} (ridge {}): {c:?}",
            self.degree,
            self.ridge
        );
        Ok(c)
    }

    /// Variance inflation factor `cᵀBc` of the combination.
    ///
    /// `B` here is the plain Gram matrix; the ridge only shapes the weights.
    pub fn variance(&self) -> Result<f64, DensityError> {
        let c = self.coefficients()?;
        Ok(self.variance_of(c.view()))
    }

    /// `cᵀBc` for weights already solved by [`Self::coefficients`].
    pub fn variance_of(&self, coefficients: ArrayView1<f64>) -> f64 {
        let b = gram_matrix(self.scales.view());
        coefficients.dot(&b.dot(&coefficients))
    }
}

/// Overlap integral of two centred Gaussian kernels with widths `a` and `b`.
#[inline]
pub fn kernel_covariance(a: f64, b: f64) -> f64 {
    1.0 / (2.0 * std::f64::consts::PI * (a * a + b * b)).sqrt()
}

/// `B[i][j] = 1/sqrt(2π(ξᵢ² + ξⱼ²))`.
pub fn gram_matrix(scales: ArrayView1<f64>) -> Array2<f64> {
    let n = scales.len();
    Array2::from_shape_fn((n, n), |(i, j)| kernel_covariance(scales[i], scales[j]))
}

/// `X[i][k] = ξᵢ^(2k)` for `k = 0..degree`.
pub fn design_matrix(scales: ArrayView1<f64>, degree: usize) -> Array2<f64> {
    Array2::from_shape_fn((scales.len(), degree), |(i, k)| {
        scales[i].powi(2 * k as i32)
    })
}

/// Combination weights for `scales` with `degree` constraints and ridge penalty `ridge`.
pub fn coef(scales: ArrayView1<f64>, degree: usize, ridge: f64) -> Result<Array1<f64>, DensityError> {
    CoefficientSpec::new(scales.to_owned())
        .with_degree(degree)
        .with_ridge(ridge)
        .coefficients()
}

/// Variance factor `cᵀBc` for the weights returned by [`coef`].
pub fn var(scales: ArrayView1<f64>, degree: usize, ridge: f64) -> Result<f64, DensityError> {
    CoefficientSpec::new(scales.to_owned())
        .with_degree(degree)
        .with_ridge(ridge)
        .variance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::LinalgError;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn moment(c: &Array1<f64>, scales: &Array1<f64>, k: i32) -> f64 {
        c.iter()
            .zip(scales.iter())
            .map(|(ci, xi)| ci * xi.powi(2 * k))
            .sum()
    }

    #[test]
    fn single_scale_gets_unit_weight() {
        let scales = array![1.3];
        let c = coef(scales.view(), 1, 0.0).unwrap();
        assert_abs_diff_eq!(c[0], 1.0, epsilon = 1e-12);
        let v = var(scales.view(), 1, 0.0).unwrap();
        assert_abs_diff_eq!(v, kernel_covariance(1.3, 1.3), epsilon = 1e-12);
    }

    #[test]
    fn two_scales_cancel_second_moment() {
        let scales = array![1.0, 2.0];
        let c = coef(scales.view(), 2, 0.0).unwrap();
        // Two equations in two unknowns: c₁ + c₂ = 1, c₁ + 4c₂ = 0.
        assert_abs_diff_eq!(c[0], 4.0 / 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(c[1], -1.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn constraints_hold_for_overdetermined_scale_sets() {
        let scales = array![0.5, 0.8, 1.0, 1.4, 2.0];
        for degree in 1..=3 {
            let c = coef(scales.view(), degree, 0.0).unwrap();
            assert_abs_diff_eq!(moment(&c, &scales, 0), 1.0, epsilon = 1e-8);
            for k in 1..degree as i32 {
                assert_abs_diff_eq!(moment(&c, &scales, k), 0.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn ridge_keeps_constraints_and_changes_weights() {
        let scales = array![0.6, 1.0, 1.5];
        let plain = coef(scales.view(), 2, 0.0).unwrap();
        let ridged = coef(scales.view(), 2, 0.5).unwrap();
        assert_abs_diff_eq!(moment(&ridged, &scales, 0), 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(moment(&ridged, &scales, 1), 0.0, epsilon = 1e-8);
        assert!((&plain - &ridged).iter().any(|d| d.abs() > 1e-6));
    }

    #[test]
    fn minimum_variance_weights_beat_other_feasible_weights() {
        let scales = array![0.7, 1.0, 1.6];
        let c = coef(scales.view(), 2, 0.0).unwrap();
        let b = gram_matrix(scales.view());
        let best = c.dot(&b.dot(&c));
        assert_abs_diff_eq!(var(scales.view(), 2, 0.0).unwrap(), best, epsilon = 1e-12);

        // Add a null-space direction of the constraints to get another feasible c.
        let x = design_matrix(scales.view(), 2);
        let (a0, a1, a2) = (scales[0].powi(2), scales[1].powi(2), scales[2].powi(2));
        let direction = array![a1 - a2, a2 - a0, a0 - a1];
        assert_abs_diff_eq!(x.t().dot(&direction)[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x.t().dot(&direction)[1], 0.0, epsilon = 1e-12);
        let other = &c + &(0.1 * &direction);
        assert!(other.dot(&b.dot(&other)) > best);
    }

    #[test]
    fn gram_and_design_matrices_have_closed_forms() {
        let scales = array![1.0, 2.0];
        let b = gram_matrix(scales.view());
        assert_abs_diff_eq!(b[(0, 1)], 1.0 / (10.0 * std::f64::consts::PI).sqrt(), epsilon = 1e-15);
        assert_eq!(b[(0, 1)], b[(1, 0)]);
        let x = design_matrix(scales.view(), 3);
        assert_eq!(x, array![[1.0, 1.0, 1.0], [1.0, 4.0, 16.0]]);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let scales = array![0.5, 1.0, 2.0];
        assert!(matches!(
            coef(scales.view(), 0, 0.0),
            Err(DensityError::InvalidArgumentValue { argument: "degree", .. })
        ));
        assert!(matches!(
            coef(scales.view(), 4, 0.0),
            Err(DensityError::InvalidArgumentValue { argument: "degree", .. })
        ));
        assert!(matches!(
            coef(scales.view(), 2, -0.1),
            Err(DensityError::InvalidArgumentValue { argument: "ridge", .. })
        ));
        assert!(matches!(
            coef(scales.view(), 2, f64::NAN),
            Err(DensityError::InvalidArgumentType { argument: "ridge", .. })
        ));
        assert!(matches!(
            coef(array![1.0, f64::NAN].view(), 1, 0.0),
            Err(DensityError::InvalidArgumentType { argument: "scales", .. })
        ));
        assert!(matches!(
            coef(array![1.0, -2.0].view(), 1, 0.0),
            Err(DensityError::InvalidArgumentValue { argument: "scales", .. })
        ));
        assert!(matches!(
            coef(Array1::<f64>::zeros(0).view(), 1, 0.0),
            Err(DensityError::InvalidArgumentValue { argument: "scales", .. })
        ));
    }

    #[test]
    fn tolerance_turns_duplicate_scales_into_a_singularity_error() {
        let spec = CoefficientSpec::new(array![1.0, 1.0, 2.0]).with_singular_tolerance(1e-10);
        assert!(matches!(
            spec.coefficients(),
            Err(DensityError::Linalg(LinalgError::Singular { .. }))
        ));
    }
}
