//! Gaussian kernel primitives.
//!
//! Every estimator in this crate is built from the standard normal density and
//! its first two derivatives. The scalar forms are used by the pointwise
//! accumulation paths, the array forms by the broadcast paths. Both compute the
//! same expressions so the two paths agree to rounding error.

use ndarray::{Array, ArrayBase, Data, Dimension};

/// 1 / sqrt(2π), the normalising constant of the standard normal density.
pub const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density `exp(-z²/2) / sqrt(2π)`.
#[inline]
pub fn kernel(z: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * z * z).exp()
}

/// First derivative of the Gaussian kernel, `-z · K(z)`.
#[inline]
pub fn kernel_d1(z: f64) -> f64 {
    -z * kernel(z)
}

/// Second derivative of the Gaussian kernel, `(z² - 1) · K(z)`.
#[inline]
pub fn kernel_d2(z: f64) -> f64 {
    (z * z - 1.0) * kernel(z)
}

/// Elementwise [`kernel`] over an array of any shape.
pub fn kernel_array<S, D>(z: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    z.mapv(kernel)
}

/// Elementwise [`kernel_d1`] over an array of any shape.
pub fn kernel_d1_array<S, D>(z: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    z.mapv(kernel_d1)
}

/// Elementwise [`kernel_d2`] over an array of any shape.
pub fn kernel_d2_array<S, D>(z: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    z.mapv(kernel_d2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, array};

    #[test]
    fn kernel_peak_is_normalising_constant() {
        assert_abs_diff_eq!(kernel(0.0), 1.0 / (2.0 * std::f64::consts::PI).sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(kernel(1.0), 0.241_970_724_519_143_37, epsilon = 1e-15);
    }

    #[test]
    fn kernel_is_symmetric_and_derivatives_have_expected_parity() {
        for &z in &[0.1, 0.7, 1.3, 2.9, 5.0] {
            assert_abs_diff_eq!(kernel(z), kernel(-z), epsilon = 1e-16);
            assert_abs_diff_eq!(kernel_d1(z), -kernel_d1(-z), epsilon = 1e-16);
            assert_abs_diff_eq!(kernel_d2(z), kernel_d2(-z), epsilon = 1e-16);
        }
        assert_eq!(kernel_d1(0.0), 0.0);
        assert_abs_diff_eq!(kernel_d2(0.0), -kernel(0.0), epsilon = 1e-16);
        // Inflection points of the normal density.
        assert_abs_diff_eq!(kernel_d2(1.0), 0.0, epsilon = 1e-16);
        assert_abs_diff_eq!(kernel_d2(-1.0), 0.0, epsilon = 1e-16);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let step = 1e-5;
        for &z in &[-2.5, -0.4, 0.3, 1.7] {
            let d1 = (kernel(z + step) - kernel(z - step)) / (2.0 * step);
            let d2 = (kernel_d1(z + step) - kernel_d1(z - step)) / (2.0 * step);
            assert_abs_diff_eq!(kernel_d1(z), d1, epsilon = 1e-9);
            assert_abs_diff_eq!(kernel_d2(z), d2, epsilon = 1e-9);
        }
    }

    #[test]
    fn array_forms_match_scalar_forms_for_any_shape() {
        let grid = array![[-1.5, 0.0, 0.25], [2.0, -3.0, 7.5]];
        let k = kernel_array(&grid);
        let k1 = kernel_d1_array(&grid.view());
        let k2 = kernel_d2_array(&grid);
        assert_eq!(k.dim(), (2, 3));
        for ((i, j), &z) in grid.indexed_iter() {
            assert_eq!(k[(i, j)], kernel(z));
            assert_eq!(k1[(i, j)], kernel_d1(z));
            assert_eq!(k2[(i, j)], kernel_d2(z));
        }

        let line: Array1<f64> = Array1::linspace(-4.0, 4.0, 9);
        assert_eq!(kernel_array(&line).len(), 9);
    }

    #[test]
    fn kernel_underflows_to_zero_far_in_the_tails() {
        assert_eq!(kernel(60.0), 0.0);
        assert_eq!(kernel_d2(-60.0), 0.0);
        assert!(kernel(f64::INFINITY) == 0.0);
    }
}
