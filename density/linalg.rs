//! Symmetric matrix inversion through the eigendecomposition `A = V Λ Vᵀ`.
//!
//! The coefficient solver inverts two small symmetric matrices per call: the
//! Gram matrix of the bandwidth scales and the projected constraint matrix.
//! Both are symmetric by construction, so a self-adjoint eigensolver gives a
//! real, orthogonal `V` and the inverse is rebuilt as `V Λ⁻¹ Vᵀ`.

use ndarray::{Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_linalg::{Eigh, UPLO};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("Matrix must be square to be inverted, but has shape {rows}x{cols}.")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix is singular and cannot be inverted (eigenvalue {eigenvalue:e}).")]
    Singular { eigenvalue: f64 },

    #[error("Symmetric eigendecomposition failed: {0}")]
    Decomposition(#[from] ndarray_linalg::error::LinalgError),
}

/// Inverts a real symmetric matrix.
///
/// Only the lower triangle is read by the eigensolver. An eigenvalue that is
/// exactly zero is reported as [`LinalgError::Singular`]; near-singular
/// matrices pass and yield very large entries. Use
/// [`invert_symmetric_matrix_with_tolerance`] to reject those as well.
pub fn invert_symmetric_matrix<S>(a: &ArrayBase<S, Ix2>) -> Result<Array2<f64>, LinalgError>
where
    S: Data<Elem = f64>,
{
    invert_symmetric_matrix_with_tolerance(a, 0.0)
}

/// Inverts a real symmetric matrix, rejecting any eigenvalue with `|λ| <= tolerance`.
///
/// A tolerance of zero is the exact-zero test of [`invert_symmetric_matrix`].
pub fn invert_symmetric_matrix_with_tolerance<S>(
    a: &ArrayBase<S, Ix2>,
    tolerance: f64,
) -> Result<Array2<f64>, LinalgError>
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = a.dim();
    if rows != cols {
        return Err(LinalgError::NotSquare { rows, cols });
    }

    let (eigenvalues, eigenvectors) = a.eigh(UPLO::Lower)?;

    if let Some(&eigenvalue) = eigenvalues.iter().find(|v| v.abs() <= tolerance) {
        return Err(LinalgError::Singular { eigenvalue });
    }

    let smallest = eigenvalues.iter().fold(f64::INFINITY, |acc, v| acc.min(v.abs()));
    let largest = eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    log::trace!(
        "Inverting {rows}x{rows} symmetric matrix, |eigenvalue| range [{smallest:.3e}, {largest:.3e}]"
    );

    // V · diag(1/λ) scales each eigenvector column, then multiply by Vᵀ.
    let inverse_values = eigenvalues.mapv(f64::recip);
    let scaled = &eigenvectors * &inverse_values.insert_axis(Axis(0));
    Ok(scaled.dot(&eigenvectors.t()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn assert_is_identity(m: &Array2<f64>, tol: f64) {
        for ((i, j), &v) in m.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(v, expected, epsilon = tol);
        }
    }

    #[test]
    fn inverse_of_diagonal_matrix_is_reciprocal_diagonal() {
        let a = array![[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 0.5]];
        let inv = invert_symmetric_matrix(&a).unwrap();
        assert_abs_diff_eq!(inv[(0, 0)], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(inv[(1, 1)], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(inv[(2, 2)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(inv[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn product_with_inverse_is_identity() {
        let a = array![
            [4.0, 1.0, 0.5, 0.2],
            [1.0, 3.0, 0.3, 0.1],
            [0.5, 0.3, 2.0, 0.4],
            [0.2, 0.1, 0.4, 1.5]
        ];
        let inv = invert_symmetric_matrix(&a).unwrap();
        assert_is_identity(&a.dot(&inv), 1e-8);
        assert_is_identity(&inv.dot(&a), 1e-8);
    }

    #[test]
    fn indefinite_symmetric_matrix_is_invertible() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        let inv = invert_symmetric_matrix(&a.view()).unwrap();
        assert_is_identity(&a.dot(&inv), 1e-8);
    }

    #[test]
    fn non_square_input_is_rejected() {
        let a = Array2::<f64>::ones((1, 2));
        match invert_symmetric_matrix(&a) {
            Err(LinalgError::NotSquare { rows, cols }) => {
                assert_eq!((rows, cols), (1, 2));
            }
            other => panic!("expected NotSquare, got {other:?}"),
        }
    }

    #[test]
    fn zero_matrix_is_singular() {
        let a = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            invert_symmetric_matrix(&a),
            Err(LinalgError::Singular { .. })
        ));
    }

    #[test]
    fn tolerance_rejects_near_singular_matrix_that_exact_test_accepts() {
        let a = array![[1.0, 0.0], [0.0, 1e-14]];
        assert!(invert_symmetric_matrix(&a).is_ok());
        assert!(matches!(
            invert_symmetric_matrix_with_tolerance(&a, 1e-12),
            Err(LinalgError::Singular { .. })
        ));
    }
}
