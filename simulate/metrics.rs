use super::SimulationError;
use ndarray::{Array1, ArrayView1, Zip};

/// `points` evenly spaced values from `start` to `end` inclusive, with spacing.
pub fn evaluation_grid(
    start: f64,
    end: f64,
    points: usize,
) -> Result<(Array1<f64>, f64), SimulationError> {
    if points < 2 || !(start.is_finite() && end.is_finite() && start < end) {
        return Err(SimulationError::InvalidConfig(format!(
            "cannot build a grid of {points} points over [{start}, {end}]"
        )));
    }
    let grid = Array1::linspace(start, end, points);
    let dx = (end - start) / (points - 1) as f64;
    Ok((grid, dx))
}

/// Riemann-sum approximation of `∫ (estimate - truth)²`.
///
/// Non-finite estimates propagate into the result.
pub fn integrated_squared_error(
    estimate: ArrayView1<f64>,
    truth: ArrayView1<f64>,
    dx: f64,
) -> Result<f64, SimulationError> {
    if estimate.len() != truth.len() {
        return Err(SimulationError::InvalidConfig(format!(
            "estimate has {} values but truth has {}",
            estimate.len(),
            truth.len()
        )));
    }
    let sum = Zip::from(&estimate)
        .and(&truth)
        .fold(0.0, |acc, &e, &t| acc + (e - t) * (e - t));
    Ok(sum * dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn grid_matches_linspace_with_uniform_spacing() {
        let (grid, dx) = evaluation_grid(-4.0, 4.0, 100).unwrap();
        assert_eq!(grid.len(), 100);
        assert_eq!(grid[0], -4.0);
        assert_abs_diff_eq!(grid[99], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid[1] - grid[0], dx, epsilon = 1e-12);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(evaluation_grid(0.0, 1.0, 1).is_err());
        assert!(evaluation_grid(1.0, 1.0, 10).is_err());
        assert!(evaluation_grid(f64::NAN, 1.0, 10).is_err());
    }

    #[test]
    fn squared_error_is_a_weighted_sum() {
        let estimate = array![1.0, 2.0, 3.0];
        let truth = array![1.0, 1.0, 1.0];
        let ise = integrated_squared_error(estimate.view(), truth.view(), 0.5).unwrap();
        assert_abs_diff_eq!(ise, 2.5, epsilon = 1e-15);
        assert_eq!(integrated_squared_error(truth.view(), truth.view(), 0.5).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let a = array![1.0, 2.0];
        let b = array![1.0];
        assert!(matches!(
            integrated_squared_error(a.view(), b.view(), 1.0),
            Err(SimulationError::InvalidConfig(_))
        ));
    }
}
