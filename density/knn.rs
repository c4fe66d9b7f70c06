//! k-nearest-neighbour density estimate, a bandwidth-free baseline.
//!
//! With `k = max(1, ⌊ratio·n⌋)` the estimate at `y` is `(k/n) / (2·r)` where
//! `r` is the distance from `y` to the sample point at rank `k` (0-based) in
//! order of increasing distance, i.e. the k-th neighbour once the nearest
//! point is set aside. A query that sits on a sample point therefore does not
//! get an infinite estimate from its own zero distance.

use crate::error::{DensityError, require_finite, require_sample};
use crate::estimator::DensityEstimator;
use ndarray::{Array1, ArrayView1};

#[derive(Debug, Clone)]
pub struct KnnDensity {
    /// Sample sorted ascending.
    sorted: Vec<f64>,
    k: usize,
}

impl KnnDensity {
    /// # Errors
    ///
    /// `InvalidArgumentType` for a non-finite ratio or sample entry,
    /// `InvalidArgumentValue` when `ratio` is outside `(0, 1)`, the sample is
    /// empty, or the sample is too small to have a neighbour at rank `k`.
    pub fn new(sample: ArrayView1<f64>, ratio: f64) -> Result<Self, DensityError> {
        let ratio = require_finite("ratio", ratio)?;
        if ratio <= 0.0 || ratio >= 1.0 {
            return Err(DensityError::out_of_range(
                "ratio",
                format!("ratio should be between 0 and 1, got {ratio}"),
            ));
        }
        require_sample(sample)?;

        let n = sample.len();
        let k = ((ratio * n as f64).floor() as usize).max(1);
        if k >= n {
            return Err(DensityError::out_of_range(
                "sample",
                format!("need more than {k} points for neighbour rank {k}, got {n}"),
            ));
        }

        let mut sorted = sample.to_vec();
        sorted.sort_by(f64::total_cmp);
        Ok(Self { sorted, k })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Distance from `y` to the sample point at 0-based rank `k` by distance.
    ///
    /// Walks outward from the insertion point of `y`, taking the closer of the
    /// two frontier points each step.
    fn neighbour_distance(&self, y: f64) -> f64 {
        let points = &self.sorted;
        let mut right = points.partition_point(|&x| x < y);
        let mut left = right;
        let mut distance = 0.0;
        for _ in 0..=self.k {
            let take_left = match (left.checked_sub(1), points.get(right)) {
                (Some(l), Some(&r)) => y - points[l] <= r - y,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if take_left {
                left -= 1;
                distance = y - points[left];
            } else {
                distance = points[right] - y;
                right += 1;
            }
        }
        distance
    }
}

impl DensityEstimator for KnnDensity {
    fn name(&self) -> &'static str {
        "knn_density"
    }

    fn sample_len(&self) -> usize {
        self.sorted.len()
    }

    fn density(&self, y: f64) -> f64 {
        let n = self.sorted.len() as f64;
        (self.k as f64 / n) / (2.0 * self.neighbour_distance(y))
    }

    fn evaluate_block(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        ys.mapv(|y| self.density(y))
    }
}

/// Builds a [`KnnDensity`]. See [`KnnDensity::new`].
pub fn knn_density(sample: ArrayView1<f64>, ratio: f64) -> Result<KnnDensity, DensityError> {
    KnnDensity::new(sample, ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{CollectNumericIssues, NumericIssueKind};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// Sorts all distances and reads rank k, the way the definition states it.
    fn brute_force(sample: &[f64], k: usize, y: f64) -> f64 {
        let mut d: Vec<f64> = sample.iter().map(|x| (x - y).abs()).collect();
        d.sort_by(f64::total_cmp);
        let n = sample.len() as f64;
        (k as f64 / n) / (2.0 * d[k])
    }

    #[test]
    fn matches_brute_force_neighbour_search() {
        let sample = array![3.2, -1.0, 0.4, 0.5, 2.2, -0.3, 1.7, 0.9, -2.5, 4.1];
        let f = knn_density(sample.view(), 0.3).unwrap();
        assert_eq!(f.k(), 3);
        let raw = sample.to_vec();
        for &y in &[-4.0, -1.0, -0.05, 0.45, 1.0, 2.0, 3.9, 10.0] {
            assert_abs_diff_eq!(f.density(y), brute_force(&raw, 3, y), epsilon = 1e-12);
        }
    }

    #[test]
    fn small_ratio_still_uses_one_neighbour() {
        let sample = array![0.0, 1.0, 3.0];
        let f = knn_density(sample.view(), 0.01).unwrap();
        assert_eq!(f.k(), 1);
        // Query on a sample point skips its own zero distance.
        assert_abs_diff_eq!(f.density(0.0), (1.0 / 3.0) / 2.0, epsilon = 1e-15);
    }

    #[test]
    fn tied_neighbours_give_infinite_density_and_are_reported() {
        let sample = array![1.0, 1.0, 5.0];
        let f = knn_density(sample.view(), 0.5).unwrap();
        let collector = CollectNumericIssues::new();
        let values = f.evaluate_observed(array![1.0, 3.0].view(), &collector);
        assert!(values[0].is_infinite());
        assert!(values[1].is_finite());
        let issues = collector.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, NumericIssueKind::NonFinite);
    }

    #[test]
    fn invalid_ratio_and_samples_are_rejected() {
        let sample = array![0.0, 1.0, 2.0];
        for ratio in [0.0, 1.0, -0.5, 1.5] {
            assert!(matches!(
                knn_density(sample.view(), ratio),
                Err(DensityError::InvalidArgumentValue { argument: "ratio", .. })
            ));
        }
        assert!(matches!(
            knn_density(sample.view(), f64::NAN),
            Err(DensityError::InvalidArgumentType { argument: "ratio", .. })
        ));
        assert!(matches!(
            knn_density(array![2.0].view(), 0.5),
            Err(DensityError::InvalidArgumentValue { argument: "sample", .. })
        ));
    }
}
