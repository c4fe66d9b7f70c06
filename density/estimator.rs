//! The evaluation contract shared by every density estimator.
//!
//! An estimator is built once from a sample and its tuning values, then
//! evaluated any number of times. Evaluation is a pure function of the query:
//! there is no interior mutability and no randomness, so repeated evaluation
//! of the same grid is bit-identical.
//!
//! Two evaluation paths exist:
//!
//! * [`DensityEstimator::density`] evaluates a single point by accumulating
//!   kernel contributions over the sample in a plain loop.
//! * [`DensityEstimator::evaluate`] evaluates a grid by broadcasting queries
//!   against the sample into an `M × N` matrix and summing along the sample
//!   axis. The grid is split into row blocks so that no block holds more than
//!   [`BROADCAST_BLOCK_ELEMENTS`] entries; each row is computed exactly as it
//!   would be in the full matrix.

use crate::observe::{IgnoreNumericIssues, NumericIssue, NumericIssueKind, NumericObserver};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Upper bound on the number of pairwise differences materialised at once.
pub const BROADCAST_BLOCK_ELEMENTS: usize = 1 << 20;

pub trait DensityEstimator {
    /// Short identifier used in logs and numeric issue reports.
    fn name(&self) -> &'static str;

    /// Number of sample points the estimator was built from.
    fn sample_len(&self) -> usize;

    /// Density at a single point, accumulated over the sample one term at a time.
    fn density(&self, y: f64) -> f64;

    /// Density at every query in `ys`, computed in one broadcast over the sample.
    fn evaluate_block(&self, ys: ArrayView1<f64>) -> Array1<f64>;

    /// Density at every query in `ys`. Numeric issues are discarded.
    fn evaluate(&self, ys: ArrayView1<f64>) -> Array1<f64> {
        self.evaluate_observed(ys, &IgnoreNumericIssues)
    }

    /// Density at every query in `ys`, reporting non-finite results to `observer`.
    fn evaluate_observed(&self, ys: ArrayView1<f64>, observer: &dyn NumericObserver) -> Array1<f64> {
        let values = evaluate_in_blocks(self.sample_len(), ys, |block| self.evaluate_block(block));
        report_non_finite(self.name(), ys, &values, observer);
        values
    }
}

/// Applies `block_fn` to row blocks of `ys` sized so that no block pairs more
/// than [`BROADCAST_BLOCK_ELEMENTS`] queries and sample points.
pub(crate) fn evaluate_in_blocks<F>(sample_len: usize, ys: ArrayView1<f64>, block_fn: F) -> Array1<f64>
where
    F: Fn(ArrayView1<f64>) -> Array1<f64>,
{
    let rows_per_block = (BROADCAST_BLOCK_ELEMENTS / sample_len.max(1)).max(1);
    if ys.len() <= rows_per_block {
        return block_fn(ys);
    }
    let mut values = Array1::zeros(ys.len());
    for (block, mut out) in ys
        .axis_chunks_iter(Axis(0), rows_per_block)
        .zip(values.axis_chunks_iter_mut(Axis(0), rows_per_block))
    {
        out.assign(&block_fn(block));
    }
    values
}

/// Reports every non-finite entry of `values` to `observer`.
pub(crate) fn report_non_finite(
    estimator: &'static str,
    ys: ArrayView1<f64>,
    values: &Array1<f64>,
    observer: &dyn NumericObserver,
) {
    for (index, (&y, &value)) in ys.iter().zip(values.iter()).enumerate() {
        if !value.is_finite() {
            observer.observe(&NumericIssue {
                estimator,
                kind: NumericIssueKind::NonFinite,
                index,
                location: y,
                value,
            });
        }
    }
}

/// Pairwise scaled differences `(yᵢ - xⱼ) / h` as an `M × N` matrix.
pub(crate) fn scaled_differences(
    ys: ArrayView1<f64>,
    sample: ArrayView1<f64>,
    bandwidth: f64,
) -> Array2<f64> {
    let queries = ys.insert_axis(Axis(1));
    let points = sample.insert_axis(Axis(0));
    (&queries - &points) / bandwidth
}
