use crate::linalg::LinalgError;
use ndarray::ArrayView1;
use thiserror::Error;

/// A comprehensive error type for estimator construction and coefficient solving.
///
/// All checks happen when an estimator is built. Evaluation never fails; numeric
/// trouble during evaluation is reported through a
/// [`NumericObserver`](crate::observe::NumericObserver) instead.
#[derive(Error, Debug)]
pub enum DensityError {
    /// The value is not usable as a number at all (NaN or infinite).
    #[error("Argument '{argument}' has the wrong kind of value: {reason}")]
    InvalidArgumentType {
        argument: &'static str,
        reason: String,
    },

    /// The value is numeric but outside its allowed range.
    #[error("Argument '{argument}' is out of range: {reason}")]
    InvalidArgumentValue {
        argument: &'static str,
        reason: String,
    },

    #[error("Linear algebra failure while solving for combination weights: {0}")]
    Linalg(#[from] LinalgError),

    #[error("Unknown configuration: {0}")]
    UnknownConfiguration(String),
}

impl DensityError {
    pub(crate) fn wrong_type(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgumentType {
            argument,
            reason: reason.into(),
        }
    }

    pub(crate) fn out_of_range(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgumentValue {
            argument,
            reason: reason.into(),
        }
    }
}

/// Checks that a scalar is a finite number.
pub(crate) fn require_finite(argument: &'static str, value: f64) -> Result<f64, DensityError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DensityError::wrong_type(
            argument,
            format!("expected a finite number, got {value}"),
        ))
    }
}

/// Checks that a bandwidth is a finite, strictly positive number.
pub(crate) fn require_bandwidth(value: f64) -> Result<f64, DensityError> {
    let h = require_finite("bandwidth", value)?;
    if h <= 0.0 {
        return Err(DensityError::out_of_range(
            "bandwidth",
            format!("bandwidth should be greater than 0, got {h}"),
        ));
    }
    Ok(h)
}

/// Checks that a sample is non-empty and contains only finite values.
pub(crate) fn require_sample(sample: ArrayView1<f64>) -> Result<(), DensityError> {
    if sample.is_empty() {
        return Err(DensityError::out_of_range("sample", "data is empty"));
    }
    if let Some((index, value)) = sample.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(DensityError::wrong_type(
            "sample",
            format!("entry {index} is not a finite number ({value})"),
        ));
    }
    Ok(())
}
