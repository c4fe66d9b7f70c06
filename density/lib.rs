#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod adaptive;
pub mod coefficients;
pub mod error;
pub mod estimator;
pub mod kde;
pub mod kernel;
pub mod knn;
pub mod linalg;
pub mod multi;
pub mod observe;

// The simulation harness drives the estimators against known densities.
#[path = "../simulate/mod.rs"]
pub mod simulate;

pub use adaptive::{AdaptiveKde, adaptive_kde};
pub use coefficients::{CoefficientSpec, coef, var};
pub use error::DensityError;
pub use estimator::DensityEstimator;
pub use kde::{Kde, PluginKde, kde, plugin_kde};
pub use kernel::{kernel, kernel_d1, kernel_d2};
pub use knn::{KnnDensity, knn_density};
pub use linalg::{LinalgError, invert_symmetric_matrix};
pub use multi::{MultiKde, multi_kde, multi_kde_nonneg};
pub use observe::{
    CollectNumericIssues, IgnoreNumericIssues, LogNumericIssues, NumericIssue, NumericIssueKind,
    NumericObserver,
};
