//! Known distributions used as ground truth in the simulation study.
//!
//! Sampling goes through `rand_distr` with a seeded [`StdRng`]; the true
//! densities come from `statrs`.

use crate::error::DensityError;
use ndarray::{Array1, ArrayView1};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use statrs::distribution::Continuous;

#[derive(Debug, Clone)]
struct NormalComponent {
    draw: rand_distr::Normal<f64>,
    truth: statrs::distribution::Normal,
}

impl NormalComponent {
    fn new(mean: f64, sd: f64) -> Result<Self, DensityError> {
        if sd <= 0.0 {
            return Err(DensityError::out_of_range(
                "params",
                format!("standard deviation should be greater than 0, got {sd}"),
            ));
        }
        Ok(Self {
            draw: rand_distr::Normal::new(mean, sd).map_err(params_error)?,
            truth: statrs::distribution::Normal::new(mean, sd).map_err(params_error)?,
        })
    }
}

#[derive(Debug, Clone)]
enum Family {
    Normal(NormalComponent),
    F {
        draw: rand_distr::FisherF<f64>,
        truth: statrs::distribution::FisherSnedecor,
    },
    Beta {
        draw: rand_distr::Beta<f64>,
        truth: statrs::distribution::Beta,
    },
    Bimodal {
        first: NormalComponent,
        second: NormalComponent,
        weight: f64,
    },
}

/// A named parametric distribution that can draw seeded samples and report
/// its true density.
///
/// | name      | params                    |
/// |-----------|---------------------------|
/// | `normal`  | `[mean, sd]`              |
/// | `f`       | `[dfn, dfd]`              |
/// | `beta`    | `[a, b]`                  |
/// | `bimodal` | `[mu1, mu2, s1, s2, p]`   |
#[derive(Debug, Clone)]
pub struct DistributionSampler {
    name: String,
    params: Vec<f64>,
    family: Family,
}

impl DistributionSampler {
    /// # Errors
    ///
    /// `UnknownConfiguration` for an unrecognised name (matched
    /// case-insensitively), `InvalidArgumentValue` for the wrong number of
    /// parameters or parameters outside the family's domain, and
    /// `InvalidArgumentType` for non-finite parameters.
    pub fn new(name: &str, params: &[f64]) -> Result<Self, DensityError> {
        let name = name.to_lowercase();
        let expected = match name.as_str() {
            "normal" | "f" | "beta" => 2,
            "bimodal" => 5,
            _ => {
                return Err(DensityError::UnknownConfiguration(format!(
                    "unknown distribution type: {name}"
                )));
            }
        };
        if params.len() != expected {
            return Err(DensityError::out_of_range(
                "params",
                format!(
                    "{name} distribution requires {expected} parameters, got {}",
                    params.len()
                ),
            ));
        }
        if let Some(bad) = params.iter().find(|p| !p.is_finite()) {
            return Err(DensityError::wrong_type(
                "params",
                format!("parameters must be finite numbers, got {bad}"),
            ));
        }

        let family = match (name.as_str(), params) {
            ("normal", &[mean, sd]) => Family::Normal(NormalComponent::new(mean, sd)?),
            ("f", &[dfn, dfd]) => {
                require_positive("degrees of freedom", &[dfn, dfd])?;
                Family::F {
                    draw: rand_distr::FisherF::new(dfn, dfd).map_err(params_error)?,
                    truth: statrs::distribution::FisherSnedecor::new(dfn, dfd)
                        .map_err(params_error)?,
                }
            }
            ("beta", &[a, b]) => {
                require_positive("shape", &[a, b])?;
                Family::Beta {
                    draw: rand_distr::Beta::new(a, b).map_err(params_error)?,
                    truth: statrs::distribution::Beta::new(a, b).map_err(params_error)?,
                }
            }
            ("bimodal", &[mu1, mu2, s1, s2, p]) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(DensityError::out_of_range(
                        "params",
                        format!("mixture weight should be within [0, 1], got {p}"),
                    ));
                }
                Family::Bimodal {
                    first: NormalComponent::new(mu1, s1)?,
                    second: NormalComponent::new(mu2, s2)?,
                    weight: p,
                }
            }
            _ => {
                return Err(DensityError::UnknownConfiguration(format!(
                    "unknown distribution type: {name}"
                )));
            }
        };

        Ok(Self {
            name,
            params: params.to_vec(),
            family,
        })
    }

    /// Lower-cased family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Draws `n` iid values. The same `(n, seed)` always gives the same sample.
    ///
    /// The bimodal family draws `⌊n·p⌋` values from the first component followed
    /// by the remainder from the second.
    pub fn generate_samples(&self, n: usize, seed: u64) -> Array1<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        match &self.family {
            Family::Normal(component) => {
                Array1::from_shape_fn(n, |_| component.draw.sample(&mut rng))
            }
            Family::F { draw, .. } => Array1::from_shape_fn(n, |_| draw.sample(&mut rng)),
            Family::Beta { draw, .. } => Array1::from_shape_fn(n, |_| draw.sample(&mut rng)),
            Family::Bimodal {
                first,
                second,
                weight,
            } => {
                let n_first = ((n as f64) * weight).floor() as usize;
                Array1::from_shape_fn(n, |i| {
                    if i < n_first {
                        first.draw.sample(&mut rng)
                    } else {
                        second.draw.sample(&mut rng)
                    }
                })
            }
        }
    }

    /// True density at `x`.
    pub fn pdf(&self, x: f64) -> f64 {
        match &self.family {
            Family::Normal(component) => component.truth.pdf(x),
            Family::F { truth, .. } => {
                if x < 0.0 {
                    0.0
                } else {
                    truth.pdf(x)
                }
            }
            Family::Beta { truth, .. } => {
                if !(0.0..=1.0).contains(&x) {
                    0.0
                } else {
                    truth.pdf(x)
                }
            }
            Family::Bimodal {
                first,
                second,
                weight,
            } => weight * first.truth.pdf(x) + (1.0 - weight) * second.truth.pdf(x),
        }
    }

    pub fn pdf_grid(&self, xs: ArrayView1<f64>) -> Array1<f64> {
        xs.mapv(|x| self.pdf(x))
    }
}

fn require_positive(what: &str, values: &[f64]) -> Result<(), DensityError> {
    match values.iter().find(|&&v| v <= 0.0) {
        Some(bad) => Err(DensityError::out_of_range(
            "params",
            format!("{what} should be greater than 0, got {bad}"),
        )),
        None => Ok(()),
    }
}

fn params_error(err: impl std::fmt::Display) -> DensityError {
    DensityError::out_of_range("params", err.to_string())
}
