//! Tangent composition and convergence checks for the multi-model stress update.
//!
//! Everything in this module is a pure function of its arguments, so it can be tested
//! independently of any stress update model.
use crate::stress_update::ConfigurationError;
use crate::tensor::{SymmetricRank2, SymmetricRank4, TensorError};
use crate::Real;
use log::warn;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Relative tolerance for the symmetry check of the summed partial tangent contributions.
const PARTIAL_SYMMETRY_TOLERANCE: f64 = 1e-8;

/// The form of the tangent a model computes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TangentCalculation {
    /// The tangent is the elasticity tensor.
    Elastic,
    /// Models report contributions $\mathbb{J}_i$ that are combined as
    /// $(\mathbb{I} + \sum_i \mathbb{J}_i)^{-1} \mathbb{C}$.
    Partial,
    /// Models report their own full tangents, which are chained through $\mathbb{C}^{-1}$.
    Full,
}

/// The tangent operator requested by the user.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TangentOperator {
    Elastic,
    Nonlinear,
}

impl Default for TangentOperator {
    fn default() -> Self {
        TangentOperator::Nonlinear
    }
}

/// Determines how the tangents of the given models are combined.
///
/// The result is [`TangentCalculation::Elastic`] if the elastic operator was requested or if
/// every model computes an elastic tangent. Otherwise models must agree on either partial or
/// full tangents; models with elastic tangents are compatible with both.
pub fn resolve_tangent_calculation<'a>(
    operator: TangentOperator,
    models: impl IntoIterator<Item = (&'a str, TangentCalculation)>,
) -> Result<TangentCalculation, ConfigurationError> {
    let mut partial_model: Option<&str> = None;
    let mut full_model: Option<&str> = None;

    for (name, calculation) in models {
        match calculation {
            TangentCalculation::Elastic => {}
            TangentCalculation::Partial => {
                partial_model.get_or_insert(name);
            }
            TangentCalculation::Full => {
                full_model.get_or_insert(name);
            }
        }
    }

    match (partial_model, full_model) {
        (Some(partial), Some(full)) => Err(ConfigurationError::IncompatibleTangentCalculation {
            partial_model: partial.to_string(),
            full_model: full.to_string(),
        }),
        _ if operator == TangentOperator::Elastic => Ok(TangentCalculation::Elastic),
        (Some(_), None) => Ok(TangentCalculation::Partial),
        (None, Some(_)) => Ok(TangentCalculation::Full),
        (None, None) => Ok(TangentCalculation::Elastic),
    }
}

/// Combines the tangents of the individual models into the tangent of the combined update.
///
/// `tangents` must be given in model order.
///
/// # Panics
///
/// Panics if `calculation` is [`TangentCalculation::Partial`] and the sum
/// $\mathbb{I} + \sum_i \mathbb{J}_i$ is not symmetric.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn compose_tangent<T: Real>(
    calculation: TangentCalculation,
    elasticity_tensor: &SymmetricRank4<T>,
    tangents: &[SymmetricRank4<T>],
) -> Result<SymmetricRank4<T>, TensorError> {
    match calculation {
        TangentCalculation::Elastic => Ok(*elasticity_tensor),
        TangentCalculation::Partial => {
            let a = tangents
                .iter()
                .fold(SymmetricRank4::identity_symmetric(), |acc, j| acc + *j);
            let tolerance = T::from_f64(PARTIAL_SYMMETRY_TOLERANCE).expect("literal must fit in T");
            assert!(
                a.is_symmetric(tolerance),
                "Sum of partial tangent contributions must be symmetric"
            );
            Ok(a.inv_symm()? * *elasticity_tensor)
        }
        TangentCalculation::Full => match tangents.split_first() {
            None => Ok(*elasticity_tensor),
            Some((first, rest)) if rest.is_empty() => Ok(*first),
            Some((first, rest)) => {
                let elasticity_inverse = elasticity_tensor.inv_symm()?;
                Ok(rest
                    .iter()
                    .fold(*first, |acc, j| *j * elasticity_inverse * acc))
            }
        },
    }
}

/// The harmonic combination $1 / \sum_i (1 / l_i)$ of time step limits.
///
/// Unbounded limits (`None`) do not contribute. Returns `None` if every limit is unbounded.
pub fn harmonic_time_step_limit<T: Real>(limits: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    let inverse_sum = limits
        .into_iter()
        .flatten()
        .fold(T::zero(), |acc, limit| acc + T::one() / limit);
    (inverse_sum > T::zero()).then(|| T::one() / inverse_sum)
}

/// Combines per-model inelastic strain increments with the given weights.
pub fn weighted_inelastic_strain<T: Real>(increments: &[SymmetricRank2<T>], weights: &[T]) -> SymmetricRank2<T> {
    assert_eq!(increments.len(), weights.len(), "one weight per model required");
    increments
        .iter()
        .zip(weights)
        .map(|(increment, weight)| *increment * *weight)
        .sum()
}

/// Resolves the weights for combining inelastic strain increments.
///
/// Defaults to a weight of one per model. A single model always uses a weight of one.
pub fn resolve_weights<T: Real>(
    num_models: usize,
    weights: Option<&[T]>,
) -> Result<Vec<T>, ConfigurationError> {
    match weights {
        None => Ok(vec![T::one(); num_models]),
        Some(weights) if weights.len() != num_models => Err(ConfigurationError::InvalidParameter {
            parameter: "combined_inelastic_strain_weights",
            expected: format!("{} entries, one per inelastic model", num_models),
            actual: format!("{} entries", weights.len()),
        }),
        Some(weights) if num_models == 1 => {
            if weights[0] != T::one() {
                warn!("Only one inelastic model is configured, its strain weight is set to 1");
            }
            Ok(vec![T::one()])
        }
        Some(weights) => Ok(weights.to_vec()),
    }
}

/// Componentwise bounds of the stresses produced during one sweep over the models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressBracket<T: Real> {
    max: SymmetricRank2<T>,
    min: SymmetricRank2<T>,
}

impl<T: Real> StressBracket<T> {
    pub fn new(stress: &SymmetricRank2<T>) -> Self {
        Self {
            max: *stress,
            min: *stress,
        }
    }

    pub fn include(&mut self, stress: &SymmetricRank2<T>) {
        self.max = self.max.sup(stress);
        self.min = self.min.inf(stress);
    }

    /// The norm $\| \sigma_{max} - \sigma_{min} \|$.
    pub fn l2norm_delta(&self) -> T {
        (self.max - self.min).l2_norm()
    }
}

/// Tolerances of the multi-model iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCriteria<T> {
    pub max_iterations: usize,
    pub relative_tolerance: T,
    pub absolute_tolerance: T,
}

/// Outcome of the convergence check after a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Converged,
    Continue,
    MaxIterationsReached,
}

/// Decides whether the multi-model iteration has converged after `sweeps` completed sweeps.
///
/// The iteration has converged if only one model participates, if the stress bracket is below
/// the absolute tolerance, or if its ratio to the bracket of the first sweep is below the relative
/// tolerance. Otherwise it fails once `sweeps` reaches the maximum number of iterations.
pub fn check_convergence<T: Real>(
    criteria: &ConvergenceCriteria<T>,
    num_models: usize,
    sweeps: usize,
    l2norm_delta: T,
    first_l2norm_delta: T,
) -> SweepOutcome {
    let converged = num_models == 1
        || l2norm_delta <= criteria.absolute_tolerance
        || l2norm_delta / first_l2norm_delta <= criteria.relative_tolerance;

    if converged {
        SweepOutcome::Converged
    } else if sweeps >= criteria.max_iterations {
        SweepOutcome::MaxIterationsReached
    } else {
        SweepOutcome::Continue
    }
}
