use crate::stress_update::TangentOperator;
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Settings of the multi-model stress update.
///
/// Missing fields take their default values when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Real + Deserialize<'de>"))]
pub struct MultiModelSettings<T> {
    /// Names of the inelastic models, in the order they are applied.
    pub inelastic_models: Vec<String>,
    /// Maximum number of sweeps over all models.
    pub max_iterations: usize,
    pub relative_tolerance: T,
    pub absolute_tolerance: T,
    pub tangent_operator: TangentOperator,
    /// Weights for combining the inelastic strain increments of the models. Defaults to one.
    pub combined_inelastic_strain_weights: Option<Vec<T>>,
    /// Apply only one model per time step, cycling through the models.
    pub cycle_models: bool,
    /// Rotate stress and strains by the rotation increment at the end of the update.
    pub perform_finite_strain_rotations: bool,
}

impl<T: Real> Default for MultiModelSettings<T> {
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn default() -> Self {
        Self {
            inelastic_models: Vec::new(),
            max_iterations: 30,
            relative_tolerance: 1e-5,
            absolute_tolerance: 1e-5,
            tangent_operator: TangentOperator::Nonlinear,
            combined_inelastic_strain_weights: None,
            cycle_models: false,
            perform_finite_strain_rotations: false,
        }
    }
}

impl<T: Real> MultiModelSettings<T> {
    /// Checks the settings that do not depend on the configured models.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_iterations == 0 {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "max_iterations",
                expected: "a positive number of iterations".to_string(),
                actual: self.max_iterations.to_string(),
            });
        }
        check_non_negative("relative_tolerance", self.relative_tolerance)?;
        check_non_negative("absolute_tolerance", self.absolute_tolerance)?;
        Ok(())
    }
}

pub(crate) fn check_non_negative<T: Real>(parameter: &'static str, value: T) -> Result<(), ConfigurationError> {
    if value >= T::zero() {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            parameter,
            expected: "a non-negative value".to_string(),
            actual: format!("{}", value),
        })
    }
}

pub(crate) fn check_positive<T: Real>(parameter: &'static str, value: T) -> Result<(), ConfigurationError> {
    if value > T::zero() {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            parameter,
            expected: "a positive value".to_string(),
            actual: format!("{}", value),
        })
    }
}

/// An invalid configuration, detected before any stress update is performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    InvalidParameter {
        parameter: &'static str,
        expected: String,
        actual: String,
    },
    UnknownModel {
        name: String,
        available: Vec<String>,
    },
    /// A model computing partial tangents was combined with a model computing full tangents.
    IncompatibleTangentCalculation {
        partial_model: String,
        full_model: String,
    },
    /// A model requires an isotropic elasticity tensor, but none is guaranteed.
    RequiresIsotropicElasticity {
        model: String,
    },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::InvalidParameter {
                parameter,
                expected,
                actual,
            } => write!(
                f,
                "Invalid value for parameter \"{}\": expected {}, got {}.",
                parameter, expected, actual
            ),
            ConfigurationError::UnknownModel { name, available } => write!(
                f,
                "Unknown stress update model \"{}\". Available models: {}.",
                name,
                available.join(", ")
            ),
            ConfigurationError::IncompatibleTangentCalculation {
                partial_model,
                full_model,
            } => write!(
                f,
                "Model \"{}\" computes a partial tangent while model \"{}\" computes a full tangent. \
                 All models must use the same tangent calculation method.",
                partial_model, full_model
            ),
            ConfigurationError::RequiresIsotropicElasticity { model } => write!(
                f,
                "Model \"{}\" requires an isotropic elasticity tensor.",
                model
            ),
        }
    }
}

impl Error for ConfigurationError {}
