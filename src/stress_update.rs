//! Stress updates at a single quadrature point.
//!
//! A [`StressUpdateModel`] takes a trial stress and the elastic trial strain increment and returns
//! an admissible stress together with the inelastic part of the strain increment. The
//! [`MultiModelStressUpdate`] combines an ordered list of such models into a single constitutive
//! update by fixed-point iteration.
use crate::batch::BatchError;
use crate::tensor::{SymmetricRank2, SymmetricRank4, TensorError};
use crate::Real;
use nalgebra::{Matrix3, Scalar};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

mod batched;
pub(crate) mod config;
mod elastic;
mod isotropic_plasticity;
mod multi_model;
mod multisurface;
mod power_law_creep;
mod radial_return;
mod registry;
pub mod tangent;

pub use batched::BatchedStressUpdate;
pub use config::{ConfigurationError, MultiModelSettings};
pub use elastic::ElasticStressUpdate;
pub use isotropic_plasticity::{IsotropicPlasticityParameters, IsotropicPlasticityStressUpdate};
pub use multi_model::{MaterialPointInput, MaterialPointState, MaterialPointUpdate, MultiModelStressUpdate};
pub use multisurface::{TensileMultisurfaceParameters, TensileMultisurfaceStressUpdate};
pub use power_law_creep::{PowerLawCreepParameters, PowerLawCreepStressUpdate};
pub use radial_return::{
    solve_return_mapping, RadialReturnMaterial, RadialReturnStressUpdate, ReturnMappingContext, ReturnMappingSettings,
};
pub use registry::ModelRegistry;
pub use tangent::{TangentCalculation, TangentOperator};

/// Identifies a quadrature point by its element and its index within the element.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuadraturePoint {
    pub element: usize,
    pub index: usize,
}

impl Display for QuadraturePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element {}, quadrature point {}", self.element, self.index)
    }
}

/// Quantities that are fixed while a model computes an admissible state.
#[derive(Debug, Clone, Copy)]
pub struct ModelInput<'a, T: Scalar> {
    pub point: QuadraturePoint,
    pub dt: T,
    pub rotation_increment: &'a Matrix3<T>,
    pub elasticity_tensor: &'a SymmetricRank4<T>,
    pub elastic_strain_old: &'a SymmetricRank2<T>,
    /// The stress at the end of the previous step, without damage.
    pub stress_old: &'a SymmetricRank2<T>,
    /// Whether the model should report its tangent.
    pub compute_tangent: bool,
    /// How the tangents of all models are combined, which determines what each model reports.
    pub tangent_calculation: TangentCalculation,
}

impl<'a, T: Real> ModelInput<'a, T> {
    /// The tangent reported by a model without inelastic response.
    ///
    /// This is the elasticity tensor when tangents are chained ([`TangentCalculation::Full`]) and
    /// zero when tangents are summed as contributions ([`TangentCalculation::Partial`]).
    pub fn elastic_tangent(&self) -> SymmetricRank4<T> {
        match self.tangent_calculation {
            TangentCalculation::Partial => SymmetricRank4::zeros(),
            TangentCalculation::Elastic | TangentCalculation::Full => *self.elasticity_tensor,
        }
    }
}

/// The trial state handed to a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialState<T: Scalar> {
    pub stress: SymmetricRank2<T>,
    /// The part of the strain increment not claimed by the other models.
    pub elastic_strain_increment: SymmetricRank2<T>,
}

/// The result of a model's stress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissibleState<T: Scalar> {
    pub stress: SymmetricRank2<T>,
    pub inelastic_strain_increment: SymmetricRank2<T>,
    /// The tangent of the model, in the form requested by [`ModelInput::tangent_calculation`].
    pub tangent: Option<SymmetricRank4<T>>,
}

impl<T: Real> AdmissibleState<T> {
    /// The state in which the trial state is accepted unchanged.
    pub fn elastic(input: &ModelInput<T>, trial: &TrialState<T>) -> Self {
        Self {
            stress: trial.stress,
            inelastic_strain_increment: SymmetricRank2::zeros(),
            tangent: input.compute_tangent.then(|| input.elastic_tangent()),
        }
    }
}

/// A constitutive model that maps a trial stress to an admissible stress.
///
/// Models do not own per-point history. Internal variables are stored by the caller as slices
/// of [`num_internal_values`](Self::num_internal_values) entries, with the values of the previous
/// step passed as `internal_old` and the values of the current step written to `internal_new`.
pub trait StressUpdateModel<T: Real>: Send + Sync {
    fn name(&self) -> &str;

    /// The form of the tangent this model computes.
    fn tangent_calculation(&self) -> TangentCalculation;

    /// Whether the model's response is isotropic.
    fn is_isotropic(&self) -> bool {
        true
    }

    /// Whether the model can only be used with an isotropic elasticity tensor.
    fn requires_isotropic_elasticity(&self) -> bool {
        false
    }

    fn num_internal_values(&self) -> usize {
        0
    }

    fn initialize_internal_values(&self, values: &mut [T]) {
        values.fill(T::zero());
    }

    /// Computes an admissible state from the trial state.
    ///
    /// The returned inelastic strain increment is the part of
    /// [`TrialState::elastic_strain_increment`] that this model claims.
    fn update_state(
        &self,
        input: &ModelInput<T>,
        trial: &TrialState<T>,
        internal_old: &[T],
        internal_new: &mut [T],
    ) -> Result<AdmissibleState<T>, ModelError>;

    /// Carries the internal variables over to the current step without updating them.
    fn propagate_state(&self, internal_old: &[T], internal_new: &mut [T]) {
        internal_new.copy_from_slice(internal_old);
    }

    /// The largest time step the model considers accurate, or `None` if unbounded.
    fn time_step_limit(&self, dt: T, internal_old: &[T], internal_new: &[T]) -> Option<T> {
        let _ = (dt, internal_old, internal_new);
        None
    }
}

/// A numerical failure inside a single model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The local return mapping did not converge.
    ReturnMappingFailed { iterations: usize },
    /// A tensor required by the model could not be inverted.
    Tensor(TensorError),
    /// Results of an external evaluation could not be located.
    Batch(BatchError),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::ReturnMappingFailed { iterations } => {
                write!(f, "Return mapping failed to converge within {} iterations.", iterations)
            }
            ModelError::Tensor(err) => write!(f, "Tensor operation failed. Error: {}", err),
            ModelError::Batch(err) => write!(f, "Batch lookup failed. Error: {}", err),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelError::ReturnMappingFailed { .. } => None,
            ModelError::Tensor(err) => Some(err),
            ModelError::Batch(err) => Some(err),
        }
    }
}

impl From<TensorError> for ModelError {
    fn from(err: TensorError) -> Self {
        ModelError::Tensor(err)
    }
}

impl From<BatchError> for ModelError {
    fn from(err: BatchError) -> Self {
        ModelError::Batch(err)
    }
}

/// A recoverable failure of the stress update at a quadrature point.
///
/// Callers are expected to retry with a smaller time step.
#[derive(Debug, Clone, PartialEq)]
pub enum StressUpdateError {
    /// The multi-model iteration did not converge within the configured number of sweeps.
    MaxIterationsReached { point: QuadraturePoint, iterations: usize },
    /// A model failed internally.
    ModelFailed {
        point: QuadraturePoint,
        model_index: usize,
        model_name: String,
        source: ModelError,
    },
    /// The tangent could not be composed because a tensor was singular.
    SingularTangent { point: QuadraturePoint, source: TensorError },
}

impl StressUpdateError {
    pub fn point(&self) -> QuadraturePoint {
        match self {
            StressUpdateError::MaxIterationsReached { point, .. } => *point,
            StressUpdateError::ModelFailed { point, .. } => *point,
            StressUpdateError::SingularTangent { point, .. } => *point,
        }
    }
}

impl Display for StressUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StressUpdateError::MaxIterationsReached { point, iterations } => write!(
                f,
                "Max stress iterations ({}) hit during multi-model stress update at {}.",
                iterations, point
            ),
            StressUpdateError::ModelFailed {
                point,
                model_index,
                model_name,
                source,
            } => write!(
                f,
                "Stress update model {} (\"{}\") failed at {}. Error: {}",
                model_index, model_name, point, source
            ),
            StressUpdateError::SingularTangent { point, source } => {
                write!(f, "Failed to compose tangent at {}. Error: {}", point, source)
            }
        }
    }
}

impl Error for StressUpdateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StressUpdateError::MaxIterationsReached { .. } => None,
            StressUpdateError::ModelFailed { source, .. } => Some(source),
            StressUpdateError::SingularTangent { source, .. } => Some(source),
        }
    }
}
