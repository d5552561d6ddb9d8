//! Rankine tensile cutoff with one yield surface per principal stress.
use crate::stress_update::config::{check_non_negative, check_positive};
use crate::stress_update::{
    AdmissibleState, ConfigurationError, ModelError, ModelInput, StressUpdateModel, TangentCalculation, TrialState,
};
use crate::tensor::{SymmetricRank2, TensorError};
use crate::OrderedReal;
use log::debug;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensileMultisurfaceParameters<T> {
    pub tensile_strength: T,
    /// Yield function values up to this tolerance are admissible.
    pub yield_function_tolerance: T,
}

/// Perfectly plastic Rankine tensile cutoff.
///
/// The yield surfaces are $f_a = \sigma_a - t \leq 0$ for the principal stresses $\sigma_a$.
/// The return is computed in principal stress space with the active sets $\{1\}$, $\{1, 2\}$ and
/// $\{1, 2, 3\}$, for principal stresses sorted in descending order, and the first admissible
/// result is taken. The internal value is the accumulated sum of the plastic multipliers.
#[derive(Debug, Clone)]
pub struct TensileMultisurfaceStressUpdate<T> {
    name: String,
    parameters: TensileMultisurfaceParameters<T>,
}

impl<T: OrderedReal> TensileMultisurfaceStressUpdate<T> {
    pub fn new(
        name: impl Into<String>,
        parameters: TensileMultisurfaceParameters<T>,
    ) -> Result<Self, ConfigurationError> {
        check_non_negative("tensile_strength", parameters.tensile_strength)?;
        check_positive("yield_function_tolerance", parameters.yield_function_tolerance)?;
        Ok(Self {
            name: name.into(),
            parameters,
        })
    }

    /// Returns the principal stresses and plastic multipliers for the given active set,
    /// or `None` if the result is not admissible.
    fn return_to_active_set(
        &self,
        elasticity: &Matrix3<T>,
        trial: &Vector3<T>,
        num_active: usize,
    ) -> Result<Option<(Vector3<T>, Vector3<T>)>, TensorError> {
        let t = self.parameters.tensile_strength;
        let tol = self.parameters.yield_function_tolerance;

        let system = Matrix3::from_fn(|i, j| {
            if i < num_active && j < num_active {
                elasticity[(i, j)]
            } else if i == j {
                T::one()
            } else {
                T::zero()
            }
        });
        let rhs = Vector3::from_fn(|i, _| if i < num_active { trial[i] - t } else { T::zero() });
        let multipliers = system.lu().solve(&rhs).ok_or(TensorError::NotInvertible)?;
        let stress = trial - elasticity * multipliers;

        let admissible_multipliers = multipliers.iter().all(|&gamma| gamma >= -tol);
        let admissible_stress = stress.iter().all(|&sigma| sigma - t <= tol);
        Ok((admissible_multipliers && admissible_stress).then(|| (stress, multipliers)))
    }
}

impl<T: OrderedReal> StressUpdateModel<T> for TensileMultisurfaceStressUpdate<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tangent_calculation(&self) -> TangentCalculation {
        TangentCalculation::Elastic
    }

    fn requires_isotropic_elasticity(&self) -> bool {
        true
    }

    fn num_internal_values(&self) -> usize {
        1
    }

    fn update_state(
        &self,
        input: &ModelInput<T>,
        trial: &TrialState<T>,
        internal_old: &[T],
        internal_new: &mut [T],
    ) -> Result<AdmissibleState<T>, ModelError> {
        internal_new.copy_from_slice(internal_old);

        // Eigenvalues are ascending, the surfaces are ordered by descending principal stress
        let (ascending, eigenvectors) = trial.stress.symmetric_eigenvalues_eigenvectors()?;
        let principal = Vector3::new(ascending[2], ascending[1], ascending[0]);
        let directions = Matrix3::from_columns(&[
            eigenvectors.column(2).clone_owned(),
            eigenvectors.column(1).clone_owned(),
            eigenvectors.column(0).clone_owned(),
        ]);

        let t = self.parameters.tensile_strength;
        if principal[0] - t <= self.parameters.yield_function_tolerance {
            return Ok(AdmissibleState::elastic(input, trial));
        }

        let mu = input.elasticity_tensor.isotropic_shear_modulus();
        let lambda = input.elasticity_tensor.isotropic_bulk_modulus() - mu * T::from_f64(2.0 / 3.0).expect("literal must fit in T");
        let elasticity = Matrix3::repeat(lambda) + Matrix3::identity() * (mu + mu);

        let mut result = None;
        for num_active in 1..=3 {
            if let Some(returned) = self.return_to_active_set(&elasticity, &principal, num_active)? {
                debug!("{}: returned to {} active surfaces at {}", self.name, num_active, input.point);
                result = Some(returned);
                break;
            }
        }
        // The apex is always reachable in stress space, so fall back to it
        let (stress, multipliers) = match result {
            Some(returned) => returned,
            None => {
                let multipliers = elasticity
                    .lu()
                    .solve(&principal.map(|sigma| sigma - t))
                    .ok_or(TensorError::NotInvertible)?;
                (Vector3::repeat(t), multipliers)
            }
        };

        internal_new[0] = internal_old[0] + multipliers.sum();

        let to_tensor = |values: &Vector3<T>| {
            SymmetricRank2::from_full(&(directions * Matrix3::from_diagonal(values) * directions.transpose()))
        };

        Ok(AdmissibleState {
            stress: to_tensor(&stress),
            inelastic_strain_increment: to_tensor(&multipliers),
            tangent: input.compute_tangent.then(|| input.elastic_tangent()),
        })
    }
}
