use crate::batch::SharedBatchOutput;
use crate::stress_update::{
    AdmissibleState, ModelError, ModelInput, StressUpdateModel, TangentCalculation, TrialState,
};
use crate::Real;

/// A model whose stress and tangent are computed by an external batched evaluator.
///
/// The model reads its stress and the derivative of the stress with respect to the strain from
/// the shared batch output. While the output is not ready, the trial state is accepted unchanged.
pub struct BatchedStressUpdate<T: Real> {
    name: String,
    output: SharedBatchOutput<T>,
    stress_field: String,
    strain_field: String,
}

impl<T: Real> BatchedStressUpdate<T> {
    pub fn new(
        name: impl Into<String>,
        output: SharedBatchOutput<T>,
        stress_field: impl Into<String>,
        strain_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            output,
            stress_field: stress_field.into(),
            strain_field: strain_field.into(),
        }
    }
}

impl<T: Real> StressUpdateModel<T> for BatchedStressUpdate<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tangent_calculation(&self) -> TangentCalculation {
        TangentCalculation::Full
    }

    fn is_isotropic(&self) -> bool {
        false
    }

    fn update_state(
        &self,
        input: &ModelInput<T>,
        trial: &TrialState<T>,
        _internal_old: &[T],
        _internal_new: &mut [T],
    ) -> Result<AdmissibleState<T>, ModelError> {
        let output = self.output.read();
        if !output.is_ready() {
            return Ok(AdmissibleState::elastic(input, trial));
        }

        let row = output.row(input.point.element, input.point.index)?;
        let stress = output.symmetric_rank2(&self.stress_field, row)?;
        let compliance = input.elasticity_tensor.inv_symm()?;
        let inelastic_strain_increment = compliance * (trial.stress - stress);

        let tangent = input
            .compute_tangent
            .then(|| match input.tangent_calculation {
                TangentCalculation::Full => output.symmetric_rank4_derivative(&self.stress_field, &self.strain_field, row),
                TangentCalculation::Elastic | TangentCalculation::Partial => input.elastic_tangent(),
            });

        Ok(AdmissibleState {
            stress,
            inelastic_strain_increment,
            tangent,
        })
    }
}
