use crate::stress_update::{
    AdmissibleState, ModelError, ModelInput, StressUpdateModel, TangentCalculation, TrialState,
};
use crate::Real;

/// A model without inelastic response, which accepts every trial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticStressUpdate {
    name: String,
}

impl ElasticStressUpdate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<T: Real> StressUpdateModel<T> for ElasticStressUpdate {
    fn name(&self) -> &str {
        &self.name
    }

    fn tangent_calculation(&self) -> TangentCalculation {
        TangentCalculation::Elastic
    }

    fn update_state(
        &self,
        input: &ModelInput<T>,
        trial: &TrialState<T>,
        _internal_old: &[T],
        _internal_new: &mut [T],
    ) -> Result<AdmissibleState<T>, ModelError> {
        Ok(AdmissibleState::elastic(input, trial))
    }
}
