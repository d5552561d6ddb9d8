use crate::stress_update::config::check_non_negative;
use crate::stress_update::radial_return::{RadialReturnMaterial, RadialReturnStressUpdate, ReturnMappingContext};
use crate::stress_update::{ConfigurationError, TangentCalculation};
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// J2 plasticity with linear isotropic hardening.
///
/// The yield stress after an accumulated plastic strain $p$ is $\sigma_y + H p$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotropicPlasticityParameters<T> {
    pub yield_stress: T,
    pub hardening_slope: T,
}

pub type IsotropicPlasticityStressUpdate<T> = RadialReturnStressUpdate<T, IsotropicPlasticityParameters<T>>;

impl<T: Real> IsotropicPlasticityParameters<T> {
    fn current_yield_stress(&self, plastic_strain: T) -> T {
        self.yield_stress + self.hardening_slope * plastic_strain
    }
}

impl<T: Real> RadialReturnMaterial<T> for IsotropicPlasticityParameters<T> {
    fn validate(&self, tangent_calculation: TangentCalculation) -> Result<(), ConfigurationError> {
        check_non_negative("yield_stress", self.yield_stress)?;
        check_non_negative("hardening_slope", self.hardening_slope)?;
        if tangent_calculation == TangentCalculation::Partial && self.hardening_slope == T::zero() {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "hardening_slope",
                expected: "a positive value when computing partial tangents".to_string(),
                actual: format!("{}", self.hardening_slope),
            });
        }
        Ok(())
    }

    fn yields(&self, effective_trial_stress: T, internal_old: &[T]) -> bool {
        effective_trial_stress > self.current_yield_stress(internal_old[0])
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn residual(&self, context: &ReturnMappingContext<T>, delta_p: T, internal_old: &[T]) -> (T, T) {
        let three_g = 3.0 * context.shear_modulus;
        let effective_stress = context.effective_trial_stress - three_g * delta_p;
        let yield_stress = self.current_yield_stress(internal_old[0] + delta_p);
        let residual = (effective_stress - yield_stress) / three_g;
        let derivative = -1.0 - self.hardening_slope / three_g;
        (residual, derivative)
    }

    fn flow_compliance(&self, _context: &ReturnMappingContext<T>, _effective_stress: T, _internal_old: &[T]) -> Option<T> {
        (self.hardening_slope > T::zero()).then(|| T::one() / self.hardening_slope)
    }
}
