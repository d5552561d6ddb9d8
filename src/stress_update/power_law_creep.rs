use crate::stress_update::config::{check_non_negative, check_positive};
use crate::stress_update::radial_return::{RadialReturnMaterial, RadialReturnStressUpdate, ReturnMappingContext};
use crate::stress_update::{ConfigurationError, TangentCalculation};
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Power law creep with the effective creep rate $A q^n \exp(-Q / (R T))$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawCreepParameters<T> {
    /// The coefficient $A$.
    pub coefficient: T,
    /// The exponent $n$.
    pub n_exponent: T,
    /// The activation energy $Q$.
    pub activation_energy: T,
    /// The gas constant $R$.
    pub gas_constant: T,
    /// The temperature $T$.
    pub temperature: T,
}

pub type PowerLawCreepStressUpdate<T> = RadialReturnStressUpdate<T, PowerLawCreepParameters<T>>;

impl<T: Real> PowerLawCreepParameters<T> {
    fn arrhenius_factor(&self) -> T {
        (-self.activation_energy / (self.gas_constant * self.temperature)).exp()
    }

    /// $\mathrm{d}\Delta p / \mathrm{d}q = n \Delta t A q^{n-1} \exp(-Q/(R T))$.
    fn rate_derivative(&self, dt: T, effective_stress: T) -> T {
        self.n_exponent
            * dt
            * self.coefficient
            * effective_stress.powf(self.n_exponent - T::one())
            * self.arrhenius_factor()
    }
}

impl<T: Real> RadialReturnMaterial<T> for PowerLawCreepParameters<T> {
    fn validate(&self, _tangent_calculation: TangentCalculation) -> Result<(), ConfigurationError> {
        check_non_negative("coefficient", self.coefficient)?;
        check_positive("n_exponent", self.n_exponent)?;
        check_non_negative("activation_energy", self.activation_energy)?;
        check_positive("gas_constant", self.gas_constant)?;
        check_positive("temperature", self.temperature)
    }

    fn yields(&self, effective_trial_stress: T, _internal_old: &[T]) -> bool {
        self.coefficient > T::zero() && effective_trial_stress > T::zero()
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn residual(&self, context: &ReturnMappingContext<T>, delta_p: T, _internal_old: &[T]) -> (T, T) {
        let three_g = 3.0 * context.shear_modulus;
        let effective_stress = (context.effective_trial_stress - three_g * delta_p).max(0.0);
        let creep_increment =
            context.dt * self.coefficient * effective_stress.powf(self.n_exponent) * self.arrhenius_factor();
        let residual = creep_increment - delta_p;
        let derivative = -three_g * self.rate_derivative(context.dt, effective_stress) - 1.0;
        (residual, derivative)
    }

    fn flow_compliance(&self, context: &ReturnMappingContext<T>, effective_stress: T, _internal_old: &[T]) -> Option<T> {
        Some(self.rate_derivative(context.dt, effective_stress))
    }
}
