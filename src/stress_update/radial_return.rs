//! J2 radial return mapping shared by the isotropic inelastic models.
//!
//! Given an isotropic elasticity tensor with shear modulus $G$ and a trial stress with
//! von Mises stress $q^{tr}$, the effective inelastic strain increment $\Delta p$ solves the
//! scalar equation $r(\Delta p) = 0$ supplied by a [`RadialReturnMaterial`]. The flow direction
//! is the deviatoric trial stress, so the updated stress is
//! $\sigma = \sigma^{tr} - 3 G \Delta p \, s^{tr} / q^{tr}$.
use crate::stress_update::config::{check_non_negative, check_positive};
use crate::stress_update::{
    AdmissibleState, ConfigurationError, ModelError, ModelInput, StressUpdateModel, TangentCalculation, TrialState,
};
use crate::tensor::{SymmetricRank2, SymmetricRank4};
use crate::Real;
use log::debug;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// The scalar constitutive law of a radial return model.
pub trait RadialReturnMaterial<T: Real>: Send + Sync {
    /// Number of internal values. The first internal value is always the accumulated effective
    /// inelastic strain.
    fn num_internal_values(&self) -> usize {
        1
    }

    /// Checks the parameters for use with the given tangent calculation.
    fn validate(&self, tangent_calculation: TangentCalculation) -> Result<(), ConfigurationError>;

    /// Whether the trial state leads to inelastic flow.
    fn yields(&self, effective_trial_stress: T, internal_old: &[T]) -> bool;

    /// The residual $r(\Delta p)$ and its derivative $\mathrm{d}r / \mathrm{d}\Delta p$.
    ///
    /// The residual must be positive at $\Delta p = 0$ whenever [`yields`](Self::yields) returns
    /// `true` and decrease monotonically.
    fn residual(&self, context: &ReturnMappingContext<T>, delta_p: T, internal_old: &[T]) -> (T, T);

    /// The flow compliance $\mathrm{d}\Delta p / \mathrm{d}q$ along the admissible states, evaluated
    /// at the updated effective stress. Returns `None` if the compliance is unbounded.
    fn flow_compliance(&self, context: &ReturnMappingContext<T>, effective_stress: T, internal_old: &[T]) -> Option<T>;

    /// Writes the internal values after a converged return mapping.
    fn update_internal_values(&self, delta_p: T, internal_old: &[T], internal_new: &mut [T]) {
        internal_new.copy_from_slice(internal_old);
        internal_new[0] = internal_old[0] + delta_p;
    }
}

/// Fixed quantities of a single return mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnMappingContext<T> {
    pub effective_trial_stress: T,
    pub shear_modulus: T,
    pub dt: T,
}

/// Settings shared by all radial return models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Real + Deserialize<'de>"))]
pub struct ReturnMappingSettings<T> {
    pub max_iterations: usize,
    pub relative_tolerance: T,
    pub absolute_tolerance: T,
    /// Largest effective inelastic strain increment per time step, used for the time step limit.
    pub max_inelastic_increment: T,
    pub tangent_calculation: TangentCalculation,
}

impl<T: Real> Default for ReturnMappingSettings<T> {
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn default() -> Self {
        Self {
            max_iterations: 30,
            relative_tolerance: 1e-8,
            absolute_tolerance: 1e-11,
            max_inelastic_increment: 1e-4,
            tangent_calculation: TangentCalculation::Partial,
        }
    }
}

impl<T: Real> ReturnMappingSettings<T> {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_iterations == 0 {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "max_iterations",
                expected: "a positive number of iterations".to_string(),
                actual: self.max_iterations.to_string(),
            });
        }
        if self.tangent_calculation == TangentCalculation::Elastic {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "tangent_calculation",
                expected: "partial or full".to_string(),
                actual: "elastic".to_string(),
            });
        }
        check_non_negative("relative_tolerance", self.relative_tolerance)?;
        check_non_negative("absolute_tolerance", self.absolute_tolerance)?;
        check_positive("max_inelastic_increment", self.max_inelastic_increment)
    }
}

/// Solves $r(x) = 0$ on $[0, x_{max}]$ with Newton's method, falling back to bisection whenever a
/// Newton step leaves the current bracket.
///
/// Assumes $r(0) > 0 > r(x_{max})$. Returns the root and the number of iterations.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn solve_return_mapping<T: Real>(
    residual: impl Fn(T) -> (T, T),
    upper_bound: T,
    settings: &ReturnMappingSettings<T>,
) -> Result<(T, usize), ModelError> {
    let mut x = 0.0;
    let (mut r, mut dr) = residual(x);
    let initial_residual = r.abs();
    let converged = |r: T| r.abs() <= settings.absolute_tolerance || r.abs() <= settings.relative_tolerance * initial_residual;

    if converged(r) {
        return Ok((x, 0));
    }

    let (mut lower, mut upper) = (0.0, upper_bound);
    for iter in 1..=settings.max_iterations {
        let newton_step = x - r / dr;
        x = if dr != 0.0 && newton_step > lower && newton_step < upper {
            newton_step
        } else {
            0.5 * (lower + upper)
        };

        (r, dr) = residual(x);
        debug!("Return mapping iteration {}: x = {}, residual = {}", iter, x, r);

        if converged(r) {
            return Ok((x, iter));
        }

        if r > 0.0 {
            lower = x;
        } else {
            upper = x;
        }
    }

    Err(ModelError::ReturnMappingFailed {
        iterations: settings.max_iterations,
    })
}

/// A stress update model performing a J2 radial return with the scalar law `M`.
#[derive(Debug, Clone)]
pub struct RadialReturnStressUpdate<T, M> {
    name: String,
    material: M,
    settings: ReturnMappingSettings<T>,
}

impl<T: Real, M: RadialReturnMaterial<T>> RadialReturnStressUpdate<T, M> {
    pub fn new(name: impl Into<String>, material: M, settings: ReturnMappingSettings<T>) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        material.validate(settings.tangent_calculation)?;
        Ok(Self {
            name: name.into(),
            material,
            settings,
        })
    }

    pub fn material(&self) -> &M {
        &self.material
    }

    pub fn settings(&self) -> &ReturnMappingSettings<T> {
        &self.settings
    }

    /// The tangent of the model for a non-zero inelastic increment.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn tangent(
        &self,
        input: &ModelInput<T>,
        context: &ReturnMappingContext<T>,
        normal: &SymmetricRank2<T>,
        delta_p: T,
        effective_stress: T,
        internal_old: &[T],
    ) -> SymmetricRank4<T> {
        let three_g = 3.0 * context.shear_modulus;
        let compliance = self
            .material
            .flow_compliance(context, effective_stress, internal_old);
        let n_outer_n = normal.outer_product(normal);
        let deviatoric = SymmetricRank4::identity_deviatoric();

        match input.tangent_calculation {
            TangentCalculation::Elastic => *input.elasticity_tensor,
            TangentCalculation::Partial => {
                let compliance = compliance.expect("partial tangent requires a bounded flow compliance");
                let scalar_one = three_g * delta_p / effective_stress;
                deviatoric * scalar_one + n_outer_n * (three_g * compliance - scalar_one)
            }
            TangentCalculation::Full => {
                let bulk_modulus = input.elasticity_tensor.isotropic_bulk_modulus();
                let identity = SymmetricRank2::identity();
                let two_g = 2.0 * context.shear_modulus;
                let normal_factor = compliance.map(|c| 1.0 / (1.0 + three_g * c)).unwrap_or(0.0);
                identity.outer_product(&identity) * bulk_modulus
                    + (deviatoric - n_outer_n) * (two_g * effective_stress / context.effective_trial_stress)
                    + n_outer_n * (two_g * normal_factor)
            }
        }
    }
}

impl<T: Real, M: RadialReturnMaterial<T>> StressUpdateModel<T> for RadialReturnStressUpdate<T, M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tangent_calculation(&self) -> TangentCalculation {
        self.settings.tangent_calculation
    }

    fn requires_isotropic_elasticity(&self) -> bool {
        true
    }

    fn num_internal_values(&self) -> usize {
        self.material.num_internal_values()
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn update_state(
        &self,
        input: &ModelInput<T>,
        trial: &TrialState<T>,
        internal_old: &[T],
        internal_new: &mut [T],
    ) -> Result<AdmissibleState<T>, ModelError> {
        let deviatoric_trial_stress = trial.stress.deviatoric();
        let context = ReturnMappingContext {
            effective_trial_stress: trial.stress.von_mises(),
            shear_modulus: input.elasticity_tensor.isotropic_shear_modulus(),
            dt: input.dt,
        };

        if context.effective_trial_stress <= 0.0 || !self.material.yields(context.effective_trial_stress, internal_old) {
            self.material.update_internal_values(0.0, internal_old, internal_new);
            return Ok(AdmissibleState::elastic(input, trial));
        }

        let upper_bound = context.effective_trial_stress / (3.0 * context.shear_modulus);
        let (delta_p, iterations) = solve_return_mapping(
            |delta_p| self.material.residual(&context, delta_p, internal_old),
            upper_bound,
            &self.settings,
        )?;
        debug!(
            "{}: return mapping converged in {} iterations at {} with inelastic increment {}",
            self.name, iterations, input.point, delta_p
        );
        self.material
            .update_internal_values(delta_p, internal_old, internal_new);

        let normal = deviatoric_trial_stress / deviatoric_trial_stress.l2_norm();
        let flow_direction = deviatoric_trial_stress * (1.5 / context.effective_trial_stress);
        let inelastic_strain_increment = flow_direction * delta_p;
        let stress = trial.stress - inelastic_strain_increment * (2.0 * context.shear_modulus);
        let effective_stress = context.effective_trial_stress - 3.0 * context.shear_modulus * delta_p;

        let tangent = input
            .compute_tangent
            .then(|| self.tangent(input, &context, &normal, delta_p, effective_stress, internal_old));

        Ok(AdmissibleState {
            stress,
            inelastic_strain_increment,
            tangent,
        })
    }

    fn time_step_limit(&self, dt: T, internal_old: &[T], internal_new: &[T]) -> Option<T> {
        let delta_p = internal_new[0] - internal_old[0];
        (delta_p > T::zero()).then(|| dt * self.settings.max_inelastic_increment / delta_p)
    }
}
