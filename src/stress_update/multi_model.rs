use crate::damage::{DamageInput, DamageModel};
use crate::stress_update::tangent::{
    check_convergence, compose_tangent, harmonic_time_step_limit, resolve_tangent_calculation, resolve_weights,
    weighted_inelastic_strain, ConvergenceCriteria, StressBracket, SweepOutcome,
};
use crate::stress_update::{
    AdmissibleState, ConfigurationError, ModelInput, ModelRegistry, MultiModelSettings, QuadraturePoint,
    StressUpdateError, StressUpdateModel, TangentCalculation, TrialState,
};
use crate::tensor::{SymmetricRank2, SymmetricRank4};
use crate::Real;
use eyre::WrapErr;
use log::{debug, warn};
use nalgebra::{Matrix3, Scalar};

/// State of a material point that is carried from one time step to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPointState<T: Scalar> {
    pub stress: SymmetricRank2<T>,
    pub elastic_strain: SymmetricRank2<T>,
    pub inelastic_strain: SymmetricRank2<T>,
    /// Internal values of each model, in model order.
    pub model_internal_values: Vec<Vec<T>>,
    pub damage_internal_values: Vec<T>,
}

/// Input of a stress update at a material point.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPointInput<T: Scalar> {
    pub point: QuadraturePoint,
    /// Index of the current time step.
    pub time_step: usize,
    pub dt: T,
    pub strain_increment: SymmetricRank2<T>,
    pub rotation_increment: Matrix3<T>,
    pub elasticity_tensor: SymmetricRank4<T>,
    pub compute_jacobian: bool,
}

impl<T: Real> MaterialPointInput<T> {
    /// An input without rotation that does not request the Jacobian.
    pub fn new(
        point: QuadraturePoint,
        time_step: usize,
        dt: T,
        strain_increment: SymmetricRank2<T>,
        elasticity_tensor: SymmetricRank4<T>,
    ) -> Self {
        Self {
            point,
            time_step,
            dt,
            strain_increment,
            rotation_increment: Matrix3::identity(),
            elasticity_tensor,
            compute_jacobian: false,
        }
    }

    pub fn with_jacobian(mut self) -> Self {
        self.compute_jacobian = true;
        self
    }

    pub fn with_rotation_increment(mut self, rotation_increment: Matrix3<T>) -> Self {
        self.rotation_increment = rotation_increment;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPointUpdate<T: Scalar> {
    pub state: MaterialPointState<T>,
    /// The consistent tangent, if requested.
    pub jacobian: Option<SymmetricRank4<T>>,
    /// The largest time step the models consider accurate, or `None` if unbounded.
    pub time_step_limit: Option<T>,
    /// The number of sweeps over the models.
    pub sweeps: usize,
}

/// Result of the inelastic models before damage and rotation are applied.
struct InelasticOutcome<T: Scalar> {
    stress: SymmetricRank2<T>,
    elastic_strain_increment: SymmetricRank2<T>,
    inelastic_strain_increment: SymmetricRank2<T>,
    /// Tangents of the participating models, in model order.
    tangents: Vec<SymmetricRank4<T>>,
    time_step_limit: Option<T>,
    sweeps: usize,
}

/// Combines several inelastic models into a single stress update.
///
/// Each model is given the part of the strain increment not claimed by the other models. The
/// sweep over all models is repeated until the stresses returned by the models within a sweep
/// agree to within the configured tolerances.
pub struct MultiModelStressUpdate<T: Real> {
    settings: MultiModelSettings<T>,
    models: Vec<Box<dyn StressUpdateModel<T>>>,
    weights: Vec<T>,
    tangent_calculation: TangentCalculation,
    damage: Option<Box<dyn DamageModel<T>>>,
    isotropic_elasticity: bool,
    all_models_isotropic: bool,
}

impl<T: Real> std::fmt::Debug for MultiModelStressUpdate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.models.iter().map(|model| model.name()).collect();
        f.debug_struct("MultiModelStressUpdate")
            .field("settings", &self.settings)
            .field("models", &names)
            .field("tangent_calculation", &self.tangent_calculation)
            .field("damage", &self.damage.as_ref().map(|damage| damage.name()))
            .finish()
    }
}

impl<T: Real> MultiModelStressUpdate<T> {
    /// Validates the configuration and creates the stress update.
    ///
    /// `isotropic_elasticity` states whether the elasticity tensor is guaranteed to be isotropic
    /// at every material point.
    pub fn new(
        settings: MultiModelSettings<T>,
        models: Vec<Box<dyn StressUpdateModel<T>>>,
        isotropic_elasticity: bool,
    ) -> Result<Self, ConfigurationError> {
        settings.validate()?;

        if models.is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "inelastic_models",
                expected: "at least one model".to_string(),
                actual: "no models".to_string(),
            });
        }
        if !settings.inelastic_models.is_empty() && settings.inelastic_models.len() != models.len() {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "inelastic_models",
                expected: format!("{} model names", models.len()),
                actual: format!("{} model names", settings.inelastic_models.len()),
            });
        }

        if let Some(model) = models
            .iter()
            .find(|model| model.requires_isotropic_elasticity() && !isotropic_elasticity)
        {
            return Err(ConfigurationError::RequiresIsotropicElasticity {
                model: model.name().to_string(),
            });
        }

        let weights = resolve_weights(models.len(), settings.combined_inelastic_strain_weights.as_deref())?;
        let tangent_calculation = resolve_tangent_calculation(
            settings.tangent_operator,
            models
                .iter()
                .map(|model| (model.name(), model.tangent_calculation())),
        )?;

        let all_models_isotropic = models.iter().all(|model| model.is_isotropic());
        if settings.perform_finite_strain_rotations && isotropic_elasticity && !all_models_isotropic {
            debug!("Anisotropic inelastic models present, trial stresses are rotated from the old stress");
        }

        if settings.cycle_models && models.len() == 1 {
            warn!("cycle_models has no effect with a single inelastic model");
        }
        debug!(
            "Configured {} inelastic models with {:?} tangent calculation",
            models.len(),
            tangent_calculation
        );

        Ok(Self {
            settings,
            models,
            weights,
            tangent_calculation,
            damage: None,
            isotropic_elasticity,
            all_models_isotropic,
        })
    }

    /// Creates the models named in the settings from the registry.
    pub fn from_registry(
        settings: MultiModelSettings<T>,
        registry: &ModelRegistry<T>,
        isotropic_elasticity: bool,
    ) -> eyre::Result<Self> {
        let models = registry
            .create_all(settings.inelastic_models.as_slice())
            .wrap_err("failed to create inelastic models")?;
        let update = Self::new(settings, models, isotropic_elasticity)
            .wrap_err("invalid multi-model stress update configuration")?;
        Ok(update)
    }

    pub fn with_damage_model(mut self, damage: Box<dyn DamageModel<T>>) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn settings(&self) -> &MultiModelSettings<T> {
        &self.settings
    }

    pub fn num_models(&self) -> usize {
        self.models.len()
    }

    pub fn model(&self, index: usize) -> &dyn StressUpdateModel<T> {
        self.models[index].as_ref()
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    /// Whether every inelastic model reports an isotropic response.
    pub fn all_models_isotropic(&self) -> bool {
        self.all_models_isotropic
    }

    /// The combined tangent calculation method of all models.
    pub fn tangent_calculation(&self) -> TangentCalculation {
        self.tangent_calculation
    }

    /// The state of a material point before the first time step.
    pub fn initial_state(&self) -> MaterialPointState<T> {
        let model_internal_values = self
            .models
            .iter()
            .map(|model| {
                let mut values = vec![T::zero(); model.num_internal_values()];
                model.initialize_internal_values(&mut values);
                values
            })
            .collect();
        let damage_internal_values = self
            .damage
            .as_ref()
            .map(|damage| {
                let mut values = vec![T::zero(); damage.num_internal_values()];
                damage.initialize_internal_values(&mut values);
                values
            })
            .unwrap_or_default();

        MaterialPointState {
            stress: SymmetricRank2::zeros(),
            elastic_strain: SymmetricRank2::zeros(),
            inelastic_strain: SymmetricRank2::zeros(),
            model_internal_values,
            damage_internal_values,
        }
    }

    /// Computes the state at the end of the time step from the state at its beginning.
    pub fn update(
        &self,
        input: &MaterialPointInput<T>,
        old: &MaterialPointState<T>,
    ) -> Result<MaterialPointUpdate<T>, StressUpdateError> {
        let mut state = old.clone();
        let stress_old = match &self.damage {
            Some(damage) => damage.undamaged_old_stress(&old.stress, &old.damage_internal_values),
            None => old.stress,
        };

        let outcome = if self.settings.cycle_models {
            let active = input.time_step % self.models.len();
            self.update_single_model(active, input, old, &stress_old, &mut state)?
        } else if self.models.len() == 1 {
            self.update_single_model(0, input, old, &stress_old, &mut state)?
        } else {
            self.update_multiple_models(input, old, &stress_old, &mut state)?
        };

        state.stress = outcome.stress;
        state.elastic_strain = old.elastic_strain + outcome.elastic_strain_increment;
        state.inelastic_strain = old.inelastic_strain + outcome.inelastic_strain_increment;

        let mut jacobian = if input.compute_jacobian {
            let jacobian = compose_tangent(self.tangent_calculation, &input.elasticity_tensor, &outcome.tangents)
                .map_err(|source| StressUpdateError::SingularTangent {
                    point: input.point,
                    source,
                })?;
            Some(jacobian)
        } else {
            None
        };
        let mut time_step_limit = outcome.time_step_limit;

        if let Some(damage) = &self.damage {
            let damage_input = DamageInput {
                point: input.point,
                dt: input.dt,
                elastic_strain: &state.elastic_strain,
                undamaged_stress: &state.stress,
            };
            damage.update_damage(&damage_input, &old.damage_internal_values, &mut state.damage_internal_values);
            damage.update_stress_for_damage(&mut state.stress, &state.damage_internal_values);
            damage.finite_strain_rotation(&input.rotation_increment, &mut state.damage_internal_values);
            if let Some(jacobian) = jacobian.as_mut() {
                damage.update_jacobian_for_damage(jacobian, &state.damage_internal_values);
            }
            let damage_limit = damage.time_step_limit(input.dt, &old.damage_internal_values, &state.damage_internal_values);
            time_step_limit = min_time_step_limit(time_step_limit, damage_limit);
        }

        if self.settings.perform_finite_strain_rotations {
            let rotation = &input.rotation_increment;
            state.stress = state.stress.rotate(rotation);
            state.elastic_strain = state.elastic_strain.rotate(rotation);
            state.inelastic_strain = state.inelastic_strain.rotate(rotation);
            jacobian = jacobian.map(|jacobian| jacobian.rotate(rotation));
        }

        Ok(MaterialPointUpdate {
            state,
            jacobian,
            time_step_limit,
            sweeps: outcome.sweeps,
        })
    }

    /// Applies a single model and propagates the state of all others.
    fn update_single_model(
        &self,
        active: usize,
        input: &MaterialPointInput<T>,
        old: &MaterialPointState<T>,
        stress_old: &SymmetricRank2<T>,
        state: &mut MaterialPointState<T>,
    ) -> Result<InelasticOutcome<T>, StressUpdateError> {
        for (i, model) in self.models.iter().enumerate() {
            if i != active {
                model.propagate_state(&old.model_internal_values[i], &mut state.model_internal_values[i]);
            }
        }

        let trial = self.trial_state(input, old, stress_old, input.strain_increment);
        let admissible = self.update_model(active, input, old, stress_old, &trial, state)?;
        let model = &self.models[active];
        let time_step_limit = model.time_step_limit(
            input.dt,
            &old.model_internal_values[active],
            &state.model_internal_values[active],
        );

        Ok(InelasticOutcome {
            stress: admissible.stress,
            elastic_strain_increment: input.strain_increment - admissible.inelastic_strain_increment,
            inelastic_strain_increment: admissible.inelastic_strain_increment,
            tangents: vec![self.model_tangent(input, &admissible)],
            time_step_limit,
            sweeps: 1,
        })
    }

    /// Sweeps over all models until their stresses agree.
    fn update_multiple_models(
        &self,
        input: &MaterialPointInput<T>,
        old: &MaterialPointState<T>,
        stress_old: &SymmetricRank2<T>,
        state: &mut MaterialPointState<T>,
    ) -> Result<InelasticOutcome<T>, StressUpdateError> {
        let num_models = self.models.len();
        let criteria = ConvergenceCriteria {
            max_iterations: self.settings.max_iterations,
            relative_tolerance: self.settings.relative_tolerance,
            absolute_tolerance: self.settings.absolute_tolerance,
        };

        let mut inelastic_strain_increments = vec![SymmetricRank2::zeros(); num_models];
        let mut tangents = vec![SymmetricRank4::zeros(); num_models];
        let mut stress = *stress_old;
        let mut first_l2norm_delta = T::one();
        let mut sweeps = 0;

        loop {
            let mut bracket: Option<StressBracket<T>> = None;
            for i in 0..num_models {
                let others: SymmetricRank2<T> = inelastic_strain_increments
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, increment)| *increment)
                    .sum();
                let trial = self.trial_state(input, old, stress_old, input.strain_increment - others);
                let admissible = self.update_model(i, input, old, stress_old, &trial, state)?;

                inelastic_strain_increments[i] = admissible.inelastic_strain_increment;
                tangents[i] = self.model_tangent(input, &admissible);
                stress = admissible.stress;
                match bracket.as_mut() {
                    Some(bracket) => bracket.include(&stress),
                    None => bracket = Some(StressBracket::new(&stress)),
                }
            }

            let l2norm_delta = bracket
                .map(|bracket| bracket.l2norm_delta())
                .unwrap_or_else(T::zero);
            if sweeps == 0 && l2norm_delta > T::zero() {
                first_l2norm_delta = l2norm_delta;
            }
            sweeps += 1;
            debug!(
                "Stress update sweep {} at {}: l2 norm of stress delta = {}",
                sweeps, input.point, l2norm_delta
            );

            match check_convergence(&criteria, num_models, sweeps, l2norm_delta, first_l2norm_delta) {
                SweepOutcome::Converged => break,
                SweepOutcome::Continue => {}
                SweepOutcome::MaxIterationsReached => {
                    return Err(StressUpdateError::MaxIterationsReached {
                        point: input.point,
                        iterations: sweeps,
                    })
                }
            }
        }

        let inelastic_strain_increment = weighted_inelastic_strain(&inelastic_strain_increments, &self.weights);
        let time_step_limit = harmonic_time_step_limit(self.models.iter().enumerate().map(|(i, model)| {
            model.time_step_limit(
                input.dt,
                &old.model_internal_values[i],
                &state.model_internal_values[i],
            )
        }));

        Ok(InelasticOutcome {
            stress,
            elastic_strain_increment: input.strain_increment - inelastic_strain_increment,
            inelastic_strain_increment,
            tangents,
            time_step_limit,
            sweeps,
        })
    }

    /// The trial state for the given elastic strain increment.
    fn trial_state(
        &self,
        input: &MaterialPointInput<T>,
        old: &MaterialPointState<T>,
        stress_old: &SymmetricRank2<T>,
        elastic_strain_increment: SymmetricRank2<T>,
    ) -> TrialState<T> {
        let elasticity = &input.elasticity_tensor;
        // With rotations, C : ε_el is only consistent with the rotated old stress if both the
        // elasticity and all models are isotropic
        let isotropic = self.isotropic_elasticity && self.all_models_isotropic;
        let stress = if isotropic || !self.settings.perform_finite_strain_rotations {
            elasticity.contract(&(old.elastic_strain + elastic_strain_increment))
        } else {
            *stress_old + elasticity.contract(&elastic_strain_increment)
        };
        TrialState {
            stress,
            elastic_strain_increment,
        }
    }

    fn update_model(
        &self,
        index: usize,
        input: &MaterialPointInput<T>,
        old: &MaterialPointState<T>,
        stress_old: &SymmetricRank2<T>,
        trial: &TrialState<T>,
        state: &mut MaterialPointState<T>,
    ) -> Result<AdmissibleState<T>, StressUpdateError> {
        let model = &self.models[index];
        let model_input = ModelInput {
            point: input.point,
            dt: input.dt,
            rotation_increment: &input.rotation_increment,
            elasticity_tensor: &input.elasticity_tensor,
            elastic_strain_old: &old.elastic_strain,
            stress_old,
            compute_tangent: input.compute_jacobian,
            tangent_calculation: self.tangent_calculation,
        };
        model
            .update_state(
                &model_input,
                trial,
                &old.model_internal_values[index],
                &mut state.model_internal_values[index],
            )
            .map_err(|source| StressUpdateError::ModelFailed {
                point: input.point,
                model_index: index,
                model_name: model.name().to_string(),
                source,
            })
    }

    fn model_tangent(&self, input: &MaterialPointInput<T>, admissible: &AdmissibleState<T>) -> SymmetricRank4<T> {
        admissible.tangent.unwrap_or_else(|| match self.tangent_calculation {
            TangentCalculation::Partial => SymmetricRank4::zeros(),
            TangentCalculation::Elastic | TangentCalculation::Full => input.elasticity_tensor,
        })
    }
}

fn min_time_step_limit<T: Real>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
