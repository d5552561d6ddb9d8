//! Damage models applied after the inelastic stress update.
//!
//! A [`DamageModel`] is invoked by the multi-model stress update once the inelastic models have
//! converged, in the order
//! [`update_damage`](DamageModel::update_damage),
//! [`update_stress_for_damage`](DamageModel::update_stress_for_damage),
//! [`finite_strain_rotation`](DamageModel::finite_strain_rotation) and
//! [`update_jacobian_for_damage`](DamageModel::update_jacobian_for_damage).
use crate::stress_update::config::{check_non_negative, check_positive};
use crate::stress_update::{ConfigurationError, QuadraturePoint};
use crate::tensor::{SymmetricRank2, SymmetricRank4};
use crate::Real;
use log::warn;
use nalgebra::{Matrix3, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Quantities available to a damage model when updating its state.
#[derive(Debug, Clone, Copy)]
pub struct DamageInput<'a, T: Scalar> {
    pub point: QuadraturePoint,
    pub dt: T,
    pub elastic_strain: &'a SymmetricRank2<T>,
    /// The stress before damage is applied.
    pub undamaged_stress: &'a SymmetricRank2<T>,
}

pub trait DamageModel<T: Real>: Send + Sync {
    fn name(&self) -> &str;

    fn num_internal_values(&self) -> usize;

    fn initialize_internal_values(&self, values: &mut [T]) {
        values.fill(T::zero());
    }

    /// Recovers the stress without damage from the stress recorded at the end of the previous step.
    fn undamaged_old_stress(&self, stress_old: &SymmetricRank2<T>, internal_old: &[T]) -> SymmetricRank2<T>;

    fn update_damage(&self, input: &DamageInput<T>, internal_old: &[T], internal_new: &mut [T]);

    fn update_stress_for_damage(&self, stress: &mut SymmetricRank2<T>, internal_new: &[T]);

    /// Rotates any tensorial internal values by the rotation increment.
    fn finite_strain_rotation(&self, rotation_increment: &Matrix3<T>, internal_new: &mut [T]) {
        let _ = (rotation_increment, internal_new);
    }

    fn update_jacobian_for_damage(&self, jacobian: &mut SymmetricRank4<T>, internal_new: &[T]);

    /// The largest time step the model considers accurate, or `None` if unbounded.
    fn time_step_limit(&self, dt: T, internal_old: &[T], internal_new: &[T]) -> Option<T> {
        let _ = (dt, internal_old, internal_new);
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Real + Deserialize<'de>"))]
pub struct ExponentialDamageParameters<T> {
    /// Equivalent strain at which damage initiates.
    pub damage_threshold: T,
    /// Controls the rate of softening once damage has initiated.
    pub softening_strain: T,
    #[serde(default = "default_maximum_damage")]
    pub maximum_damage: T,
    #[serde(default = "default_maximum_damage_increment")]
    pub maximum_damage_increment: T,
}

fn default_maximum_damage<T: Real>() -> T {
    T::from_f64(0.99).expect("literal must fit in T")
}

fn default_maximum_damage_increment<T: Real>() -> T {
    T::from_f64(0.1).expect("literal must fit in T")
}

/// Isotropic scalar damage with exponential softening.
///
/// The history variable $\kappa$ is the largest equivalent strain $\sqrt{\varepsilon : \varepsilon}$
/// seen so far. Above the threshold $\kappa_0$ the damage is
/// $D = 1 - (\kappa_0 / \kappa) \exp(-(\kappa - \kappa_0) / \kappa_f)$, and the stress is scaled
/// by $1 - D$. Damage never decreases.
///
/// Internal values are $[\kappa, D]$.
#[derive(Debug, Clone)]
pub struct ExponentialScalarDamage<T> {
    name: String,
    parameters: ExponentialDamageParameters<T>,
}

impl<T: Real> ExponentialScalarDamage<T> {
    pub fn new(name: impl Into<String>, parameters: ExponentialDamageParameters<T>) -> Result<Self, ConfigurationError> {
        check_positive("damage_threshold", parameters.damage_threshold)?;
        check_positive("softening_strain", parameters.softening_strain)?;
        check_positive("maximum_damage_increment", parameters.maximum_damage_increment)?;
        check_non_negative("maximum_damage", parameters.maximum_damage)?;
        if parameters.maximum_damage >= T::one() {
            return Err(ConfigurationError::InvalidParameter {
                parameter: "maximum_damage",
                expected: "a value less than 1".to_string(),
                actual: format!("{}", parameters.maximum_damage),
            });
        }
        Ok(Self {
            name: name.into(),
            parameters,
        })
    }

    /// The damage for the history variable `kappa`.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn damage(&self, kappa: T) -> T {
        let ExponentialDamageParameters {
            damage_threshold: k0,
            softening_strain: kf,
            maximum_damage,
            ..
        } = self.parameters;
        if kappa <= k0 {
            0.0
        } else {
            let damage = 1.0 - (k0 / kappa) * (-(kappa - k0) / kf).exp();
            damage.min(maximum_damage)
        }
    }
}

impl<T: Real> DamageModel<T> for ExponentialScalarDamage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_internal_values(&self) -> usize {
        2
    }

    fn undamaged_old_stress(&self, stress_old: &SymmetricRank2<T>, internal_old: &[T]) -> SymmetricRank2<T> {
        *stress_old / (T::one() - internal_old[1])
    }

    fn update_damage(&self, input: &DamageInput<T>, internal_old: &[T], internal_new: &mut [T]) {
        let equivalent_strain = input.elastic_strain.l2_norm();
        let kappa = internal_old[0].max(equivalent_strain);
        let damage = self.damage(kappa).max(internal_old[1]);
        if damage == self.parameters.maximum_damage && internal_old[1] < damage {
            warn!(
                "{}: damage reached its maximum value {} at {}",
                self.name, damage, input.point
            );
        }
        internal_new[0] = kappa;
        internal_new[1] = damage;
    }

    fn update_stress_for_damage(&self, stress: &mut SymmetricRank2<T>, internal_new: &[T]) {
        *stress *= T::one() - internal_new[1];
    }

    fn update_jacobian_for_damage(&self, jacobian: &mut SymmetricRank4<T>, internal_new: &[T]) {
        *jacobian *= T::one() - internal_new[1];
    }

    fn time_step_limit(&self, dt: T, internal_old: &[T], internal_new: &[T]) -> Option<T> {
        let increment = internal_new[1] - internal_old[1];
        (increment > T::zero()).then(|| dt * self.parameters.maximum_damage_increment / increment)
    }
}
