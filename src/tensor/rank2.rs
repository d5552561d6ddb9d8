use super::{mandel_factor, sqrt2, SymmetricRank4, TensorError, MANDEL_INDICES};
use crate::Real;
use nalgebra::{Matrix3, SVector, Scalar, Vector3};
use simba::scalar::SupersetOf;
use numeric_literals::replace_float_literals;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A symmetric $3 \times 3$ tensor stored as six Mandel components.
///
/// Components are ordered $(11, 22, 33, 23, 13, 12)$. The three shear components carry a
/// factor $\sqrt{2}$ relative to the raw tensor entries, which is applied when filling from raw
/// values and removed again by [`component`](Self::component), [`row`](Self::row) and
/// [`to_full`](Self::to_full).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetricRank2<T: Scalar> {
    pub(super) vals: SVector<T, 6>,
}

impl<T: Real> Default for SymmetricRank2<T> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<T: Real> SymmetricRank2<T> {
    pub fn zeros() -> Self {
        Self { vals: SVector::zeros() }
    }

    pub fn identity() -> Self {
        let mut vals = SVector::zeros();
        for i in 0..3 {
            vals[i] = T::one();
        }
        Self { vals }
    }

    /// Constructs the tensor from raw (unscaled) components.
    pub fn new(s11: T, s22: T, s33: T, s23: T, s13: T, s12: T) -> Self {
        let r2 = sqrt2::<T>();
        Self {
            vals: SVector::<T, 6>::from([s11, s22, s33, r2 * s23, r2 * s13, r2 * s12]),
        }
    }

    /// Constructs the tensor directly from packed Mandel components.
    pub fn from_mandel(vals: SVector<T, 6>) -> Self {
        Self { vals }
    }

    /// Fills the tensor from a vector of raw values.
    ///
    /// - One value is broadcast to the three normal components.
    /// - Three values set the normal components $(11, 22, 33)$.
    /// - Six values set all components in the order $(11, 22, 33, 23, 13, 12)$.
    ///
    /// Any other length is rejected with [`TensorError::InvalidInputLength`].
    pub fn from_fill(input: &[T]) -> Result<Self, TensorError> {
        match *input {
            [a] => Ok(Self::new(a, a, a, T::zero(), T::zero(), T::zero())),
            [a, b, c] => Ok(Self::new(a, b, c, T::zero(), T::zero(), T::zero())),
            [a, b, c, d, e, f] => Ok(Self::new(a, b, c, d, e, f)),
            _ => Err(TensorError::InvalidInputLength { actual: input.len() }),
        }
    }

    /// Constructs the tensor from the symmetric part of a general $3 \times 3$ matrix.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn from_full(matrix: &Matrix3<T>) -> Self {
        let vals = SVector::from_fn(|k, _| {
            let (i, j) = MANDEL_INDICES[k];
            mandel_factor::<T>(k) * 0.5 * (matrix[(i, j)] + matrix[(j, i)])
        });
        Self { vals }
    }

    /// Returns the tensor $\vec v \otimes \vec v$.
    pub fn self_outer_product(v: &Vector3<T>) -> Self {
        Self::from_full(&(v * v.transpose()))
    }

    /// Generates a tensor whose raw components are drawn uniformly from
    /// `[offset - scale / 2, offset + scale / 2)`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, scale: T, offset: T) -> Self {
        let distribution = Uniform::new(-0.5f64, 0.5f64);
        let mut next = || {
            let sample = T::from_f64(distribution.sample(rng)).expect("sample must fit in T");
            offset + scale * sample
        };
        Self::new(next(), next(), next(), next(), next(), next())
    }

    /// The packed Mandel components.
    pub fn mandel(&self) -> &SVector<T, 6> {
        &self.vals
    }

    /// The raw tensor entry $A_{ij}$.
    pub fn component(&self, i: usize, j: usize) -> T {
        let k = super::mandel_index(i, j);
        self.vals[k] / mandel_factor(k)
    }

    /// The row $i$ of the full tensor.
    pub fn row(&self, i: usize) -> Vector3<T> {
        Vector3::new(self.component(i, 0), self.component(i, 1), self.component(i, 2))
    }

    pub fn to_full(&self) -> Matrix3<T> {
        Matrix3::from_fn(|i, j| self.component(i, j))
    }

    pub fn cast<U: Real>(&self) -> SymmetricRank2<U>
    where
        U: SupersetOf<T>,
    {
        SymmetricRank2 { vals: self.vals.cast() }
    }

    pub fn trace(&self) -> T {
        self.vals[0] + self.vals[1] + self.vals[2]
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn deviatoric(&self) -> Self {
        let mean = self.trace() / 3.0;
        let mut vals = self.vals;
        for i in 0..3 {
            vals[i] -= mean;
        }
        Self { vals }
    }

    /// The double contraction $\vec A : \vec B$.
    pub fn double_contraction(&self, other: &Self) -> T {
        self.vals.dot(&other.vals)
    }

    /// The outer product $\vec A \otimes \vec B$ as a fourth-order tensor.
    pub fn outer_product(&self, other: &Self) -> SymmetricRank4<T> {
        SymmetricRank4::from_mandel(self.vals * other.vals.transpose())
    }

    /// The Frobenius norm of the full tensor.
    pub fn l2_norm(&self) -> T {
        self.vals.norm()
    }

    pub fn det(&self) -> T {
        self.to_full().determinant()
    }

    /// The inverse of the tensor.
    ///
    /// Fails with [`TensorError::NotInvertible`] if the tensor is singular.
    pub fn inverse(&self) -> Result<Self, TensorError> {
        self.to_full()
            .try_inverse()
            .filter(|inv| inv.iter().all(|x| x.is_finite()))
            .map(|inv| Self::from_full(&inv))
            .ok_or(TensorError::NotInvertible)
    }

    /// The second invariant $J_2 = \frac{1}{2} \vec s : \vec s$ of the deviatoric part $\vec s$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn second_invariant(&self) -> T {
        let s = self.deviatoric();
        0.5 * s.double_contraction(&s)
    }

    /// The third invariant $J_3 = \det \vec s$ of the deviatoric part $\vec s$.
    pub fn third_invariant(&self) -> T {
        self.deviatoric().det()
    }

    /// The derivative $\partial J_2 / \partial \vec A$, which is the deviatoric part.
    pub fn dsecond_invariant(&self) -> Self {
        self.deviatoric()
    }

    /// The von Mises equivalent $\sqrt{3 J_2}$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn von_mises(&self) -> T {
        (3.0 * self.second_invariant()).sqrt()
    }

    /// Returns $\vec R \vec A \vec R^T$.
    pub fn rotate(&self, rotation: &Matrix3<T>) -> Self {
        Self::from_full(&(rotation * self.to_full() * rotation.transpose()))
    }

    /// Componentwise maximum of the packed components.
    pub fn sup(&self, other: &Self) -> Self {
        Self {
            vals: self.vals.zip_map(&other.vals, |a, b| a.max(b)),
        }
    }

    /// Componentwise minimum of the packed components.
    pub fn inf(&self, other: &Self) -> Self {
        Self {
            vals: self.vals.zip_map(&other.vals, |a, b| a.min(b)),
        }
    }
}
