use super::{mandel_factor, mandel_rotation_matrix, SymmetricRank2, TensorError, MANDEL_INDICES};
use crate::util::clone_upper_to_lower;
use crate::Real;
use nalgebra::{DMatrix, Matrix3, SMatrix, Scalar};
use simba::scalar::SupersetOf;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::mem::size_of;
use std::str::FromStr;

/// Largest number of bytes the packed matrix may occupy for inversion to run on the stack.
///
/// Scalars with embedded derivative storage can make the fixed-size $6 \times 6$ solve expensive
/// in stack space; beyond this budget the inverse is computed with a heap-allocated matrix.
const MAX_STACK_INVERSE_BYTES: usize = 1024;

/// The ways in which a [`SymmetricRank4`] can be filled from a list of independent constants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMethod {
    /// `C1111 C1122 C1133 C2222 C2233 C3333 C2323 C1313 C1212`.
    Symmetric9,
    /// The 21 entries of the upper triangle, row by row:
    /// `C1111 C1122 C1133 C1123 C1113 C1112 C2222 C2233 C2223 C2213 C2212 C3333 C3323 C3313 C3312
    /// C2323 C2313 C2312 C1313 C1312 C1212`.
    Symmetric21,
    /// The Lamé constants `lambda mu`.
    SymmetricIsotropic,
    /// Young's modulus and Poisson's ratio `E nu`.
    SymmetricIsotropicENu,
    /// `C1111 C1122 C1133 C3333 C2323` for transverse isotropy about the 3-axis.
    AxisymmetricRz,
    /// `C1111 C1122 C1133 C2211 C2222 C2233 C3311 C3322 C3333`.
    Principal,
    /// `E1 E2 E3 G12 G23 G31 nu21 nu31 nu32 nu12 nu13 nu23`.
    Orthotropic,
}

impl FillMethod {
    /// The number of constants this fill method consumes.
    pub fn num_constants(&self) -> usize {
        match self {
            FillMethod::Symmetric9 => 9,
            FillMethod::Symmetric21 => 21,
            FillMethod::SymmetricIsotropic => 2,
            FillMethod::SymmetricIsotropicENu => 2,
            FillMethod::AxisymmetricRz => 5,
            FillMethod::Principal => 9,
            FillMethod::Orthotropic => 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FillMethod::Symmetric9 => "symmetric9",
            FillMethod::Symmetric21 => "symmetric21",
            FillMethod::SymmetricIsotropic => "symmetric_isotropic",
            FillMethod::SymmetricIsotropicENu => "symmetric_isotropic_E_nu",
            FillMethod::AxisymmetricRz => "axisymmetric_rz",
            FillMethod::Principal => "principal",
            FillMethod::Orthotropic => "orthotropic",
        }
    }
}

impl Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FillMethod {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            FillMethod::Symmetric9,
            FillMethod::Symmetric21,
            FillMethod::SymmetricIsotropic,
            FillMethod::SymmetricIsotropicENu,
            FillMethod::AxisymmetricRz,
            FillMethod::Principal,
            FillMethod::Orthotropic,
        ]
        .into_iter()
        .find(|method| method.name() == s)
        .ok_or_else(|| TensorError::UnknownFillMethod(s.to_string()))
    }
}

/// A minor-symmetric fourth-order tensor stored as a $6 \times 6$ matrix in the Mandel basis.
///
/// The symmetries $C_{ijkl} = C_{jikl} = C_{ijlk}$ hold by construction. Elasticity tensors built
/// through [`fill`](Self::fill) additionally have the major symmetry $C_{ijkl} = C_{klij}$, which
/// corresponds to a symmetric packed matrix.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetricRank4<T: Scalar> {
    pub(super) vals: SMatrix<T, 6, 6>,
}

impl<T: Real> Default for SymmetricRank4<T> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<T: Real> SymmetricRank4<T> {
    pub fn zeros() -> Self {
        Self { vals: SMatrix::zeros() }
    }

    /// The symmetric identity $\mathbb{I}$ with $\mathbb{I} : \vec A = \vec A$ for symmetric $\vec A$.
    pub fn identity_symmetric() -> Self {
        Self {
            vals: SMatrix::identity(),
        }
    }

    /// The deviatoric projection $\mathbb{P} = \mathbb{I} - \frac{1}{3} \vec I \otimes \vec I$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn identity_deviatoric() -> Self {
        let i = SymmetricRank2::<T>::identity();
        Self::identity_symmetric() - i.outer_product(&i) * (1.0 / 3.0)
    }

    /// Constructs the tensor directly from its packed Mandel matrix.
    pub fn from_mandel(vals: SMatrix<T, 6, 6>) -> Self {
        Self { vals }
    }

    /// Packs the tensor whose full components are given by `f(i, j, k, l)`.
    ///
    /// Only the components with $i \leq j$ and $k \leq l$ are queried, so `f` is assumed to
    /// respect the minor symmetries.
    pub fn from_fn(f: impl Fn(usize, usize, usize, usize) -> T) -> Self {
        let vals = SMatrix::from_fn(|a, b| {
            let (i, j) = MANDEL_INDICES[a];
            let (k, l) = MANDEL_INDICES[b];
            mandel_factor::<T>(a) * mandel_factor::<T>(b) * f(i, j, k, l)
        });
        Self { vals }
    }

    /// The packed Mandel matrix.
    pub fn mandel(&self) -> &SMatrix<T, 6, 6> {
        &self.vals
    }

    /// The raw tensor entry $C_{ijkl}$.
    pub fn component(&self, i: usize, j: usize, k: usize, l: usize) -> T {
        let a = super::mandel_index(i, j);
        let b = super::mandel_index(k, l);
        self.vals[(a, b)] / (mandel_factor::<T>(a) * mandel_factor::<T>(b))
    }

    pub fn cast<U: Real>(&self) -> SymmetricRank4<U>
    where
        U: SupersetOf<T>,
    {
        SymmetricRank4 { vals: self.vals.cast() }
    }

    /// Fills the tensor from independent constants according to the given fill method.
    ///
    /// Fails with [`TensorError::SizeMismatch`] if `input` does not contain exactly
    /// [`FillMethod::num_constants`] values.
    pub fn fill(method: FillMethod, input: &[T]) -> Result<Self, TensorError> {
        if input.len() != method.num_constants() {
            return Err(TensorError::SizeMismatch {
                fill_method: method,
                expected: method.num_constants(),
                actual: input.len(),
            });
        }

        let tensor = match method {
            FillMethod::Symmetric9 => Self::symmetric9(input),
            FillMethod::Symmetric21 => Self::symmetric21(input),
            FillMethod::SymmetricIsotropic => Self::isotropic(input[0], input[1]),
            FillMethod::SymmetricIsotropicENu => Self::isotropic_e_nu(input[0], input[1]),
            FillMethod::AxisymmetricRz => Self::axisymmetric_rz(input),
            FillMethod::Principal => Self::principal(input),
            FillMethod::Orthotropic => Self::orthotropic(input),
        };
        Ok(tensor)
    }

    /// Fills the tensor from nine constants. Shear-normal coupling is zero.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn symmetric9(c: &[T]) -> Self {
        let z = T::zero();
        #[rustfmt::skip]
        let vals = SMatrix::<T, 6, 6>::from_row_slice(&[
            c[0], c[1], c[2], z,          z,          z,
            c[1], c[3], c[4], z,          z,          z,
            c[2], c[4], c[5], z,          z,          z,
            z,    z,    z,    2.0 * c[6], z,          z,
            z,    z,    z,    z,          2.0 * c[7], z,
            z,    z,    z,    z,          z,          2.0 * c[8],
        ]);
        Self { vals }
    }

    /// Fills the upper triangle from 21 constants and mirrors it.
    fn symmetric21(c: &[T]) -> Self {
        let mut vals = SMatrix::<T, 6, 6>::zeros();
        let mut index = 0;
        for i in 0..6 {
            for j in i..6 {
                vals[(i, j)] = mandel_factor::<T>(i) * mandel_factor::<T>(j) * c[index];
                index += 1;
            }
        }
        clone_upper_to_lower(&mut vals);
        Self { vals }
    }

    /// The isotropic elasticity tensor $\lambda \vec I \otimes \vec I + 2 \mu \mathbb{I}$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn isotropic(lambda: T, mu: T) -> Self {
        let i = SymmetricRank2::<T>::identity();
        i.outer_product(&i) * lambda + Self::identity_symmetric() * (2.0 * mu)
    }

    /// The isotropic elasticity tensor for Young's modulus `young` and Poisson's ratio `poisson`.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn isotropic_e_nu(young: T, poisson: T) -> Self {
        let lambda = young * poisson / ((1.0 + poisson) * (1.0 - 2.0 * poisson));
        let mu = young / (2.0 * (1.0 + poisson));
        Self::isotropic(lambda, mu)
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn axisymmetric_rz(c: &[T]) -> Self {
        Self::symmetric9(&[c[0], c[1], c[2], c[0], c[2], c[3], c[4], c[4], 0.5 * (c[0] - c[1])])
    }

    fn principal(c: &[T]) -> Self {
        let mut vals = SMatrix::<T, 6, 6>::zeros();
        for i in 0..3 {
            for j in 0..3 {
                vals[(i, j)] = c[3 * i + j];
            }
        }
        Self { vals }
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn orthotropic(c: &[T]) -> Self {
        let (e1, e2, e3) = (c[0], c[1], c[2]);
        let (g12, g23, g31) = (c[3], c[4], c[5]);
        let (nu21, nu31, nu32) = (c[6], c[7], c[8]);
        let (nu12, nu13, nu23) = (c[9], c[10], c[11]);

        let k = 1.0 - nu12 * nu21 - nu23 * nu32 - nu31 * nu13 - 2.0 * nu21 * nu32 * nu13;
        Self::symmetric9(&[
            e1 * (1.0 - nu23 * nu32) / k,
            e1 * (nu21 + nu31 * nu23) / k,
            e1 * (nu31 + nu21 * nu32) / k,
            e2 * (1.0 - nu13 * nu31) / k,
            e2 * (nu32 + nu12 * nu31) / k,
            e3 * (1.0 - nu12 * nu21) / k,
            g23,
            g31,
            g12,
        ])
    }

    /// The shear modulus of an isotropic tensor, read from $C_{1212}$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn isotropic_shear_modulus(&self) -> T {
        0.5 * self.vals[(5, 5)]
    }

    /// The bulk modulus of an isotropic tensor, $(C_{1111} + 2 C_{1122}) / 3$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn isotropic_bulk_modulus(&self) -> T {
        (self.vals[(0, 0)] + 2.0 * self.vals[(0, 1)]) / 3.0
    }

    /// The major transpose $C_{klij}$.
    pub fn transpose_major(&self) -> Self {
        Self {
            vals: self.vals.transpose(),
        }
    }

    /// Whether the tensor has the major symmetry, up to a tolerance relative to its largest entry.
    pub fn is_symmetric(&self, relative_tolerance: T) -> bool {
        let scale = self.vals.amax().max(T::one());
        let asym = (self.vals - self.vals.transpose()).amax();
        asym <= relative_tolerance * scale
    }

    /// The Frobenius norm of the packed matrix.
    pub fn l2_norm(&self) -> T {
        self.vals.norm()
    }

    /// Rotates all four indices: $C'_{ijkl} = R_{im} R_{jn} R_{ko} R_{lp} C_{mnop}$.
    pub fn rotate(&self, rotation: &Matrix3<T>) -> Self {
        let q = mandel_rotation_matrix(rotation);
        Self {
            vals: q * self.vals * q.transpose(),
        }
    }

    /// The inverse of the packed matrix, which is the inverse on the space of symmetric tensors.
    ///
    /// Fails with [`TensorError::NotInvertible`] if the matrix is singular.
    pub fn inv_symm(&self) -> Result<Self, TensorError> {
        if 36 * size_of::<T>() > MAX_STACK_INVERSE_BYTES {
            self.inverse_dynamic()
        } else {
            self.inverse_fixed()
        }
    }

    fn inverse_fixed(&self) -> Result<Self, TensorError> {
        let mut inverse = self.vals;
        if inverse.try_inverse_mut() && inverse.iter().all(|x| x.is_finite()) {
            Ok(Self { vals: inverse })
        } else {
            Err(TensorError::NotInvertible)
        }
    }

    fn inverse_dynamic(&self) -> Result<Self, TensorError> {
        let matrix = DMatrix::from_column_slice(6, 6, self.vals.as_slice());
        let inverse = matrix
            .lu()
            .try_inverse()
            .filter(|inv| inv.iter().all(|x| x.is_finite()))
            .ok_or(TensorError::NotInvertible)?;
        Ok(Self {
            vals: SMatrix::from_column_slice(inverse.as_slice()),
        })
    }

    /// The contraction $C_{ijkl} A_{kl}$.
    pub fn contract(&self, a: &SymmetricRank2<T>) -> SymmetricRank2<T> {
        SymmetricRank2::from_mandel(self.vals * a.mandel())
    }
}
