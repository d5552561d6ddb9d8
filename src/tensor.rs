//! Fixed-size symmetric tensors in Mandel notation.
//!
//! A symmetric second-order tensor $\vec A$ is stored as the six-vector
//! $$
//! \hat{\vec a} = \begin{bmatrix} A_{11} & A_{22} & A_{33} & \sqrt{2} A_{23} & \sqrt{2} A_{13} & \sqrt{2} A_{12} \end{bmatrix}^T,
//! $$
//! so that the Euclidean inner product of two packed vectors equals the double contraction
//! $\vec A : \vec B$ of the tensors they represent. Minor-symmetric fourth-order tensors are stored
//! as $6 \times 6$ matrices in the same basis, with entry $(I, J)$ scaled by
//! $f_I f_J$, where $f_I$ is the Mandel factor of index $I$.
use crate::Real;
use nalgebra::{Matrix3, SMatrix};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

mod ops;
mod rank2;
mod rank4;
mod spectral;

pub use rank2::SymmetricRank2;
pub use rank4::{FillMethod, SymmetricRank4};

/// Full tensor indices $(i, j)$ associated with each packed Mandel index.
pub const MANDEL_INDICES: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)];

/// Returns the packed Mandel index of the full tensor index $(i, j)$.
///
/// # Panics
///
/// Panics if `i` or `j` is not in `0 .. 3`.
pub fn mandel_index(i: usize, j: usize) -> usize {
    assert!(i < 3 && j < 3, "Tensor indices must be in 0 .. 3");
    match (i.min(j), i.max(j)) {
        (a, b) if a == b => a,
        (1, 2) => 3,
        (0, 2) => 4,
        _ => 5,
    }
}

/// The factor applied to the packed component `i` relative to the raw tensor entry.
pub fn mandel_factor<T: Real>(i: usize) -> T {
    if i < 3 {
        T::one()
    } else {
        sqrt2()
    }
}

pub(crate) fn sqrt2<T: Real>() -> T {
    (T::one() + T::one()).sqrt()
}

/// Returns the matrix $\vec Q$ such that $\vec Q \hat{\vec a}$ is the packed form of
/// $\vec R \vec A \vec R^T$.
///
/// For a rotation $\vec R$ the matrix $\vec Q$ is orthogonal.
pub(crate) fn mandel_rotation_matrix<T: Real>(rotation: &Matrix3<T>) -> SMatrix<T, 6, 6> {
    SMatrix::from_fn(|row, col| {
        let (i, j) = MANDEL_INDICES[row];
        let (k, l) = MANDEL_INDICES[col];
        let r = rotation;
        if k == l {
            mandel_factor::<T>(row) * r[(i, k)] * r[(j, k)]
        } else {
            // The basis tensor for a shear index is (e_k e_l + e_l e_k) / sqrt(2)
            mandel_factor::<T>(row) * (r[(i, k)] * r[(j, l)] + r[(i, l)] * r[(j, k)]) / sqrt2()
        }
    })
}

/// Errors produced by tensor construction and inversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// The fill vector of a second-order tensor did not have 1, 3 or 6 entries.
    InvalidInputLength { actual: usize },
    /// The fill vector of a fourth-order tensor did not match the fill method.
    SizeMismatch {
        fill_method: FillMethod,
        expected: usize,
        actual: usize,
    },
    /// The name does not correspond to any known fill method.
    UnknownFillMethod(String),
    /// The tensor is singular and cannot be inverted.
    NotInvertible,
    /// The tensor has NaN or infinite components.
    NonFinite,
}

impl Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TensorError::InvalidInputLength { actual } => write!(
                f,
                "Symmetric rank-2 tensors must be filled from 1, 3 or 6 values, got {}.",
                actual
            ),
            TensorError::SizeMismatch {
                fill_method,
                expected,
                actual,
            } => write!(
                f,
                "Fill method {} expects {} values, got {}.",
                fill_method, expected, actual
            ),
            TensorError::UnknownFillMethod(name) => write!(f, "Unknown fill method \"{}\".", name),
            TensorError::NotInvertible => write!(f, "Tensor is not invertible."),
            TensorError::NonFinite => write!(f, "Tensor has non-finite components."),
        }
    }
}

impl Error for TensorError {}
