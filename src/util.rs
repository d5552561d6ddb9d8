use crate::Real;
use nalgebra::storage::StorageMut;
use nalgebra::{Dim, Matrix, Scalar};

/// Clones the upper triangle entries into the lower triangle entries.
///
/// The primary use case for this is to construct a full symmetric matrix from a symmetric
/// matrix represented only by its upper triangular entries.
pub(crate) fn clone_upper_to_lower<T, R, C, S>(matrix: &mut Matrix<T, R, C, S>)
where
    T: Scalar,
    R: Dim,
    C: Dim,
    S: StorageMut<T, R, C>,
{
    for j in 0..matrix.ncols() {
        for i in (j + 1)..matrix.nrows() {
            matrix[(i, j)] = matrix[(j, i)].clone();
        }
    }
}

/// Whether `|a - b| <= tolerance`.
pub fn absolute_fuzzy_eq<T: Real>(a: T, b: T, tolerance: T) -> bool {
    (a - b).abs() <= tolerance
}

/// Whether `|a - b| <= tolerance * max(|a|, |b|)`.
///
/// Two exact zeros compare equal.
pub fn relative_fuzzy_eq<T: Real>(a: T, b: T, tolerance: T) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs())
}
