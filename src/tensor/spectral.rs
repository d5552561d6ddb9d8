//! Spectral operations, which rely on ordering the eigenvalues and are therefore only available
//! for [`OrderedReal`] scalars.
use super::{SymmetricRank2, SymmetricRank4, TensorError};
use crate::util::relative_fuzzy_eq;
use crate::OrderedReal;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use numeric_literals::replace_float_literals;
use std::cmp::Ordering;

/// Relative tolerance below which two eigenvalues are treated as repeated.
const REPEATED_EIGENVALUE_TOLERANCE: f64 = 1e-12;

impl<T: OrderedReal> SymmetricRank2<T> {
    /// The eigenvalues in ascending order.
    pub fn symmetric_eigenvalues(&self) -> Result<Vector3<T>, TensorError> {
        Ok(self.symmetric_eigenvalues_eigenvectors()?.0)
    }

    /// The eigenvalues in ascending order, together with a matrix whose columns are the
    /// associated unit eigenvectors.
    ///
    /// Fails with [`TensorError::NonFinite`] if any component is NaN or infinite.
    pub fn symmetric_eigenvalues_eigenvectors(&self) -> Result<(Vector3<T>, Matrix3<T>), TensorError> {
        if !self.mandel().iter().all(|x| x.is_finite()) {
            return Err(TensorError::NonFinite);
        }
        let SymmetricEigen {
            eigenvalues,
            eigenvectors,
        } = SymmetricEigen::new(self.to_full());

        let mut order = [0, 1, 2];
        order.sort_unstable_by(|&a, &b| nan_last(eigenvalues[a], eigenvalues[b]));

        let values = Vector3::from_fn(|i, _| eigenvalues[order[i]]);
        let vectors = Matrix3::from_fn(|r, c| eigenvectors[(r, order[c])]);
        Ok((values, vectors))
    }

    /// $\sin 3 \theta$ for the Lode angle $\theta$.
    ///
    /// When $J_2 \leq r_0$ the Lode angle is ill-defined and `r0_value` is returned instead.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn sin3_lode(&self, r0: T, r0_value: T) -> T {
        let j2 = self.second_invariant();
        if j2 <= r0 {
            r0_value
        } else {
            let value = -1.5 * (3.0).sqrt() * self.third_invariant() / j2.powf(1.5);
            value.min(1.0).max(-1.0)
        }
    }

    /// The fourth-order projection onto the positive part of the spectrum.
    ///
    /// Given the spectral decomposition $\vec A = \sum_a \lambda_a \vec M_a$ with
    /// $\vec M_a = \vec v_a \otimes \vec v_a$, the returned tensor $\mathbb{P}^+$ is the derivative
    /// of $\vec A^+ = \sum_a \langle \lambda_a \rangle_+ \vec M_a$ with respect to $\vec A$
    /// (Miehe & Lambrecht, 2001):
    /// $$
    /// \mathbb{P}^+ = \sum_a d_a \vec M_a \otimes \vec M_a
    ///   + \sum_a \sum_{b < a} \theta_{ab} (\mathbb{G}_{ab} + \mathbb{G}_{ba}),
    /// \qquad
    /// \theta_{ab} = \frac{1}{2} \frac{\langle \lambda_a \rangle_+ - \langle \lambda_b \rangle_+}{\lambda_a - \lambda_b}.
    /// $$
    /// For repeated eigenvalues $\theta_{ab}$ is replaced by its limit $\frac{1}{4}(d_a + d_b)$.
    ///
    /// Also returns the eigenvalues and eigenvectors used for the projection.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn positive_projection_eigen_decomposition(
        &self,
    ) -> Result<(SymmetricRank4<T>, Vector3<T>, Matrix3<T>), TensorError> {
        let (eigval, eigvec) = self.symmetric_eigenvalues_eigenvectors()?;

        let epos = eigval.map(|lambda| 0.5 * (lambda.abs() + lambda));
        let d = eigval.map(|lambda| if lambda > 0.0 { 1.0 } else { 0.0 });
        let m: Vec<Matrix3<T>> = (0..3)
            .map(|a| {
                let v = eigvec.column(a);
                v * v.transpose()
            })
            .collect();

        let mut proj_pos = SymmetricRank4::zeros();
        for a in 0..3 {
            let ma = SymmetricRank2::from_full(&m[a]);
            proj_pos += ma.outer_product(&ma) * d[a];
        }

        let tolerance = T::from_f64(REPEATED_EIGENVALUE_TOLERANCE).expect("literal must fit in T");
        for a in 0..3 {
            for b in 0..a {
                let (ma, mb) = (&m[a], &m[b]);
                let g = SymmetricRank4::from_fn(|i, j, k, l| {
                    let gab = ma[(i, k)] * mb[(j, l)] + ma[(i, l)] * mb[(j, k)];
                    let gba = mb[(i, k)] * ma[(j, l)] + mb[(i, l)] * ma[(j, k)];
                    gab + gba
                });

                let theta_ab = if relative_fuzzy_eq(eigval[a], eigval[b], tolerance) {
                    0.25 * (d[a] + d[b])
                } else {
                    0.5 * (epos[a] - epos[b]) / (eigval[a] - eigval[b])
                };
                proj_pos += g * theta_ab;
            }
        }

        Ok((proj_pos, eigval, eigvec))
    }
}

/// A total order on scalars that sorts NaN after all other values.
fn nan_last<T: OrderedReal>(a: T, b: T) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| {
        let a_is_nan = a.partial_cmp(&a).is_none();
        let b_is_nan = b.partial_cmp(&b).is_none();
        a_is_nan.cmp(&b_is_nan)
    })
}
