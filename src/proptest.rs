use crate::tensor::{SymmetricRank2, SymmetricRank4};
use ::proptest::prelude::*;
use nalgebra::SMatrix;

/// Symmetric rank-2 tensors with components of moderate magnitude.
pub fn symmetric_rank2() -> impl Strategy<Value = SymmetricRank2<f64>> {
    // Keep the range small so that products of tensors stay well within double precision
    let range = -10.0..10.0;
    [
        range.clone(),
        range.clone(),
        range.clone(),
        range.clone(),
        range.clone(),
        range,
    ]
    .prop_map(|[s11, s22, s33, s23, s13, s12]| SymmetricRank2::new(s11, s22, s33, s23, s13, s12))
}

/// Isotropic elasticity tensors with Young's modulus in `[1, 1000]` and Poisson's ratio in
/// `[0, 0.45]`.
pub fn isotropic_elasticity() -> impl Strategy<Value = SymmetricRank4<f64>> {
    (1.0..1000.0, 0.0..0.45).prop_map(|(young, poisson)| SymmetricRank4::isotropic_e_nu(young, poisson))
}

/// Well-conditioned symmetric positive definite rank-4 tensors.
///
/// Generated as $\mathbb{A} \mathbb{A}^T + \mathbb{I}$ for a random packed matrix $\mathbb{A}$.
pub fn spd_symmetric_rank4() -> impl Strategy<Value = SymmetricRank4<f64>> {
    prop::collection::vec(-1.0..1.0, 36).prop_map(|values| {
        let a = SMatrix::<f64, 6, 6>::from_column_slice(&values);
        SymmetricRank4::from_mandel(a * a.transpose() + SMatrix::identity())
    })
}
