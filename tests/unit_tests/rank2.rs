use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix3, Vector3};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tensor_mechanics::proptest::symmetric_rank2;
use tensor_mechanics::tensor::{mandel_index, SymmetricRank2, TensorError};
use util::{assert_mandel_approx_eq, rotation_about};

#[test]
fn fill_from_one_three_or_six_values() {
    let isotropic = SymmetricRank2::from_fill(&[2.0]).unwrap();
    assert_matrix_eq!(isotropic.to_full(), Matrix3::identity() * 2.0);

    let diagonal = SymmetricRank2::from_fill(&[1.0, 2.0, 3.0]).unwrap();
    assert_matrix_eq!(diagonal.to_full(), Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)));

    let full = SymmetricRank2::from_fill(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    #[rustfmt::skip]
    let expected = Matrix3::new(
        1.0, 6.0, 5.0,
        6.0, 2.0, 4.0,
        5.0, 4.0, 3.0);
    assert_matrix_eq!(full.to_full(), expected, comp = abs, tol = 1e-14);

    // Shear components are stored with the Mandel factor
    assert_scalar_eq!(full.mandel()[3], 4.0 * 2.0f64.sqrt(), comp = abs, tol = 1e-14);
    assert_scalar_eq!(full.mandel()[5], 6.0 * 2.0f64.sqrt(), comp = abs, tol = 1e-14);
}

#[test]
fn fill_with_invalid_length_fails() {
    for len in [0, 2, 4, 5, 7, 9] {
        let values = vec![1.0; len];
        assert_eq!(
            SymmetricRank2::from_fill(&values),
            Err(TensorError::InvalidInputLength { actual: len })
        );
    }
}

#[test]
fn mandel_index_follows_voigt_order() {
    assert_eq!(mandel_index(0, 0), 0);
    assert_eq!(mandel_index(1, 1), 1);
    assert_eq!(mandel_index(2, 2), 2);
    assert_eq!(mandel_index(1, 2), 3);
    assert_eq!(mandel_index(2, 1), 3);
    assert_eq!(mandel_index(0, 2), 4);
    assert_eq!(mandel_index(0, 1), 5);
}

#[test]
fn inverse_of_symmetric_tensor() {
    let a = SymmetricRank2::new(4.0, 5.0, 6.0, 1.0, 0.5, 0.2);
    let a_inv = a.inverse().unwrap();
    assert_matrix_eq!(a.to_full() * a_inv.to_full(), Matrix3::identity(), comp = abs, tol = 1e-12);
    assert_scalar_eq!(a.det() * a_inv.det(), 1.0, comp = abs, tol = 1e-12);

    let singular = SymmetricRank2::new(1.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    assert_eq!(singular.inverse(), Err(TensorError::NotInvertible));
}

#[test]
fn invariants_of_uniaxial_tension() {
    let sigma: f64 = 3.0;
    let a = SymmetricRank2::new(sigma, 0.0, 0.0, 0.0, 0.0, 0.0);
    assert_scalar_eq!(a.trace(), sigma);
    assert_scalar_eq!(a.second_invariant(), sigma * sigma / 3.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(a.third_invariant(), 2.0 * sigma.powi(3) / 27.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(a.von_mises(), sigma, comp = abs, tol = 1e-12);
    assert_scalar_eq!(a.sin3_lode(1e-12, 0.0), -1.0, comp = abs, tol = 1e-12);
}

#[test]
fn sin3_lode_of_hydrostatic_tensor_uses_fallback_value() {
    let a = SymmetricRank2::from_fill(&[5.0]).unwrap();
    assert_eq!(a.sin3_lode(1e-10, 0.25), 0.25);
}

#[test]
fn eigen_decomposition_is_sorted_and_reconstructs_tensor() {
    let rotation = rotation_about(Vector3::new(1.0, -2.0, 0.5), 0.7);
    let a = SymmetricRank2::new(2.0, 3.0, 1.0, 0.0, 0.0, 0.0).rotate(&rotation);

    let (eigenvalues, eigenvectors) = a.symmetric_eigenvalues_eigenvectors().unwrap();
    assert_matrix_eq!(eigenvalues, Vector3::new(1.0, 2.0, 3.0), comp = abs, tol = 1e-12);

    let reconstructed = eigenvectors * Matrix3::from_diagonal(&eigenvalues) * eigenvectors.transpose();
    assert_matrix_eq!(reconstructed, a.to_full(), comp = abs, tol = 1e-12);
}

#[test]
fn eigen_decomposition_of_non_finite_tensor_fails() {
    let nan = SymmetricRank2::new(f64::NAN, 1.0, 2.0, 0.0, 0.0, 0.0);
    assert_eq!(nan.symmetric_eigenvalues(), Err(TensorError::NonFinite));
    assert!(matches!(nan.positive_projection_eigen_decomposition(), Err(TensorError::NonFinite)));

    let infinite = SymmetricRank2::new(1.0, 2.0, 3.0, f64::INFINITY, 0.0, 0.0);
    assert_eq!(infinite.symmetric_eigenvalues(), Err(TensorError::NonFinite));
}

#[test]
fn positive_projection_of_positive_definite_tensor_is_identity() {
    let rotation = rotation_about(Vector3::new(0.3, 1.0, -0.4), 1.1);
    let a = SymmetricRank2::new(3.0, 1.0, 2.0, 0.0, 0.0, 0.0).rotate(&rotation);
    let (projection, _, _) = a.positive_projection_eigen_decomposition().unwrap();
    assert_mandel_approx_eq!(
        projection,
        tensor_mechanics::tensor::SymmetricRank4::<f64>::identity_symmetric(),
        abstol = 1e-10
    );
}

#[test]
fn positive_projection_recovers_positive_part() {
    let rotation = rotation_about(Vector3::new(-1.0, 0.2, 0.9), 0.4);
    let expected = SymmetricRank2::new(3.0, 0.0, 2.0, 0.0, 0.0, 0.0).rotate(&rotation);

    // Distinct eigenvalues
    let a = SymmetricRank2::new(3.0, -1.0, 2.0, 0.0, 0.0, 0.0).rotate(&rotation);
    let (projection, eigenvalues, _) = a.positive_projection_eigen_decomposition().unwrap();
    assert_matrix_eq!(eigenvalues, Vector3::new(-1.0, 2.0, 3.0), comp = abs, tol = 1e-12);
    assert_mandel_approx_eq!(projection * a, expected, abstol = 1e-10);

    // Repeated eigenvalues take the limiting coefficient
    let a = SymmetricRank2::new(2.0, -1.0, 2.0, 0.0, 0.0, 0.0).rotate(&rotation);
    let expected = SymmetricRank2::new(2.0, 0.0, 2.0, 0.0, 0.0, 0.0).rotate(&rotation);
    let (projection, _, _) = a.positive_projection_eigen_decomposition().unwrap();
    assert!(projection.mandel().iter().all(|x| x.is_finite()));
    assert_mandel_approx_eq!(projection * a, expected, abstol = 1e-10);
}

#[test]
fn random_tensors_are_reproducible() {
    let mut rng1 = ChaCha8Rng::seed_from_u64(42);
    let mut rng2 = ChaCha8Rng::seed_from_u64(42);
    let a = SymmetricRank2::<f64>::random(&mut rng1, 2.0, 10.0);
    let b = SymmetricRank2::<f64>::random(&mut rng2, 2.0, 10.0);
    assert_eq!(a, b);

    for i in 0..3 {
        for j in 0..3 {
            let x = a.component(i, j);
            assert!(x >= 9.0 && x < 11.0, "component ({}, {}) = {} out of range", i, j, x);
        }
    }
}

#[test]
fn mixed_precision_arithmetic_promotes_to_f64() {
    let a = SymmetricRank2::<f32>::new(1.0, 2.0, 3.0, 0.5, 0.25, 0.125);
    let b = SymmetricRank2::<f64>::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
    let sum: SymmetricRank2<f64> = a + b;
    let expected = SymmetricRank2::<f64>::new(2.0, 3.0, 4.0, 1.5, 1.25, 1.125);
    assert_mandel_approx_eq!(sum, expected, abstol = 1e-6);

    let difference: SymmetricRank2<f64> = b - a;
    assert_mandel_approx_eq!(difference, b - a.cast::<f64>(), abstol = 1e-12);
}

proptest! {
    #[test]
    fn mandel_packing_round_trips_through_full_tensor(
        values in prop::array::uniform6(-100.0..100.0f64)
    ) {
        let [s11, s22, s33, s23, s13, s12] = values;
        let a = SymmetricRank2::new(s11, s22, s33, s23, s13, s12);
        let full = a.to_full();
        prop_assert!(full == full.transpose());

        let recovered = [full[(0, 0)], full[(1, 1)], full[(2, 2)], full[(1, 2)], full[(0, 2)], full[(0, 1)]];
        for (x, y) in recovered.iter().zip(&values) {
            assert_scalar_eq!(*x, *y, comp = abs, tol = 1e-12);
        }
        assert_mandel_approx_eq!(SymmetricRank2::from_full(&full), a, abstol = 1e-12);
    }

    #[test]
    fn double_contraction_matches_full_contraction(a in symmetric_rank2(), b in symmetric_rank2()) {
        let full = a.to_full().component_mul(&b.to_full()).sum();
        assert_scalar_eq!(a.double_contraction(&b), full, comp = abs, tol = 1e-9);
        assert_scalar_eq!(a.l2_norm(), a.to_full().norm(), comp = abs, tol = 1e-9);
    }

    #[test]
    fn deviatoric_part_is_traceless(a in symmetric_rank2()) {
        let s = a.deviatoric();
        assert_scalar_eq!(s.trace(), 0.0, comp = abs, tol = 1e-12);
        assert_mandel_approx_eq!(s + SymmetricRank2::identity() * (a.trace() / 3.0), a, abstol = 1e-12);
    }

    #[test]
    fn rotation_preserves_invariants(a in symmetric_rank2(), angle in -3.0..3.0f64) {
        let rotation = rotation_about(Vector3::new(1.0, 2.0, 3.0), angle);
        let rotated = a.rotate(&rotation);
        assert_scalar_eq!(rotated.trace(), a.trace(), comp = abs, tol = 1e-9);
        assert_scalar_eq!(rotated.second_invariant(), a.second_invariant(), comp = abs, tol = 1e-8);
        assert_mandel_approx_eq!(rotated.rotate(&rotation.transpose()), a, abstol = 1e-10);
    }

    #[test]
    fn self_outer_product_is_rank_one(v in prop::array::uniform3(-5.0..5.0f64)) {
        let v = Vector3::from(v);
        let a = SymmetricRank2::self_outer_product(&v);
        assert_matrix_eq!(a.to_full(), v * v.transpose(), comp = abs, tol = 1e-12);
        assert_scalar_eq!(a.det(), 0.0, comp = abs, tol = 1e-8);
    }
}
