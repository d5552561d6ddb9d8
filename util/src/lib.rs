use nalgebra::{Matrix3, Unit, Vector3};

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Approx assertion for anything exposing its packed Mandel components through `mandel()`.
#[macro_export]
macro_rules! assert_mandel_approx_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        $crate::assert_approx_matrix_eq!($x.mandel().clone_owned(), $y.mandel().clone_owned(), abstol = $tol)
    }};
}

/// Rotation matrix for a rotation of `angle` radians about `axis`.
pub fn rotation_about(axis: Vector3<f64>, angle: f64) -> Matrix3<f64> {
    nalgebra::Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle).into_inner()
}
