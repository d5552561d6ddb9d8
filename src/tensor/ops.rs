//! Arithmetic operators for the symmetric tensor types.
//!
//! Operations between tensors of the same scalar type are implemented generically. Operations
//! between `f32` and `f64` tensors promote to `f64`.
use super::{SymmetricRank2, SymmetricRank4};
use crate::Real;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

macro_rules! impl_elementwise_ops {
    ($tensor:ident) => {
        impl<T: Real> Add for $tensor<T> {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self { vals: self.vals + rhs.vals }
            }
        }

        impl<T: Real> Sub for $tensor<T> {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self { vals: self.vals - rhs.vals }
            }
        }

        impl<T: Real> AddAssign for $tensor<T> {
            fn add_assign(&mut self, rhs: Self) {
                self.vals += rhs.vals;
            }
        }

        impl<T: Real> SubAssign for $tensor<T> {
            fn sub_assign(&mut self, rhs: Self) {
                self.vals -= rhs.vals;
            }
        }

        impl<T: Real> Neg for $tensor<T> {
            type Output = Self;

            fn neg(self) -> Self {
                Self { vals: -self.vals }
            }
        }

        impl<T: Real> Mul<T> for $tensor<T> {
            type Output = Self;

            fn mul(self, rhs: T) -> Self {
                Self { vals: self.vals * rhs }
            }
        }

        impl<T: Real> Div<T> for $tensor<T> {
            type Output = Self;

            fn div(self, rhs: T) -> Self {
                Self { vals: self.vals / rhs }
            }
        }

        impl<T: Real> MulAssign<T> for $tensor<T> {
            fn mul_assign(&mut self, rhs: T) {
                self.vals *= rhs;
            }
        }

        impl<T: Real> DivAssign<T> for $tensor<T> {
            fn div_assign(&mut self, rhs: T) {
                self.vals /= rhs;
            }
        }

        impl<T: Real> Sum for $tensor<T> {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::zeros(), |acc, x| acc + x)
            }
        }

        impl Mul<$tensor<f64>> for f64 {
            type Output = $tensor<f64>;

            fn mul(self, rhs: $tensor<f64>) -> $tensor<f64> {
                rhs * self
            }
        }

        impl Mul<$tensor<f32>> for f32 {
            type Output = $tensor<f32>;

            fn mul(self, rhs: $tensor<f32>) -> $tensor<f32> {
                rhs * self
            }
        }
    };
}

impl_elementwise_ops!(SymmetricRank2);
impl_elementwise_ops!(SymmetricRank4);

/// The product $C_{ijmn} D_{mnkl}$.
impl<T: Real> Mul for SymmetricRank4<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self { vals: self.vals * rhs.vals }
    }
}

/// The contraction $C_{ijkl} A_{kl}$.
impl<T: Real> Mul<SymmetricRank2<T>> for SymmetricRank4<T> {
    type Output = SymmetricRank2<T>;

    fn mul(self, rhs: SymmetricRank2<T>) -> SymmetricRank2<T> {
        self.contract(&rhs)
    }
}

macro_rules! impl_promoting_ops {
    ($lhs:ty, $rhs:ty => $out:ty) => {
        impl Add<SymmetricRank2<$rhs>> for SymmetricRank2<$lhs> {
            type Output = SymmetricRank2<$out>;

            fn add(self, rhs: SymmetricRank2<$rhs>) -> Self::Output {
                self.cast::<$out>() + rhs.cast::<$out>()
            }
        }

        impl Sub<SymmetricRank2<$rhs>> for SymmetricRank2<$lhs> {
            type Output = SymmetricRank2<$out>;

            fn sub(self, rhs: SymmetricRank2<$rhs>) -> Self::Output {
                self.cast::<$out>() - rhs.cast::<$out>()
            }
        }

        impl Add<SymmetricRank4<$rhs>> for SymmetricRank4<$lhs> {
            type Output = SymmetricRank4<$out>;

            fn add(self, rhs: SymmetricRank4<$rhs>) -> Self::Output {
                self.cast::<$out>() + rhs.cast::<$out>()
            }
        }

        impl Sub<SymmetricRank4<$rhs>> for SymmetricRank4<$lhs> {
            type Output = SymmetricRank4<$out>;

            fn sub(self, rhs: SymmetricRank4<$rhs>) -> Self::Output {
                self.cast::<$out>() - rhs.cast::<$out>()
            }
        }

        impl Mul<SymmetricRank4<$rhs>> for SymmetricRank4<$lhs> {
            type Output = SymmetricRank4<$out>;

            fn mul(self, rhs: SymmetricRank4<$rhs>) -> Self::Output {
                self.cast::<$out>() * rhs.cast::<$out>()
            }
        }

        impl Mul<SymmetricRank2<$rhs>> for SymmetricRank4<$lhs> {
            type Output = SymmetricRank2<$out>;

            fn mul(self, rhs: SymmetricRank2<$rhs>) -> Self::Output {
                self.cast::<$out>() * rhs.cast::<$out>()
            }
        }
    };
}

impl_promoting_ops!(f32, f64 => f64);
impl_promoting_ops!(f64, f32 => f64);
