//! Small-tensor algebra and multi-model stress updates for solid mechanics.
pub mod batch;
pub mod damage;
pub mod stress_update;
pub mod tensor;
pub mod util;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use tensor_mechanics_traits::{OrderedReal, Real};
