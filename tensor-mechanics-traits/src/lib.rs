use nalgebra::RealField;

pub use nalgebra;

/// The scalar type used by all tensor routines.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Plain scalars whose comparisons form a total order on their values.
///
/// Scalars that carry derivative information compare only their values and therefore lose
/// information under ordering-based algorithms such as eigendecompositions or sign logic.
/// Routines that rely on such algorithms are only available for types implementing this trait.
pub trait OrderedReal: Real {}

impl OrderedReal for f32 {}
impl OrderedReal for f64 {}
