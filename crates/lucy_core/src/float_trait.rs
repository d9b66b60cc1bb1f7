//! Float trait abstraction for f32/f64 support.
//!
//! The deconvolution engine runs in double precision by default, but every
//! primitive is generic so single-precision buffers can be processed without
//! conversion.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Trait alias for floating point sample types.
///
/// This trait combines all the bounds needed for deconvolution:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Thread-safety for rayon workers (Send, Sync)
pub trait LucyFloat:
    Float + FromPrimitive + NumAssign + Sum + Debug + Display + Send + Sync + 'static
{
    /// Gaussian window half-width in units of sigma (window = 8 sigma + 1).
    const GAUSSIAN_TRUNCATE: Self;

    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Create a value from an isize constant.
    fn isize_as(val: isize) -> Self;
}

impl LucyFloat for f32 {
    const GAUSSIAN_TRUNCATE: Self = 4.0;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn isize_as(val: isize) -> Self {
        val as f32
    }
}

impl LucyFloat for f64 {
    const GAUSSIAN_TRUNCATE: Self = 4.0;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn isize_as(val: isize) -> Self {
        val as f64
    }
}
