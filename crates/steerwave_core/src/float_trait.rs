//! Float trait abstraction for f32/f64 support.
//!
//! Every grid, filter and tensor in this crate is generic over `WaveletFloat`,
//! so the whole transform engine runs in either single or double precision.

use num_traits::{Float, FromPrimitive, NumAssign};
use rustfft::FftNum;
use std::fmt::Debug;
use std::iter::Sum;

/// Trait alias for floating point types supported by the transform engine.
///
/// Combines the bounds needed by the pipeline:
/// - Basic float operations (Float, NumAssign)
/// - FFT compatibility (FftNum from rustfft)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Debug printing
pub trait WaveletFloat:
    Float + FftNum + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static
{
    /// Relative gap below which two eigenvalues are treated as tied.
    const EIGEN_TIE_TOLERANCE: Self;

    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Widen to f64 for kernel evaluation.
    fn as_f64(self) -> f64;
}

impl WaveletFloat for f32 {
    const EIGEN_TIE_TOLERANCE: Self = 1e-5;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl WaveletFloat for f64 {
    const EIGEN_TIE_TOLERANCE: Self = 1e-10;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
