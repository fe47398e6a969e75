//! Storage and compute precision.
//!
//! Every blob stores values of a [`DataType`], and every kernel and layer
//! accumulates in a [`MathType`]. The two are independent type parameters so a
//! layer can, for example, keep `f16` values in memory while summing in `f32`.

use half::{bf16, f16};
use std::fmt::Debug;

/// A type values can be stored as inside a blob.
pub trait DataType: Copy + Debug + Default + PartialOrd + Send + Sync + 'static {
    /// Short name used in debug output.
    const NAME: &'static str;

    fn as_f64(self) -> f64;

    fn from_f64(v: f64) -> Self;

    /// Convert a stored value to the compute precision.
    #[inline]
    fn to_math<M: MathType>(self) -> M {
        M::from_f64(self.as_f64())
    }

    /// Round a compute-precision value back to storage.
    #[inline]
    fn from_math<M: MathType>(v: M) -> Self {
        Self::from_f64(v.as_f64())
    }
}

/// A precision used for intermediate accumulation.
pub trait MathType: DataType + num_traits::Float + ndarray::LinalgScalar {}

impl DataType for f32 {
    const NAME: &'static str = "f32";
    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl DataType for f64 {
    const NAME: &'static str = "f64";
    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

impl DataType for f16 {
    const NAME: &'static str = "f16";
    #[inline]
    fn as_f64(self) -> f64 {
        f16::to_f64(self)
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
}

impl DataType for bf16 {
    const NAME: &'static str = "bf16";
    #[inline]
    fn as_f64(self) -> f64 {
        bf16::to_f64(self)
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }
}

impl MathType for f32 {}
impl MathType for f64 {}
