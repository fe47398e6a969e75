//! Numeric kernel library.
//!
//! All kernels are generic over a storage type `D` and a compute type `M`,
//! work on flat host slices, and complete before returning.

pub mod activation;
pub mod cpu_blas;
pub mod cpu_ops;

pub use activation::ActivationMode;
pub use cpu_blas::{gemm, gemv};
pub use cpu_ops::*;
