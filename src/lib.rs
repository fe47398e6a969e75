//! A computation-layer engine for feed-forward / back-propagation graphs.
//!
//! Each layer consumes bottom blobs, produces top blobs and propagates
//! gradients back to its inputs and learnable parameters. This crate provides:
//! - [`Blob`], a shaped buffer with forward values (`data`) and gradients (`diff`)
//! - the [`Layer`] contract (setup, reshape, forward, backward)
//! - InnerProduct, Softmax, Log, Split, ReLU, Sigmoid and TanH layers
//! - an accelerator device interface with a host reference device
//! - numeric kernels generic over storage precision (`f32`, `f64`, `f16`,
//!   `bf16`) and compute precision (`f32`, `f64`)
//!
//! # Features
//! - `serialization` - serde support for layer configuration (JSON)
//! - `cpu_openblas` - OpenBLAS-backed matrix multiply
//! - `debug_logs` - verbose setup logging through [`debug_println!`]
//!
//! # Example
//! ```rust
//! use rust_layer_lib::config::{FillerParameter, InnerProductParameter};
//! use rust_layer_lib::layers::InnerProductLayer;
//! use rust_layer_lib::{Blob, Layer};
//!
//! fn main() -> Result<(), rust_layer_lib::Error> {
//!     let bottom = Blob::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])?;
//!     let mut top = Blob::<f32>::empty();
//!
//!     let mut fc = InnerProductLayer::<f32, f32>::new(InnerProductParameter {
//!         num_output: 2,
//!         weight_filler: FillerParameter::Constant { value: 1.0 },
//!         ..Default::default()
//!     });
//!     fc.setup(&[&bottom], &mut [&mut top])?;
//!     fc.forward(&[&bottom], &mut [&mut top])?;
//!
//!     assert_eq!(top.shape(), &[2, 2]);
//!     assert_eq!(top.data_vec(), vec![6.0, 6.0, 15.0, 15.0]);
//!     Ok(())
//! }
//! ```

// --- Central debug_println macro definition ---
/// Conditional logging macro. Prints if 'debug_logs' feature is enabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        ::std::println!("[DEBUG {}] {}", module_path!(), ::std::format_args!($($arg)*))
    };
}

/// Conditional logging macro (disabled version). Arguments are still
/// type-checked but nothing is printed.
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        if false {
            ::std::println!($($arg)*)
        }
    };
}

pub mod backend;
pub mod blob;
pub mod config;
pub mod dtype;
pub mod error;
pub mod filler;
pub mod layer;
pub mod layers;
pub mod ops;
pub mod registry;
pub mod util;

// Gradient checking helpers, used by the integration tests.
pub mod test_utils;

pub use backend::{AcceleratorDevice, DescriptorApi, HostDevice};
pub use blob::Blob;
pub use dtype::{DataType, MathType};
pub use error::{Error, Transpose};
pub use filler::{create_filler, Filler};
pub use layer::{Layer, LayerParams};
pub use ops::ActivationMode;
pub use registry::LayerRegistry;

pub use half::{bf16, f16};
