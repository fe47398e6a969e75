//! Accelerator device interface.
//!
//! An accelerator describes tensors through opaque 4-D descriptors
//! (`num, channels, height, width`). Layers acquire descriptors during setup,
//! resize them on reshape and release them when dropped.

use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::ops::ActivationMode;

pub mod host;

pub use host::{HostDescriptor, HostDevice};

/// Descriptor lifecycle.
pub trait DescriptorApi {
    type Descriptor;

    fn create_descriptor(&self) -> Result<Self::Descriptor, Error>;

    fn set_descriptor_shape(
        &self,
        desc: &mut Self::Descriptor,
        n: usize,
        c: usize,
        h: usize,
        w: usize,
    ) -> Result<(), Error>;

    /// Release a descriptor. Consumes the handle so it cannot be released twice.
    fn destroy_descriptor(&self, desc: Self::Descriptor);
}

/// Activation entry points of an accelerator.
pub trait AcceleratorDevice: DescriptorApi {
    /// `y = f(x)`
    fn activation_forward<D: DataType, M: MathType>(
        &self,
        mode: ActivationMode,
        x_desc: &Self::Descriptor,
        x: &[D],
        y_desc: &Self::Descriptor,
        y: &mut [D],
    ) -> Result<(), Error>;

    /// `dx = f'(x) * dy`
    #[allow(clippy::too_many_arguments)]
    fn activation_backward<D: DataType, M: MathType>(
        &self,
        mode: ActivationMode,
        y_desc: &Self::Descriptor,
        y: &[D],
        dy: &[D],
        x_desc: &Self::Descriptor,
        x: &[D],
        dx: &mut [D],
    ) -> Result<(), Error>;
}
