use super::{AcceleratorDevice, DescriptorApi};
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::ops::{activation, ActivationMode};
use std::cell::Cell;
use std::rc::Rc;

/// Host-side stand-in for an accelerator.
///
/// Evaluates activations with the portable kernels but enforces the descriptor
/// protocol: every buffer must match the shape its descriptor was set to.
/// Clones share the live-descriptor counter, so a test can keep a clone and
/// observe what a layer acquired and released.
#[derive(Debug, Clone, Default)]
pub struct HostDevice {
    live: Rc<Cell<usize>>,
    created: Rc<Cell<usize>>,
    fail_after: Option<usize>,
}

#[derive(Debug)]
pub struct HostDescriptor {
    id: usize,
    dims: Option<[usize; 4]>,
}

impl HostDescriptor {
    pub fn id(&self) -> usize {
        self.id
    }

    /// `(n, c, h, w)` once set.
    pub fn dims(&self) -> Option<[usize; 4]> {
        self.dims
    }

    fn check(&self, what: &str, len: usize) -> Result<(), Error> {
        let dims = self.dims.ok_or_else(|| {
            Error::DeviceError(format!("descriptor {} used before its shape was set", self.id))
        })?;
        let expected: usize = dims.iter().product();
        if expected != len {
            return Err(Error::DeviceError(format!(
                "{} has {} elements but descriptor {} describes {:?}",
                what, len, self.id, dims
            )));
        }
        Ok(())
    }
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose descriptor creation fails once `n` descriptors have been
    /// created.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Descriptors created and not yet destroyed.
    pub fn live_descriptors(&self) -> usize {
        self.live.get()
    }
}

impl DescriptorApi for HostDevice {
    type Descriptor = HostDescriptor;

    fn create_descriptor(&self) -> Result<HostDescriptor, Error> {
        let id = self.created.get();
        if self.fail_after.is_some_and(|limit| id >= limit) {
            return Err(Error::DeviceError(format!(
                "descriptor allocation failed after {} descriptors",
                id
            )));
        }
        self.created.set(id + 1);
        self.live.set(self.live.get() + 1);
        debug_println!("created descriptor {}", id);
        Ok(HostDescriptor { id, dims: None })
    }

    fn set_descriptor_shape(
        &self,
        desc: &mut HostDescriptor,
        n: usize,
        c: usize,
        h: usize,
        w: usize,
    ) -> Result<(), Error> {
        desc.dims = Some([n, c, h, w]);
        Ok(())
    }

    fn destroy_descriptor(&self, desc: HostDescriptor) {
        debug_println!("destroyed descriptor {}", desc.id);
        self.live.set(self.live.get().saturating_sub(1));
    }
}

impl AcceleratorDevice for HostDevice {
    fn activation_forward<D: DataType, M: MathType>(
        &self,
        mode: ActivationMode,
        x_desc: &HostDescriptor,
        x: &[D],
        y_desc: &HostDescriptor,
        y: &mut [D],
    ) -> Result<(), Error> {
        x_desc.check("x", x.len())?;
        y_desc.check("y", y.len())?;
        activation::forward::<D, M>(mode, x, y)
    }

    fn activation_backward<D: DataType, M: MathType>(
        &self,
        mode: ActivationMode,
        y_desc: &HostDescriptor,
        y: &[D],
        dy: &[D],
        x_desc: &HostDescriptor,
        x: &[D],
        dx: &mut [D],
    ) -> Result<(), Error> {
        y_desc.check("y", y.len())?;
        y_desc.check("dy", dy.len())?;
        x_desc.check("x", x.len())?;
        x_desc.check("dx", dx.len())?;
        activation::backward::<D, M>(mode, x, y, dy, dx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_accounting() {
        let device = HostDevice::new();
        let observer = device.clone();
        let a = device.create_descriptor().unwrap();
        let b = device.create_descriptor().unwrap();
        assert_eq!(observer.live_descriptors(), 2);
        device.destroy_descriptor(b);
        device.destroy_descriptor(a);
        assert_eq!(observer.live_descriptors(), 0);
    }

    #[test]
    fn test_unset_descriptor_rejected() {
        let device = HostDevice::new();
        let desc = device.create_descriptor().unwrap();
        let mut y = [0.0f32; 2];
        let err = device
            .activation_forward::<f32, f32>(ActivationMode::Tanh, &desc, &[1.0, 2.0], &desc, &mut y)
            .unwrap_err();
        assert!(matches!(err, Error::DeviceError(_)));
        device.destroy_descriptor(desc);
    }

    #[test]
    fn test_failing_device() {
        let device = HostDevice::failing_after(1);
        let first = device.create_descriptor().unwrap();
        assert!(device.create_descriptor().is_err());
        assert_eq!(device.live_descriptors(), 1);
        device.destroy_descriptor(first);
    }
}
