//! Activation layers executed on an [`AcceleratorDevice`].
//!
//! Numerically equivalent to the portable ReLU/Sigmoid/TanH layers (ReLU with
//! zero slope). The layer owns two descriptors, one for the bottom and one for
//! the top, created in setup, resized on every reshape and destroyed on drop.

use crate::backend::AcceleratorDevice;
use crate::blob::Blob;
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::layer::{wants_bottom_diff, Layer, LayerParams};
use crate::ops::ActivationMode;
use std::marker::PhantomData;

pub struct AcceleratedActivationLayer<D: DataType, M: MathType, Dev: AcceleratorDevice> {
    mode: ActivationMode,
    device: Dev,
    params: LayerParams<D>,
    bottom_desc: Option<Dev::Descriptor>,
    top_desc: Option<Dev::Descriptor>,
    handles_setup: bool,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType, Dev: AcceleratorDevice> AcceleratedActivationLayer<D, M, Dev> {
    pub fn new(mode: ActivationMode, device: Dev) -> Self {
        Self {
            mode,
            device,
            params: LayerParams::new(),
            bottom_desc: None,
            top_desc: None,
            handles_setup: false,
            _math: PhantomData,
        }
    }

    pub fn mode(&self) -> ActivationMode {
        self.mode
    }

    /// Whether both descriptors were created.
    pub fn handles_setup(&self) -> bool {
        self.handles_setup
    }

    fn descriptors(&self) -> Result<(&Dev::Descriptor, &Dev::Descriptor), Error> {
        match (&self.bottom_desc, &self.top_desc) {
            (Some(b), Some(t)) if self.handles_setup => Ok((b, t)),
            _ => Err(Error::InvalidOperation(format!(
                "{} accelerated layer used before setup",
                self.mode
            ))),
        }
    }
}

fn dims4<D: DataType>(blob: &Blob<D>) -> Result<(usize, usize, usize, usize), Error> {
    Ok((blob.num()?, blob.channels()?, blob.height()?, blob.width()?))
}

impl<D: DataType, M: MathType, Dev: AcceleratorDevice> Layer<D, M>
    for AcceleratedActivationLayer<D, M, Dev>
{
    fn type_name(&self) -> &'static str {
        match self.mode {
            ActivationMode::Relu => "ReLU",
            ActivationMode::Sigmoid => "Sigmoid",
            ActivationMode::Tanh => "TanH",
        }
    }

    fn params(&self) -> &LayerParams<D> {
        &self.params
    }

    fn params_mut(&mut self) -> &mut LayerParams<D> {
        &mut self.params
    }

    fn exact_num_bottom_blobs(&self) -> Option<usize> {
        Some(1)
    }

    fn exact_num_top_blobs(&self) -> Option<usize> {
        Some(1)
    }

    fn layer_setup(&mut self, _bottom: &[&Blob<D>], _top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        if self.handles_setup {
            return Ok(());
        }
        let bottom_desc = self.device.create_descriptor()?;
        let top_desc = match self.device.create_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                self.device.destroy_descriptor(bottom_desc);
                return Err(e);
            }
        };
        self.bottom_desc = Some(bottom_desc);
        self.top_desc = Some(top_desc);
        self.handles_setup = true;
        debug_println!("{} descriptors created", self.mode);
        Ok(())
    }

    fn reshape(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        top[0].reshape_like(bottom[0])?;
        let (n, c, h, w) = dims4(bottom[0])?;
        if let Some(desc) = self.bottom_desc.as_mut() {
            self.device.set_descriptor_shape(desc, n, c, h, w)?;
        }
        if let Some(desc) = self.top_desc.as_mut() {
            self.device.set_descriptor_shape(desc, n, c, h, w)?;
        }
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        let (bottom_desc, top_desc) = self.descriptors()?;
        self.device.activation_forward::<D, M>(
            self.mode,
            bottom_desc,
            &bottom[0].cpu_data(),
            top_desc,
            &mut top[0].mutable_cpu_data(),
        )
    }

    fn backward(
        &mut self,
        top: &[&Blob<D>],
        propagate_down: &[bool],
        bottom: &mut [&mut Blob<D>],
    ) -> Result<(), Error> {
        if !wants_bottom_diff(propagate_down) {
            return Ok(());
        }
        let (bottom_desc, top_desc) = self.descriptors()?;
        let (x, mut dx) = bottom[0].data_and_mutable_diff();
        self.device.activation_backward::<D, M>(
            self.mode,
            top_desc,
            &top[0].cpu_data(),
            &top[0].cpu_diff(),
            bottom_desc,
            &x,
            &mut dx,
        )
    }
}

impl<D: DataType, M: MathType, Dev: AcceleratorDevice> Drop for AcceleratedActivationLayer<D, M, Dev> {
    fn drop(&mut self) {
        if !self.handles_setup {
            return;
        }
        // Reverse order of acquisition.
        if let Some(desc) = self.top_desc.take() {
            self.device.destroy_descriptor(desc);
        }
        if let Some(desc) = self.bottom_desc.take() {
            self.device.destroy_descriptor(desc);
        }
        self.handles_setup = false;
        debug_println!("{} descriptors destroyed", self.mode);
    }
}
