//! Element-wise activation layers computed with the portable kernels.

use crate::blob::Blob;
use crate::config::ReluParameter;
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::layer::{wants_bottom_diff, Layer, LayerParams};
use crate::ops::activation;
use std::marker::PhantomData;

/// Shared plumbing: one bottom, one top of the same shape, no parameters.
macro_rules! neuron_layer_common {
    ($name:literal) => {
        fn type_name(&self) -> &'static str {
            $name
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

        fn reshape(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
            top[0].reshape_like(bottom[0])
        }
    };
}

/// Rectified linear unit, leaky when `negative_slope` is non-zero.
pub struct ReLULayer<D: DataType, M: MathType> {
    params: LayerParams<D>,
    negative_slope: f64,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType> ReLULayer<D, M> {
    pub fn new(param: ReluParameter) -> Self {
        Self {
            params: LayerParams::new(),
            negative_slope: param.negative_slope,
            _math: PhantomData,
        }
    }
}

impl<D: DataType, M: MathType> Layer<D, M> for ReLULayer<D, M> {
    neuron_layer_common!("ReLU");

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        activation::relu_forward::<D, M>(
            &bottom[0].cpu_data(),
            &mut top[0].mutable_cpu_data(),
            M::from_f64(self.negative_slope),
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
        let (x, mut dx) = bottom[0].data_and_mutable_diff();
        activation::relu_backward::<D, M>(
            &x,
            &top[0].cpu_diff(),
            &mut dx,
            M::from_f64(self.negative_slope),
        )
    }
}

pub struct SigmoidLayer<D: DataType, M: MathType> {
    params: LayerParams<D>,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType> SigmoidLayer<D, M> {
    pub fn new() -> Self {
        Self {
            params: LayerParams::new(),
            _math: PhantomData,
        }
    }
}

impl<D: DataType, M: MathType> Default for SigmoidLayer<D, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataType, M: MathType> Layer<D, M> for SigmoidLayer<D, M> {
    neuron_layer_common!("Sigmoid");

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        activation::sigmoid_forward::<D, M>(&bottom[0].cpu_data(), &mut top[0].mutable_cpu_data())
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
        activation::sigmoid_backward::<D, M>(
            &top[0].cpu_data(),
            &top[0].cpu_diff(),
            &mut bottom[0].mutable_cpu_diff(),
        )
    }
}

pub struct TanHLayer<D: DataType, M: MathType> {
    params: LayerParams<D>,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType> TanHLayer<D, M> {
    pub fn new() -> Self {
        Self {
            params: LayerParams::new(),
            _math: PhantomData,
        }
    }
}

impl<D: DataType, M: MathType> Default for TanHLayer<D, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataType, M: MathType> Layer<D, M> for TanHLayer<D, M> {
    neuron_layer_common!("TanH");

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        activation::tanh_forward::<D, M>(&bottom[0].cpu_data(), &mut top[0].mutable_cpu_data())
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
        activation::tanh_backward::<D, M>(
            &top[0].cpu_data(),
            &top[0].cpu_diff(),
            &mut bottom[0].mutable_cpu_diff(),
        )
    }
}
