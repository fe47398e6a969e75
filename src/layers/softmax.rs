//! Softmax along one axis.
//!
//! The blob is viewed as `[outer_num, channels, inner_num]`; normalization runs
//! over `channels` independently for every `(outer, inner)` position. The
//! per-position maximum is subtracted before exponentiation so large inputs do
//! not overflow.

use crate::blob::Blob;
use crate::config::SoftmaxParameter;
use crate::dtype::{DataType, MathType};
use crate::error::{Error, Transpose};
use crate::layer::{wants_bottom_diff, Layer, LayerParams};
use crate::ops::{self, gemm, gemv};
use std::marker::PhantomData;

pub struct SoftmaxLayer<D: DataType, M: MathType> {
    param: SoftmaxParameter,
    params: LayerParams<D>,
    /// Per-position scratch: running max in forward, sums and dots after.
    scale: Blob<D>,
    /// Ones of length `channels`.
    sum_multiplier: Blob<D>,
    softmax_axis: usize,
    outer_num: usize,
    inner_num: usize,
    channels: usize,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType> SoftmaxLayer<D, M> {
    pub fn new(param: SoftmaxParameter) -> Self {
        Self {
            param,
            params: LayerParams::new(),
            scale: Blob::empty(),
            sum_multiplier: Blob::empty(),
            softmax_axis: 0,
            outer_num: 0,
            inner_num: 0,
            channels: 0,
            _math: PhantomData,
        }
    }

    pub fn softmax_axis(&self) -> usize {
        self.softmax_axis
    }

    pub fn outer_num(&self) -> usize {
        self.outer_num
    }

    pub fn inner_num(&self) -> usize {
        self.inner_num
    }
}

impl<D: DataType, M: MathType> Layer<D, M> for SoftmaxLayer<D, M> {
    fn type_name(&self) -> &'static str {
        "Softmax"
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
        let axis = bottom[0].canonical_axis_index(self.param.axis)?;
        top[0].reshape_like(bottom[0])?;

        self.softmax_axis = axis;
        self.channels = bottom[0].shape()[axis];
        self.outer_num = bottom[0].count_range(0, axis)?;
        self.inner_num = bottom[0].count_from(axis + 1)?;

        self.sum_multiplier.reshape(&[self.channels])?;
        ops::set::<D, M>(M::one(), &mut self.sum_multiplier.mutable_cpu_data());

        let mut scale_shape = bottom[0].shape().to_vec();
        scale_shape[axis] = 1;
        self.scale.reshape(&scale_shape)?;
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        let channels = self.channels;
        let inner = self.inner_num;
        let dim = channels * inner;

        let bottom_data = bottom[0].cpu_data();
        let mut top_data = top[0].mutable_cpu_data();
        let multiplier = self.sum_multiplier.cpu_data();
        ops::copy(&bottom_data, &mut top_data)?;
        if channels == 0 || self.outer_num == 0 {
            return Ok(());
        }
        let mut scale_buf = self.scale.mutable_cpu_data();
        let scale = &mut scale_buf[..inner];

        for i in 0..self.outer_num {
            let group = i * dim..(i + 1) * dim;
            let input = &bottom_data[group.clone()];

            scale.copy_from_slice(&input[..inner]);
            for j in 1..channels {
                for (s, &v) in scale.iter_mut().zip(&input[j * inner..(j + 1) * inner]) {
                    if v > *s {
                        *s = v;
                    }
                }
            }

            let out = &mut top_data[group];
            // out[j, k] -= max[k]
            gemm::<D, M>(
                Transpose::NoTrans,
                Transpose::NoTrans,
                channels,
                inner,
                1,
                -M::one(),
                &multiplier,
                scale,
                M::one(),
                out,
            )?;
            ops::exp_inplace::<D, M>(out);
            gemv::<D, M>(
                Transpose::Trans,
                channels,
                inner,
                M::one(),
                out,
                &multiplier,
                M::zero(),
                scale,
            )?;
            for j in 0..channels {
                ops::div_assign::<D, M>(scale, &mut out[j * inner..(j + 1) * inner])?;
            }
        }
        Ok(())
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
        let channels = self.channels;
        let inner = self.inner_num;
        let dim = channels * inner;

        let top_data = top[0].cpu_data();
        let top_diff = top[0].cpu_diff();
        let mut bottom_diff = bottom[0].mutable_cpu_diff();
        let multiplier = self.sum_multiplier.cpu_data();
        ops::copy(&top_diff, &mut bottom_diff)?;
        if channels == 0 || self.outer_num == 0 {
            return Ok(());
        }
        let mut scale_buf = self.scale.mutable_cpu_data();
        let scale = &mut scale_buf[..inner];

        for i in 0..self.outer_num {
            let base = i * dim;
            for (k, s) in scale.iter_mut().enumerate() {
                *s = D::from_math(ops::strided_dot::<D, M>(
                    channels,
                    &bottom_diff[base + k..],
                    inner,
                    &top_data[base + k..],
                    inner,
                )?);
            }
            gemm::<D, M>(
                Transpose::NoTrans,
                Transpose::NoTrans,
                channels,
                inner,
                1,
                -M::one(),
                &multiplier,
                scale,
                M::one(),
                &mut bottom_diff[base..base + dim],
            )?;
        }
        ops::mul_assign::<D, M>(&top_data, &mut bottom_diff)?;
        Ok(())
    }
}
