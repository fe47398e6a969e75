// InnerProduct: fully connected (affine) layer
//
// Bottom dimensions from `axis` onward are flattened into one feature vector
// of length K; the dimensions before `axis` enumerate M independent samples.
//
//   weight: [N, K]   ([K, N] with `transpose`)
//   bias:   [N]
//
//   top[M, N] = bottom[M, K] · weightᵀ + 1_M · bias
//
// Parameter gradients accumulate across backward calls; the bottom gradient
// is overwritten.

use crate::blob::Blob;
use crate::config::InnerProductParameter;
use crate::dtype::{DataType, MathType};
use crate::error::{Error, Transpose};
use crate::filler::create_filler;
use crate::layer::{wants_bottom_diff, Layer, LayerParams};
use crate::ops::{self, gemm, gemv};
use crate::util::shape_string;
use std::marker::PhantomData;

pub struct InnerProductLayer<D: DataType, M: MathType> {
    param: InnerProductParameter,
    params: LayerParams<D>,
    bias_multiplier: Blob<D>,
    m: usize,
    k: usize,
    n: usize,
    axis: usize,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType> InnerProductLayer<D, M> {
    pub fn new(param: InnerProductParameter) -> Self {
        Self::with_params(param, LayerParams::new())
    }

    /// Construct around parameter blobs restored from persisted state.
    /// Setup keeps them as they are.
    pub fn with_params(param: InnerProductParameter, params: LayerParams<D>) -> Self {
        Self {
            param,
            params,
            bias_multiplier: Blob::empty(),
            m: 0,
            k: 0,
            n: 0,
            axis: 0,
            _math: PhantomData,
        }
    }

    /// Samples `M` seen at the last reshape.
    pub fn batch_size(&self) -> usize {
        self.m
    }

    /// Flattened feature count `K`.
    pub fn input_size(&self) -> usize {
        self.k
    }

    pub fn num_output(&self) -> usize {
        self.n
    }

    fn has_bias(&self) -> bool {
        self.param.bias_term
    }

    fn weight_trans(&self) -> Transpose {
        if self.param.transpose {
            Transpose::NoTrans
        } else {
            Transpose::Trans
        }
    }
}

/// Persisted parameters must match the shape setup would allocate.
fn check_param_shape<D: DataType>(blob: &Blob<D>, expected: &[usize]) -> Result<(), Error> {
    if blob.shape() != expected {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            actual: blob.shape().to_vec(),
        });
    }
    Ok(())
}

impl<D: DataType, M: MathType> Layer<D, M> for InnerProductLayer<D, M> {
    fn type_name(&self) -> &'static str {
        "InnerProduct"
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

    fn layer_setup(&mut self, bottom: &[&Blob<D>], _top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        if self.param.num_output == 0 {
            return Err(Error::InvalidParameter(
                "inner product num_output must be positive".to_string(),
            ));
        }
        self.n = self.param.num_output;
        self.axis = bottom[0].canonical_axis_index(self.param.axis)?;
        self.k = bottom[0].count_from(self.axis)?;
        let weight_shape = if self.param.transpose {
            [self.k, self.n]
        } else {
            [self.n, self.k]
        };

        if !self.params.blobs.is_empty() {
            debug_println!("Skipping parameter initialization");
            let expected_blobs = if self.has_bias() { 2 } else { 1 };
            if self.params.blobs.len() != expected_blobs {
                return Err(Error::BlobCountMismatch {
                    layer: "InnerProduct",
                    kind: "parameter",
                    expected: expected_blobs.to_string(),
                    actual: self.params.blobs.len(),
                });
            }
            check_param_shape(&self.params.blobs[0], &weight_shape)?;
            if self.has_bias() {
                check_param_shape(&self.params.blobs[1], &[self.n])?;
            }
        } else {
            let mut weight = Blob::new(&weight_shape)?;
            create_filler::<D>(&self.param.weight_filler).fill(&mut weight)?;
            self.params.blobs.push(weight);

            if self.has_bias() {
                let mut bias = Blob::new(&[self.n])?;
                create_filler::<D>(&self.param.bias_filler).fill(&mut bias)?;
                self.params.blobs.push(bias);
            }
        }
        self.params.sync_propagate_down();
        Ok(())
    }

    fn reshape(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        let axis = bottom[0].canonical_axis_index(self.param.axis)?;
        let new_k = bottom[0].count_from(axis)?;
        if new_k != self.k {
            return Err(Error::IncompatibleFeatureCount {
                expected: self.k,
                actual: new_k,
            });
        }
        self.axis = axis;
        self.m = bottom[0].count_range(0, axis)?;

        let mut top_shape = bottom[0].shape()[..axis].to_vec();
        top_shape.push(self.n);
        top[0].reshape(&top_shape)?;
        debug_println!("InnerProduct top shape: {}", shape_string(&top_shape));

        if self.has_bias() {
            self.bias_multiplier.reshape(&[self.m])?;
            ops::set::<D, M>(M::one(), &mut self.bias_multiplier.mutable_cpu_data());
        }
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        let (m, n, k) = (self.m, self.n, self.k);
        let trans_w = self.weight_trans();
        let bottom_data = bottom[0].cpu_data();
        let mut top_data = top[0].mutable_cpu_data();
        let weight = self.params.blobs[0].cpu_data();
        gemm::<D, M>(
            Transpose::NoTrans,
            trans_w,
            m,
            n,
            k,
            M::one(),
            &bottom_data,
            &weight,
            M::zero(),
            &mut top_data,
        )?;
        if self.has_bias() {
            let bias = self.params.blobs[1].cpu_data();
            gemm::<D, M>(
                Transpose::NoTrans,
                Transpose::NoTrans,
                m,
                n,
                1,
                M::one(),
                &self.bias_multiplier.cpu_data(),
                &bias,
                M::one(),
                &mut top_data,
            )?;
        }
        Ok(())
    }

    fn backward(
        &mut self,
        top: &[&Blob<D>],
        propagate_down: &[bool],
        bottom: &mut [&mut Blob<D>],
    ) -> Result<(), Error> {
        let (m, n, k) = (self.m, self.n, self.k);
        let top_diff = top[0].cpu_diff();

        if self.params.propagate_down.first().copied().unwrap_or(false) {
            let bottom_data = bottom[0].cpu_data();
            let mut weight_diff = self.params.blobs[0].mutable_cpu_diff();
            if self.param.transpose {
                // [K, N] += bottomᵀ · top_diff
                gemm::<D, M>(
                    Transpose::Trans,
                    Transpose::NoTrans,
                    k,
                    n,
                    m,
                    M::one(),
                    &bottom_data,
                    &top_diff,
                    M::one(),
                    &mut weight_diff,
                )?;
            } else {
                // [N, K] += top_diffᵀ · bottom
                gemm::<D, M>(
                    Transpose::Trans,
                    Transpose::NoTrans,
                    n,
                    k,
                    m,
                    M::one(),
                    &top_diff,
                    &bottom_data,
                    M::one(),
                    &mut weight_diff,
                )?;
            }
        }

        if self.has_bias() && self.params.propagate_down.get(1).copied().unwrap_or(false) {
            let multiplier = self.bias_multiplier.cpu_data();
            let mut bias_diff = self.params.blobs[1].mutable_cpu_diff();
            gemv::<D, M>(
                Transpose::Trans,
                m,
                n,
                M::one(),
                &top_diff,
                &multiplier,
                M::one(),
                &mut bias_diff,
            )?;
        }

        if wants_bottom_diff(propagate_down) {
            let weight = self.params.blobs[0].cpu_data();
            let trans_w = if self.param.transpose {
                Transpose::Trans
            } else {
                Transpose::NoTrans
            };
            gemm::<D, M>(
                Transpose::NoTrans,
                trans_w,
                m,
                k,
                n,
                M::one(),
                &top_diff,
                &weight,
                M::zero(),
                &mut bottom[0].mutable_cpu_diff(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FillerParameter;

    fn param(num_output: usize) -> InnerProductParameter {
        InnerProductParameter {
            num_output,
            weight_filler: FillerParameter::Constant { value: 1.0 },
            bias_filler: FillerParameter::Constant { value: 0.5 },
            ..Default::default()
        }
    }

    #[test]
    fn test_setup_allocates_weight_and_bias() {
        let bottom = Blob::<f32>::new(&[2, 3, 4]).unwrap();
        let mut top = Blob::<f32>::empty();
        let mut layer = InnerProductLayer::<f32, f32>::new(param(5));
        layer.setup(&[&bottom], &mut [&mut top]).unwrap();
        assert_eq!(layer.blobs().len(), 2);
        assert_eq!(layer.blobs()[0].shape(), &[5, 12]);
        assert_eq!(layer.blobs()[1].shape(), &[5]);
        assert!(layer.param_propagate_down(0));
        assert!(layer.param_propagate_down(1));
        assert_eq!(top.shape(), &[2, 5]);
    }

    #[test]
    fn test_zero_outputs_rejected() {
        let bottom = Blob::<f32>::new(&[2, 3]).unwrap();
        let mut top = Blob::<f32>::empty();
        let mut layer = InnerProductLayer::<f32, f32>::new(param(0));
        assert!(matches!(
            layer.setup(&[&bottom], &mut [&mut top]),
            Err(Error::InvalidParameter(_))
        ));
    }
}
