//! `y = log_base(scale * x + shift)`
//!
//! With the default base (`-1`) the natural logarithm is used. Inputs outside
//! the logarithm's domain are not rejected; they produce NaN or -Inf.

use crate::blob::Blob;
use crate::config::{LogParameter, NATURAL_LOG_BASE};
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::layer::{wants_bottom_diff, Layer, LayerParams};
use crate::ops;
use std::marker::PhantomData;

pub struct LogLayer<D: DataType, M: MathType> {
    param: LogParameter,
    params: LayerParams<D>,
    base_scale: f64,
    input_scale: f64,
    input_shift: f64,
    backward_num_scale: f64,
    _math: PhantomData<M>,
}

fn finite(name: &str, value: f64) -> Result<f64, Error> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NonFiniteConstant {
            name: name.to_string(),
            value,
        })
    }
}

impl<D: DataType, M: MathType> LogLayer<D, M> {
    pub fn new(param: LogParameter) -> Self {
        Self {
            param,
            params: LayerParams::new(),
            base_scale: 1.0,
            input_scale: 1.0,
            input_shift: 0.0,
            backward_num_scale: 1.0,
            _math: PhantomData,
        }
    }

    /// `1 / ln(base)`, or exactly 1 for the natural logarithm.
    pub fn base_scale(&self) -> f64 {
        self.base_scale
    }

    pub fn backward_num_scale(&self) -> f64 {
        self.backward_num_scale
    }

    /// Write `scale * x + shift` into `out`, skipping identity steps.
    fn affine_input(&self, x: &[D], out: &mut [D]) -> Result<(), Error> {
        ops::copy(x, out)?;
        if self.input_scale != 1.0 {
            ops::scal::<D, M>(M::from_f64(self.input_scale), out);
        }
        if self.input_shift != 0.0 {
            ops::add_scalar::<D, M>(M::from_f64(self.input_shift), out);
        }
        Ok(())
    }
}

impl<D: DataType, M: MathType> Layer<D, M> for LogLayer<D, M> {
    fn type_name(&self) -> &'static str {
        "Log"
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
        let base = self.param.base;
        if !(base == NATURAL_LOG_BASE || base > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "log base must be strictly positive or set to -1 for base e, got {}",
                base
            )));
        }
        let log_base = if base == NATURAL_LOG_BASE { 1.0 } else { base.ln() };
        let log_base = finite("log_base", log_base)?;
        self.base_scale = finite("base_scale", 1.0 / log_base)?;
        self.input_scale = self.param.scale;
        self.input_shift = self.param.shift;
        self.backward_num_scale = self.input_scale / log_base;
        debug_println!(
            "Log layer: base_scale={} input_scale={} input_shift={}",
            self.base_scale,
            self.input_scale,
            self.input_shift
        );
        Ok(())
    }

    fn reshape(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        top[0].reshape_like(bottom[0])
    }

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        let bottom_data = bottom[0].cpu_data();
        let mut top_data = top[0].mutable_cpu_data();
        if self.input_scale == 1.0 && self.input_shift == 0.0 {
            ops::log::<D, M>(&bottom_data, &mut top_data)?;
        } else {
            self.affine_input(&bottom_data, &mut top_data)?;
            ops::log_inplace::<D, M>(&mut top_data);
        }
        if self.base_scale != 1.0 {
            ops::scal::<D, M>(M::from_f64(self.base_scale), &mut top_data);
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
        let top_diff = top[0].cpu_diff();
        let (bottom_data, mut bottom_diff) = bottom[0].data_and_mutable_diff();

        // dy/dx = backward_num_scale / (scale * x + shift)
        self.affine_input(&bottom_data, &mut bottom_diff)?;
        ops::powx_inplace::<D, M>(-M::one(), &mut bottom_diff);
        if self.backward_num_scale != 1.0 {
            ops::scal::<D, M>(M::from_f64(self.backward_num_scale), &mut bottom_diff);
        }
        ops::mul_assign::<D, M>(&top_diff, &mut bottom_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(param: LogParameter) -> Result<LogLayer<f64, f64>, Error> {
        let bottom = Blob::<f64>::new(&[2, 3]).unwrap();
        let mut top = Blob::<f64>::empty();
        let mut layer = LogLayer::new(param);
        layer.setup(&[&bottom], &mut [&mut top])?;
        Ok(layer)
    }

    #[test]
    fn test_natural_base_is_identity_scale() {
        let layer = setup(LogParameter::default()).unwrap();
        assert_eq!(layer.base_scale(), 1.0);
        assert_eq!(layer.backward_num_scale(), 1.0);
    }

    #[test]
    fn test_base_two_constants() {
        let layer = setup(LogParameter {
            base: 2.0,
            scale: 0.5,
            shift: 0.0,
        })
        .unwrap();
        let ln2 = 2.0f64.ln();
        assert!((layer.base_scale() - 1.0 / ln2).abs() < 1e-12);
        assert!((layer.backward_num_scale() - 0.5 / ln2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_bases() {
        assert!(matches!(
            setup(LogParameter { base: -2.0, ..Default::default() }),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            setup(LogParameter { base: 0.0, ..Default::default() }),
            Err(Error::InvalidParameter(_))
        ));
        // ln(1) = 0 makes the base scale infinite.
        assert!(matches!(
            setup(LogParameter { base: 1.0, ..Default::default() }),
            Err(Error::NonFiniteConstant { .. })
        ));
    }
}
