//! Fan one blob out to several consumers.
//!
//! Every top aliases the bottom's `data`; in backward the tops' gradients are
//! summed into the bottom's `diff`.

use crate::blob::Blob;
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::layer::{wants_bottom_diff, Layer, LayerParams};
use crate::ops;
use std::marker::PhantomData;

pub struct SplitLayer<D: DataType, M: MathType> {
    params: LayerParams<D>,
    count: usize,
    _math: PhantomData<M>,
}

impl<D: DataType, M: MathType> SplitLayer<D, M> {
    pub fn new() -> Self {
        Self {
            params: LayerParams::new(),
            count: 0,
            _math: PhantomData,
        }
    }
}

impl<D: DataType, M: MathType> Default for SplitLayer<D, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataType, M: MathType> Layer<D, M> for SplitLayer<D, M> {
    fn type_name(&self) -> &'static str {
        "Split"
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

    fn min_top_blobs(&self) -> Option<usize> {
        Some(1)
    }

    fn reshape(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        self.count = bottom[0].count();
        for t in top.iter_mut() {
            // Gradients from the tops are summed into the bottom, so a top may
            // not be the bottom itself.
            if t.shares_diff_with(bottom[0]) {
                return Err(Error::InPlaceNotAllowed("Split"));
            }
            t.reshape_like(bottom[0])?;
            if t.count() != self.count {
                return Err(Error::CountMismatch {
                    op: "split reshape".to_string(),
                    expected: self.count,
                    actual: t.count(),
                });
            }
        }
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        for t in top.iter_mut() {
            t.share_data(bottom[0])?;
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
        let mut bottom_diff = bottom[0].mutable_cpu_diff();
        match top {
            [] => Ok(()),
            [only] => ops::copy(&only.cpu_diff(), &mut bottom_diff),
            [first, second, rest @ ..] => {
                ops::add::<D, M>(&first.cpu_diff(), &second.cpu_diff(), &mut bottom_diff)?;
                for t in rest {
                    ops::axpy::<D, M>(M::one(), &t.cpu_diff(), &mut bottom_diff)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tops_alias_bottom_data() {
        let bottom = Blob::<f32>::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let mut a = Blob::<f32>::empty();
        let mut b = Blob::<f32>::empty();
        let mut layer = SplitLayer::<f32, f32>::new();
        layer.setup(&[&bottom], &mut [&mut a, &mut b]).unwrap();
        layer.forward(&[&bottom], &mut [&mut a, &mut b]).unwrap();
        assert!(a.shares_data_with(&bottom));
        assert!(b.shares_data_with(&bottom));
        assert_eq!(b.data_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_in_place_rejected() {
        let bottom = Blob::<f32>::new(&[4]).unwrap();
        let mut top = Blob::<f32>::new(&[4]).unwrap();
        top.share_diff(&bottom).unwrap();
        let mut layer = SplitLayer::<f32, f32>::new();
        assert!(matches!(
            layer.setup(&[&bottom], &mut [&mut top]),
            Err(Error::InPlaceNotAllowed("Split"))
        ));
    }
}
