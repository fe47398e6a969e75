//! The layer execution contract.
//!
//! A layer is driven by its owning graph in four phases:
//!
//! 1. [`Layer::setup`] once, which validates blob counts, runs
//!    [`Layer::layer_setup`] and then [`Layer::reshape`];
//! 2. [`Layer::reshape`] again whenever the bottom shapes change;
//! 3. [`Layer::forward`], computing top `data` from bottom `data`;
//! 4. [`Layer::backward`], computing bottom `diff` (where `propagate_down`
//!    asks for it) and accumulating parameter `diff` (where
//!    [`Layer::param_propagate_down`] allows it).
//!
//! Bottom and top blobs must be distinct buffers; only the split layer reads
//! through an alias it created itself. Borrowing a buffer mutably while it is
//! aliased by another argument panics.
//!
//! Calls on one layer are synchronous and must not overlap. Errors returned by
//! `setup` and `reshape` describe an invalid model and should abort graph
//! construction.

use crate::blob::Blob;
use crate::dtype::{DataType, MathType};
use crate::error::Error;

/// Learnable parameters and their per-blob gradient switches.
#[derive(Debug, Default)]
pub struct LayerParams<D: DataType> {
    pub blobs: Vec<Blob<D>>,
    pub propagate_down: Vec<bool>,
}

impl<D: DataType> LayerParams<D> {
    pub fn new() -> Self {
        Self {
            blobs: Vec::new(),
            propagate_down: Vec::new(),
        }
    }

    /// Parameters restored from persisted state; setup will not refill them.
    pub fn from_blobs(blobs: Vec<Blob<D>>) -> Self {
        let propagate_down = vec![true; blobs.len()];
        Self {
            blobs,
            propagate_down,
        }
    }

    /// Grow or shrink the switch vector to one entry per blob, new entries
    /// defaulting to `true`.
    pub fn sync_propagate_down(&mut self) {
        self.propagate_down.resize(self.blobs.len(), true);
    }
}

pub trait Layer<D: DataType, M: MathType> {
    /// Registry name of the layer type.
    fn type_name(&self) -> &'static str;

    fn params(&self) -> &LayerParams<D>;

    fn params_mut(&mut self) -> &mut LayerParams<D>;

    /// Layer-specific one-time setup: read configuration, allocate and fill
    /// parameter blobs.
    fn layer_setup(&mut self, _bottom: &[&Blob<D>], _top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        Ok(())
    }

    /// Derive top shapes and internal buffers from the bottom shapes.
    fn reshape(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error>;

    fn forward(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error>;

    fn backward(
        &mut self,
        top: &[&Blob<D>],
        propagate_down: &[bool],
        bottom: &mut [&mut Blob<D>],
    ) -> Result<(), Error>;

    fn exact_num_bottom_blobs(&self) -> Option<usize> {
        None
    }

    fn exact_num_top_blobs(&self) -> Option<usize> {
        None
    }

    fn min_top_blobs(&self) -> Option<usize> {
        None
    }

    /// Run the one-time setup sequence.
    fn setup(&mut self, bottom: &[&Blob<D>], top: &mut [&mut Blob<D>]) -> Result<(), Error> {
        check_blob_counts(
            self.type_name(),
            bottom.len(),
            top.len(),
            self.exact_num_bottom_blobs(),
            self.exact_num_top_blobs(),
            self.min_top_blobs(),
        )?;
        self.layer_setup(bottom, top)?;
        self.reshape(bottom, top)
    }

    fn blobs(&self) -> &[Blob<D>] {
        &self.params().blobs
    }

    fn blobs_mut(&mut self) -> &mut [Blob<D>] {
        &mut self.params_mut().blobs
    }

    /// Whether the gradient of parameter blob `index` is computed.
    fn param_propagate_down(&self, index: usize) -> bool {
        self.params()
            .propagate_down
            .get(index)
            .copied()
            .unwrap_or(false)
    }

    fn set_param_propagate_down(&mut self, index: usize, value: bool) {
        if let Some(flag) = self.params_mut().propagate_down.get_mut(index) {
            *flag = value;
        }
    }
}

fn check_blob_counts(
    layer: &'static str,
    num_bottom: usize,
    num_top: usize,
    exact_bottom: Option<usize>,
    exact_top: Option<usize>,
    min_top: Option<usize>,
) -> Result<(), Error> {
    if let Some(expected) = exact_bottom {
        if num_bottom != expected {
            return Err(Error::BlobCountMismatch {
                layer,
                kind: "bottom",
                expected: expected.to_string(),
                actual: num_bottom,
            });
        }
    }
    if let Some(expected) = exact_top {
        if num_top != expected {
            return Err(Error::BlobCountMismatch {
                layer,
                kind: "top",
                expected: expected.to_string(),
                actual: num_top,
            });
        }
    }
    if let Some(min) = min_top {
        if num_top < min {
            return Err(Error::BlobCountMismatch {
                layer,
                kind: "top",
                expected: format!("at least {}", min),
                actual: num_top,
            });
        }
    }
    Ok(())
}

/// First entry of `propagate_down`, treating an empty slice as "no".
pub(crate) fn wants_bottom_diff(propagate_down: &[bool]) -> bool {
    propagate_down.first().copied().unwrap_or(false)
}
