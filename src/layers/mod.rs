//! Built-in layer implementations.

pub mod accelerated;
pub mod inner_product;
pub mod log;
pub mod neuron;
pub mod softmax;
pub mod split;

pub use accelerated::AcceleratedActivationLayer;
pub use inner_product::InnerProductLayer;
pub use log::LogLayer;
pub use neuron::{ReLULayer, SigmoidLayer, TanHLayer};
pub use softmax::SoftmaxLayer;
pub use split::SplitLayer;
