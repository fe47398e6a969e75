//! Name-based layer construction.

use crate::config::LayerParameter;
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::layer::Layer;
use crate::layers::{
    InnerProductLayer, LogLayer, ReLULayer, SigmoidLayer, SoftmaxLayer, SplitLayer, TanHLayer,
};
use std::collections::HashMap;

pub type LayerCreator<D, M> = fn(&LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error>;

fn create_inner_product<D: DataType, M: MathType>(
    p: &LayerParameter,
) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(InnerProductLayer::<D, M>::new(p.inner_product_param.clone())))
}

fn create_softmax<D: DataType, M: MathType>(p: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(SoftmaxLayer::<D, M>::new(p.softmax_param.clone())))
}

fn create_log<D: DataType, M: MathType>(p: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(LogLayer::<D, M>::new(p.log_param.clone())))
}

fn create_split<D: DataType, M: MathType>(_: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(SplitLayer::<D, M>::new()))
}

fn create_relu<D: DataType, M: MathType>(p: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(ReLULayer::<D, M>::new(p.relu_param.clone())))
}

fn create_sigmoid<D: DataType, M: MathType>(_: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(SigmoidLayer::<D, M>::new()))
}

fn create_tanh<D: DataType, M: MathType>(_: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
    Ok(Box::new(TanHLayer::<D, M>::new()))
}

/// Maps layer type names to constructors.
///
/// # Example
/// ```rust
/// use rust_layer_lib::config::LayerParameter;
/// use rust_layer_lib::LayerRegistry;
///
/// let registry = LayerRegistry::<f32, f32>::with_builtin_layers();
/// let layer = registry.create(&LayerParameter::new("prob", "Softmax")).unwrap();
/// assert_eq!(layer.type_name(), "Softmax");
/// ```
pub struct LayerRegistry<D: DataType, M: MathType> {
    creators: HashMap<String, LayerCreator<D, M>>,
}

impl<D: DataType, M: MathType> Default for LayerRegistry<D, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataType, M: MathType> LayerRegistry<D, M> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            creators: HashMap::new(),
        }
    }

    /// A registry holding every layer type this crate implements on the host.
    pub fn with_builtin_layers() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, LayerCreator<D, M>); 7] = [
            ("InnerProduct", create_inner_product::<D, M>),
            ("Softmax", create_softmax::<D, M>),
            ("Log", create_log::<D, M>),
            ("Split", create_split::<D, M>),
            ("ReLU", create_relu::<D, M>),
            ("Sigmoid", create_sigmoid::<D, M>),
            ("TanH", create_tanh::<D, M>),
        ];
        for (name, creator) in builtins {
            registry.creators.insert(name.to_string(), creator);
        }
        registry
    }

    pub fn register(&mut self, layer_type: &str, creator: LayerCreator<D, M>) -> Result<(), Error> {
        if self.creators.contains_key(layer_type) {
            return Err(Error::DuplicateLayerType(layer_type.to_string()));
        }
        self.creators.insert(layer_type.to_string(), creator);
        Ok(())
    }

    pub fn create(&self, param: &LayerParameter) -> Result<Box<dyn Layer<D, M>>, Error> {
        let creator = self
            .creators
            .get(&param.layer_type)
            .ok_or_else(|| Error::UnknownLayerType(param.layer_type.clone()))?;
        debug_println!("Creating layer {} of type {}", param.name, param.layer_type);
        creator(param)
    }

    pub fn contains(&self, layer_type: &str) -> bool {
        self.creators.contains_key(layer_type)
    }

    /// Registered type names in sorted order.
    pub fn layer_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.creators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
