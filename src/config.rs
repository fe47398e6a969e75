//! Layer configuration objects.
//!
//! These mirror the options a model definition supplies per layer. Layers read
//! them once, at construction and setup time.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// How Xavier/MSRA fillers derive the variance from the blob's fans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum VarianceNorm {
    #[default]
    FanIn,
    FanOut,
    Average,
}

/// Parameter initialization strategy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(tag = "type", rename_all = "lowercase"))]
pub enum FillerParameter {
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
    Gaussian { mean: f64, std: f64 },
    Xavier { variance_norm: VarianceNorm },
    Msra { variance_norm: VarianceNorm },
}

impl Default for FillerParameter {
    fn default() -> Self {
        FillerParameter::Constant { value: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct InnerProductParameter {
    /// Output width `N`.
    pub num_output: usize,
    pub bias_term: bool,
    pub weight_filler: FillerParameter,
    pub bias_filler: FillerParameter,
    /// First axis to flatten into the per-sample feature vector.
    pub axis: isize,
    /// Store the weight as `[K, N]` instead of `[N, K]`.
    pub transpose: bool,
}

impl Default for InnerProductParameter {
    fn default() -> Self {
        Self {
            num_output: 0,
            bias_term: true,
            weight_filler: FillerParameter::default(),
            bias_filler: FillerParameter::default(),
            axis: 1,
            transpose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct SoftmaxParameter {
    pub axis: isize,
}

impl Default for SoftmaxParameter {
    fn default() -> Self {
        Self { axis: 1 }
    }
}

/// Base value that selects the natural logarithm.
pub const NATURAL_LOG_BASE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct LogParameter {
    /// Logarithm base, or [`NATURAL_LOG_BASE`] for base e.
    pub base: f64,
    pub scale: f64,
    pub shift: f64,
}

impl Default for LogParameter {
    fn default() -> Self {
        Self {
            base: NATURAL_LOG_BASE,
            scale: 1.0,
            shift: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct ReluParameter {
    pub negative_slope: f64,
}

/// Configuration of a single layer.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct LayerParameter {
    pub name: String,
    /// Registry key, e.g. `"InnerProduct"`.
    #[cfg_attr(feature = "serialization", serde(rename = "type"))]
    pub layer_type: String,
    pub inner_product_param: InnerProductParameter,
    pub softmax_param: SoftmaxParameter,
    pub log_param: LogParameter,
    pub relu_param: ReluParameter,
}

impl LayerParameter {
    pub fn new(name: &str, layer_type: &str) -> Self {
        Self {
            name: name.to_string(),
            layer_type: layer_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_inner_product(mut self, param: InnerProductParameter) -> Self {
        self.inner_product_param = param;
        self
    }

    pub fn with_softmax(mut self, param: SoftmaxParameter) -> Self {
        self.softmax_param = param;
        self
    }

    pub fn with_log(mut self, param: LogParameter) -> Self {
        self.log_param = param;
        self
    }

    pub fn with_relu(mut self, param: ReluParameter) -> Self {
        self.relu_param = param;
        self
    }

    /// Parse one layer configuration from JSON. Missing fields take their
    /// defaults.
    #[cfg(feature = "serialization")]
    pub fn from_json(json: &str) -> Result<Self, crate::error::Error> {
        Ok(serde_json::from_str(json)?)
    }
}
