use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape error: {0}")]
    ShapeError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Incompatible shapes for operation {op}: {shape_a:?} and {shape_b:?}")]
    IncompatibleShapes {
        op: String,
        shape_a: Vec<usize>,
        shape_b: Vec<usize>,
    },

    #[error("Count mismatch in {op}: expected {expected}, got {actual}")]
    CountMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("Axis {axis} out of range for a blob with {num_axes} axes")]
    AxisOutOfRange { axis: isize, num_axes: usize },

    #[error("Invalid axis range [{start}, {end}) for a blob with {num_axes} axes")]
    InvalidAxisRange {
        start: usize,
        end: usize,
        num_axes: usize,
    },

    #[error("Input size incompatible with inner product parameters: expected K={expected}, got K={actual}")]
    IncompatibleFeatureCount { expected: usize, actual: usize },

    #[error("{layer} layer takes {expected} {kind} blob(s), got {actual}")]
    BlobCountMismatch {
        layer: &'static str,
        kind: &'static str,
        expected: String,
        actual: usize,
    },

    #[error("{0} layer does not allow in-place computation")]
    InPlaceNotAllowed(&'static str),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Non-finite result: {name} = {value}")]
    NonFiniteConstant { name: String, value: f64 },

    #[error("Unknown layer type: {0}")]
    UnknownLayerType(String),

    #[error("Layer type already registered: {0}")]
    DuplicateLayerType(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[cfg(feature = "serialization")]
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal logic error: {0}")]
    InternalLogicError(String),

    #[error("Gradient check error: analytical={analytical}, numerical={numerical}, blob={blob_index}, at_index={at_index}, threshold={threshold}")]
    GradientCheckError {
        analytical: f64,
        numerical: f64,
        blob_index: usize,
        at_index: usize,
        threshold: f64,
    },
}

#[cfg(feature = "serialization")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::DeserializationError(err.to_string())
    }
}

/// Whether a matrix operand is used as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    /// Use the operand as stored (row-major).
    NoTrans,
    /// Use the transpose of the operand.
    Trans,
}
