// tests/gradient_check_tests.rs
use rust_layer_lib::config::{
    FillerParameter, InnerProductParameter, LogParameter, ReluParameter, SoftmaxParameter,
};
use rust_layer_lib::layers::{
    InnerProductLayer, LogLayer, ReLULayer, SigmoidLayer, SoftmaxLayer, SplitLayer, TanHLayer,
};
use rust_layer_lib::test_utils::{check_layer_gradient, GradientChecker};
use rust_layer_lib::{Blob, Error, Layer, LayerParams};

const STEP: f64 = 1e-4;
const THRESHOLD: f64 = 1e-5;

/// Deterministic values in `[lo, hi)`.
fn filled(shape: &[usize], lo: f64, hi: f64, seed: u64) -> Blob<f64> {
    let count: usize = shape.iter().product();
    let mut state = seed;
    let data = (0..count)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            lo + (hi - lo) * ((state >> 33) as f64 / (1u64 << 31) as f64)
        })
        .collect();
    Blob::from_vec(data, shape).unwrap()
}

fn single_top() -> Vec<Blob<f64>> {
    vec![Blob::empty()]
}

#[test]
fn test_inner_product_gradient() -> Result<(), Error> {
    let mut layer = InnerProductLayer::<f64, f64>::new(InnerProductParameter {
        num_output: 4,
        weight_filler: FillerParameter::Uniform { min: -1.0, max: 1.0 },
        bias_filler: FillerParameter::Gaussian { mean: 0.0, std: 0.5 },
        ..Default::default()
    });
    let mut bottom = vec![filled(&[2, 3, 2], -1.0, 1.0, 11)];
    check_layer_gradient(&mut layer, &mut bottom, &mut single_top(), STEP, THRESHOLD)
}

#[test]
fn test_inner_product_transposed_gradient() -> Result<(), Error> {
    let mut layer = InnerProductLayer::<f64, f64>::new(InnerProductParameter {
        num_output: 3,
        transpose: true,
        weight_filler: FillerParameter::Xavier {
            variance_norm: Default::default(),
        },
        bias_filler: FillerParameter::Constant { value: 0.1 },
        ..Default::default()
    });
    let mut bottom = vec![filled(&[3, 5], -1.0, 1.0, 12)];
    check_layer_gradient(&mut layer, &mut bottom, &mut single_top(), STEP, THRESHOLD)
}

#[test]
fn test_softmax_gradient() -> Result<(), Error> {
    let mut layer = SoftmaxLayer::<f64, f64>::new(SoftmaxParameter { axis: 1 });
    let mut bottom = vec![filled(&[2, 4, 2, 3], -2.0, 2.0, 13)];
    check_layer_gradient(&mut layer, &mut bottom, &mut single_top(), STEP, THRESHOLD)
}

#[test]
fn test_log_gradient() -> Result<(), Error> {
    let mut layer = LogLayer::<f64, f64>::new(LogParameter {
        base: 3.0,
        scale: 0.5,
        shift: 1.0,
    });
    let mut bottom = vec![filled(&[2, 3], 0.5, 4.0, 14)];
    check_layer_gradient(&mut layer, &mut bottom, &mut single_top(), STEP, THRESHOLD)
}

#[test]
fn test_split_gradient() -> Result<(), Error> {
    let mut layer = SplitLayer::<f64, f64>::new();
    let mut bottom = vec![filled(&[2, 3], -1.0, 1.0, 15)];
    let mut top = vec![Blob::empty(), Blob::empty(), Blob::empty()];
    check_layer_gradient(&mut layer, &mut bottom, &mut top, STEP, THRESHOLD)
}

#[test]
fn test_relu_gradient() -> Result<(), Error> {
    let mut layer = ReLULayer::<f64, f64>::new(ReluParameter {
        negative_slope: 0.01,
    });
    let mut bottom = vec![filled(&[2, 3, 4], -1.0, 1.0, 16)];
    GradientChecker::new(STEP, THRESHOLD)
        .with_kink(0.0, 0.01)
        .check_layer(&mut layer, &mut bottom, &mut single_top())
}

#[test]
fn test_sigmoid_gradient() -> Result<(), Error> {
    let mut layer = SigmoidLayer::<f64, f64>::new();
    let mut bottom = vec![filled(&[2, 5], -3.0, 3.0, 17)];
    check_layer_gradient(&mut layer, &mut bottom, &mut single_top(), STEP, THRESHOLD)
}

#[test]
fn test_tanh_gradient() -> Result<(), Error> {
    let mut layer = TanHLayer::<f64, f64>::new();
    let mut bottom = vec![filled(&[2, 5], -3.0, 3.0, 18)];
    check_layer_gradient(&mut layer, &mut bottom, &mut single_top(), STEP, THRESHOLD)
}

#[test]
fn test_checker_reports_wrong_gradient() {
    // A layer whose backward ignores the gradient must be caught.
    let mut layer = InnerProductLayer::<f64, f64>::new(InnerProductParameter {
        num_output: 2,
        weight_filler: FillerParameter::Constant { value: 0.5 },
        ..Default::default()
    });
    let mut bottom = vec![filled(&[1, 3], 1.0, 2.0, 19)];
    let mut top = single_top();
    let result = GradientChecker::new(STEP, THRESHOLD)
        .check_layer(&mut NoBottomGradient(&mut layer), &mut bottom, &mut top);
    assert!(matches!(
        result,
        Err(Error::GradientCheckError { blob_index: 0, .. })
    ));
}

/// Wraps a layer and drops the bottom gradient request.
struct NoBottomGradient<'a>(&'a mut InnerProductLayer<f64, f64>);

impl Layer<f64, f64> for NoBottomGradient<'_> {
    fn type_name(&self) -> &'static str {
        "NoBottomGradient"
    }

    fn params(&self) -> &LayerParams<f64> {
        self.0.params()
    }

    fn params_mut(&mut self) -> &mut LayerParams<f64> {
        self.0.params_mut()
    }

    fn layer_setup(&mut self, bottom: &[&Blob<f64>], top: &mut [&mut Blob<f64>]) -> Result<(), Error> {
        self.0.layer_setup(bottom, top)
    }

    fn reshape(&mut self, bottom: &[&Blob<f64>], top: &mut [&mut Blob<f64>]) -> Result<(), Error> {
        self.0.reshape(bottom, top)
    }

    fn forward(&mut self, bottom: &[&Blob<f64>], top: &mut [&mut Blob<f64>]) -> Result<(), Error> {
        self.0.forward(bottom, top)
    }

    fn backward(
        &mut self,
        top: &[&Blob<f64>],
        _propagate_down: &[bool],
        bottom: &mut [&mut Blob<f64>],
    ) -> Result<(), Error> {
        self.0.backward(top, &[false], bottom)
    }
}
