// tests/inner_product_tests.rs
use approx::assert_abs_diff_eq;
use rust_layer_lib::config::{FillerParameter, InnerProductParameter};
use rust_layer_lib::layers::InnerProductLayer;
use rust_layer_lib::{Blob, Error, Layer, LayerParams};

fn constant_param(num_output: usize, weight: f64, bias: f64) -> InnerProductParameter {
    InnerProductParameter {
        num_output,
        weight_filler: FillerParameter::Constant { value: weight },
        bias_filler: FillerParameter::Constant { value: bias },
        ..Default::default()
    }
}

fn ramp(shape: &[usize]) -> Blob<f64> {
    let count: usize = shape.iter().product();
    let data = (0..count).map(|i| 0.1 * (i as f64 + 1.0)).collect();
    Blob::from_vec(data, shape).unwrap()
}

#[test]
fn test_top_shape_law() {
    let bottom = Blob::<f32>::new(&[2, 3, 4, 5]).unwrap();
    let mut top = Blob::<f32>::empty();

    let mut layer = InnerProductLayer::<f32, f32>::new(constant_param(10, 0.0, 0.0));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.shape(), &[2, 10]);
    assert_eq!(layer.blobs()[0].shape(), &[10, 60]);

    let mut layer = InnerProductLayer::<f32, f32>::new(InnerProductParameter {
        axis: 2,
        ..constant_param(7, 0.0, 0.0)
    });
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.shape(), &[2, 3, 7]);
    assert_eq!(layer.batch_size(), 6);
    assert_eq!(layer.input_size(), 20);

    let mut layer = InnerProductLayer::<f32, f32>::new(InnerProductParameter {
        axis: -1,
        ..constant_param(3, 0.0, 0.0)
    });
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.shape(), &[2, 3, 4, 3]);
}

#[test]
fn test_forward_values() {
    // x = [[1, 2, 3], [4, 5, 6]], W = ones(2x3) * 0.5, b = 1
    let bottom = Blob::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    let mut top = Blob::<f32>::empty();
    let mut layer = InnerProductLayer::<f32, f32>::new(constant_param(2, 0.5, 1.0));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.data_vec(), vec![4.0, 4.0, 8.5, 8.5]);
}

#[test]
fn test_forward_without_bias() {
    let bottom = Blob::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[1, 3]).unwrap();
    let mut top = Blob::<f64>::empty();
    let mut layer = InnerProductLayer::<f64, f64>::new(InnerProductParameter {
        bias_term: false,
        ..constant_param(2, 1.0, 5.0)
    });
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(layer.blobs().len(), 1);
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.data_vec(), vec![6.0, 6.0]);
}

#[test]
fn test_transposed_weight_matches_plain() {
    let bottom = ramp(&[3, 4]);
    let weights: Vec<f64> = (0..8).map(|i| (i as f64) * 0.25 - 1.0).collect();

    // Plain layout [N=2, K=4].
    let plain_w = Blob::from_vec(weights.clone(), &[2, 4]).unwrap();
    let bias = Blob::from_vec(vec![0.5, -0.5], &[2]).unwrap();
    let mut plain = InnerProductLayer::<f64, f64>::with_params(
        constant_param(2, 0.0, 0.0),
        LayerParams::from_blobs(vec![plain_w, bias]),
    );

    // The same matrix stored as [K=4, N=2].
    let mut transposed_data = vec![0.0; 8];
    for n in 0..2 {
        for k in 0..4 {
            transposed_data[k * 2 + n] = weights[n * 4 + k];
        }
    }
    let trans_w = Blob::from_vec(transposed_data, &[4, 2]).unwrap();
    let bias = Blob::from_vec(vec![0.5, -0.5], &[2]).unwrap();
    let mut transposed = InnerProductLayer::<f64, f64>::with_params(
        InnerProductParameter {
            transpose: true,
            ..constant_param(2, 0.0, 0.0)
        },
        LayerParams::from_blobs(vec![trans_w, bias]),
    );

    let mut top_a = Blob::<f64>::empty();
    let mut top_b = Blob::<f64>::empty();
    plain.setup(&[&bottom], &mut [&mut top_a]).unwrap();
    transposed.setup(&[&bottom], &mut [&mut top_b]).unwrap();
    plain.forward(&[&bottom], &mut [&mut top_a]).unwrap();
    transposed.forward(&[&bottom], &mut [&mut top_b]).unwrap();
    for (a, b) in top_a.data_vec().iter().zip(top_b.data_vec().iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn test_reshape_is_idempotent() {
    let bottom = ramp(&[2, 3, 2]);
    let mut top = Blob::<f64>::empty();
    let mut layer = InnerProductLayer::<f64, f64>::new(constant_param(4, 0.3, 0.1));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    let first = top.data_vec();
    let weights = layer.blobs()[0].data_vec();

    layer.reshape(&[&bottom], &mut [&mut top]).unwrap();
    layer.reshape(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.shape(), &[2, 4]);
    assert_eq!(layer.blobs()[0].data_vec(), weights);
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.data_vec(), first);
}

#[test]
fn test_batch_size_change_keeps_parameters() {
    let bottom = ramp(&[2, 5]);
    let mut top = Blob::<f64>::empty();
    let mut layer = InnerProductLayer::<f64, f64>::new(constant_param(3, 1.0, 0.0));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();

    let bigger = ramp(&[6, 5]);
    layer.reshape(&[&bigger], &mut [&mut top]).unwrap();
    assert_eq!(top.shape(), &[6, 3]);
    layer.forward(&[&bigger], &mut [&mut top]).unwrap();
    assert_eq!(layer.batch_size(), 6);
}

#[test]
fn test_feature_count_change_is_fatal() {
    let bottom = Blob::<f32>::new(&[2, 10]).unwrap();
    let mut top = Blob::<f32>::empty();
    let mut layer = InnerProductLayer::<f32, f32>::new(constant_param(4, 1.0, 0.0));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();

    let wider = Blob::<f32>::new(&[2, 12]).unwrap();
    let err = layer.reshape(&[&wider], &mut [&mut top]).unwrap_err();
    assert!(matches!(
        err,
        Error::IncompatibleFeatureCount { expected: 10, actual: 12 }
    ));
}

#[test]
fn test_parameter_gradients_accumulate() {
    let bottom = ramp(&[3, 4]);
    let mut bottom_mut = ramp(&[3, 4]);
    let mut top = Blob::<f64>::empty();
    let mut layer = InnerProductLayer::<f64, f64>::new(constant_param(2, 0.2, 0.1));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    top.set_diff_from_slice(&[1.0, -1.0, 0.5, 2.0, -0.5, 1.5]).unwrap();

    layer.backward(&[&top], &[true], &mut [&mut bottom_mut]).unwrap();
    let w_once = layer.blobs()[0].diff_vec();
    let b_once = layer.blobs()[1].diff_vec();
    let x_once = bottom_mut.diff_vec();
    assert_abs_diff_eq!(b_once[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(b_once[1], 2.5, epsilon = 1e-12);

    layer.backward(&[&top], &[true], &mut [&mut bottom_mut]).unwrap();
    for (twice, once) in layer.blobs()[0].diff_vec().iter().zip(&w_once) {
        assert_abs_diff_eq!(*twice, 2.0 * once, epsilon = 1e-12);
    }
    for (twice, once) in layer.blobs()[1].diff_vec().iter().zip(&b_once) {
        assert_abs_diff_eq!(*twice, 2.0 * once, epsilon = 1e-12);
    }
    // The bottom gradient is overwritten, not accumulated.
    assert_eq!(bottom_mut.diff_vec(), x_once);
}

#[test]
fn test_disabled_parameter_gradient_untouched() {
    let bottom = ramp(&[2, 3]);
    let mut bottom_mut = ramp(&[2, 3]);
    let mut top = Blob::<f64>::empty();
    let mut layer = InnerProductLayer::<f64, f64>::new(constant_param(2, 1.0, 0.0));
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    layer.set_param_propagate_down(0, false);
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    top.set_diff_from_slice(&[1.0; 4]).unwrap();
    layer.backward(&[&top], &[false], &mut [&mut bottom_mut]).unwrap();

    assert!(layer.blobs()[0].diff_vec().iter().all(|&v| v == 0.0));
    assert_eq!(layer.blobs()[1].diff_vec(), vec![2.0, 2.0]);
    assert!(bottom_mut.diff_vec().iter().all(|&v| v == 0.0));
}

#[test]
fn test_persisted_parameters_are_kept() {
    let weight = Blob::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    let bias = Blob::<f32>::from_vec(vec![10.0, 20.0], &[2]).unwrap();
    let mut layer = InnerProductLayer::<f32, f32>::with_params(
        constant_param(2, 0.0, 0.0),
        LayerParams::from_blobs(vec![weight, bias]),
    );
    let bottom = Blob::<f32>::from_vec(vec![1.0, 1.0], &[1, 2]).unwrap();
    let mut top = Blob::<f32>::empty();
    layer.setup(&[&bottom], &mut [&mut top]).unwrap();
    layer.forward(&[&bottom], &mut [&mut top]).unwrap();
    assert_eq!(top.data_vec(), vec![13.0, 27.0]);
}

#[test]
fn test_persisted_parameters_with_wrong_shape_rejected() {
    let bottom = Blob::<f32>::from_vec(vec![1.0, 1.0], &[1, 2]).unwrap();
    let mut top = Blob::<f32>::empty();

    // Weight stored for three outputs while the layer is configured for two.
    let stale_weight = Blob::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
    let stale_bias = Blob::<f32>::from_vec(vec![0.0; 3], &[3]).unwrap();
    let mut layer = InnerProductLayer::<f32, f32>::with_params(
        constant_param(2, 0.0, 0.0),
        LayerParams::from_blobs(vec![stale_weight, stale_bias]),
    );
    assert!(matches!(
        layer.setup(&[&bottom], &mut [&mut top]),
        Err(Error::ShapeMismatch { expected, actual }) if expected == vec![2, 2] && actual == vec![3, 2]
    ));

    // Correct weight, wrong bias.
    let weight = Blob::<f32>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    let bias = Blob::<f32>::from_vec(vec![0.0; 3], &[3]).unwrap();
    let mut layer = InnerProductLayer::<f32, f32>::with_params(
        constant_param(2, 0.0, 0.0),
        LayerParams::from_blobs(vec![weight, bias]),
    );
    assert!(matches!(
        layer.setup(&[&bottom], &mut [&mut top]),
        Err(Error::ShapeMismatch { expected, .. }) if expected == vec![2]
    ));

    // A [N, K] weight is not accepted where the transposed layout is expected.
    let weight = Blob::<f32>::from_vec(vec![1.0; 6], &[3, 2]).unwrap();
    let bias = Blob::<f32>::from_vec(vec![0.0; 3], &[3]).unwrap();
    let mut layer = InnerProductLayer::<f32, f32>::with_params(
        InnerProductParameter {
            transpose: true,
            ..constant_param(3, 0.0, 0.0)
        },
        LayerParams::from_blobs(vec![weight, bias]),
    );
    assert!(matches!(
        layer.setup(&[&bottom], &mut [&mut top]),
        Err(Error::ShapeMismatch { expected, .. }) if expected == vec![2, 3]
    ));
}

#[test]
fn test_wrong_blob_counts() {
    let a = Blob::<f32>::new(&[2, 3]).unwrap();
    let b = Blob::<f32>::new(&[2, 3]).unwrap();
    let mut top = Blob::<f32>::empty();
    let mut layer = InnerProductLayer::<f32, f32>::new(constant_param(2, 1.0, 0.0));
    assert!(matches!(
        layer.setup(&[&a, &b], &mut [&mut top]),
        Err(Error::BlobCountMismatch { kind: "bottom", .. })
    ));
}
