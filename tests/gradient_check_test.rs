use scnn::layers::{ConvLayer, DenseLayer, RecurrentLayer};
use scnn::{ActivationFunction, Input, Layer, Matrix, Model, ParamGrad, ParamsMut, Shape, Signal};

const H: f64 = 1e-4;
const TOLERANCE: f64 = 1e-3;

/// E = ½ Σ (o − t)², whose gradient is the model's error signal `o − t`.
fn half_sse(output: &[f64], target: &[f64]) -> f64 {
    0.5 * output.iter().zip(target).map(|(o, t)| (o - t).powi(2)).sum::<f64>()
}

fn assert_close(analytic: f64, numeric: f64, what: &str) {
    let scale = analytic.abs().max(numeric.abs());
    if scale < 1e-8 {
        return;
    }
    let rel = (analytic - numeric).abs() / scale;
    assert!(rel < TOLERANCE, "{what}: analytic {analytic} vs numeric {numeric} (rel {rel})");
}

/// Every scalar parameter of one layer, addressed so it can be nudged in place.
fn parameter_slots(params: Option<ParamsMut<'_>>) -> Vec<&mut f64> {
    match params {
        Some(ParamsMut::Weights(w)) => w.data.iter_mut().flatten().collect(),
        Some(ParamsMut::Kernels(grid)) => {
            grid.iter_mut().flatten().flat_map(|k| k.data.iter_mut().flatten()).collect()
        }
        None => Vec::new(),
    }
}

/// Returns parameter `i` of layer `l`, overwriting it first when `value` is set.
fn set_parameter(model: &mut Model, l: usize, i: usize, value: Option<f64>) -> f64 {
    let slot = parameter_slots(model.parameters_mut(l))
        .into_iter()
        .nth(i)
        .expect("parameter index in range");
    if let Some(v) = value {
        *slot = v;
    }
    *slot
}

fn grad_values(grad: &ParamGrad) -> Vec<f64> {
    match grad {
        ParamGrad::Weights(w) => w.to_array(),
        ParamGrad::Kernels(grid) => grid.iter().flatten().flat_map(|k| k.to_array()).collect(),
    }
}

/// Compares every analytic parameter gradient with a central difference of `loss`.
fn check_model<F>(model: &mut Model, grads: Vec<Option<ParamGrad>>, mut loss: F)
where
    F: FnMut(&mut Model) -> f64,
{
    for (l, grad) in grads.iter().enumerate() {
        let Some(grad) = grad else { continue };
        let analytic = grad_values(grad);
        for (i, expected) in analytic.iter().enumerate() {
            let original = set_parameter(model, l, i, None);

            set_parameter(model, l, i, Some(original + H));
            let plus = loss(model);
            set_parameter(model, l, i, Some(original - H));
            let minus = loss(model);
            set_parameter(model, l, i, Some(original));

            let numeric = (plus - minus) / (2.0 * H);
            assert_close(*expected, numeric, &format!("layer {l} parameter {i}"));
        }
    }
}

#[test]
fn test_dense_2_2_1() {
    let hidden = Matrix::from_2d_array(vec![vec![0.5, -0.4], vec![0.3, 0.6]]).unwrap();
    let output = Matrix::from_2d_array(vec![vec![0.7], vec![-0.2]]).unwrap();
    let mut model = Model::new(0.1, vec![
        Layer::input(2),
        Layer::Dense(DenseLayer::with_weights(hidden)),
        Layer::Dense(DenseLayer::with_weights(output)),
    ])
    .unwrap();

    let x = Input::Flat(vec![1.0, 2.0]);
    let target = [0.0];
    let grads = model.back_prop(&x, &target).unwrap();
    assert_eq!(grads.iter().filter(|g| g.is_some()).count(), 2);

    check_model(&mut model, grads, |m| half_sse(&m.for_prop(&x).unwrap(), &target));
}

#[test]
fn test_dense_with_smooth_activations() {
    let hidden = Matrix::from_2d_array(vec![vec![0.2, -0.9, 0.4], vec![-0.6, 0.1, 0.8]]).unwrap();
    let output = Matrix::from_2d_array(vec![vec![0.3, -0.5], vec![0.7, 0.2], vec![-0.4, 0.9]]).unwrap();
    let mut hidden = DenseLayer::with_weights(hidden);
    hidden.activator = ActivationFunction::Tanh;
    let mut output = DenseLayer::with_weights(output);
    output.activator = ActivationFunction::Sigmoid;
    let mut model = Model::new(0.1, vec![Layer::input(2), hidden.into(), output.into()]).unwrap();

    let x = Input::Flat(vec![0.7, -1.1]);
    let target = [1.0, 0.0];
    let grads = model.back_prop(&x, &target).unwrap();
    check_model(&mut model, grads, |m| half_sse(&m.for_prop(&x).unwrap(), &target));
}

#[test]
fn test_conv_chain() {
    let kernel_a = Matrix::from_2d_array(vec![vec![0.2, 0.1], vec![0.4, 0.3]]).unwrap();
    let kernel_b = Matrix::from_2d_array(vec![vec![0.5, 0.25], vec![0.15, 0.35]]).unwrap();
    let dense = Matrix::from_array(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8], 8).unwrap();
    let mut model = Model::new(0.1, vec![
        Layer::input_maps(4, 4, 1),
        Layer::Conv(ConvLayer::with_kernels(2, vec![vec![kernel_a, kernel_b]])),
        Layer::pool(2),
        Layer::flatten(),
        Layer::Dense(DenseLayer::with_weights(dense)),
    ])
    .unwrap();

    let x = Input::Flat((1..=16).map(|v| v as f64 / 16.0).collect());
    let target = [0.0];
    let grads = model.back_prop(&x, &target).unwrap();
    assert!(matches!(grads[1], Some(ParamGrad::Kernels(_))));

    check_model(&mut model, grads, |m| half_sse(&m.for_prop(&x).unwrap(), &target));
}

#[test]
fn test_conv_input_gradient() {
    let kernels = vec![
        vec![
            Matrix::from_2d_array(vec![vec![0.2, -0.1], vec![0.4, 0.3]]).unwrap(),
            Matrix::from_2d_array(vec![vec![0.1, 0.5], vec![-0.3, 0.2]]).unwrap(),
        ],
        vec![
            Matrix::from_2d_array(vec![vec![0.3, 0.3], vec![0.1, -0.2]]).unwrap(),
            Matrix::from_2d_array(vec![vec![-0.4, 0.2], vec![0.6, 0.1]]).unwrap(),
        ],
    ];
    let mut conv = ConvLayer::with_kernels(2, kernels);
    conv.link(Shape::Maps { num_maps: 2, height: 3, width: 4 }).unwrap();

    let input: Vec<Matrix> = (0..2)
        .map(|m| {
            let values: Vec<f64> = (0..12).map(|v| ((v + 5 * m) as f64 * 0.9).cos()).collect();
            Matrix::from_array(&values, 4).unwrap()
        })
        .collect();

    // E = ½ Σ O², so dE/dO = O.
    let energy = |conv: &mut ConvLayer, input: Vec<Matrix>| -> (f64, Vec<Matrix>) {
        let out = conv.forward(Signal::Maps(input)).unwrap().into_maps("check").unwrap();
        let e = 0.5 * out.iter().map(|o| o.to_array().iter().map(|v| v * v).sum::<f64>()).sum::<f64>();
        (e, out)
    };

    let (_, out) = energy(&mut conv, input.clone());
    let back = conv.backward(Some(Signal::Maps(out))).unwrap();
    let d_input = back.input_grad.unwrap().into_maps("check").unwrap();

    for m in 0..2 {
        for c in 0..4 {
            for r in 0..3 {
                let mut plus = input.clone();
                plus[m].data[c][r] += H;
                let mut minus = input.clone();
                minus[m].data[c][r] -= H;
                let numeric = (energy(&mut conv, plus).0 - energy(&mut conv, minus).0) / (2.0 * H);
                assert_close(d_input[m].data[c][r], numeric, &format!("map {m} cell ({c}, {r})"));
            }
        }
    }
}

#[test]
fn test_backprop_through_time() {
    let recurrent = Matrix::from_array(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8], 4).unwrap();
    let mut recurrent = RecurrentLayer::with_weights(recurrent);
    recurrent.activator = ActivationFunction::Tanh;
    let dense = Matrix::from_2d_array(vec![vec![0.3], vec![0.5]]).unwrap();
    let mut model = Model::new(0.1, vec![
        Layer::input(2),
        recurrent.into(),
        Layer::Dense(DenseLayer::with_weights(dense)),
    ])
    .unwrap();

    let series = vec![
        Input::Flat(vec![0.5, 0.2]),
        Input::Flat(vec![0.1, 0.9]),
        Input::Flat(vec![0.4, 0.3]),
    ];
    let target = [0.0];
    let grads = model.back_prop_series(&series, &target).unwrap();
    assert!(matches!(grads[1], Some(ParamGrad::Weights(ref w)) if w.shape() == (4, 2)));

    check_model(&mut model, grads, |m| half_sse(&m.for_prop_series(&series).unwrap(), &target));
}

#[test]
fn test_backprop_through_time_with_leaky_relu() {
    let mut model = Model::new(0.1, vec![
        Layer::input(2),
        Layer::Recurrent(RecurrentLayer::with_weights(
            Matrix::from_array(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8], 4).unwrap(),
        )),
        Layer::Dense(DenseLayer::with_weights(Matrix::from_2d_array(vec![vec![0.3], vec![0.5]]).unwrap())),
    ])
    .unwrap();

    let series = vec![Input::Flat(vec![0.5, 0.2]), Input::Flat(vec![0.1, 0.9])];
    let target = [0.0];
    let grads = model.back_prop_series(&series, &target).unwrap();
    check_model(&mut model, grads, |m| half_sse(&m.for_prop_series(&series).unwrap(), &target));
}
