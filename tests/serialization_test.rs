use approx::assert_relative_eq;
use scnn::layers::{DenseLayer, RecurrentLayer};
use scnn::{ActivationFunction, Input, Layer, Matrix, Model, NetError};

fn assert_same_outputs(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_relative_eq!(*x, *y, max_relative = 1e-12);
    }
}

#[test]
fn test_exact_text_layout() {
    let w = Matrix::from_2d_array(vec![vec![0.5], vec![-0.25]]).unwrap();
    let model = Model::new(0.1, vec![Layer::input(2), Layer::Dense(DenseLayer::with_weights(w))]).unwrap();
    assert_eq!(model.serialize().unwrap(), "0.1|<InLayer><2><1><0>/<NLayer><1>[[0.5],[-0.25]]");
}

#[test]
fn test_dense_round_trip() {
    let mut model = Model::new(0.05, vec![Layer::input(3), Layer::dense(4), Layer::dense(2)]).unwrap();
    let x = Input::Flat(vec![0.3, -0.7, 1.2]);
    let before = model.for_prop(&x).unwrap();

    let mut restored = Model::deserialize(&model.serialize().unwrap()).unwrap();
    assert_eq!(restored.learning_rate(), 0.05);
    assert_same_outputs(&before, &restored.for_prop(&x).unwrap());
}

#[test]
fn test_cnn_round_trip() {
    let mut model = Model::new(0.01, vec![
        Layer::input_maps(6, 6, 2),
        Layer::conv(3, 3),
        Layer::pool(2),
        Layer::flatten(),
        Layer::dense(2),
    ])
    .unwrap();
    let channel: Vec<f64> = (0..36).map(|v| (v as f64 * 0.37).sin()).collect();
    let x = Input::Channels(vec![channel.clone(), channel.iter().map(|v| v * 0.5).collect()]);
    let before = model.for_prop(&x).unwrap();

    let text = model.serialize().unwrap();
    assert!(text.contains("<InLayer><6><6><2>/<CLayer><3><3>[[["));
    assert!(text.contains("/<ALayer><2>/<FLayer>/<NLayer><2>[["));

    let mut restored = Model::deserialize(&text).unwrap();
    assert_same_outputs(&before, &restored.for_prop(&x).unwrap());
}

#[test]
fn test_rnn_round_trip_keeps_activation() {
    let mut model = Model::new(0.02, vec![
        Layer::input(2),
        Layer::Recurrent(RecurrentLayer::with_activation(3, ActivationFunction::Tanh)),
        Layer::Dense(DenseLayer::with_activation(1, ActivationFunction::Sigmoid)),
    ])
    .unwrap();
    let series = vec![Input::Flat(vec![0.1, 0.9]), Input::Flat(vec![-0.4, 0.2])];
    let before = model.for_prop_series(&series).unwrap();

    let text = model.serialize().unwrap();
    assert!(text.contains("<RLayer><3><tanh>[["));
    assert!(text.contains("<NLayer><1><sigmoid>[["));

    let mut restored = Model::deserialize(&text).unwrap();
    assert!(restored.is_recurrent());
    assert_same_outputs(&before, &restored.for_prop_series(&series).unwrap());
}

#[test]
fn test_unset_parameters_are_initialised_on_load() {
    let mut model = Model::deserialize("0.1|<InLayer><2><1><0>/<NLayer><3>null/<NLayer><1>null").unwrap();
    let out = model.for_prop(&Input::Flat(vec![1.0, 1.0])).unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn test_parse_errors() {
    let cases = [
        "<InLayer><2><1><0>/<NLayer><1>null",
        "fast|<InLayer><2><1><0>/<NLayer><1>null",
        "0.1|<Bogus><2>/<NLayer><1>null",
        "0.1|<InLayer><2><1><0>/<NLayer><1>",
        "0.1|<InLayer><two><1><0>/<NLayer><1>null",
        "0.1|<InLayer><2><1><0><7>/<NLayer><1>null",
        "0.1|<InLayer><2><1><0>/<NLayer<1>null",
    ];
    for text in cases {
        let err = Model::deserialize(text).unwrap_err();
        assert!(matches!(err, NetError::Parse(_)), "{text}: unexpected error {err}");
    }
}

#[test]
fn test_malformed_parameter_blob() {
    let err = Model::deserialize("0.1|<InLayer><2><1><0>/<NLayer><1>[[0.5],[0.5]").unwrap_err();
    assert!(matches!(err, NetError::Json(_)));
}

#[test]
fn test_unknown_activation_tag() {
    let err = Model::deserialize("0.1|<InLayer><2><1><0>/<NLayer><1><softmax>null").unwrap_err();
    assert!(matches!(err, NetError::UnknownActivation(_)));
}

#[test]
fn test_parameter_shape_must_match_chain() {
    let err = Model::deserialize("0.1|<InLayer><3><1><0>/<NLayer><1>[[0.5],[0.5]]").unwrap_err();
    assert!(matches!(err, NetError::DimensionMismatch { .. }));
}
