use approx::assert_relative_eq;
use scnn::activation::activation::{self as act, grad_func, LEAKY_SLOPE};
use scnn::{ActivationFunction, NetError};

#[test]
fn test_leaky_relu() {
    assert_eq!(act::leaky_relu(2.0), 2.0);
    assert_relative_eq!(act::leaky_relu(-2.0), -2.0 * LEAKY_SLOPE);
    assert_eq!(act::leaky_relu_grad(3.0), 1.0);
    assert_eq!(act::leaky_relu_grad(0.0), LEAKY_SLOPE);
    assert_eq!(act::leaky_relu_grad(-1.0), LEAKY_SLOPE);
}

#[test]
fn test_sigmoid_and_tanh_match_std() {
    for &x in &[-3.0, -0.5, 0.0, 0.7, 2.5] {
        assert_relative_eq!(act::sigmoid(x), 1.0 / (1.0 + (-x as f64).exp()), epsilon = 1e-12);
        assert_relative_eq!(act::tanh(x), f64::tanh(x), epsilon = 1e-12);
    }
    assert_relative_eq!(act::sigmoid_grad(0.0), 0.25);
    assert_relative_eq!(act::tanh_grad(0.0), 1.0);
}

#[test]
fn test_derivatives_match_finite_differences() {
    let h = 1e-6;
    for f in [ActivationFunction::Sigmoid, ActivationFunction::Tanh, ActivationFunction::LeakyRelu] {
        for &x in &[-1.3, 0.4, 1.7] {
            let numeric = (f.function(x + h) - f.function(x - h)) / (2.0 * h);
            assert_relative_eq!(f.derivative(x), numeric, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_grad_func_lookup() {
    assert_relative_eq!(grad_func("sigmoid").unwrap()(0.0), 0.25);
    assert_eq!(grad_func("relu").unwrap()(1.0), 1.0);
    assert!(matches!(grad_func("softmax"), Err(NetError::UnknownActivation(_))));
}

#[test]
fn test_names_round_trip() {
    for f in [ActivationFunction::LeakyRelu, ActivationFunction::Sigmoid, ActivationFunction::Tanh] {
        assert_eq!(f.to_string().parse::<ActivationFunction>().unwrap(), f);
    }
    assert_eq!(ActivationFunction::default(), ActivationFunction::LeakyRelu);
}
