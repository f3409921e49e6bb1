use serde::{Serialize, Deserialize};
use std::f64::consts::E;
use std::fmt;
use std::str::FromStr;

use crate::error::NetError;

/// Slope applied to negative inputs by the leaky ReLU.
pub const LEAKY_SLOPE: f64 = 0.001;

pub fn leaky_relu(x: f64) -> f64 {
    if x < 0.0 { LEAKY_SLOPE * x } else { x }
}

/// The kink at 0 takes the leaky slope.
pub fn leaky_relu_grad(x: f64) -> f64 {
    if x <= 0.0 { LEAKY_SLOPE } else { 1.0 }
}

pub fn sigmoid(x: f64) -> f64 {
    let ex = E.powf(x);
    ex / (ex + 1.0)
}

pub fn sigmoid_grad(x: f64) -> f64 {
    let y = sigmoid(x);
    y * (1.0 - y)
}

pub fn tanh(x: f64) -> f64 {
    let ex = E.powf(x);
    let e_neg_x = 1.0 / ex;
    (ex - e_neg_x) / (ex + e_neg_x)
}

pub fn tanh_grad(x: f64) -> f64 {
    let t = tanh(x);
    1.0 - t * t
}

/// Element-wise activations a dense or recurrent layer may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[default]
    LeakyRelu,
    Sigmoid,
    Tanh,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::LeakyRelu => leaky_relu(x),
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::Tanh => tanh(x),
        }
    }

    pub fn derivative(&self, x: f64) -> f64 {
        (self.grad_func())(x)
    }

    /// The derivative paired with this activation.
    pub fn grad_func(&self) -> fn(f64) -> f64 {
        match self {
            ActivationFunction::LeakyRelu => leaky_relu_grad,
            ActivationFunction::Sigmoid => sigmoid_grad,
            ActivationFunction::Tanh => tanh_grad,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::LeakyRelu => "leaky_relu",
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Tanh => "tanh",
        }
    }
}

impl FromStr for ActivationFunction {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leaky_relu" | "relu" => Ok(ActivationFunction::LeakyRelu),
            "sigmoid" => Ok(ActivationFunction::Sigmoid),
            "tanh" => Ok(ActivationFunction::Tanh),
            other => Err(NetError::UnknownActivation(other.to_string())),
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks up the derivative of an activation given by name.
pub fn grad_func(name: &str) -> Result<fn(f64) -> f64, NetError> {
    Ok(name.parse::<ActivationFunction>()?.grad_func())
}
