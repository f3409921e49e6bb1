use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::loss::mse::MseLoss;

/// Selects the error function a model trains against.
///
/// - `Mse` — mean-squared error; its gradient `output - target` seeds the
///   terminal layer's backward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Mse,
}

impl LossType {
    pub fn loss(&self, predicted: &[f64], expected: &[f64]) -> Result<f64> {
        match self {
            LossType::Mse => MseLoss::loss(predicted, expected),
        }
    }

    pub fn derivative(&self, predicted: &[f64], expected: &[f64]) -> Result<Vec<f64>> {
        match self {
            LossType::Mse => MseLoss::derivative(predicted, expected),
        }
    }
}
