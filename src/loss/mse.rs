use crate::error::{NetError, Result};

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> Result<f64> {
        check_lengths(predicted, expected)?;
        if predicted.is_empty() {
            return Ok(0.0);
        }
        let n = predicted.len() as f64;
        Ok(predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n)
    }

    /// Per-output gradient: predicted - expected
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Result<Vec<f64>> {
        check_lengths(predicted, expected)?;
        Ok(predicted.iter().zip(expected.iter())
            .map(|(a, b)| a - b)
            .collect())
    }
}

fn check_lengths(predicted: &[f64], expected: &[f64]) -> Result<()> {
    if predicted.len() != expected.len() {
        return Err(NetError::lengths("output vs target", predicted.len(), expected.len()));
    }
    Ok(())
}
