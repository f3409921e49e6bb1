use crate::error::Result;
use crate::math::matrix::Matrix;

/// Plain gradient descent: `param += -learning_rate * grad`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one SGD update to a parameter matrix given its accumulated gradient.
    pub fn step(&self, param: &mut Matrix, grad: &Matrix) -> Result<()> {
        param.add(&grad.multiply(-self.learning_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_against_the_gradient() {
        let mut w = Matrix::from_array(&[1.0, 2.0], 1).unwrap();
        let g = Matrix::from_array(&[0.5, -1.0], 1).unwrap();
        Sgd::new(0.1).step(&mut w, &g).unwrap();
        assert_eq!(w.to_array(), vec![0.95, 2.1]);
    }

    #[test]
    fn mismatched_gradient_is_rejected() {
        let mut w = Matrix::zeros(2, 2);
        let g = Matrix::zeros(1, 2);
        assert!(Sgd::new(0.1).step(&mut w, &g).is_err());
    }
}
