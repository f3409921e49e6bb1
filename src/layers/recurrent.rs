use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::layers::dense::{add_weight_grad, he_initialization};
use crate::layers::{tags, Backward, ParamGrad, Shape, Signal};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// One recorded forward step of a recurrent layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStep {
    /// External input followed by the previous step's output.
    pub input: Matrix,
    pub pre_activation: Matrix,
    pub output: Matrix,
}

/// Elman-style recurrent layer: `O_t = act(W · (I_t ++ O_{t-1}))`.
///
/// Every forward call appends a [`TimeStep`]; the history only shrinks on
/// [`RecurrentLayer::reset_memory`]. Backward unrolls the whole history.
#[derive(Debug, Clone)]
pub struct RecurrentLayer {
    pub num_nodes: usize,
    pub activator: ActivationFunction,
    weights: Option<Matrix>,
    prev_nodes: Option<usize>,
    is_end: bool,
    dw: Option<Matrix>,
    history: Vec<TimeStep>,
}

impl RecurrentLayer {
    pub fn new(num_nodes: usize) -> RecurrentLayer {
        RecurrentLayer {
            num_nodes,
            activator: ActivationFunction::default(),
            weights: None,
            prev_nodes: None,
            is_end: false,
            dw: None,
            history: Vec::new(),
        }
    }

    pub fn with_activation(num_nodes: usize, activation: ActivationFunction) -> RecurrentLayer {
        RecurrentLayer { activator: activation, ..RecurrentLayer::new(num_nodes) }
    }

    /// Layer with preset combined weights of shape `(prev_nodes + n, n)`.
    pub fn with_weights(weights: Matrix) -> RecurrentLayer {
        let num_nodes = weights.row;
        RecurrentLayer { weights: Some(weights), ..RecurrentLayer::new(num_nodes) }
    }

    pub fn weights(&self) -> Option<&Matrix> {
        self.weights.as_ref()
    }

    pub fn weights_mut(&mut self) -> Option<&mut Matrix> {
        self.weights.as_mut()
    }

    /// Columns of `W` that read the external input.
    pub fn input_weights(&self) -> Option<Matrix> {
        let prev = self.prev_nodes?;
        let w = self.weights.as_ref()?;
        Some(column_range(w, 0, prev))
    }

    /// Columns of `W` that read the previous step's output.
    pub fn recurrent_weights(&self) -> Option<Matrix> {
        let prev = self.prev_nodes?;
        let w = self.weights.as_ref()?;
        Some(column_range(w, prev, w.col))
    }

    pub fn history(&self) -> &[TimeStep] {
        &self.history
    }

    pub fn step_count(&self) -> usize {
        self.history.len()
    }

    pub fn reset_memory(&mut self) {
        self.history.clear();
    }

    pub fn output_shape(&self) -> Option<Shape> {
        self.prev_nodes.map(|_| Shape::Vector { nodes: self.num_nodes })
    }

    pub fn link(&mut self, prev: Shape, is_end: bool) -> Result<()> {
        let Shape::Vector { nodes } = prev else {
            return Err(NetError::StructuralLink("RLayer needs a vector input".to_string()));
        };
        let expected = (nodes + self.num_nodes, self.num_nodes);
        match self.weights.as_ref().map(Matrix::shape) {
            Some(shape) if shape != expected => {
                return Err(NetError::shapes("RLayer weights", expected, shape));
            }
            Some(_) => {}
            None => self.weights = Some(he_initialization(expected.0, expected.1)),
        }
        self.prev_nodes = Some(nodes);
        self.is_end = is_end;
        self.history.clear();
        Ok(())
    }

    fn linked(&self) -> Result<(usize, &Matrix)> {
        match (self.prev_nodes, self.weights.as_ref()) {
            (Some(n), Some(w)) => Ok((n, w)),
            _ => Err(NetError::StructuralLink("RLayer used before link".to_string())),
        }
    }

    pub fn forward(&mut self, input: Signal) -> Result<Signal> {
        let (prev_nodes, weights) = self.linked()?;
        let external = input.into_vector("RLayer forward")?;
        if external.shape() != (1, prev_nodes) {
            return Err(NetError::shapes("RLayer input", (1, prev_nodes), external.shape()));
        }

        let feedback = match self.history.last() {
            Some(step) => step.output.clone(),
            None => Matrix::zeros(1, self.num_nodes),
        };
        let combined = Matrix::concat_vectors(&external, &feedback)?;
        let s = weights.dot(&combined)?;
        let o = s.map(|x| self.activator.function(x));

        self.history.push(TimeStep { input: combined, pre_activation: s, output: o.clone() });
        Ok(Signal::Vector(o))
    }

    /// Backpropagation through time over every recorded step.
    ///
    /// `upstream` is the gradient of the final step's output. The returned
    /// weight gradient sums all steps; the input gradient is the external part
    /// of the combined input gradient summed over all steps.
    pub fn backward(&mut self, upstream: Option<Signal>) -> Result<Backward> {
        let upstream = upstream.ok_or_else(|| {
            NetError::MissingGradient(if self.is_end {
                "the terminal RLayer needs the network error".to_string()
            } else {
                "RLayer received no gradient from its successor".to_string()
            })
        })?;
        if self.history.is_empty() {
            return Err(NetError::MissingGradient("RLayer has no recorded time step".to_string()));
        }
        let (prev_nodes, weights) = self.linked()?;
        let w_t = weights.transpose();
        let total = prev_nodes + self.num_nodes;

        let mut d_out = upstream.into_vector("RLayer backward")?;
        let mut dw = Matrix::zeros(weights.col, weights.row);
        let mut d_combined = Matrix::zeros(1, total);

        for step in self.history.iter().rev() {
            let act_derivative = step.pre_activation.map(|x| self.activator.derivative(x));
            let ds = d_out.hadamard(&act_derivative)?;
            dw.add(&ds.dot(&step.input.transpose())?)?;

            let di = w_t.dot(&ds)?;
            d_combined.add(&di)?;
            d_out = di.slice_vector(prev_nodes, total)?;
        }

        Ok(Backward {
            input_grad: Some(Signal::Vector(d_combined.slice_vector(0, prev_nodes)?)),
            param_grad: Some(ParamGrad::Weights(dw)),
        })
    }

    pub fn add_dp(&mut self, grad: ParamGrad) -> Result<()> {
        add_weight_grad(&mut self.dw, grad, "RLayer add_dp")
    }

    pub fn clear_dp(&mut self) {
        self.dw = None;
    }

    pub fn update_parameters(&mut self, optimizer: &Sgd) -> Result<()> {
        if let (Some(dw), Some(w)) = (self.dw.take(), self.weights.as_mut()) {
            optimizer.step(w, &dw)?;
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<String> {
        let mut out = String::new();
        tags::push_tag(&mut out, "RLayer");
        tags::push_tag(&mut out, self.num_nodes);
        if self.activator != ActivationFunction::default() {
            tags::push_tag(&mut out, self.activator);
        }
        tags::push_blob(&mut out, &self.weights)?;
        Ok(out)
    }

    pub(crate) fn from_tags(reader: &mut tags::TagReader<'_>) -> Result<RecurrentLayer> {
        let num_nodes = reader.number("node count")?;
        let activator = if reader.has_tag() { reader.tag()?.parse()? } else { ActivationFunction::default() };
        let weights: Option<Matrix> = reader.blob("weights")?;
        Ok(RecurrentLayer { activator, weights, ..RecurrentLayer::new(num_nodes) })
    }

    pub fn description(&self) -> String {
        match self.activator {
            ActivationFunction::LeakyRelu => format!("RLayer / numNodes: {}", self.num_nodes),
            other => format!("RLayer / numNodes: {} / activation: {}", self.num_nodes, other),
        }
    }
}

fn column_range(m: &Matrix, from: usize, to: usize) -> Matrix {
    Matrix {
        col: to - from,
        row: m.row,
        data: m.data[from..to].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(prev: usize, n: usize) -> RecurrentLayer {
        let mut layer = RecurrentLayer::new(n);
        layer.link(Shape::Vector { nodes: prev }, true).unwrap();
        layer
    }

    #[test]
    fn weight_views_split_the_columns() {
        let layer = linked(3, 2);
        let w = layer.weights().unwrap();
        assert_eq!(w.shape(), (5, 2));
        let wi = layer.input_weights().unwrap();
        let wr = layer.recurrent_weights().unwrap();
        assert_eq!(wi.shape(), (3, 2));
        assert_eq!(wr.shape(), (2, 2));
        assert_eq!(wi.data[0], w.data[0]);
        assert_eq!(wr.data[1], w.data[4]);
    }

    #[test]
    fn first_step_feeds_back_zeros() {
        let mut layer = linked(1, 2);
        let x = Matrix::from_array(&[1.0], 1).unwrap();
        layer.forward(Signal::Vector(x)).unwrap();
        assert_eq!(layer.history()[0].input.to_array(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn backward_needs_history() {
        let mut layer = linked(1, 1);
        let grad = Signal::Vector(Matrix::from_array(&[1.0], 1).unwrap());
        assert!(matches!(layer.backward(Some(grad)), Err(NetError::MissingGradient(_))));
    }
}
