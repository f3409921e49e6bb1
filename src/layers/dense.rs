use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::layers::{tags, Backward, ParamGrad, Shape, Signal};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

#[derive(Debug, Clone)]
struct DenseCache {
    input: Matrix,
    pre_neurons: Matrix, // S = W·I, needed for the activation derivative
}

/// Fully connected layer without bias: `O = act(W·I)`.
///
/// `W` has one column per input node and one row per output node.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub num_nodes: usize,
    pub activator: ActivationFunction,
    weights: Option<Matrix>,
    prev_nodes: Option<usize>,
    is_end: bool,
    dw: Option<Matrix>,
    cache: Option<DenseCache>,
}

impl DenseLayer {
    pub fn new(num_nodes: usize) -> DenseLayer {
        DenseLayer {
            num_nodes,
            activator: ActivationFunction::default(),
            weights: None,
            prev_nodes: None,
            is_end: false,
            dw: None,
            cache: None,
        }
    }

    pub fn with_activation(num_nodes: usize, activation: ActivationFunction) -> DenseLayer {
        DenseLayer { activator: activation, ..DenseLayer::new(num_nodes) }
    }

    /// Layer with preset weights of shape `(prev_nodes, weights.row)`.
    pub fn with_weights(weights: Matrix) -> DenseLayer {
        let num_nodes = weights.row;
        DenseLayer { weights: Some(weights), ..DenseLayer::new(num_nodes) }
    }

    pub fn weights(&self) -> Option<&Matrix> {
        self.weights.as_ref()
    }

    pub fn weights_mut(&mut self) -> Option<&mut Matrix> {
        self.weights.as_mut()
    }

    pub fn is_end(&self) -> bool {
        self.is_end
    }

    pub fn output_shape(&self) -> Option<Shape> {
        self.prev_nodes.map(|_| Shape::Vector { nodes: self.num_nodes })
    }

    pub fn link(&mut self, prev: Shape, is_end: bool) -> Result<()> {
        let Shape::Vector { nodes } = prev else {
            return Err(NetError::StructuralLink("NLayer needs a vector input".to_string()));
        };
        match self.weights.as_ref().map(Matrix::shape) {
            Some(shape) if shape != (nodes, self.num_nodes) => {
                return Err(NetError::shapes("NLayer weights", (nodes, self.num_nodes), shape));
            }
            Some(_) => {}
            None => self.weights = Some(he_initialization(nodes, self.num_nodes)),
        }
        self.prev_nodes = Some(nodes);
        self.is_end = is_end;
        Ok(())
    }

    fn linked(&self) -> Result<(usize, &Matrix)> {
        match (self.prev_nodes, self.weights.as_ref()) {
            (Some(n), Some(w)) => Ok((n, w)),
            _ => Err(NetError::StructuralLink("NLayer used before link".to_string())),
        }
    }

    pub fn forward(&mut self, input: Signal) -> Result<Signal> {
        let (prev_nodes, weights) = self.linked()?;
        let input = input.into_vector("NLayer forward")?;
        if input.shape() != (1, prev_nodes) {
            return Err(NetError::shapes("NLayer input", (1, prev_nodes), input.shape()));
        }
        let z = weights.dot(&input)?;
        let a = z.map(|x| self.activator.function(x));
        self.cache = Some(DenseCache { input, pre_neurons: z });
        Ok(Signal::Vector(a))
    }

    /// `upstream` is `dE/dO`: the network error for the terminal layer,
    /// otherwise the successor's input gradient.
    pub fn backward(&mut self, upstream: Option<Signal>) -> Result<Backward> {
        let upstream = upstream.ok_or_else(|| {
            NetError::MissingGradient(if self.is_end {
                "the terminal NLayer needs the network error".to_string()
            } else {
                "NLayer received no gradient from its successor".to_string()
            })
        })?;
        let (_, weights) = self.linked()?;
        let cache = self.cache.as_ref().ok_or(NetError::NoForwardPass("NLayer"))?;
        let d_out = upstream.into_vector("NLayer backward")?;

        let act_derivative = cache.pre_neurons.map(|x| self.activator.derivative(x));
        // δ = dE/dO ⊙ act'(S)
        let delta = d_out.hadamard(&act_derivative)?;

        let dw = delta.dot(&cache.input.transpose())?;
        let d_input = weights.transpose().dot(&delta)?;

        Ok(Backward {
            input_grad: Some(Signal::Vector(d_input)),
            param_grad: Some(ParamGrad::Weights(dw)),
        })
    }

    pub fn add_dp(&mut self, grad: ParamGrad) -> Result<()> {
        add_weight_grad(&mut self.dw, grad, "NLayer add_dp")
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
        tags::push_tag(&mut out, "NLayer");
        tags::push_tag(&mut out, self.num_nodes);
        if self.activator != ActivationFunction::default() {
            tags::push_tag(&mut out, self.activator);
        }
        tags::push_blob(&mut out, &self.weights)?;
        Ok(out)
    }

    pub(crate) fn from_tags(reader: &mut tags::TagReader<'_>) -> Result<DenseLayer> {
        let num_nodes = reader.number("node count")?;
        let activator = if reader.has_tag() { reader.tag()?.parse()? } else { ActivationFunction::default() };
        let weights: Option<Matrix> = reader.blob("weights")?;
        Ok(DenseLayer { activator, weights, ..DenseLayer::new(num_nodes) })
    }

    pub fn description(&self) -> String {
        match self.activator {
            ActivationFunction::LeakyRelu => format!("NLayer / numNodes: {}", self.num_nodes),
            other => format!("NLayer / numNodes: {} / activation: {}", self.num_nodes, other),
        }
    }
}

/// Uniform draw in `±sqrt(2 / fan_in)` where `fan_in` is the column count.
pub(crate) fn he_initialization(cols: usize, rows: usize) -> Matrix {
    let upper = (2.0 / cols as f64).sqrt();
    let mut w = Matrix::zeros(cols, rows);
    w.rand_uni(-upper, upper);
    w
}

/// Shared accumulator logic for the weight-matrix layers.
pub(crate) fn add_weight_grad(acc: &mut Option<Matrix>, grad: ParamGrad, op: &'static str) -> Result<()> {
    let ParamGrad::Weights(dw) = grad else {
        return Err(NetError::DimensionMismatch {
            op,
            expected: "a weight matrix".to_string(),
            actual: "a kernel grid".to_string(),
        });
    };
    match acc.as_mut() {
        Some(sum) => sum.add(&dw)?,
        None => *acc = Some(dw),
    }
    Ok(())
}
