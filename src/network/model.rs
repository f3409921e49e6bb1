use std::cmp::Ordering;

use crate::error::{NetError, Result};
use crate::layers::{check_link, Input, Layer, LayerKind, ParamGrad, ParamsMut, Shape, Signal};
use crate::loss::loss_type::LossType;
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// One training or test example.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// A single input; on a recurrent model it is a one-step series.
    Single(Input),
    /// Ordered time steps for a many-to-one recurrent model.
    Series(Vec<Input>),
}

impl From<Input> for Sample {
    fn from(input: Input) -> Self {
        Sample::Single(input)
    }
}

impl From<Vec<f64>> for Sample {
    fn from(values: Vec<f64>) -> Self {
        Sample::Single(Input::Flat(values))
    }
}

impl From<Vec<Input>> for Sample {
    fn from(steps: Vec<Input>) -> Self {
        Sample::Series(steps)
    }
}

/// Outcome of [`Model::test`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestReport {
    pub test_samples: usize,
    pub correct_count: usize,
}

impl TestReport {
    /// Fraction of correct samples in [0, 1]; 0 for an empty test set.
    pub fn accuracy(&self) -> f64 {
        if self.test_samples == 0 {
            return 0.0;
        }
        self.correct_count as f64 / self.test_samples as f64
    }
}

/// An ordered chain of linked layers plus the optimizer that trains it.
///
/// The first layer is always an [`InputLayer`](crate::layers::InputLayer), the
/// last a dense or recurrent layer. The structure is fixed at construction;
/// only parameters change afterwards.
#[derive(Debug, Clone)]
pub struct Model {
    layers: Vec<Layer>,
    optimizer: Sgd,
    loss: LossType,
    is_rnn: bool,
}

impl Model {
    /// Links `layers` in order and validates every adjacency.
    ///
    /// Layers that already carry parameters (deserialized or built with
    /// preset weights) keep them; their shapes are checked against the chain.
    pub fn new(learning_rate: f64, mut layers: Vec<Layer>) -> Result<Model> {
        if !learning_rate.is_finite() {
            return Err(NetError::InvalidConfig(format!("learning rate {learning_rate} is not finite")));
        }
        if layers.len() < 2 {
            return Err(NetError::StructuralLink(format!(
                "a model needs at least two layers, got {}",
                layers.len()
            )));
        }

        let count = layers.len();
        for i in 0..count {
            let prev = match i {
                0 => None,
                _ => {
                    let p = &layers[i - 1];
                    let shape = p.output_shape().ok_or_else(|| {
                        NetError::StructuralLink(format!("{} at position {} is not linked", p.kind(), i - 1))
                    })?;
                    Some((p.kind(), shape))
                }
            };
            let next = layers.get(i + 1).map(Layer::kind);
            check_link(prev, layers[i].kind(), next)?;
            layers[i].link(prev.map(|(_, shape)| shape), i + 1 == count)?;
        }

        let is_rnn = layers.iter().any(|l| l.kind() == LayerKind::Recurrent);
        let model = Model {
            layers,
            optimizer: Sgd::new(learning_rate),
            loss: LossType::default(),
            is_rnn,
        };
        log::debug!("model linked (recurrent: {})\n{}", is_rnn, model.structure_description());
        Ok(model)
    }

    pub fn with_loss(mut self, loss: LossType) -> Model {
        self.loss = loss;
        self
    }

    pub fn is_recurrent(&self) -> bool {
        self.is_rnn
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate
    }

    pub fn loss(&self) -> LossType {
        self.loss
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Parameters of the layer at `index`, for overwriting them in place.
    /// Layers themselves cannot be replaced once the chain is linked.
    pub fn parameters_mut(&mut self, index: usize) -> Option<ParamsMut<'_>> {
        self.layers.get_mut(index)?.parameters_mut()
    }

    fn output_nodes(&self) -> Result<usize> {
        match self.layers.last().and_then(Layer::output_shape) {
            Some(Shape::Vector { nodes }) => Ok(nodes),
            _ => Err(NetError::StructuralLink("the last layer has no vector output".to_string())),
        }
    }

    fn require_rnn(&self, op: &str) -> Result<()> {
        if self.is_rnn {
            Ok(())
        } else {
            Err(NetError::Mode(format!("only recurrent models support {op}")))
        }
    }

    /// Clears every recurrent layer's history.
    pub fn reset_memory(&mut self) -> Result<()> {
        self.require_rnn("reset_memory")?;
        self.layers.iter_mut().for_each(Layer::reset_memory);
        Ok(())
    }

    /// Feeds one input through the chain and returns the terminal output.
    ///
    /// On a recurrent model this appends one time step without resetting.
    pub fn for_prop(&mut self, input: &Input) -> Result<Vec<f64>> {
        let (first, rest) = self.layers
            .split_first_mut()
            .ok_or_else(|| NetError::StructuralLink("model has no layers".to_string()))?;
        let Layer::Input(input_layer) = first else {
            return Err(NetError::StructuralLink("the first layer must be an InLayer".to_string()));
        };

        let mut signal = input_layer.forward(input)?;
        for layer in rest.iter_mut() {
            signal = layer.forward(signal)?;
        }
        Ok(signal.into_vector("model output")?.to_array())
    }

    /// Resets memory, feeds every step in order and returns the final output.
    pub fn for_prop_series(&mut self, inputs: &[Input]) -> Result<Vec<f64>> {
        self.require_rnn("for_prop_series")?;
        if inputs.is_empty() {
            return Err(NetError::InvalidConfig("a series needs at least one step".to_string()));
        }
        self.reset_memory()?;
        let mut output = Vec::new();
        for input in inputs {
            output = self.for_prop(input)?;
        }
        Ok(output)
    }

    /// Gradients of every layer for one example, aligned with [`Model::layers`].
    /// `None` marks a layer without parameters.
    pub fn back_prop(&mut self, input: &Input, target: &[f64]) -> Result<Vec<Option<ParamGrad>>> {
        let output = self.for_prop(input)?;
        let (_, grads) = self.backward(&output, target)?;
        Ok(grads)
    }

    /// Many-to-one backpropagation through time over `inputs`.
    pub fn back_prop_series(&mut self, inputs: &[Input], target: &[f64]) -> Result<Vec<Option<ParamGrad>>> {
        let output = self.for_prop_series(inputs)?;
        let (_, grads) = self.backward(&output, target)?;
        Ok(grads)
    }

    fn backward(&mut self, output: &[f64], target: &[f64]) -> Result<(f64, Vec<Option<ParamGrad>>)> {
        log::trace!("target: {:?}", target);
        log::trace!("output: {:?}", output);

        let loss = self.loss.loss(output, target)?;
        let error = self.loss.derivative(output, target)?;

        let mut upstream = Some(Signal::Vector(Matrix::from_array(&error, 1)?));
        let mut grads = Vec::with_capacity(self.layers.len());
        for layer in self.layers.iter_mut().rev() {
            let step = layer.backward(upstream.take())?;
            grads.push(step.param_grad);
            upstream = step.input_grad;
        }
        grads.reverse();
        Ok((loss, grads))
    }

    /// Output for one sample, dispatching on the model's mode.
    pub fn predict(&mut self, sample: &Sample) -> Result<Vec<f64>> {
        match (sample, self.is_rnn) {
            (Sample::Single(input), false) => self.for_prop(input),
            (Sample::Single(input), true) => self.for_prop_series(std::slice::from_ref(input)),
            (Sample::Series(steps), true) => self.for_prop_series(steps),
            (Sample::Series(_), false) => {
                Err(NetError::Mode("series samples need a recurrent model".to_string()))
            }
        }
    }

    fn sample_gradients(&mut self, sample: &Sample, target: &[f64]) -> Result<(f64, Vec<Option<ParamGrad>>)> {
        let output = self.predict(sample)?;
        self.backward(&output, target)
    }

    /// One pass over the data in order, updating parameters after every
    /// `batch_size` samples and once more for a trailing partial batch.
    /// Returns the mean loss over the pass.
    ///
    /// Target lengths are checked before any update. If a sample fails
    /// mid-pass the pending batch is discarded; earlier batches stay applied.
    pub fn train(&mut self, samples: &[Sample], targets: &[Vec<f64>], batch_size: usize) -> Result<f64> {
        let order: Vec<usize> = (0..samples.len()).collect();
        self.train_order(samples, targets, &order, batch_size)
    }

    /// [`Model::train`] visiting the samples in `order`.
    pub(crate) fn train_order(
        &mut self,
        samples: &[Sample],
        targets: &[Vec<f64>],
        order: &[usize],
        batch_size: usize,
    ) -> Result<f64> {
        if batch_size == 0 {
            return Err(NetError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if samples.len() != targets.len() {
            return Err(NetError::InvalidConfig(format!(
                "{} samples but {} targets",
                samples.len(),
                targets.len()
            )));
        }
        let nodes = self.output_nodes()?;
        if let Some(target) = order.iter().map(|&idx| &targets[idx]).find(|t| t.len() != nodes) {
            return Err(NetError::lengths("train target", nodes, target.len()));
        }
        if order.is_empty() {
            return Ok(0.0);
        }

        let result = self.train_batches(samples, targets, order, batch_size);
        if result.is_err() {
            self.layers.iter_mut().for_each(Layer::clear_dp);
        }
        result
    }

    fn train_batches(
        &mut self,
        samples: &[Sample],
        targets: &[Vec<f64>],
        order: &[usize],
        batch_size: usize,
    ) -> Result<f64> {
        let mut total_loss = 0.0;
        for (i, &idx) in order.iter().enumerate() {
            let (loss, grads) = self.sample_gradients(&samples[idx], &targets[idx])?;
            total_loss += loss;
            for (layer, grad) in self.layers.iter_mut().zip(grads) {
                if let Some(grad) = grad {
                    layer.add_dp(grad)?;
                }
            }

            if (i + 1) % batch_size == 0 || i + 1 == order.len() {
                self.update_parameters()?;
            }
        }
        Ok(total_loss / order.len() as f64)
    }

    /// Counts samples whose top-k outputs all land on target 1s.
    pub fn test(&mut self, samples: &[Sample], targets: &[Vec<f64>]) -> Result<TestReport> {
        if samples.len() != targets.len() {
            return Err(NetError::InvalidConfig(format!(
                "{} samples but {} targets",
                samples.len(),
                targets.len()
            )));
        }
        let mut report = TestReport { test_samples: samples.len(), correct_count: 0 };
        for (sample, target) in samples.iter().zip(targets) {
            let output = self.predict(sample)?;
            if output.len() != target.len() {
                return Err(NetError::lengths("output vs target", output.len(), target.len()));
            }
            if top_k_match(&output, target) {
                report.correct_count += 1;
            }
        }
        Ok(report)
    }

    /// Applies and clears every layer's accumulated gradient.
    pub fn update_parameters(&mut self) -> Result<()> {
        let optimizer = self.optimizer;
        for layer in self.layers.iter_mut() {
            layer.update_parameters(&optimizer)?;
        }
        Ok(())
    }

    /// `<learningRate>|<layer0>/<layer1>/...`
    pub fn serialize(&self) -> Result<String> {
        let layers = self.layers
            .iter()
            .map(Layer::serialize)
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{}|{}", self.optimizer.learning_rate, layers.join("/")))
    }

    /// Rebuilds a model from [`Model::serialize`] output, keeping its parameters.
    pub fn deserialize(text: &str) -> Result<Model> {
        let (rate, body) = text
            .trim()
            .split_once('|')
            .ok_or_else(|| NetError::Parse("missing `|` after the learning rate".to_string()))?;
        let learning_rate: f64 = rate
            .trim()
            .parse()
            .map_err(|_| NetError::Parse(format!("`{rate}` is not a valid learning rate")))?;
        let layers = body
            .split('/')
            .map(Layer::deserialize)
            .collect::<Result<Vec<_>>>()?;
        Model::new(learning_rate, layers)
    }

    pub fn structure_description(&self) -> String {
        let rule = "========================================\n";
        let mut out = String::from(rule);
        out.push_str("Structure:\n");
        for layer in &self.layers {
            out.push('\t');
            out.push_str(&layer.description());
            out.push('\n');
        }
        out.push_str(rule);
        out
    }
}

/// True when the indices of the `k` largest outputs all hold a 1 in `target`,
/// where `k` is the number of exact 1s in `target`. Ties keep index order.
pub fn top_k_match(output: &[f64], target: &[f64]) -> bool {
    let k = target.iter().filter(|&&t| t == 1.0).count();
    let mut ranked: Vec<usize> = (0..output.len()).collect();
    ranked.sort_by(|&a, &b| output[b].partial_cmp(&output[a]).unwrap_or(Ordering::Equal));
    ranked
        .iter()
        .take(k)
        .all(|&i| target.get(i).is_some_and(|&t| t == 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_needs_every_hot_index() {
        assert!(top_k_match(&[0.9, 0.05, 0.05], &[1.0, 0.0, 0.0]));
        assert!(!top_k_match(&[0.1, 0.8, 0.1], &[1.0, 0.0, 0.0]));
        assert!(top_k_match(&[0.4, 0.1, 0.5], &[1.0, 0.0, 1.0]));
        assert!(!top_k_match(&[0.4, 0.5, 0.1], &[1.0, 0.0, 1.0]));
    }

    #[test]
    fn no_hot_target_counts_as_correct() {
        assert!(top_k_match(&[0.3, 0.7], &[0.0, 0.0]));
    }

    #[test]
    fn single_layer_model_is_rejected() {
        let err = Model::new(0.1, vec![Layer::input(2)]).unwrap_err();
        assert!(matches!(err, NetError::StructuralLink(_)));
    }
}
