//! The six layer kinds and the data that flows between them.
//!
//! A model is a chain `InLayer -> ... -> NLayer | RLayer`. Forward passes hand
//! each layer its predecessor's output as a [`Signal`]; backward passes hand it
//! its successor's input gradient, also as a [`Signal`].

pub mod input;
pub mod conv;
pub mod pool;
pub mod flatten;
pub mod dense;
pub mod recurrent;
pub(crate) mod tags;

use std::fmt;

use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

pub use conv::ConvLayer;
pub use dense::DenseLayer;
pub use flatten::FlattenLayer;
pub use input::{Input, InputLayer};
pub use pool::PoolLayer;
pub use recurrent::{RecurrentLayer, TimeStep};

/// Values (or gradients) passed between two neighbouring layers.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A single column vector, `col == 1`.
    Vector(Matrix),
    /// One matrix per feature map, each `width x height`.
    Maps(Vec<Matrix>),
}

impl Signal {
    pub fn into_vector(self, op: &'static str) -> Result<Matrix> {
        match self {
            Signal::Vector(v) => Ok(v),
            Signal::Maps(maps) => Err(NetError::DimensionMismatch {
                op,
                expected: "a vector".to_string(),
                actual: format!("{} maps", maps.len()),
            }),
        }
    }

    pub fn into_maps(self, op: &'static str) -> Result<Vec<Matrix>> {
        match self {
            Signal::Maps(maps) => Ok(maps),
            Signal::Vector(v) => Err(NetError::DimensionMismatch {
                op,
                expected: "feature maps".to_string(),
                actual: format!("a vector of {}", v.row),
            }),
        }
    }
}

/// Parameter gradient returned by a layer's backward step.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamGrad {
    /// `[input map][output map]` grid of kernel gradients.
    Kernels(Vec<Vec<Matrix>>),
    Weights(Matrix),
}

/// Borrowed parameters of one layer, shaped like [`ParamGrad`].
#[derive(Debug)]
pub enum ParamsMut<'a> {
    Kernels(&'a mut Vec<Vec<Matrix>>),
    Weights(&'a mut Matrix),
}

/// What a backward step hands back to the model.
#[derive(Debug, Clone, Default)]
pub struct Backward {
    /// Gradient with respect to this layer's input; `None` only for the input layer.
    pub input_grad: Option<Signal>,
    pub param_grad: Option<ParamGrad>,
}

/// Output shape of a linked layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Vector { nodes: usize },
    Maps { num_maps: usize, height: usize, width: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Input,
    Conv,
    Pool,
    Flatten,
    Dense,
    Recurrent,
}

impl LayerKind {
    /// Tag used in the serialized form.
    pub fn tag(&self) -> &'static str {
        match self {
            LayerKind::Input => "InLayer",
            LayerKind::Conv => "CLayer",
            LayerKind::Pool => "ALayer",
            LayerKind::Flatten => "FLayer",
            LayerKind::Dense => "NLayer",
            LayerKind::Recurrent => "RLayer",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Rejects illegal adjacencies before a layer is linked.
///
/// `prev` is the predecessor's kind and output shape, `next` the successor's
/// kind; both are `None` at the ends of the chain.
pub fn check_link(
    prev: Option<(LayerKind, Shape)>,
    kind: LayerKind,
    next: Option<LayerKind>,
) -> Result<()> {
    use LayerKind as K;

    let structural = |msg: &str| -> Result<()> { Err(NetError::StructuralLink(msg.to_string())) };

    match (prev, kind) {
        (None, K::Input) => {}
        (None, _) => return structural("the first layer must be an InLayer"),
        (Some(_), K::Input) => return structural("an InLayer can only start a model"),

        (Some((_, Shape::Vector { .. })), K::Conv | K::Pool) => {
            return structural("CLayer and ALayer need feature maps; they cannot follow a vector layer")
        }

        (Some((K::Dense | K::Recurrent | K::Flatten, _)), K::Flatten) => {
            return structural("FLayer must not be linked after NLayer, RLayer or FLayer")
        }
        (Some((_, Shape::Vector { .. })), K::Flatten) => {
            return structural("FLayer has nothing to flatten after a vector InLayer")
        }

        (Some((K::Conv | K::Pool, _)), K::Dense | K::Recurrent) => {
            return structural("CLayer or ALayer must not be linked before NLayer or RLayer; insert an FLayer")
        }
        (Some((K::Input, Shape::Maps { .. })), K::Dense | K::Recurrent) => {
            return structural(
                "feature maps must be flattened before NLayer or RLayer; insert an FLayer after the InLayer",
            )
        }

        _ => {}
    }

    match (kind, next) {
        (K::Flatten, Some(K::Dense | K::Recurrent)) => Ok(()),
        (K::Flatten, _) => structural("FLayer must be followed by an NLayer or RLayer"),
        (K::Dense | K::Recurrent, None) => Ok(()),
        (_, None) => structural("the last layer must be an NLayer or RLayer"),
        _ => Ok(()),
    }
}

/// Closed set of layer kinds a model can chain.
#[derive(Debug, Clone)]
pub enum Layer {
    Input(InputLayer),
    Conv(ConvLayer),
    Pool(PoolLayer),
    Flatten(FlattenLayer),
    Dense(DenseLayer),
    Recurrent(RecurrentLayer),
}

impl Layer {
    /// Vector input of `num_nodes` values.
    pub fn input(num_nodes: usize) -> Layer {
        Layer::Input(InputLayer::new(num_nodes))
    }

    pub fn input_maps(height: usize, width: usize, num_maps: usize) -> Layer {
        Layer::Input(InputLayer::maps(height, width, num_maps))
    }

    pub fn conv(kernel_size: usize, num_maps: usize) -> Layer {
        Layer::Conv(ConvLayer::new(kernel_size, num_maps))
    }

    pub fn pool(kernel_size: usize) -> Layer {
        Layer::Pool(PoolLayer::new(kernel_size))
    }

    pub fn flatten() -> Layer {
        Layer::Flatten(FlattenLayer::new())
    }

    pub fn dense(num_nodes: usize) -> Layer {
        Layer::Dense(DenseLayer::new(num_nodes))
    }

    pub fn recurrent(num_nodes: usize) -> Layer {
        Layer::Recurrent(RecurrentLayer::new(num_nodes))
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Input(_) => LayerKind::Input,
            Layer::Conv(_) => LayerKind::Conv,
            Layer::Pool(_) => LayerKind::Pool,
            Layer::Flatten(_) => LayerKind::Flatten,
            Layer::Dense(_) => LayerKind::Dense,
            Layer::Recurrent(_) => LayerKind::Recurrent,
        }
    }

    /// Output shape; `None` until the layer has been linked.
    pub fn output_shape(&self) -> Option<Shape> {
        match self {
            Layer::Input(l) => Some(l.shape()),
            Layer::Conv(l) => l.output_shape(),
            Layer::Pool(l) => l.output_shape(),
            Layer::Flatten(l) => l.output_shape(),
            Layer::Dense(l) => l.output_shape(),
            Layer::Recurrent(l) => l.output_shape(),
        }
    }

    /// Records the predecessor's shape and initialises missing parameters.
    pub fn link(&mut self, prev: Option<Shape>, is_end: bool) -> Result<()> {
        let prev_shape = |kind: LayerKind| {
            prev.ok_or_else(|| NetError::StructuralLink(format!("{kind} needs a predecessor")))
        };
        match self {
            Layer::Input(_) => Ok(()),
            Layer::Conv(l) => l.link(prev_shape(LayerKind::Conv)?),
            Layer::Pool(l) => l.link(prev_shape(LayerKind::Pool)?),
            Layer::Flatten(l) => l.link(prev_shape(LayerKind::Flatten)?),
            Layer::Dense(l) => l.link(prev_shape(LayerKind::Dense)?, is_end),
            Layer::Recurrent(l) => l.link(prev_shape(LayerKind::Recurrent)?, is_end),
        }
    }

    /// Forward step for every layer but the input layer, which is fed
    /// through [`InputLayer::forward`].
    pub fn forward(&mut self, input: Signal) -> Result<Signal> {
        match self {
            Layer::Input(_) => Err(NetError::StructuralLink(
                "an InLayer is fed raw input, not a predecessor's output".to_string(),
            )),
            Layer::Conv(l) => l.forward(input),
            Layer::Pool(l) => l.forward(input),
            Layer::Flatten(l) => l.forward(input),
            Layer::Dense(l) => l.forward(input),
            Layer::Recurrent(l) => l.forward(input),
        }
    }

    /// Backward step. `upstream` is the successor's input gradient, or the
    /// network error for the terminal layer.
    pub fn backward(&mut self, upstream: Option<Signal>) -> Result<Backward> {
        match self {
            Layer::Input(l) => Ok(l.backward()),
            Layer::Conv(l) => l.backward(upstream),
            Layer::Pool(l) => l.backward(upstream),
            Layer::Flatten(l) => l.backward(upstream),
            Layer::Dense(l) => l.backward(upstream),
            Layer::Recurrent(l) => l.backward(upstream),
        }
    }

    /// Adds a parameter gradient to this layer's batch accumulator.
    pub fn add_dp(&mut self, grad: ParamGrad) -> Result<()> {
        match self {
            Layer::Conv(l) => l.add_dp(grad),
            Layer::Dense(l) => l.add_dp(grad),
            Layer::Recurrent(l) => l.add_dp(grad),
            Layer::Input(_) | Layer::Pool(_) | Layer::Flatten(_) => Ok(()),
        }
    }

    /// Drops the accumulated parameter gradient without applying it.
    pub fn clear_dp(&mut self) {
        match self {
            Layer::Conv(l) => l.clear_dp(),
            Layer::Dense(l) => l.clear_dp(),
            Layer::Recurrent(l) => l.clear_dp(),
            Layer::Input(_) | Layer::Pool(_) | Layer::Flatten(_) => {}
        }
    }

    /// Mutable view of this layer's parameters, `None` for parameter-free layers
    /// and for layers not yet initialised.
    pub fn parameters_mut(&mut self) -> Option<ParamsMut<'_>> {
        match self {
            Layer::Conv(l) => l.kernels_mut().map(ParamsMut::Kernels),
            Layer::Dense(l) => l.weights_mut().map(ParamsMut::Weights),
            Layer::Recurrent(l) => l.weights_mut().map(ParamsMut::Weights),
            Layer::Input(_) | Layer::Pool(_) | Layer::Flatten(_) => None,
        }
    }

    /// Applies and clears the accumulated parameter gradient.
    pub fn update_parameters(&mut self, optimizer: &Sgd) -> Result<()> {
        match self {
            Layer::Conv(l) => l.update_parameters(optimizer),
            Layer::Dense(l) => l.update_parameters(optimizer),
            Layer::Recurrent(l) => l.update_parameters(optimizer),
            Layer::Input(_) | Layer::Pool(_) | Layer::Flatten(_) => Ok(()),
        }
    }

    pub fn serialize(&self) -> Result<String> {
        match self {
            Layer::Input(l) => Ok(l.serialize()),
            Layer::Conv(l) => l.serialize(),
            Layer::Pool(l) => Ok(l.serialize()),
            Layer::Flatten(l) => Ok(l.serialize()),
            Layer::Dense(l) => l.serialize(),
            Layer::Recurrent(l) => l.serialize(),
        }
    }

    /// Parses one layer written by [`Layer::serialize`].
    pub fn deserialize(text: &str) -> Result<Layer> {
        let mut reader = tags::TagReader::new(text);
        let layer = match reader.tag()? {
            "InLayer" => Layer::Input(InputLayer::from_tags(&mut reader)?),
            "CLayer" => Layer::Conv(ConvLayer::from_tags(&mut reader)?),
            "ALayer" => Layer::Pool(PoolLayer::from_tags(&mut reader)?),
            "FLayer" => Layer::Flatten(FlattenLayer::from_tags(&mut reader)?),
            "NLayer" => Layer::Dense(DenseLayer::from_tags(&mut reader)?),
            "RLayer" => Layer::Recurrent(RecurrentLayer::from_tags(&mut reader)?),
            other => return Err(NetError::Parse(format!("unknown layer type `{other}`"))),
        };
        Ok(layer)
    }

    /// Short human-readable summary, e.g. `CLayer / kernelSize: 5 / numMaps: 16`.
    pub fn description(&self) -> String {
        match self {
            Layer::Input(l) => l.description(),
            Layer::Conv(l) => l.description(),
            Layer::Pool(l) => l.description(),
            Layer::Flatten(l) => l.description(),
            Layer::Dense(l) => l.description(),
            Layer::Recurrent(l) => l.description(),
        }
    }

    /// Clears recurrent history; a no-op for the other kinds.
    pub fn reset_memory(&mut self) {
        if let Layer::Recurrent(l) = self {
            l.reset_memory();
        }
    }
}

macro_rules! impl_from_layer {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Layer {
                fn from(layer: $ty) -> Layer {
                    Layer::$variant(layer)
                }
            }
        )*
    };
}

impl_from_layer!(
    Input(InputLayer),
    Conv(ConvLayer),
    Pool(PoolLayer),
    Flatten(FlattenLayer),
    Dense(DenseLayer),
    Recurrent(RecurrentLayer),
);
