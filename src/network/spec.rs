use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::{DenseLayer, Layer, RecurrentLayer};
use crate::loss::loss_type::LossType;
use crate::network::model::Model;

/// Hyper-parameters of one layer in a model specification.
///
/// Parameters are never part of a spec; `build` initialises them fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Vector input when `num_maps` is 0, feature maps otherwise.
    Input {
        height: usize,
        #[serde(default = "one")]
        width: usize,
        #[serde(default)]
        num_maps: usize,
    },
    Conv {
        kernel_size: usize,
        num_maps: usize,
    },
    Pool {
        kernel_size: usize,
    },
    Flatten,
    Dense {
        num_nodes: usize,
        #[serde(default)]
        activation: ActivationFunction,
    },
    Recurrent {
        num_nodes: usize,
        #[serde(default)]
        activation: ActivationFunction,
    },
}

fn one() -> usize {
    1
}

impl LayerSpec {
    pub fn to_layer(&self) -> Layer {
        match *self {
            LayerSpec::Input { height, width, num_maps } => Layer::input_maps(height, width, num_maps),
            LayerSpec::Conv { kernel_size, num_maps } => Layer::conv(kernel_size, num_maps),
            LayerSpec::Pool { kernel_size } => Layer::pool(kernel_size),
            LayerSpec::Flatten => Layer::flatten(),
            LayerSpec::Dense { num_nodes, activation } => {
                Layer::Dense(DenseLayer::with_activation(num_nodes, activation))
            }
            LayerSpec::Recurrent { num_nodes, activation } => {
                Layer::Recurrent(RecurrentLayer::with_activation(num_nodes, activation))
            }
        }
    }
}

/// A fully serializable description of a model architecture plus its
/// learning rate and loss type.
///
/// `ModelSpec` can be saved to / loaded from JSON independently of the
/// trained parameters, so an architecture can be stored before training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Human-readable name, e.g. used as a file stem by callers.
    pub name: String,
    pub learning_rate: f64,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub loss: LossType,
}

impl ModelSpec {
    /// Links a freshly initialised model from this spec.
    pub fn build(&self) -> Result<Model> {
        let layers = self.layers.iter().map(LayerSpec::to_layer).collect();
        Ok(Model::new(self.learning_rate, layers)?.with_loss(self.loss))
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `ModelSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<ModelSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
