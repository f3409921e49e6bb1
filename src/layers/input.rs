use crate::error::{NetError, Result};
use crate::layers::{tags, Backward, Shape, Signal};
use crate::math::matrix::Matrix;

/// Raw values handed to a model for one forward step.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Plain values: a vector input, or a single-channel map in column-major order.
    Flat(Vec<f64>),
    /// One value sequence per channel.
    Channels(Vec<Vec<f64>>),
}

impl From<Vec<f64>> for Input {
    fn from(values: Vec<f64>) -> Self {
        Input::Flat(values)
    }
}

impl From<Vec<Vec<f64>>> for Input {
    fn from(channels: Vec<Vec<f64>>) -> Self {
        Input::Channels(channels)
    }
}

/// First layer of every model: turns raw values into a vector or feature maps.
///
/// `num_maps == 0` is a vector input of `height` nodes (width is then 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayer {
    pub height: usize,
    pub width: usize,
    pub num_maps: usize,
}

impl InputLayer {
    pub fn new(num_nodes: usize) -> InputLayer {
        InputLayer { height: num_nodes, width: 1, num_maps: 0 }
    }

    /// Map input; `num_maps == 0` or `width == 0` falls back to a vector of `height`.
    pub fn maps(height: usize, width: usize, num_maps: usize) -> InputLayer {
        if num_maps == 0 || width == 0 {
            return InputLayer::new(height);
        }
        InputLayer { height, width, num_maps }
    }

    pub fn shape(&self) -> Shape {
        if self.num_maps == 0 {
            Shape::Vector { nodes: self.height }
        } else {
            Shape::Maps { num_maps: self.num_maps, height: self.height, width: self.width }
        }
    }

    fn channel(&self, values: &[f64]) -> Result<Matrix> {
        let expected = self.height * self.width;
        if values.len() != expected {
            return Err(NetError::lengths("input values", expected, values.len()));
        }
        Matrix::from_array(values, self.width)
    }

    pub fn forward(&mut self, input: &Input) -> Result<Signal> {
        let single = match input {
            Input::Flat(values) => Some(values),
            Input::Channels(channels) if channels.len() == 1 => channels.first(),
            Input::Channels(_) => None,
        };

        match (self.num_maps, single, input) {
            (0, Some(values), _) => Ok(Signal::Vector(self.channel(values)?)),
            (1, Some(values), _) => Ok(Signal::Maps(vec![self.channel(values)?])),
            (n, _, Input::Channels(channels)) if n > 1 && channels.len() == n => {
                let maps = channels.iter()
                    .map(|values| self.channel(values))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Signal::Maps(maps))
            }
            (n, _, Input::Channels(channels)) => {
                Err(NetError::lengths("input channels", n.max(1), channels.len()))
            }
            (n, _, Input::Flat(_)) => Err(NetError::lengths("input channels", n, 1)),
        }
    }

    /// Nothing flows back past the input.
    pub fn backward(&mut self) -> Backward {
        Backward::default()
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        tags::push_tag(&mut out, "InLayer");
        tags::push_tag(&mut out, self.height);
        tags::push_tag(&mut out, self.width);
        tags::push_tag(&mut out, self.num_maps);
        out
    }

    pub(crate) fn from_tags(reader: &mut tags::TagReader<'_>) -> Result<InputLayer> {
        let height = reader.number("height")?;
        let width = reader.number("width")?;
        let num_maps = reader.number("map count")?;
        reader.finish()?;
        Ok(InputLayer::maps(height, width, num_maps))
    }

    pub fn description(&self) -> String {
        if self.num_maps > 0 {
            format!(
                "InLayer / height: {} / width: {} / numMaps: {}",
                self.height, self.width, self.num_maps
            )
        } else {
            format!("InLayer / numNodes: {}", self.height)
        }
    }
}
