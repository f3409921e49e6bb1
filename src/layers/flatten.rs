use crate::error::{NetError, Result};
use crate::layers::{tags, Backward, Shape, Signal};
use crate::math::matrix::Matrix;

/// Concatenates feature maps into one column vector, map after map.
#[derive(Debug, Clone, Default)]
pub struct FlattenLayer {
    /// `(num_maps, height, width)` of the predecessor.
    source: Option<(usize, usize, usize)>,
}

impl FlattenLayer {
    pub fn new() -> FlattenLayer {
        FlattenLayer { source: None }
    }

    pub fn output_shape(&self) -> Option<Shape> {
        self.source.map(|(maps, height, width)| Shape::Vector { nodes: maps * height * width })
    }

    pub fn link(&mut self, prev: Shape) -> Result<()> {
        let Shape::Maps { num_maps, height, width } = prev else {
            return Err(NetError::StructuralLink("FLayer needs feature maps as input".to_string()));
        };
        self.source = Some((num_maps, height, width));
        Ok(())
    }

    fn linked(&self) -> Result<(usize, usize, usize)> {
        self.source
            .ok_or_else(|| NetError::StructuralLink("FLayer used before link".to_string()))
    }

    pub fn forward(&mut self, input: Signal) -> Result<Signal> {
        let (num_maps, height, width) = self.linked()?;
        let maps = input.into_maps("FLayer forward")?;
        if maps.len() != num_maps {
            return Err(NetError::lengths("FLayer input maps", num_maps, maps.len()));
        }

        let mut values = Vec::with_capacity(num_maps * height * width);
        for map in &maps {
            if map.shape() != (width, height) {
                return Err(NetError::shapes("FLayer input map", (width, height), map.shape()));
            }
            values.extend(map.to_array());
        }
        Ok(Signal::Vector(Matrix::from_array(&values, 1)?))
    }

    pub fn backward(&mut self, upstream: Option<Signal>) -> Result<Backward> {
        let (num_maps, height, width) = self.linked()?;
        let upstream = upstream.ok_or_else(|| {
            NetError::MissingGradient("FLayer received no gradient from its successor".to_string())
        })?;
        let values = upstream.into_vector("FLayer backward")?.to_array();
        let map_len = height * width;
        if values.len() != num_maps * map_len {
            return Err(NetError::lengths("FLayer gradient", num_maps * map_len, values.len()));
        }

        let d_input = values
            .chunks(map_len.max(1))
            .map(|chunk| Matrix::from_array(chunk, width))
            .collect::<Result<Vec<_>>>()?;
        Ok(Backward { input_grad: Some(Signal::Maps(d_input)), param_grad: None })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        tags::push_tag(&mut out, "FLayer");
        out
    }

    pub(crate) fn from_tags(reader: &mut tags::TagReader<'_>) -> Result<FlattenLayer> {
        reader.finish()?;
        Ok(FlattenLayer::new())
    }

    pub fn description(&self) -> String {
        "FLayer".to_string()
    }
}
