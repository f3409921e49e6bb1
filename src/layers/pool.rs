use crate::error::{NetError, Result};
use crate::layers::{tags, Backward, Shape, Signal};
use crate::math::matrix::Matrix;

#[derive(Debug, Clone, Copy)]
struct PoolGeometry {
    num_maps: usize,
    in_height: usize,
    in_width: usize,
    /// Zero rows appended below the input.
    y_padding: usize,
    /// Zero columns appended right of the input.
    x_padding: usize,
}

impl PoolGeometry {
    fn out_height(&self, stride: usize) -> usize {
        (self.in_height + self.y_padding) / stride
    }

    fn out_width(&self, stride: usize) -> usize {
        (self.in_width + self.x_padding) / stride
    }
}

/// Non-overlapping average pooling; the stride equals the kernel size.
#[derive(Debug, Clone)]
pub struct PoolLayer {
    pub kernel_size: usize,
    geometry: Option<PoolGeometry>,
}

fn padding(dim: usize, stride: usize) -> usize {
    match dim % stride {
        0 => 0,
        rem => stride - rem,
    }
}

impl PoolLayer {
    pub fn new(kernel_size: usize) -> PoolLayer {
        PoolLayer { kernel_size, geometry: None }
    }

    pub fn output_shape(&self) -> Option<Shape> {
        self.geometry.map(|g| Shape::Maps {
            num_maps: g.num_maps,
            height: g.out_height(self.kernel_size),
            width: g.out_width(self.kernel_size),
        })
    }

    pub fn link(&mut self, prev: Shape) -> Result<()> {
        let Shape::Maps { num_maps, height, width } = prev else {
            return Err(NetError::StructuralLink("ALayer needs feature maps as input".to_string()));
        };
        if self.kernel_size == 0 {
            return Err(NetError::InvalidConfig("ALayer needs a positive kernel size".to_string()));
        }
        self.geometry = Some(PoolGeometry {
            num_maps,
            in_height: height,
            in_width: width,
            y_padding: padding(height, self.kernel_size),
            x_padding: padding(width, self.kernel_size),
        });
        Ok(())
    }

    fn linked(&self) -> Result<PoolGeometry> {
        self.geometry
            .ok_or_else(|| NetError::StructuralLink("ALayer used before link".to_string()))
    }

    fn pad_map(&self, g: &PoolGeometry, map: &Matrix) -> Matrix {
        let mut padded = Matrix::zeros(map.col + g.x_padding, map.row + g.y_padding);
        for (c, column) in map.data.iter().enumerate() {
            padded.data[c][..map.row].copy_from_slice(column);
        }
        padded
    }

    fn depad_map(&self, g: &PoolGeometry, map: &Matrix) -> Matrix {
        Matrix {
            col: g.in_width,
            row: g.in_height,
            data: map.data.iter()
                .take(g.in_width)
                .map(|column| column[..g.in_height].to_vec())
                .collect(),
        }
    }

    /// Averages each `stride x stride` block, padding the trailing edges first.
    pub fn avg_pool(&self, map: &Matrix) -> Result<Matrix> {
        let g = self.linked()?;
        if map.shape() != (g.in_width, g.in_height) {
            return Err(NetError::shapes("ALayer input map", (g.in_width, g.in_height), map.shape()));
        }
        let stride = self.kernel_size;
        let padded = self.pad_map(&g, map);
        let area = (stride * stride) as f64;

        let mut res = Matrix::zeros(g.out_width(stride), g.out_height(stride));
        for c in 0..res.col {
            for r in 0..res.row {
                let mut sum = 0.0;
                for column in &padded.data[c * stride..(c + 1) * stride] {
                    sum += column[r * stride..(r + 1) * stride].iter().sum::<f64>();
                }
                res.data[c][r] = sum / area;
            }
        }
        Ok(res)
    }

    /// Spreads each gradient evenly over its block, then drops the padding.
    pub fn avg_pool_grad(&self, grad: &Matrix) -> Result<Matrix> {
        let g = self.linked()?;
        let stride = self.kernel_size;
        let expected = (g.out_width(stride), g.out_height(stride));
        if grad.shape() != expected {
            return Err(NetError::shapes("ALayer gradient map", expected, grad.shape()));
        }
        let area = (stride * stride) as f64;

        let mut spread = Matrix::zeros(grad.col * stride, grad.row * stride);
        for (c, column) in spread.data.iter_mut().enumerate() {
            for (r, cell) in column.iter_mut().enumerate() {
                *cell = grad.data[c / stride][r / stride] / area;
            }
        }
        Ok(self.depad_map(&g, &spread))
    }

    pub fn forward(&mut self, input: Signal) -> Result<Signal> {
        let g = self.linked()?;
        let maps = input.into_maps("ALayer forward")?;
        if maps.len() != g.num_maps {
            return Err(NetError::lengths("ALayer input maps", g.num_maps, maps.len()));
        }
        let pooled = maps.iter().map(|m| self.avg_pool(m)).collect::<Result<Vec<_>>>()?;
        Ok(Signal::Maps(pooled))
    }

    pub fn backward(&mut self, upstream: Option<Signal>) -> Result<Backward> {
        let upstream = upstream.ok_or_else(|| {
            NetError::MissingGradient("ALayer received no gradient from its successor".to_string())
        })?;
        let maps = upstream.into_maps("ALayer backward")?;
        let d_input = maps.iter().map(|m| self.avg_pool_grad(m)).collect::<Result<Vec<_>>>()?;
        Ok(Backward { input_grad: Some(Signal::Maps(d_input)), param_grad: None })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        tags::push_tag(&mut out, "ALayer");
        tags::push_tag(&mut out, self.kernel_size);
        out
    }

    pub(crate) fn from_tags(reader: &mut tags::TagReader<'_>) -> Result<PoolLayer> {
        let kernel_size = reader.number("kernel size")?;
        reader.finish()?;
        Ok(PoolLayer::new(kernel_size))
    }

    pub fn description(&self) -> String {
        format!("ALayer / kernelSize: {}", self.kernel_size)
    }
}
