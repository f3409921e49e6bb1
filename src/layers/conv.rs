use crate::activation::activation::{leaky_relu, leaky_relu_grad};
use crate::error::{NetError, Result};
use crate::layers::{tags, Backward, ParamGrad, Shape, Signal};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// `[input map][output map]` grid of square kernels.
pub type KernelGrid = Vec<Vec<Matrix>>;

#[derive(Debug, Clone)]
struct ConvCache {
    input: Vec<Matrix>,
    pre_activation: Vec<Matrix>,
}

#[derive(Debug, Clone, Copy)]
struct ConvGeometry {
    in_maps: usize,
    in_height: usize,
    in_width: usize,
}

/// Valid-mode convolution (cross-correlation) followed by a leaky ReLU.
#[derive(Debug, Clone)]
pub struct ConvLayer {
    pub kernel_size: usize,
    pub num_maps: usize,
    kernels: Option<KernelGrid>,
    geometry: Option<ConvGeometry>,
    dp: Option<KernelGrid>,
    cache: Option<ConvCache>,
}

impl ConvLayer {
    pub fn new(kernel_size: usize, num_maps: usize) -> ConvLayer {
        ConvLayer {
            kernel_size,
            num_maps,
            kernels: None,
            geometry: None,
            dp: None,
            cache: None,
        }
    }

    /// Layer with preset kernels; the grid is checked against the chain on link.
    pub fn with_kernels(kernel_size: usize, kernels: KernelGrid) -> ConvLayer {
        let num_maps = kernels.first().map_or(0, |outs| outs.len());
        ConvLayer { kernels: Some(kernels), ..ConvLayer::new(kernel_size, num_maps) }
    }

    pub fn kernels(&self) -> Option<&KernelGrid> {
        self.kernels.as_ref()
    }

    pub fn kernels_mut(&mut self) -> Option<&mut KernelGrid> {
        self.kernels.as_mut()
    }

    pub fn output_shape(&self) -> Option<Shape> {
        self.geometry.map(|g| Shape::Maps {
            num_maps: self.num_maps,
            height: g.in_height + 1 - self.kernel_size,
            width: g.in_width + 1 - self.kernel_size,
        })
    }

    pub fn link(&mut self, prev: Shape) -> Result<()> {
        let Shape::Maps { num_maps: in_maps, height, width } = prev else {
            return Err(NetError::StructuralLink("CLayer needs feature maps as input".to_string()));
        };
        if self.kernel_size == 0 || self.num_maps == 0 {
            return Err(NetError::InvalidConfig(
                "CLayer needs a positive kernel size and map count".to_string(),
            ));
        }
        if self.kernel_size > height || self.kernel_size > width {
            return Err(NetError::DimensionMismatch {
                op: "CLayer link",
                expected: format!("kernel no larger than {width}x{height}"),
                actual: format!("{0}x{0}", self.kernel_size),
            });
        }

        self.geometry = Some(ConvGeometry { in_maps, in_height: height, in_width: width });

        match &self.kernels {
            Some(grid) => self.check_grid(grid, in_maps)?,
            None => self.kernels = Some(self.he_initialization(in_maps)),
        }
        Ok(())
    }

    fn check_grid(&self, grid: &KernelGrid, in_maps: usize) -> Result<()> {
        if grid.len() != in_maps {
            return Err(NetError::lengths("CLayer kernel rows (input maps)", in_maps, grid.len()));
        }
        for outs in grid {
            if outs.len() != self.num_maps {
                return Err(NetError::lengths("CLayer kernel columns (output maps)", self.num_maps, outs.len()));
            }
            for k in outs {
                if k.shape() != (self.kernel_size, self.kernel_size) {
                    return Err(NetError::shapes("CLayer kernel", (self.kernel_size, self.kernel_size), k.shape()));
                }
            }
        }
        Ok(())
    }

    /// Uniform draw in `±sqrt(out / (in + out) / k²)`.
    fn he_initialization(&self, in_maps: usize) -> KernelGrid {
        let k = self.kernel_size;
        let upper = (self.num_maps as f64 / (in_maps + self.num_maps) as f64 / (k * k) as f64).sqrt();
        (0..in_maps)
            .map(|_| {
                (0..self.num_maps)
                    .map(|_| {
                        let mut kernel = Matrix::zeros(k, k);
                        kernel.rand_uni(-upper, upper);
                        kernel
                    })
                    .collect()
            })
            .collect()
    }

    fn linked(&self) -> Result<(ConvGeometry, &KernelGrid)> {
        match (self.geometry, self.kernels.as_ref()) {
            (Some(g), Some(k)) => Ok((g, k)),
            _ => Err(NetError::StructuralLink("CLayer used before link".to_string())),
        }
    }

    pub fn forward(&mut self, input: Signal) -> Result<Signal> {
        let (geometry, kernels) = self.linked()?;
        let maps = input.into_maps("CLayer forward")?;
        if maps.len() != geometry.in_maps {
            return Err(NetError::lengths("CLayer input maps", geometry.in_maps, maps.len()));
        }
        for map in &maps {
            if map.shape() != (geometry.in_width, geometry.in_height) {
                return Err(NetError::shapes(
                    "CLayer input map",
                    (geometry.in_width, geometry.in_height),
                    map.shape(),
                ));
            }
        }

        let mut pre_activation = Vec::with_capacity(self.num_maps);
        for out in 0..self.num_maps {
            let mut sum = maps[0].correlation(&kernels[0][out])?;
            for (map, row) in maps.iter().zip(kernels.iter()).skip(1) {
                sum.add(&map.correlation(&row[out])?)?;
            }
            pre_activation.push(sum);
        }

        let output = pre_activation.iter().map(|y| y.map(leaky_relu)).collect();
        self.cache = Some(ConvCache { input: maps, pre_activation });
        Ok(Signal::Maps(output))
    }

    /// Returns the kernel gradient grid and passes `dE/dI` upstream.
    pub fn backward(&mut self, upstream: Option<Signal>) -> Result<Backward> {
        let upstream = upstream.ok_or_else(|| {
            NetError::MissingGradient("CLayer received no gradient from its successor".to_string())
        })?;
        let (_, kernels) = self.linked()?;
        let cache = self.cache.as_ref().ok_or(NetError::NoForwardPass("CLayer"))?;
        let d_out = upstream.into_maps("CLayer backward")?;
        if d_out.len() != self.num_maps {
            return Err(NetError::lengths("CLayer gradient maps", self.num_maps, d_out.len()));
        }

        let d_y = d_out.iter().zip(cache.pre_activation.iter())
            .map(|(g, y)| g.hadamard(&y.map(leaky_relu_grad)))
            .collect::<Result<Vec<_>>>()?;

        let mut d_kernels: KernelGrid = Vec::with_capacity(kernels.len());
        let mut d_input: Vec<Matrix> = Vec::with_capacity(kernels.len());
        for (input_map, row) in cache.input.iter().zip(kernels.iter()) {
            let mut d_row = Vec::with_capacity(self.num_maps);
            let mut d_map: Option<Matrix> = None;
            for (kernel, dy) in row.iter().zip(d_y.iter()) {
                d_row.push(input_map.correlation(dy)?);

                let spread = kernel.rotate180().full_correlation(dy)?.rotate180();
                match d_map.as_mut() {
                    Some(acc) => acc.add(&spread)?,
                    None => d_map = Some(spread),
                }
            }
            d_kernels.push(d_row);
            d_input.push(d_map.unwrap_or_else(|| Matrix::zeros(input_map.col, input_map.row)));
        }

        Ok(Backward {
            input_grad: Some(Signal::Maps(d_input)),
            param_grad: Some(ParamGrad::Kernels(d_kernels)),
        })
    }

    pub fn add_dp(&mut self, grad: ParamGrad) -> Result<()> {
        let ParamGrad::Kernels(grid) = grad else {
            return Err(NetError::DimensionMismatch {
                op: "CLayer add_dp",
                expected: "a kernel grid".to_string(),
                actual: "a weight matrix".to_string(),
            });
        };
        match self.dp.as_mut() {
            None => self.dp = Some(grid),
            Some(acc) => {
                if acc.len() != grid.len() {
                    return Err(NetError::lengths("CLayer add_dp", acc.len(), grid.len()));
                }
                for (acc_row, row) in acc.iter_mut().zip(grid.iter()) {
                    if acc_row.len() != row.len() {
                        return Err(NetError::lengths("CLayer add_dp", acc_row.len(), row.len()));
                    }
                    for (a, g) in acc_row.iter_mut().zip(row.iter()) {
                        a.add(g)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn clear_dp(&mut self) {
        self.dp = None;
    }

    pub fn update_parameters(&mut self, optimizer: &Sgd) -> Result<()> {
        if let (Some(dp), Some(kernels)) = (self.dp.take(), self.kernels.as_mut()) {
            for (k_row, g_row) in kernels.iter_mut().zip(dp.iter()) {
                for (kernel, grad) in k_row.iter_mut().zip(g_row.iter()) {
                    optimizer.step(kernel, grad)?;
                }
            }
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<String> {
        let mut out = String::new();
        tags::push_tag(&mut out, "CLayer");
        tags::push_tag(&mut out, self.kernel_size);
        tags::push_tag(&mut out, self.num_maps);
        tags::push_blob(&mut out, &self.kernels)?;
        Ok(out)
    }

    pub(crate) fn from_tags(reader: &mut tags::TagReader<'_>) -> Result<ConvLayer> {
        let kernel_size = reader.number("kernel size")?;
        let num_maps = reader.number("map count")?;
        let kernels: Option<KernelGrid> = reader.blob("kernels")?;
        Ok(ConvLayer { kernels, ..ConvLayer::new(kernel_size, num_maps) })
    }

    pub fn description(&self) -> String {
        format!("CLayer / kernelSize: {} / numMaps: {}", self.kernel_size, self.num_maps)
    }
}
