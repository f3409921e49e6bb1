use rand::prelude::*;
use serde::{Serialize, Deserialize};

use crate::error::{NetError, Result};

/// Dense 2-D grid addressed as `data[column][row]`.
///
/// A column vector is a matrix with `col == 1`. Serializes as the nested
/// array of its columns, e.g. `[[1.0, 2.0], [3.0, 4.0]]` for a 2x2 matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<f64>>", try_from = "Vec<Vec<f64>>")]
pub struct Matrix {
    pub col: usize,
    pub row: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(col: usize, row: usize) -> Matrix {
        Matrix {
            col,
            row,
            data: vec![vec![0.0; row]; col],
        }
    }

    /// Unflattens `arr` into `col` columns, walking columns outer and rows inner.
    ///
    /// An empty `arr` with `col == 0` is the empty matrix. A zero-column
    /// matrix with rows flattens to nothing, so its row count does not survive
    /// a `to_array` round trip.
    pub fn from_array(arr: &[f64], col: usize) -> Result<Matrix> {
        if col == 0 && arr.is_empty() {
            return Ok(Matrix::zeros(0, 0));
        }
        if col == 0 || arr.len() % col != 0 {
            return Err(NetError::DimensionMismatch {
                op: "from_array",
                expected: format!("a multiple of {col} elements"),
                actual: arr.len().to_string(),
            });
        }
        let row = arr.len() / col;
        let data = if row == 0 {
            vec![Vec::new(); col]
        } else {
            arr.chunks(row).map(|chunk| chunk.to_vec()).collect()
        };
        Ok(Matrix { col, row, data })
    }

    /// Builds a matrix from its columns. Ragged input is rejected.
    pub fn from_2d_array(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let col = data.len();
        let row = data.first().map_or(0, |c| c.len());
        if let Some(bad) = data.iter().find(|c| c.len() != row) {
            return Err(NetError::lengths("from_2d_array", row, bad.len()));
        }
        Ok(Matrix { col, row, data })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().flatten().sum()
    }

    fn ensure_same_shape(&self, other: &Matrix, op: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(NetError::shapes(op, self.shape(), other.shape()));
        }
        Ok(())
    }

    /// Matrix product `self · other`; the result is `(other.col, self.row)`.
    pub fn dot(&self, other: &Matrix) -> Result<Matrix> {
        if self.col != other.row {
            return Err(NetError::lengths("dot", self.col, other.row));
        }

        let mut res = Matrix::zeros(other.col, self.row);

        for c in 0..res.col {
            for r in 0..res.row {
                let mut sum = 0.0;

                for k in 0..self.col {
                    sum += self.data[k][r] * other.data[c][k];
                }

                res.data[c][r] = sum;
            }
        }

        Ok(res)
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix> {
        self.ensure_same_shape(other, "hadamard")?;
        let data = self.data.iter().zip(other.data.iter())
            .map(|(col_a, col_b)| {
                col_a.iter().zip(col_b.iter()).map(|(x, y)| x * y).collect()
            })
            .collect();
        Ok(Matrix { col: self.col, row: self.row, data })
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.row, self.col);

        for c in 0..res.col {
            for r in 0..res.row {
                res.data[c][r] = self.data[r][c];
            }
        }

        res
    }

    /// In-place element-wise sum.
    pub fn add(&mut self, other: &Matrix) -> Result<()> {
        self.ensure_same_shape(other, "add")?;
        for (col_a, col_b) in self.data.iter_mut().zip(other.data.iter()) {
            for (x, y) in col_a.iter_mut().zip(col_b.iter()) {
                *x += y;
            }
        }
        Ok(())
    }

    pub fn multiply(&self, scalar: f64) -> Matrix {
        self.map(|x| scalar * x)
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            col: self.col,
            row: self.row,
            data: self.data.iter()
                .map(|column| column.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    /// Valid-mode cross-correlation; the kernel is not flipped.
    pub fn correlation(&self, kernel: &Matrix) -> Result<Matrix> {
        if kernel.col > self.col || kernel.row > self.row || kernel.col == 0 || kernel.row == 0 {
            return Err(NetError::DimensionMismatch {
                op: "correlation",
                expected: format!("non-empty kernel no larger than {}x{}", self.col, self.row),
                actual: format!("{}x{}", kernel.col, kernel.row),
            });
        }

        let mut res = Matrix::zeros(self.col - kernel.col + 1, self.row - kernel.row + 1);

        for c in 0..res.col {
            for r in 0..res.row {
                let mut sum = 0.0;
                for kc in 0..kernel.col {
                    for kr in 0..kernel.row {
                        sum += self.data[c + kc][r + kr] * kernel.data[kc][kr];
                    }
                }
                res.data[c][r] = sum;
            }
        }

        Ok(res)
    }

    /// Zero-pads `kernel - 1` cells on every side, then correlates.
    pub fn full_correlation(&self, kernel: &Matrix) -> Result<Matrix> {
        if kernel.col == 0 || kernel.row == 0 {
            return Err(NetError::shapes("full_correlation", (1, 1), kernel.shape()));
        }
        let pad_c = kernel.col - 1;
        let pad_r = kernel.row - 1;
        let mut padded = Matrix::zeros(self.col + 2 * pad_c, self.row + 2 * pad_r);
        for (c, column) in self.data.iter().enumerate() {
            padded.data[c + pad_c][pad_r..pad_r + self.row].copy_from_slice(column);
        }
        padded.correlation(kernel)
    }

    pub fn rotate180(&self) -> Matrix {
        Matrix {
            col: self.col,
            row: self.row,
            data: self.data.iter().rev()
                .map(|column| column.iter().rev().copied().collect())
                .collect(),
        }
    }

    /// Column-major flatten: column 0 top to bottom, then column 1, ...
    pub fn to_array(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }

    /// Reinterprets the matrix as a single column vector.
    pub fn vectorize(&self) -> Matrix {
        Matrix {
            col: 1,
            row: self.col * self.row,
            data: vec![self.to_array()],
        }
    }

    /// Reinterprets the flattened elements as `num_vectors` columns.
    pub fn matrixize(&self, num_vectors: usize) -> Result<Matrix> {
        Matrix::from_array(&self.to_array(), num_vectors)
    }

    /// Appends `v2` below `v1`. Both must be column vectors.
    pub fn concat_vectors(v1: &Matrix, v2: &Matrix) -> Result<Matrix> {
        if v1.col != 1 {
            return Err(NetError::lengths("concat_vectors (v1 columns)", 1, v1.col));
        }
        if v2.col != 1 {
            return Err(NetError::lengths("concat_vectors (v2 columns)", 1, v2.col));
        }
        let mut joined = v1.data[0].clone();
        joined.extend_from_slice(&v2.data[0]);
        Ok(Matrix { col: 1, row: joined.len(), data: vec![joined] })
    }

    /// Column vector of the flattened elements in `[from, to)`.
    pub fn slice_vector(&self, from: usize, to: usize) -> Result<Matrix> {
        let total = self.col * self.row;
        if from > to || to > total {
            return Err(NetError::DimensionMismatch {
                op: "slice_vector",
                expected: format!("a range within 0..{total}"),
                actual: format!("{from}..{to}"),
            });
        }
        let arr = self.to_array();
        Matrix::from_array(&arr[from..to], 1)
    }

    /// Fills the matrix with distinct interval starts from `[lower, upper)`.
    ///
    /// The range is cut into `col * row` equal intervals and every cell draws
    /// one interval, without replacement, in random order.
    pub fn rand_uni(&mut self, lower: f64, upper: f64) {
        let mut rng = rand::thread_rng();
        self.rand_uni_with(&mut rng, lower, upper);
    }

    pub fn rand_uni_with<R: Rng + ?Sized>(&mut self, rng: &mut R, lower: f64, upper: f64) {
        let cells = self.col * self.row;
        if cells == 0 {
            return;
        }
        let interval = (upper - lower) / cells as f64;
        let mut pool: Vec<f64> = (0..cells).map(|i| lower + i as f64 * interval).collect();

        for column in self.data.iter_mut() {
            for cell in column.iter_mut() {
                let pick = rng.gen_range(0..pool.len());
                *cell = pool.remove(pick);
            }
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { col: 0, row: 0, data: vec![] }
    }
}

impl From<Matrix> for Vec<Vec<f64>> {
    fn from(m: Matrix) -> Self {
        m.data
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = NetError;

    fn try_from(data: Vec<Vec<f64>>) -> Result<Self> {
        Matrix::from_2d_array(data)
    }
}
