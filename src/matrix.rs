//! Row-major 2-D float storage shared by every index.
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, Axis};

/// Flat float matrix with row stride exactly equal to `cols`.
///
/// Thin wrapper around [`ndarray::Array2`] so that downstream components keep
/// using `ndarray`'s row views and `rayon`-backed `axis_iter` without owning a
/// second, hand-rolled storage layout.
#[derive(Debug, Clone)]
pub struct Matrix {
    data: Array2<f32>,
}

impl Matrix {
    /// A `rows x cols` matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: Array2::zeros((rows, cols)),
        }
    }

    /// Build a matrix from row-major data. `data.len()` must be a multiple of `cols`.
    pub fn from_vec(cols: usize, data: Vec<f32>) -> Result<Self> {
        if cols == 0 || data.len() % cols != 0 {
            return Err(Error::MalformedInput {
                file: "<in-memory>".to_string(),
                reason: format!(
                    "buffer of length {} is not a multiple of row width {}",
                    data.len(),
                    cols
                ),
            });
        }
        let rows = data.len() / cols;
        let arr = Array2::from_shape_vec((rows, cols), data).expect("shape matches length");
        Ok(Matrix { data: arr })
    }

    /// Build a matrix by stacking equal-length rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.is_empty() {
            return Ok(Matrix::zeros(0, 0));
        }
        let cols = rows[0].len();
        let mut flat = Vec::with_capacity(rows.len() * cols);
        for r in rows {
            if r.len() != cols {
                return Err(Error::MalformedInput {
                    file: "<in-memory>".to_string(),
                    reason: "rows have unequal length".to_string(),
                });
            }
            flat.extend_from_slice(r);
        }
        Matrix::from_vec(cols, flat)
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Bounds-checked element access. Panics out of range, like `ndarray`'s own indexing.
    pub fn at(&self, i: usize, j: usize) -> f32 {
        self.data[[i, j]]
    }

    pub fn row(&self, i: usize) -> ArrayView1<f32> {
        self.data.row(i)
    }

    pub fn row_slice(&self, i: usize) -> &[f32] {
        self.data
            .row(i)
            .into_slice()
            .expect("matrix rows are contiguous")
    }

    pub fn row_slice_mut(&mut self, i: usize) -> &mut [f32] {
        self.data
            .row_mut(i)
            .into_slice()
            .expect("matrix rows are contiguous")
    }

    /// Resize to `(rows, cols)`, erasing all contents.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.data = Array2::zeros((rows, cols));
    }

    /// Raw contiguous span, row-major, for the numeric kernel.
    pub fn as_slice(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("matrix storage is always contiguous")
    }

    pub fn view(&self) -> ndarray::ArrayView2<f32> {
        self.data.view()
    }

    pub fn axis_rows(&self) -> ndarray::iter::AxisIter<f32, ndarray::Ix1> {
        self.data.axis_iter(Axis(0))
    }

    /// Append rows (vertically stack), growing the matrix in place.
    pub fn extend_rows(&mut self, other: &Matrix) -> Result<()> {
        if self.rows() == 0 {
            self.data = other.data.clone();
            return Ok(());
        }
        if other.cols() != self.cols() {
            return Err(Error::DimensionMismatch {
                expected: self.cols(),
                found: other.cols(),
            });
        }
        let stacked = ndarray::concatenate(Axis(0), &[self.data.view(), other.data.view()])
            .expect("equal column counts");
        self.data = stacked;
        Ok(())
    }

    /// Column-permute every row by `perm` (`perm[j]` is the source column for output column `j`).
    pub fn permute_columns(&self, perm: &[usize]) -> Matrix {
        let mut out = Array2::<f32>::zeros((self.rows(), perm.len()));
        for (j, &src) in perm.iter().enumerate() {
            out.column_mut(j).assign(&self.data.column(src));
        }
        Matrix { data: out }
    }
}
