use crate::dtype::Float;
use crate::error::{CoreError, CoreResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense row-major matrix: one row per sample, one column per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Matrix<T: Float> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Matrix<T> {
    /// Create a matrix from flat row-major data.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> CoreResult<Self> {
        if data.len() != rows * cols {
            return Err(CoreError::ShapeMismatch {
                expected: vec![rows, cols],
                got: vec![data.len()],
            });
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![T::ZERO; rows * cols],
            rows,
            cols,
        }
    }

    /// Matrix with no rows and a fixed column count.
    pub fn empty(cols: usize) -> Self {
        Matrix {
            data: Vec::new(),
            rows: 0,
            cols,
        }
    }

    /// Build from nested rows; every row must have the same length.
    pub fn from_rows(rows: &[Vec<T>]) -> CoreResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(CoreError::ShapeMismatch {
                    expected: vec![cols],
                    got: vec![row.len()],
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            data,
            rows: rows.len(),
            cols,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn get(&self, row: usize, col: usize) -> CoreResult<T> {
        self.check_row(row)?;
        if col >= self.cols {
            return Err(CoreError::IndexOutOfBounds {
                index: col,
                axis: 1,
                size: self.cols,
            });
        }
        Ok(self.data[row * self.cols + col])
    }

    /// Borrow row `i` as a slice.
    pub fn row(&self, i: usize) -> CoreResult<&[T]> {
        self.check_row(i)?;
        Ok(&self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Copy out column `j`.
    pub fn column(&self, j: usize) -> CoreResult<Vec<T>> {
        if j >= self.cols {
            return Err(CoreError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: self.cols,
            });
        }
        Ok(self.rows().map(|r| r[j]).collect())
    }

    fn check_row(&self, i: usize) -> CoreResult<()> {
        if i >= self.rows {
            return Err(CoreError::IndexOutOfBounds {
                index: i,
                axis: 0,
                size: self.rows,
            });
        }
        Ok(())
    }

    // ─── Row operations ─────────────────────────────────────────────────────

    /// Gather the given rows (in order, repeats allowed) into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> CoreResult<Matrix<T>> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i)?);
        }
        Ok(Matrix {
            data,
            rows: indices.len(),
            cols: self.cols,
        })
    }

    /// Append a row in place.
    pub fn push_row(&mut self, row: &[T]) -> CoreResult<()> {
        if row.len() != self.cols {
            return Err(CoreError::ShapeMismatch {
                expected: vec![self.cols],
                got: vec![row.len()],
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Stack `other` below `self`.
    pub fn vstack(&self, other: &Matrix<T>) -> CoreResult<Matrix<T>> {
        if self.cols != other.cols {
            return Err(CoreError::ShapeMismatch {
                expected: vec![other.rows, self.cols],
                got: vec![other.rows, other.cols],
            });
        }
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Ok(Matrix {
            data,
            rows: self.rows + other.rows,
            cols: self.cols,
        })
    }

    /// First (row, col) holding a NaN or infinite value.
    pub fn find_non_finite(&self) -> Option<(usize, usize)> {
        if self.cols == 0 {
            return None;
        }
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|idx| (idx / self.cols, idx % self.cols))
    }
}

impl<T: Float> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix({}x{})", self.rows, self.cols)?;
        for row in self.rows().take(10) {
            let cells: Vec<String> = row.iter().map(|v| format!("{:.4}", v.to_f64())).collect();
            writeln!(f, "  [{}]", cells.join(", "))?;
        }
        if self.rows > 10 {
            writeln!(f, "  ... {} more rows", self.rows - 10)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let m: Matrix<f64> = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.get(1, 2).unwrap(), 6.0);
        assert_eq!(m.row(0).unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Matrix::<f64>::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_select_and_stack() {
        let m: Matrix<f64> = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap();
        let s = m.select_rows(&[2, 0, 2]).unwrap();
        assert_eq!(s.data(), &[5.0, 6.0, 1.0, 2.0, 5.0, 6.0]);

        let stacked = m.vstack(&s).unwrap();
        assert_eq!(stacked.nrows(), 6);
        assert_eq!(stacked.row(3).unwrap(), &[5.0, 6.0]);
        assert!(m.vstack(&Matrix::zeros(1, 3)).is_err());
    }

    #[test]
    fn test_out_of_bounds() {
        let m: Matrix<f64> = Matrix::zeros(2, 2);
        assert!(matches!(
            m.get(2, 0),
            Err(CoreError::IndexOutOfBounds { axis: 0, .. })
        ));
        assert!(m.column(5).is_err());
    }

    #[test]
    fn test_find_non_finite() {
        let mut m: Matrix<f64> = Matrix::empty(2);
        m.push_row(&[1.0, 2.0]).unwrap();
        m.push_row(&[3.0, f64::NAN]).unwrap();
        assert_eq!(m.find_non_finite(), Some((1, 1)));
    }
}
