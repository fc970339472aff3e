use rebalance_core::{CoreError, CoreResult, Float, Matrix};
use serde::{Deserialize, Serialize};

/// Standardize selected columns by removing the mean and scaling to unit
/// variance. Other columns pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct StandardScaler<T: Float> {
    columns: Vec<usize>,
    mean: Option<Vec<T>>,
    std: Option<Vec<T>>,
}

impl<T: Float> StandardScaler<T> {
    /// Scaler for the given column indices.
    pub fn new(columns: Vec<usize>) -> Self {
        StandardScaler {
            columns,
            mean: None,
            std: None,
        }
    }

    /// Scaler for every column of an `n_cols`-wide matrix.
    pub fn all(n_cols: usize) -> Self {
        StandardScaler::new((0..n_cols).collect())
    }

    /// Compute per-column mean and population std from `x`.
    pub fn fit(&mut self, x: &Matrix<T>) -> CoreResult<()> {
        if x.is_empty() {
            return Err(CoreError::EmptyDataset);
        }
        let n = T::from_usize(x.nrows());
        let mut mean = Vec::with_capacity(self.columns.len());
        let mut std = Vec::with_capacity(self.columns.len());
        for &j in &self.columns {
            let col = x.column(j)?;
            let m: T = col.iter().copied().sum::<T>() / n;
            let var: T = col.iter().map(|&v| (v - m) * (v - m)).sum::<T>() / n;
            mean.push(m);
            std.push(var.sqrt());
        }
        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    /// Scale one row in place.
    pub fn transform_row(&self, row: &mut [T]) -> CoreResult<()> {
        let (mean, std) = match (&self.mean, &self.std) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(CoreError::NotFitted),
        };
        let width = row.len();
        for (k, &j) in self.columns.iter().enumerate() {
            let v = row.get_mut(j).ok_or(CoreError::IndexOutOfBounds {
                index: j,
                axis: 1,
                size: width,
            })?;
            // Constant columns are centered but not scaled.
            let s = if std[k].abs() < T::EPSILON { T::ONE } else { std[k] };
            *v = (*v - mean[k]) / s;
        }
        Ok(())
    }

    pub fn transform(&self, x: &Matrix<T>) -> CoreResult<Matrix<T>> {
        let mut out = Matrix::empty(x.ncols());
        let mut buf = Vec::with_capacity(x.ncols());
        for row in x.rows() {
            buf.clear();
            buf.extend_from_slice(row);
            self.transform_row(&mut buf)?;
            out.push_row(&buf)?;
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Matrix<T>) -> CoreResult<Matrix<T>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn mean(&self) -> Option<&[T]> {
        self.mean.as_deref()
    }

    pub fn std(&self) -> Option<&[T]> {
        self.std.as_deref()
    }
}
