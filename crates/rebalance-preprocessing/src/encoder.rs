use rebalance_core::estimator::check_row_width;
use rebalance_core::{CoreError, CoreResult, Dataset, FeatureKind, Float, Matrix, Schema};
use serde::{Deserialize, Serialize};

use crate::scaler::StandardScaler;

/// Maps raw mixed-type rows to a purely numeric design matrix.
///
/// Columns come out in schema order. A numeric feature becomes one
/// standardized column; a categorical feature with `L` levels becomes `L`
/// indicator columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct DesignEncoder<T: Float> {
    schema: Schema,
    scaler: StandardScaler<T>,
    names: Vec<String>,
}

impl<T: Float> DesignEncoder<T> {
    /// Fit scaling statistics on `x`, whose columns are described by `schema`.
    pub fn fit(schema: &Schema, x: &Matrix<T>) -> CoreResult<Self> {
        if x.ncols() != schema.len() {
            return Err(CoreError::SchemaMismatch(format!(
                "schema has {} features, matrix has {} columns",
                schema.len(),
                x.ncols()
            )));
        }
        let mut scaler = StandardScaler::new(schema.numeric_indices());
        scaler.fit(x)?;

        let mut names = Vec::new();
        for feature in schema.features() {
            match &feature.kind {
                FeatureKind::Numeric => names.push(feature.name.clone()),
                FeatureKind::Categorical { levels } => {
                    names.extend(levels.iter().map(|l| format!("{}={}", feature.name, l)))
                }
            }
        }

        Ok(DesignEncoder {
            schema: schema.clone(),
            scaler,
            names,
        })
    }

    pub fn fit_dataset(data: &Dataset<T>) -> CoreResult<Self> {
        Self::fit(data.schema(), data.features())
    }

    /// Width of the encoded rows.
    pub fn n_outputs(&self) -> usize {
        self.names.len()
    }

    pub fn n_inputs(&self) -> usize {
        self.schema.len()
    }

    /// Encoded column names; indicator columns are named `feature=level`.
    pub fn output_names(&self) -> &[String] {
        &self.names
    }

    /// Encode one raw row, appending to `out` (which is cleared first).
    pub fn transform_row_into(&self, row: &[T], out: &mut Vec<T>) -> CoreResult<()> {
        check_row_width(row, self.schema.len())?;
        let mut scaled = row.to_vec();
        self.scaler.transform_row(&mut scaled)?;

        out.clear();
        for (j, feature) in self.schema.features().iter().enumerate() {
            match &feature.kind {
                FeatureKind::Numeric => out.push(scaled[j]),
                FeatureKind::Categorical { levels } => {
                    let v = row[j].to_f64();
                    if v < 0.0 || v.fract() != 0.0 || v as usize >= levels.len() {
                        return Err(CoreError::InvalidCategory {
                            feature: feature.name.clone(),
                            levels: levels.len(),
                            value: v,
                        });
                    }
                    let hot = v as usize;
                    out.extend((0..levels.len()).map(|l| if l == hot { T::ONE } else { T::ZERO }));
                }
            }
        }
        Ok(())
    }

    pub fn transform_row(&self, row: &[T]) -> CoreResult<Vec<T>> {
        let mut out = Vec::with_capacity(self.n_outputs());
        self.transform_row_into(row, &mut out)?;
        Ok(out)
    }

    pub fn transform(&self, x: &Matrix<T>) -> CoreResult<Matrix<T>> {
        let mut out = Matrix::empty(self.n_outputs());
        let mut buf = Vec::with_capacity(self.n_outputs());
        for row in x.rows() {
            self.transform_row_into(row, &mut buf)?;
            out.push_row(&buf)?;
        }
        Ok(out)
    }
}
