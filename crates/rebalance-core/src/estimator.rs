use crate::dataset::Dataset;
use crate::dtype::Float;
use crate::error::{CoreError, CoreResult};
use crate::matrix::Matrix;

/// A fitted binary classifier that scores rows with P(positive).
pub trait Model<T: Float>: Send + Sync {
    /// Probability of the positive class for a single row.
    fn predict_proba_row(&self, row: &[T]) -> CoreResult<T>;

    /// Probabilities for every row of `x`.
    fn predict_proba(&self, x: &Matrix<T>) -> CoreResult<Vec<T>> {
        x.rows().map(|row| self.predict_proba_row(row)).collect()
    }

    /// Hard predictions at `threshold` (positive iff p >= threshold).
    fn predict(&self, x: &Matrix<T>, threshold: T) -> CoreResult<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p >= threshold)
            .collect())
    }
}

/// An unfitted learner: configuration that can be trained into a [`Model`].
///
/// `seed` drives every random choice made while fitting, so the same data and
/// seed always produce the same model.
pub trait Classifier<T: Float>: Send + Sync {
    /// Short human-readable identifier, used as the learner id in benchmarks.
    fn name(&self) -> String;

    fn fit(&self, data: &Dataset<T>, seed: u64) -> CoreResult<Box<dyn Model<T>>>;
}

/// Reject empty or featureless training sets before fitting.
pub fn check_trainable<T: Float>(data: &Dataset<T>) -> CoreResult<()> {
    if data.is_empty() {
        return Err(CoreError::EmptyDataset);
    }
    if data.n_features() == 0 {
        return Err(CoreError::InvalidParameter(
            "training data has no feature columns".into(),
        ));
    }
    Ok(())
}

/// Check a prediction row against the width the model was trained on.
pub fn check_row_width(row: &[impl Copy], expected: usize) -> CoreResult<()> {
    if row.len() != expected {
        return Err(CoreError::ShapeMismatch {
            expected: vec![expected],
            got: vec![row.len()],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Class;

    struct Constant(f64);

    impl Model<f64> for Constant {
        fn predict_proba_row(&self, row: &[f64]) -> CoreResult<f64> {
            check_row_width(row, 1)?;
            Ok(self.0)
        }
    }

    #[test]
    fn test_default_predict() {
        let model = Constant(0.7);
        let x = Matrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(model.predict_proba(&x).unwrap(), vec![0.7, 0.7]);
        assert_eq!(model.predict(&x, 0.7).unwrap(), vec![true, true]);
        assert_eq!(model.predict(&x, 0.8).unwrap(), vec![false, false]);
        assert!(model.predict_proba(&Matrix::zeros(1, 2)).is_err());
    }

    #[test]
    fn test_check_trainable() {
        let empty = Dataset::<f64>::from_numeric(&[], vec![]).unwrap();
        assert_eq!(check_trainable(&empty), Err(CoreError::EmptyDataset));
        let ok = Dataset::from_numeric(&[vec![1.0]], vec![Class::Positive]).unwrap();
        assert!(check_trainable(&ok).is_ok());
    }
}
