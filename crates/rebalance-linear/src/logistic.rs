use rebalance_core::estimator::check_trainable;
use rebalance_core::{Classifier, CoreError, CoreResult, Dataset, Float, Model};
use rebalance_preprocessing::DesignEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Gradient descent settings for [`LogisticRegression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this.
    pub tol: f64,
    /// L2 penalty on the weights (the bias is not penalized).
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        LogisticConfig {
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
            l2: 0.0,
        }
    }
}

impl LogisticConfig {
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(CoreError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_iter == 0 {
            return Err(CoreError::InvalidParameter("max_iter must be at least 1".into()));
        }
        if !(self.l2 >= 0.0 && self.l2.is_finite()) {
            return Err(CoreError::InvalidParameter(format!(
                "l2 must be non-negative, got {}",
                self.l2
            )));
        }
        Ok(())
    }
}

/// Logistic Regression: binary classification via batch gradient descent on
/// the cross-entropy loss.
///
/// Rows are one-hot encoded and standardized with a [`DesignEncoder`] fitted
/// on the training data, so categorical features need no preparation.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    pub config: LogisticConfig,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        LogisticRegression { config }
    }
}

/// Fitted weights in the encoder's design space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct LogisticModel<T: Float> {
    encoder: DesignEncoder<T>,
    weights: Vec<T>,
    bias: T,
    /// Iterations run before convergence or `max_iter`.
    pub n_iter: usize,
}

impl<T: Float> LogisticModel<T> {
    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn bias(&self) -> T {
        self.bias
    }

    fn decision(&self, design_row: &[T]) -> T {
        self.bias
            + design_row
                .iter()
                .zip(&self.weights)
                .map(|(&x, &w)| x * w)
                .sum::<T>()
    }
}

fn sigmoid<T: Float>(z: T) -> T {
    T::ONE / (T::ONE + (-z).exp())
}

impl<T: Float> Model<T> for LogisticModel<T> {
    fn predict_proba_row(&self, row: &[T]) -> CoreResult<T> {
        let design = self.encoder.transform_row(row)?;
        Ok(sigmoid(self.decision(&design)))
    }
}

impl<T: Float> Classifier<T> for LogisticRegression {
    fn name(&self) -> String {
        "logistic".into()
    }

    #[instrument(skip_all, fields(learner = "logistic", n_samples = data.len()))]
    fn fit(&self, data: &Dataset<T>, _seed: u64) -> CoreResult<Box<dyn Model<T>>> {
        Ok(Box::new(self.fit_model(data)?))
    }
}

impl LogisticRegression {
    /// Train and return the concrete model. Gradient descent starts from zero
    /// weights, so fitting is deterministic and ignores the seed.
    pub fn fit_model<T: Float>(&self, data: &Dataset<T>) -> CoreResult<LogisticModel<T>> {
        check_trainable(data)?;
        self.config.validate()?;

        let encoder = DesignEncoder::fit_dataset(data)?;
        let x = encoder.transform(data.features())?;
        let y = data.labels_as_float();
        let n_t = T::from_usize(x.nrows());
        let p = x.ncols();
        let lr = T::from_f64(self.config.learning_rate);
        let l2 = T::from_f64(self.config.l2);
        let tol = T::from_f64(self.config.tol);

        let mut w = vec![T::ZERO; p];
        let mut b = T::ZERO;
        let mut n_iter = 0;

        for _ in 0..self.config.max_iter {
            n_iter += 1;
            let mut dw = vec![T::ZERO; p];
            let mut db = T::ZERO;

            for (row, &yi) in x.rows().zip(&y) {
                let z = b + row.iter().zip(&w).map(|(&xi, &wi)| xi * wi).sum::<T>();
                let error = sigmoid(z) - yi;
                for (g, &xi) in dw.iter_mut().zip(row) {
                    *g += error * xi;
                }
                db += error;
            }

            let mut max_grad = T::ZERO;
            for (wj, &g) in w.iter_mut().zip(&dw) {
                let grad = g / n_t + l2 * *wj;
                *wj -= lr * grad;
                max_grad = max_grad.max(grad.abs());
            }
            let grad_b = db / n_t;
            b -= lr * grad_b;
            max_grad = max_grad.max(grad_b.abs());

            if max_grad < tol {
                break;
            }
        }
        debug!(n_iter, n_weights = p, "logistic regression fitted");

        Ok(LogisticModel {
            encoder,
            weights: w,
            bias: b,
            n_iter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalance_core::{Class, Feature, Matrix, Schema};

    #[test]
    fn test_logistic_regression() {
        // Linearly separable data
        let data = Dataset::from_numeric(
            &[
                vec![0.0, 0.0],
                vec![0.5, 0.5],
                vec![1.0, 1.0],
                vec![5.0, 5.0],
                vec![5.5, 5.5],
                vec![6.0, 6.0],
            ],
            vec![
                Class::Negative,
                Class::Negative,
                Class::Negative,
                Class::Positive,
                Class::Positive,
                Class::Positive,
            ],
        )
        .unwrap();

        let model = LogisticRegression::default().fit(&data, 0).unwrap();
        let proba = model.predict_proba(data.features()).unwrap();
        for (i, p) in proba.iter().enumerate() {
            if i < 3 {
                assert!(*p < 0.5, "Expected negative at {}", i);
            } else {
                assert!(*p > 0.5, "Expected positive at {}", i);
            }
        }
    }

    #[test]
    fn test_categorical_feature_is_learned() {
        let schema = Schema::new(vec![Feature::categorical(
            "color",
            vec!["blue".into(), "red".into()],
        )]);
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![(i % 2) as f64]).collect();
        let classes = (0..20).map(|i| Class::from_bool(i % 2 == 1)).collect();
        let data = Dataset::new(schema, Matrix::from_rows(&rows).unwrap(), classes).unwrap();

        let model = LogisticRegression::default().fit_model(&data).unwrap();
        assert_eq!(model.weights().len(), 2);
        assert!(model.predict_proba_row(&[1.0]).unwrap() > 0.5);
        assert!(model.predict_proba_row(&[0.0]).unwrap() < 0.5);
    }

    #[test]
    fn test_l2_shrinks_weights() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let classes = (0..10).map(|i| Class::from_bool(i >= 5)).collect();
        let data = Dataset::from_numeric(&rows, classes).unwrap();

        let plain = LogisticRegression::default().fit_model(&data).unwrap();
        let ridge = LogisticRegression::new(LogisticConfig::default().with_l2(1.0))
            .fit_model(&data)
            .unwrap();
        assert!(ridge.weights()[0].abs() < plain.weights()[0].abs());
    }

    #[test]
    fn test_rejects_bad_config_and_width() {
        let data = Dataset::from_numeric(&[vec![1.0], vec![2.0]], vec![Class::Negative, Class::Positive]).unwrap();
        let bad = LogisticRegression::new(LogisticConfig::default().with_learning_rate(0.0));
        assert!(matches!(
            bad.fit_model(&data),
            Err(CoreError::InvalidParameter(_))
        ));
        let model = LogisticRegression::default().fit_model(&data).unwrap();
        assert!(model.predict_proba_row(&[1.0, 2.0]).is_err());
    }
}
