use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rebalance_core::{Class, CoreError, CoreResult, Dataset, Feature, Matrix, Schema};
use serde::{Deserialize, Serialize};

/// Recipe for a synthetic binary dataset with a rare positive class.
///
/// Numeric features are unit-variance Gaussians centred at 0 for negatives
/// and at `separation` for positives. Categorical features are uniform for
/// negatives; positives take the last level with probability `cat_signal`
/// and are uniform otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImbalancedSpec {
    pub n_samples: usize,
    /// Share of positive rows; the positive count is rounded to nearest.
    pub positive_fraction: f64,
    pub n_numeric: usize,
    pub n_categorical: usize,
    pub n_levels: usize,
    pub separation: f64,
    pub cat_signal: f64,
    pub seed: u64,
}

impl Default for ImbalancedSpec {
    fn default() -> Self {
        ImbalancedSpec {
            n_samples: 500,
            positive_fraction: 0.1,
            n_numeric: 2,
            n_categorical: 0,
            n_levels: 3,
            separation: 2.0,
            cat_signal: 0.6,
            seed: 42,
        }
    }
}

impl ImbalancedSpec {
    pub fn new(n_samples: usize, positive_fraction: f64) -> Self {
        ImbalancedSpec {
            n_samples,
            positive_fraction,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, n: usize) -> Self {
        self.n_numeric = n;
        self
    }

    #[must_use]
    pub fn with_categorical(mut self, n: usize, n_levels: usize) -> Self {
        self.n_categorical = n;
        self.n_levels = n_levels;
        self
    }

    #[must_use]
    pub fn with_separation(mut self, separation: f64) -> Self {
        self.separation = separation;
        self
    }

    pub fn n_positive(&self) -> usize {
        (self.n_samples as f64 * self.positive_fraction).round() as usize
    }

    fn validate(&self) -> CoreResult<()> {
        let invalid = |msg: String| -> CoreResult<()> { Err(CoreError::InvalidParameter(msg)) };
        if !(self.positive_fraction > 0.0 && self.positive_fraction < 1.0) {
            return invalid(format!(
                "positive_fraction must be in (0, 1), got {}",
                self.positive_fraction
            ));
        }
        let n_pos = self.n_positive();
        if n_pos == 0 || n_pos == self.n_samples {
            return invalid(format!(
                "{} samples at fraction {} leave a class empty",
                self.n_samples, self.positive_fraction
            ));
        }
        if self.n_numeric + self.n_categorical == 0 {
            return invalid("at least one feature is required".into());
        }
        if self.n_categorical > 0 && self.n_levels < 2 {
            return invalid("categorical features need at least 2 levels".into());
        }
        if !(0.0..=1.0).contains(&self.cat_signal) {
            return invalid(format!("cat_signal must be in [0, 1], got {}", self.cat_signal));
        }
        Ok(())
    }
}

/// Standard normal draw via Box-Muller.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Generate the dataset described by `spec`. Numeric columns come first,
/// named `x0, x1, ..`; categorical columns follow as `c0, c1, ..` with
/// levels `l0, l1, ..`.
pub fn make_imbalanced(spec: &ImbalancedSpec) -> CoreResult<Dataset<f64>> {
    spec.validate()?;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let n_pos = spec.n_positive();
    let mut classes: Vec<Class> = (0..spec.n_samples)
        .map(|i| Class::from_bool(i < n_pos))
        .collect();
    classes.shuffle(&mut rng);

    let mut features: Vec<Feature> = (0..spec.n_numeric)
        .map(|j| Feature::numeric(format!("x{j}")))
        .collect();
    let levels: Vec<String> = (0..spec.n_levels).map(|l| format!("l{l}")).collect();
    features.extend((0..spec.n_categorical).map(|j| Feature::categorical(format!("c{j}"), levels.clone())));

    let width = spec.n_numeric + spec.n_categorical;
    let mut data = Vec::with_capacity(spec.n_samples * width);
    for class in &classes {
        let centre = if class.is_positive() { spec.separation } else { 0.0 };
        for _ in 0..spec.n_numeric {
            data.push(centre + gaussian(&mut rng));
        }
        for _ in 0..spec.n_categorical {
            let level = if class.is_positive() && rng.gen::<f64>() < spec.cat_signal {
                spec.n_levels - 1
            } else {
                rng.gen_range(0..spec.n_levels)
            };
            data.push(level as f64);
        }
    }

    let matrix = Matrix::new(data, spec.n_samples, width)?;
    Dataset::new(Schema::new(features), matrix, classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_imbalanced() {
        let data = make_imbalanced(&ImbalancedSpec::new(200, 0.15)).unwrap();
        assert_eq!(data.len(), 200);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.class_counts().positive, 30);
    }

    #[test]
    fn test_positive_rows_are_shifted() {
        let data = make_imbalanced(&ImbalancedSpec::new(400, 0.25).with_separation(3.0).with_seed(1)).unwrap();
        let mean = |class: Class| {
            let idx = data.indices_of(class);
            idx.iter().map(|&i| data.features().get(i, 0).unwrap()).sum::<f64>() / idx.len() as f64
        };
        assert!(mean(Class::Positive) - mean(Class::Negative) > 2.0);
    }

    #[test]
    fn test_categorical_columns() {
        let spec = ImbalancedSpec::new(100, 0.2).with_numeric(1).with_categorical(2, 4);
        let data = make_imbalanced(&spec).unwrap();
        assert_eq!(data.n_features(), 3);
        assert_eq!(data.schema().categorical_indices(), vec![1, 2]);
        assert_eq!(data.schema().feature(2).unwrap().n_levels(), Some(4));
        let col = data.features().column(1).unwrap();
        assert!(col.iter().all(|&v| v.fract() == 0.0 && (0.0..4.0).contains(&v)));
    }

    #[test]
    fn test_seeded() {
        let spec = ImbalancedSpec::new(50, 0.2).with_categorical(1, 3).with_seed(9);
        assert_eq!(make_imbalanced(&spec).unwrap(), make_imbalanced(&spec).unwrap());
        assert_ne!(
            make_imbalanced(&spec).unwrap(),
            make_imbalanced(&spec.clone().with_seed(10)).unwrap()
        );
    }

    #[test]
    fn test_invalid_specs() {
        assert!(make_imbalanced(&ImbalancedSpec::new(10, 0.0)).is_err());
        assert!(make_imbalanced(&ImbalancedSpec::new(10, 0.01)).is_err());
        assert!(make_imbalanced(&ImbalancedSpec::new(10, 0.5).with_numeric(0)).is_err());
        assert!(make_imbalanced(&ImbalancedSpec::new(10, 0.5).with_categorical(1, 1)).is_err());
    }

    #[test]
    fn test_spec_from_json() {
        let spec: ImbalancedSpec = serde_json::from_str(r#"{"n_samples": 80, "n_categorical": 1}"#).unwrap();
        assert_eq!(spec.n_samples, 80);
        assert_eq!(spec.n_numeric, 2);
        assert!(make_imbalanced(&spec).is_ok());
    }
}
