use rebalance_core::ClassCounts;
use rebalance_neighbors::DistanceMetric;
use serde::{Deserialize, Serialize};

use crate::error::{SamplingError, SamplingResult};

/// Upper bound on the synthetic rows a single call may generate.
pub const MAX_SYNTHETIC: usize = 100_000_000;

/// How many synthetic minority samples to generate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    /// Percentage of the minority count: 100 means one synthetic sample per
    /// minority sample, 250 means two and a half.
    Percent(f64),
    /// Multiplier on the minority count: 2.0 doubles the minority class,
    /// 1.0 leaves it unchanged.
    Factor(f64),
    /// Grow the minority class up to the majority count.
    Balance,
}

impl Rate {
    pub fn validate(&self) -> SamplingResult<()> {
        match *self {
            Rate::Percent(p) if !p.is_finite() || p <= 0.0 => Err(SamplingError::InvalidConfiguration(
                format!("rate must be a positive percentage, got {p}"),
            )),
            Rate::Factor(f) if !f.is_finite() || f < 1.0 => Err(SamplingError::InvalidConfiguration(
                format!("rate factor must be >= 1, got {f}"),
            )),
            _ => Ok(()),
        }
    }

    /// Total synthetic samples for the given class counts.
    ///
    /// Fractional totals are rounded to the nearest whole sample, halves away
    /// from zero. Totals above [`MAX_SYNTHETIC`] are rejected.
    pub fn synthetic_count(&self, counts: ClassCounts) -> SamplingResult<usize> {
        let n = counts.positive as f64;
        let total = match *self {
            Rate::Percent(p) => (n * p / 100.0).round(),
            Rate::Factor(f) => (n * (f - 1.0)).round(),
            Rate::Balance => return Ok(counts.negative.saturating_sub(counts.positive)),
        };
        if !total.is_finite() || total > MAX_SYNTHETIC as f64 {
            return Err(SamplingError::InvalidConfiguration(format!(
                "rate {self:?} asks for {total} synthetic samples, limit is {MAX_SYNTHETIC}"
            )));
        }
        Ok(total as usize)
    }
}

/// How categorical attributes of a synthetic sample are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalStrategy {
    /// Most frequent value among the source sample's k neighbors; ties go to
    /// the source's own value, then to the lower level index.
    #[default]
    MajorityVote,
    /// Copy the source sample's value.
    CopySource,
}

/// SMOTE parameters.
///
/// # Defaults
///
/// | Parameter     | Default        |
/// |---------------|----------------|
/// | `rate`        | `Percent(100)` |
/// | `k`           | 5              |
/// | `seed`        | 42             |
/// | `categorical` | `MajorityVote` |
/// | `metric`      | `Euclidean`    |
/// | `scale_by_range` | `false`     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoteConfig {
    pub rate: Rate,
    pub k: usize,
    pub seed: u64,
    pub categorical: CategoricalStrategy,
    pub metric: DistanceMetric,
    /// Divide numeric differences by the column range of the minority subset.
    pub scale_by_range: bool,
}

impl Default for SmoteConfig {
    fn default() -> Self {
        SmoteConfig {
            rate: Rate::Percent(100.0),
            k: 5,
            seed: 42,
            categorical: CategoricalStrategy::MajorityVote,
            metric: DistanceMetric::Euclidean,
            scale_by_range: false,
        }
    }
}

impl SmoteConfig {
    pub fn new(rate: Rate, k: usize) -> Self {
        SmoteConfig {
            rate,
            k,
            ..SmoteConfig::default()
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_categorical(mut self, strategy: CategoricalStrategy) -> Self {
        self.categorical = strategy;
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_range_scaling(mut self, enabled: bool) -> Self {
        self.scale_by_range = enabled;
        self
    }

    /// Check the parameters that do not depend on the data.
    pub fn validate(&self) -> SamplingResult<()> {
        if self.k == 0 {
            return Err(SamplingError::InvalidConfiguration(
                "k must be at least 1".into(),
            ));
        }
        self.rate.validate()
    }
}
