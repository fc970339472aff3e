use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rebalance_core::{Classifier, Dataset, Float};
use rebalance_metrics::{ConfusionMatrix, ThresholdMetric};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::benchmark::{evaluate_split, MetricSummary};
use crate::cv::CrossValidator;
use crate::error::{PipelineError, PipelineResult};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Int(i) => Some(i as f64),
            ParamValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match *self {
            ParamValue::Int(i) => usize::try_from(i).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// The values one hyperparameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDomain {
    Discrete(Vec<ParamValue>),
    /// `low..=high` in increments of `step`.
    IntRange { low: i64, high: i64, step: i64 },
    /// Grid search takes `steps` evenly spaced points including both ends;
    /// random search draws uniformly from `[low, high]`.
    FloatRange { low: f64, high: f64, steps: usize },
}

impl ParamDomain {
    fn validate(&self, name: &str) -> PipelineResult<()> {
        let bad = |msg: String| -> PipelineResult<()> {
            Err(PipelineError::InvalidConfiguration(format!("parameter '{name}': {msg}")))
        };
        match *self {
            ParamDomain::Discrete(ref values) if values.is_empty() => bad("no values".into()),
            ParamDomain::IntRange { low, high, step } if step <= 0 || low > high => {
                bad(format!("invalid int range {low}..={high} step {step}"))
            }
            ParamDomain::FloatRange { low, high, steps }
                if steps == 0 || !(low <= high) || !low.is_finite() || !high.is_finite() =>
            {
                bad(format!("invalid float range [{low}, {high}] with {steps} steps"))
            }
            _ => Ok(()),
        }
    }

    /// Every grid value, in ascending or listed order.
    pub fn grid(&self) -> Vec<ParamValue> {
        match *self {
            ParamDomain::Discrete(ref values) => values.clone(),
            ParamDomain::IntRange { low, high, step } => {
                let mut out = Vec::new();
                let mut next = Some(low);
                while let Some(v) = next.filter(|&v| v <= high) {
                    out.push(ParamValue::Int(v));
                    next = v.checked_add(step);
                }
                out
            }
            ParamDomain::FloatRange { low, high, steps } => {
                if steps == 1 {
                    return vec![ParamValue::Float(low)];
                }
                let width = (high - low) / (steps - 1) as f64;
                (0..steps)
                    .map(|i| ParamValue::Float(low + width * i as f64))
                    .collect()
            }
        }
    }

    /// One uniform draw.
    pub fn sample(&self, rng: &mut StdRng) -> ParamValue {
        match *self {
            ParamDomain::Discrete(ref values) => values
                .choose(rng)
                .cloned()
                .unwrap_or(ParamValue::Bool(false)),
            ParamDomain::IntRange { low, high, step } => {
                // i128 keeps the span of any i64 pair representable
                let n_steps = (i128::from(high) - i128::from(low)) / i128::from(step);
                let v = i128::from(low) + i128::from(step) * rng.gen_range(0..=n_steps);
                ParamValue::Int(i64::try_from(v).unwrap_or(high))
            }
            ParamDomain::FloatRange { low, high, .. } => {
                if low == high {
                    ParamValue::Float(low)
                } else {
                    ParamValue::Float(rng.gen_range(low..=high))
                }
            }
        }
    }
}

/// Named hyperparameter domains, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    params: Vec<(String, ParamDomain)>,
}

impl ParamSpace {
    pub fn new() -> Self {
        ParamSpace::default()
    }

    #[must_use]
    pub fn add(mut self, name: impl Into<String>, domain: ParamDomain) -> Self {
        self.params.push((name.into(), domain));
        self
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[(String, ParamDomain)] {
        &self.params
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.params.is_empty() {
            return Err(PipelineError::EmptySearchSpace);
        }
        for (name, domain) in &self.params {
            domain.validate(name)?;
        }
        Ok(())
    }
}

/// One concrete assignment of hyperparameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    pub fn get_usize(&self, name: &str) -> Option<usize> {
        self.get(name).and_then(ParamValue::as_usize)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub params: ParamSet,
    pub score: MetricSummary,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub metric: String,
    pub threshold: f64,
    /// In evaluation order.
    pub trials: Vec<Trial>,
    /// Index into `trials` of the highest mean score; ties keep the first.
    pub best: usize,
}

impl SearchResult {
    pub fn best_trial(&self) -> &Trial {
        &self.trials[self.best]
    }
}

/// How the metric is computed for each candidate.
#[derive(Debug, Clone)]
pub struct Scoring {
    pub cv: CrossValidator,
    pub metric: ThresholdMetric,
    /// Fixed cut-off at which the metric is measured.
    pub threshold: f64,
    /// Seeds each split's fit; identical for every candidate.
    pub seed: u64,
}

/// A strategy for proposing hyperparameter candidates.
pub trait HyperparameterSearch: Send + Sync {
    /// Candidates to evaluate, in order.
    fn candidates(&self, space: &ParamSpace) -> PipelineResult<Vec<ParamSet>>;

    /// Score every candidate by cross-validation and pick the best.
    ///
    /// `factory` turns a candidate into an untrained classifier. Candidates
    /// are evaluated in parallel; all of them share the same splits and fit
    /// seeds.
    #[instrument(skip_all, fields(metric = %scoring.metric.name(), n_samples = data.len()))]
    fn search<T, F>(
        &self,
        space: &ParamSpace,
        factory: F,
        data: &Dataset<T>,
        scoring: &Scoring,
    ) -> PipelineResult<SearchResult>
    where
        Self: Sized,
        T: Float,
        F: Fn(&ParamSet) -> PipelineResult<Box<dyn Classifier<T>>> + Sync,
    {
        let candidates = self.candidates(space)?;
        if candidates.is_empty() {
            return Err(PipelineError::EmptySearchSpace);
        }
        let splits = scoring.cv.splits(data.classes())?;
        let mut rng = StdRng::seed_from_u64(scoring.seed);
        let split_seeds: Vec<u64> = splits.iter().map(|_| rng.gen()).collect();
        info!(n_candidates = candidates.len(), n_splits = splits.len(), "starting search");

        let trials = candidates
            .into_par_iter()
            .map(|params| {
                let classifier = factory(&params)?;
                let mut fold_scores = Vec::with_capacity(splits.len());
                for (split, &seed) in splits.iter().zip(&split_seeds) {
                    let pred = evaluate_split(classifier.as_ref(), data, split, seed)?;
                    let cm = ConfusionMatrix::at_threshold(&pred.probabilities, &pred.classes, scoring.threshold)?;
                    fold_scores.push(scoring.metric.score(&cm));
                }
                let score = MetricSummary::from_scores(&fold_scores);
                debug!(params = %params, mean = score.mean, "trial scored");
                Ok(Trial {
                    params,
                    score,
                    fold_scores,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut best = 0;
        for (i, trial) in trials.iter().enumerate().skip(1) {
            if trial.score.mean > trials[best].score.mean {
                best = i;
            }
        }
        info!(best = %trials[best].params, score = trials[best].score.mean, "search finished");

        Ok(SearchResult {
            metric: scoring.metric.name(),
            threshold: scoring.threshold,
            trials,
            best,
        })
    }
}

/// Exhaustive search over the Cartesian product of every domain's grid.
///
/// The last parameter added varies fastest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl HyperparameterSearch for GridSearch {
    fn candidates(&self, space: &ParamSpace) -> PipelineResult<Vec<ParamSet>> {
        space.validate()?;
        let mut sets = vec![ParamSet::default()];
        for (name, domain) in space.params() {
            let values = domain.grid();
            let mut next = Vec::with_capacity(sets.len() * values.len());
            for set in &sets {
                for value in &values {
                    let mut extended = set.clone();
                    extended.insert(name.clone(), value.clone());
                    next.push(extended);
                }
            }
            sets = next;
        }
        Ok(sets)
    }
}

/// `n_iter` independent uniform draws from the space.
#[derive(Debug, Clone, Copy)]
pub struct RandomSearch {
    pub n_iter: usize,
    pub seed: u64,
}

impl RandomSearch {
    pub fn new(n_iter: usize, seed: u64) -> Self {
        RandomSearch { n_iter, seed }
    }
}

impl HyperparameterSearch for RandomSearch {
    fn candidates(&self, space: &ParamSpace) -> PipelineResult<Vec<ParamSet>> {
        space.validate()?;
        if self.n_iter == 0 {
            return Err(PipelineError::EmptySearchSpace);
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        Ok((0..self.n_iter)
            .map(|_| {
                let mut set = ParamSet::default();
                for (name, domain) in space.params() {
                    set.insert(name.clone(), domain.sample(&mut rng));
                }
                set
            })
            .collect())
    }
}
