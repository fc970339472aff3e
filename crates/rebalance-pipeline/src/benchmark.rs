use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rebalance_core::{Class, Classifier, Dataset, Float};
use rebalance_metrics::{
    confusion_at_thresholds, log_loss, roc_auc, tune_threshold, ConfusionMatrix, ThresholdMetric,
    ThresholdPoint,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cv::{CrossValidator, CvStrategy, Split};
use crate::error::{PipelineError, PipelineResult};

/// Benchmark settings shared by every learner.
///
/// # Defaults
///
/// | Parameter       | Default                        |
/// |-----------------|--------------------------------|
/// | `cv`            | `StratifiedKFold { folds: 5 }` |
/// | `thresholds`    | `[0.5]`                        |
/// | `tuning_metric` | `F1`                           |
/// | `seed`          | 42                             |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub cv: CvStrategy,
    /// Fixed cut-offs at which per-fold confusion matrices are reported.
    pub thresholds: Vec<f64>,
    /// Objective for the threshold tuned on pooled out-of-fold predictions.
    pub tuning_metric: ThresholdMetric,
    pub seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            cv: CvStrategy::default(),
            thresholds: vec![0.5],
            tuning_metric: ThresholdMetric::F1,
            seed: 42,
        }
    }
}

impl BenchmarkConfig {
    #[must_use]
    pub fn with_cv(mut self, cv: CvStrategy) -> Self {
        self.cv = cv;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn with_tuning_metric(mut self, metric: ThresholdMetric) -> Self {
        self.tuning_metric = metric;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.thresholds.is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "at least one threshold is required".into(),
            ));
        }
        if let Some(t) = self.thresholds.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "threshold {t} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

/// A classifier entered into a benchmark under a unique id.
pub struct Learner<T: Float> {
    pub id: String,
    pub classifier: Box<dyn Classifier<T>>,
}

impl<T: Float> Learner<T> {
    /// Learner identified by the classifier's own name.
    pub fn new(classifier: Box<dyn Classifier<T>>) -> Self {
        Learner {
            id: classifier.name(),
            classifier,
        }
    }

    pub fn with_id(id: impl Into<String>, classifier: Box<dyn Classifier<T>>) -> Self {
        Learner {
            id: id.into(),
            classifier,
        }
    }
}

/// Test-partition probabilities from one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldPredictions {
    pub repeat: usize,
    pub fold: usize,
    /// Row indices into the evaluated dataset.
    pub rows: Vec<usize>,
    pub probabilities: Vec<f64>,
    pub classes: Vec<Class>,
}

/// Fit on the split's training rows and score its test rows.
pub fn evaluate_split<T: Float>(
    classifier: &dyn Classifier<T>,
    data: &Dataset<T>,
    split: &Split,
    seed: u64,
) -> PipelineResult<FoldPredictions> {
    let train = data.subset(&split.train)?;
    let test = data.subset(&split.test)?;
    let model = classifier.fit(&train, seed)?;
    let probabilities = model
        .predict_proba(test.features())?
        .into_iter()
        .map(|p| p.to_f64())
        .collect();
    Ok(FoldPredictions {
        repeat: split.repeat,
        fold: split.fold,
        rows: split.test.clone(),
        probabilities,
        classes: test.classes().to_vec(),
    })
}

/// Mean and population standard deviation over folds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
}

impl MetricSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return MetricSummary::default();
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        MetricSummary {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// One split's scores for a learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub repeat: usize,
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub auc: f64,
    pub log_loss: f64,
    /// One matrix per configured threshold, in order.
    pub confusion: Vec<ConfusionMatrix>,
}

/// Fold-aggregated results at one fixed threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSummary {
    pub threshold: f64,
    /// Sum of the per-fold confusion matrices.
    pub confusion: ConfusionMatrix,
    pub accuracy: MetricSummary,
    pub precision: MetricSummary,
    pub recall: MetricSummary,
    pub f1: MetricSummary,
    pub balanced_accuracy: MetricSummary,
    pub mcc: MetricSummary,
}

impl ThresholdSummary {
    fn from_folds(threshold: f64, matrices: &[ConfusionMatrix]) -> Self {
        let summarize = |score: fn(&ConfusionMatrix) -> f64| {
            MetricSummary::from_scores(&matrices.iter().map(score).collect::<Vec<_>>())
        };
        ThresholdSummary {
            threshold,
            confusion: matrices.iter().fold(ConfusionMatrix::default(), |acc, cm| acc + *cm),
            accuracy: summarize(ConfusionMatrix::accuracy),
            precision: summarize(ConfusionMatrix::precision),
            recall: summarize(ConfusionMatrix::recall),
            f1: summarize(ConfusionMatrix::f1),
            balanced_accuracy: summarize(ConfusionMatrix::balanced_accuracy),
            mcc: summarize(ConfusionMatrix::mcc),
        }
    }
}

/// Everything measured for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerResult {
    pub id: String,
    pub folds: Vec<FoldResult>,
    pub thresholds: Vec<ThresholdSummary>,
    /// Per-fold ROC-AUC.
    pub auc: MetricSummary,
    /// ROC-AUC over all out-of-fold predictions pooled together.
    pub pooled_auc: f64,
    pub tuning_metric: String,
    /// Best threshold on the pooled out-of-fold predictions.
    pub tuned: ThresholdPoint,
    #[serde(skip)]
    pub predictions: Vec<FoldPredictions>,
}

impl LearnerResult {
    /// Pooled out-of-fold probabilities and their labels, in split order.
    pub fn pooled(&self) -> (Vec<f64>, Vec<Class>) {
        let probabilities = self
            .predictions
            .iter()
            .flat_map(|p| p.probabilities.iter().copied())
            .collect();
        let classes = self
            .predictions
            .iter()
            .flat_map(|p| p.classes.iter().copied())
            .collect();
        (probabilities, classes)
    }

    pub fn at_threshold(&self, threshold: f64) -> Option<&ThresholdSummary> {
        self.thresholds.iter().find(|t| t.threshold == threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub seed: u64,
    pub n_samples: usize,
    pub n_splits: usize,
    pub learners: Vec<LearnerResult>,
}

impl BenchmarkResult {
    pub fn learner(&self, id: &str) -> Option<&LearnerResult> {
        self.learners.iter().find(|l| l.id == id)
    }
}

/// Evaluates several learners on the same cross-validation splits.
///
/// Every (learner, split) pair is an independent job run on the rayon pool.
/// Split assignment and per-split fit seeds are fixed from the master seed
/// before dispatch, so results do not depend on scheduling.
pub struct Benchmark<T: Float> {
    config: BenchmarkConfig,
    learners: Vec<Learner<T>>,
}

impl<T: Float> Benchmark<T> {
    pub fn new(config: BenchmarkConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Benchmark {
            config,
            learners: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_learner(mut self, learner: Learner<T>) -> Self {
        self.learners.push(learner);
        self
    }

    pub fn push(&mut self, learner: Learner<T>) {
        self.learners.push(learner);
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn learner_ids(&self) -> Vec<&str> {
        self.learners.iter().map(|l| l.id.as_str()).collect()
    }

    #[instrument(skip_all, fields(n_learners = self.learners.len(), n_samples = data.len()))]
    pub fn run(&self, data: &Dataset<T>) -> PipelineResult<BenchmarkResult> {
        if self.learners.is_empty() {
            return Err(PipelineError::InvalidConfiguration("no learners to benchmark".into()));
        }
        let mut ids = HashSet::new();
        if let Some(dup) = self.learners.iter().find(|l| !ids.insert(l.id.as_str())) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "duplicate learner id '{}'",
                dup.id
            )));
        }

        let mut master = StdRng::seed_from_u64(self.config.seed);
        let cv = CrossValidator::new(self.config.cv, master.gen());
        let splits = cv.splits(data.classes())?;
        let split_seeds: Vec<u64> = splits.iter().map(|_| master.gen()).collect();
        let n_splits = splits.len();

        info!(
            n_learners = self.learners.len(),
            n_splits,
            seed = self.config.seed,
            "running benchmark"
        );

        let jobs: Vec<(usize, usize)> = (0..self.learners.len())
            .flat_map(|l| (0..n_splits).map(move |s| (l, s)))
            .collect();
        let outputs = jobs
            .par_iter()
            .map(|&(l, s)| {
                let learner = &self.learners[l];
                debug!(learner = %learner.id, repeat = splits[s].repeat, fold = splits[s].fold, "evaluating split");
                evaluate_split(learner.classifier.as_ref(), data, &splits[s], split_seeds[s])
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut outputs = outputs.into_iter();
        let mut learners = Vec::with_capacity(self.learners.len());
        for learner in &self.learners {
            let predictions: Vec<FoldPredictions> = outputs.by_ref().take(n_splits).collect();
            learners.push(self.summarize(&learner.id, predictions, &splits)?);
        }

        Ok(BenchmarkResult {
            seed: self.config.seed,
            n_samples: data.len(),
            n_splits,
            learners,
        })
    }

    fn summarize(
        &self,
        id: &str,
        predictions: Vec<FoldPredictions>,
        splits: &[Split],
    ) -> PipelineResult<LearnerResult> {
        let thresholds = &self.config.thresholds;
        let mut per_threshold: Vec<Vec<ConfusionMatrix>> = vec![Vec::new(); thresholds.len()];
        let mut folds = Vec::with_capacity(predictions.len());

        for (pred, split) in predictions.iter().zip(splits) {
            let confusion = confusion_at_thresholds(&pred.probabilities, &pred.classes, thresholds)?;
            for (bucket, cm) in per_threshold.iter_mut().zip(&confusion) {
                bucket.push(*cm);
            }
            folds.push(FoldResult {
                repeat: split.repeat,
                fold: split.fold,
                n_train: split.train.len(),
                n_test: split.test.len(),
                auc: roc_auc(&pred.probabilities, &pred.classes)?,
                log_loss: log_loss(&pred.probabilities, &pred.classes)?,
                confusion,
            });
        }

        let summaries: Vec<ThresholdSummary> = thresholds
            .iter()
            .zip(&per_threshold)
            .map(|(&t, cms)| ThresholdSummary::from_folds(t, cms))
            .collect();

        let mut result = LearnerResult {
            id: id.to_string(),
            auc: MetricSummary::from_scores(&folds.iter().map(|f| f.auc).collect::<Vec<_>>()),
            folds,
            thresholds: summaries,
            pooled_auc: 0.0,
            tuning_metric: self.config.tuning_metric.name(),
            tuned: ThresholdPoint {
                threshold: 0.5,
                score: 0.0,
                confusion: ConfusionMatrix::default(),
            },
            predictions,
        };
        let (probabilities, classes) = result.pooled();
        result.pooled_auc = roc_auc(&probabilities, &classes)?;
        result.tuned = tune_threshold(&probabilities, &classes, self.config.tuning_metric)?;

        info!(
            learner = id,
            auc = result.auc.mean,
            pooled_auc = result.pooled_auc,
            tuned_threshold = result.tuned.threshold,
            tuned_score = result.tuned.score,
            "learner evaluated"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smote_wrapper::SmoteClassifier;
    use rebalance_datasets::{make_imbalanced, ImbalancedSpec};
    use rebalance_linear::LogisticRegression;
    use rebalance_sampling::{Rate, SamplingError, SmoteConfig};
    use rebalance_tree::{DecisionTree, TreeConfig};

    fn data() -> Dataset<f64> {
        make_imbalanced(&ImbalancedSpec::new(120, 0.2).with_seed(5)).unwrap()
    }

    fn benchmark() -> Benchmark<f64> {
        let smote_tree = SmoteClassifier::<f64>::new(
            Box::new(DecisionTree::new(TreeConfig::default().with_max_depth(3))),
            SmoteConfig::new(Rate::Percent(200.0), 3),
        )
        .unwrap();
        Benchmark::<f64>::new(
            BenchmarkConfig::default()
                .with_cv(CvStrategy::StratifiedKFold { folds: 4 })
                .with_thresholds(vec![0.3, 0.5]),
        )
        .unwrap()
        .with_learner(Learner::new(Box::new(LogisticRegression::default())))
        .with_learner(Learner::new(Box::new(smote_tree)))
    }

    #[test]
    fn test_benchmark_shapes() {
        let data = data();
        let result = benchmark().run(&data).unwrap();
        assert_eq!(result.n_splits, 4);
        assert_eq!(result.learners.len(), 2);

        let logistic = result.learner("logistic").unwrap();
        assert_eq!(logistic.folds.len(), 4);
        assert_eq!(logistic.thresholds.len(), 2);
        // Every row is scored exactly once across the folds.
        let total: usize = logistic.folds.iter().map(|f| f.n_test).sum();
        assert_eq!(total, data.len());
        assert_eq!(logistic.thresholds[1].confusion.total(), data.len());
        assert_eq!(logistic.pooled().0.len(), data.len());

        let smote = result.learner("tree+smote").unwrap();
        assert!(smote.tuned.threshold >= 0.0 && smote.tuned.threshold <= 1.0);
        assert!(logistic.pooled_auc > 0.5);
    }

    #[test]
    fn test_benchmark_reproducible() {
        let data = data();
        let a = benchmark().run(&data).unwrap();
        let b = benchmark().run(&data).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.learners[1].predictions, b.learners[1].predictions);
    }

    #[test]
    fn test_rejects_bad_setup() {
        assert!(Benchmark::<f64>::new(BenchmarkConfig::default().with_thresholds(vec![])).is_err());
        assert!(Benchmark::<f64>::new(BenchmarkConfig::default().with_thresholds(vec![1.5])).is_err());

        let empty = Benchmark::<f64>::new(BenchmarkConfig::default()).unwrap();
        assert!(matches!(
            empty.run(&data()),
            Err(PipelineError::InvalidConfiguration(_))
        ));

        let dup = Benchmark::<f64>::new(BenchmarkConfig::default())
            .unwrap()
            .with_learner(Learner::new(Box::new(LogisticRegression::default())))
            .with_learner(Learner::new(Box::new(LogisticRegression::default())));
        assert!(matches!(
            dup.run(&data()),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_fold_oversampling_error_keeps_kind() {
        // 24 positives over 4 folds leave 18 per training partition.
        let greedy = SmoteClassifier::<f64>::new(
            Box::new(LogisticRegression::default()),
            SmoteConfig::new(Rate::Percent(100.0), 30),
        )
        .unwrap();
        let bench = Benchmark::<f64>::new(BenchmarkConfig::default().with_cv(CvStrategy::StratifiedKFold { folds: 4 }))
            .unwrap()
            .with_learner(Learner::new(Box::new(greedy)));
        assert!(matches!(
            bench.run(&data()),
            Err(PipelineError::Sampling(SamplingError::InsufficientMinoritySamples { required: 31, .. }))
        ));
    }

    #[test]
    fn test_metric_summary() {
        let s = MetricSummary::from_scores(&[1.0, 3.0]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.std, 1.0);
        assert_eq!(MetricSummary::from_scores(&[]), MetricSummary::default());
    }

    #[test]
    fn test_config_json_defaults() {
        let config: BenchmarkConfig =
            serde_json::from_str(r#"{"cv": {"strategy": "k_fold", "folds": 3}, "tuning_metric": "mcc"}"#).unwrap();
        assert_eq!(config.cv, CvStrategy::KFold { folds: 3 });
        assert_eq!(config.thresholds, vec![0.5]);
        assert_eq!(config.tuning_metric, ThresholdMetric::Mcc);
    }
}
