use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rebalance_core::Classifier;
use rebalance_linear::{LogisticConfig, LogisticRegression};
use rebalance_pipeline::{BenchmarkConfig, CvStrategy, Learner, SmoteClassifier};
use rebalance_sampling::{Rate, SmoteConfig};
use rebalance_tree::{DecisionTree, ForestConfig, RandomForest, TreeConfig};

/// Which classifier a learner entry builds, with its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelSpec {
    Logistic {
        #[serde(default)]
        params: LogisticConfig,
    },
    Tree {
        #[serde(default)]
        params: TreeConfig,
    },
    Forest {
        #[serde(default)]
        params: ForestConfig,
    },
}

/// One entry of the `learners` list.
///
/// ```json
/// { "model": "forest", "params": { "n_trees": 200 }, "smote": { "rate": { "percent": 200.0 }, "k": 5 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub model: ModelSpec,
    #[serde(default)]
    pub smote: Option<SmoteConfig>,
}

impl LearnerSpec {
    pub fn build(&self) -> Result<Learner<f64>> {
        let classifier: Box<dyn Classifier<f64>> = match &self.model {
            ModelSpec::Logistic { params } => {
                params.validate().context("invalid logistic parameters")?;
                Box::new(LogisticRegression::new(params.clone()))
            }
            ModelSpec::Tree { params } => {
                params.validate().context("invalid tree parameters")?;
                Box::new(DecisionTree::new(params.clone()))
            }
            ModelSpec::Forest { params } => {
                if params.n_trees == 0 {
                    anyhow::bail!("invalid forest parameters: n_trees must be at least 1");
                }
                Box::new(RandomForest::new(params.clone()))
            }
        };
        let classifier: Box<dyn Classifier<f64>> = match &self.smote {
            Some(smote) => Box::new(
                SmoteClassifier::new(classifier, smote.clone()).context("invalid smote configuration")?,
            ),
            None => classifier,
        };
        Ok(match &self.id {
            Some(id) => Learner::with_id(id.clone(), classifier),
            None => Learner::new(classifier),
        })
    }
}

/// Contents of a `--config` file: the learners plus the benchmark settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkFile {
    pub learners: Vec<LearnerSpec>,
    #[serde(flatten)]
    pub benchmark: BenchmarkConfig,
}

impl BenchmarkFile {
    pub fn build_learners(&self) -> Result<Vec<Learner<f64>>> {
        if self.learners.is_empty() {
            anyhow::bail!("config lists no learners");
        }
        self.learners
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.build().with_context(|| format!("learner #{i}")))
            .collect()
    }
}

impl Default for BenchmarkFile {
    /// Plain and SMOTE-wrapped logistic regression and random forest under
    /// 5-fold stratified CV, scored at 0.5 and tuned on F1.
    fn default() -> Self {
        let smote = SmoteConfig::new(Rate::Percent(200.0), 5);
        let logistic = ModelSpec::Logistic {
            params: LogisticConfig::default(),
        };
        let forest = ModelSpec::Forest {
            params: ForestConfig {
                n_trees: 50,
                ..Default::default()
            },
        };
        let learner = |model: &ModelSpec, smote: Option<SmoteConfig>| LearnerSpec {
            id: None,
            model: model.clone(),
            smote,
        };
        BenchmarkFile {
            learners: vec![
                learner(&logistic, None),
                learner(&logistic, Some(smote.clone())),
                learner(&forest, None),
                learner(&forest, Some(smote)),
            ],
            benchmark: BenchmarkConfig::default()
                .with_cv(CvStrategy::StratifiedKFold { folds: 5 })
                .with_thresholds(vec![0.3, 0.5]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalance_metrics::ThresholdMetric;

    #[test]
    fn test_parse_config_file() {
        let json = r#"{
            "learners": [
                { "model": "logistic", "params": { "l2": 0.01 } },
                { "id": "rf-smote", "model": "forest", "params": { "n_trees": 20 },
                  "smote": { "rate": { "percent": 300.0 }, "k": 3 } },
                { "model": "tree" }
            ],
            "cv": { "strategy": "stratified_k_fold", "folds": 3 },
            "thresholds": [0.2, 0.5],
            "tuning_metric": "mcc"
        }"#;
        let file: BenchmarkFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.learners.len(), 3);
        assert_eq!(file.benchmark.cv, CvStrategy::StratifiedKFold { folds: 3 });
        assert_eq!(file.benchmark.thresholds, vec![0.2, 0.5]);
        assert_eq!(file.benchmark.tuning_metric, ThresholdMetric::Mcc);
        assert_eq!(file.benchmark.seed, 42);

        let smote = file.learners[1].smote.as_ref().unwrap();
        assert_eq!(smote.rate, Rate::Percent(300.0));
        assert_eq!(smote.k, 3);

        let learners = file.build_learners().unwrap();
        let ids: Vec<&str> = learners.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["logistic", "rf-smote", "tree"]);
    }

    #[test]
    fn test_smote_learner_is_named_after_inner() {
        let spec = LearnerSpec {
            id: None,
            model: ModelSpec::Tree {
                params: TreeConfig::default(),
            },
            smote: Some(SmoteConfig::new(Rate::Balance, 5)),
        };
        assert_eq!(spec.build().unwrap().id, "tree+smote");
    }

    #[test]
    fn test_rejects_bad_learners() {
        let empty = BenchmarkFile {
            learners: Vec::new(),
            benchmark: BenchmarkConfig::default(),
        };
        assert!(empty.build_learners().is_err());

        let bad_k: BenchmarkFile =
            serde_json::from_str(r#"{ "learners": [ { "model": "tree", "smote": { "k": 0 } } ] }"#).unwrap();
        assert!(bad_k.build_learners().is_err());

        assert!(serde_json::from_str::<BenchmarkFile>(r#"{ "learners": [ { "model": "svm" } ] }"#).is_err());
    }

    #[test]
    fn test_default_file_builds() {
        let file = BenchmarkFile::default();
        let learners = file.build_learners().unwrap();
        let ids: Vec<&str> = learners.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["logistic", "logistic+smote", "forest", "forest+smote"]);
        assert!(file.benchmark.validate().is_ok());
    }
}
