use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rebalance_core::estimator::{check_row_width, check_trainable};
use rebalance_core::{Classifier, CoreError, CoreResult, Dataset, Float, Model};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::decision_tree::{MaxFeatures, TreeConfig, TreeModel};

/// Ensemble settings for [`RandomForest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn afresh at every split.
    pub max_features: MaxFeatures,
    /// Train each tree on a bootstrap resample instead of the full set.
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

impl ForestConfig {
    pub fn new(n_trees: usize) -> CoreResult<Self> {
        if n_trees == 0 {
            return Err(CoreError::InvalidParameter("n_trees must be at least 1".into()));
        }
        Ok(ForestConfig {
            n_trees,
            ..Default::default()
        })
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            min_impurity_decrease: 0.0,
            max_features: self.max_features,
        }
    }
}

/// Random forest classifier: bagged CART trees with per-split feature
/// subsampling. Trees are grown in parallel.
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    pub config: ForestConfig,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        RandomForest { config }
    }

    /// Train and return the concrete ensemble.
    ///
    /// Per-tree seeds are drawn from `seed` before dispatch, so the result
    /// does not depend on the thread count.
    pub fn fit_model<T: Float>(&self, data: &Dataset<T>, seed: u64) -> CoreResult<ForestModel<T>> {
        check_trainable(data)?;
        if self.config.n_trees == 0 {
            return Err(CoreError::InvalidParameter("n_trees must be at least 1".into()));
        }
        let tree_config = self.config.tree_config();
        tree_config.validate()?;
        let max_features = self.config.max_features.resolve(data.n_features())?;

        let n = data.len();
        info!(
            n_trees = self.config.n_trees,
            n_samples = n,
            n_features = data.n_features(),
            max_features,
            "training random forest"
        );

        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..self.config.n_trees).map(|_| master.gen()).collect();
        let bootstrap = self.config.bootstrap;

        let trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let indices: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                TreeModel::grow(data.features(), data.classes(), &indices, &tree_config, rng.gen())
            })
            .collect::<CoreResult<Vec<_>>>()?;

        debug!(n_trees_trained = trees.len(), "tree training complete");
        Ok(ForestModel {
            trees,
            n_features: data.n_features(),
        })
    }
}

impl<T: Float> Classifier<T> for RandomForest {
    fn name(&self) -> String {
        "forest".into()
    }

    #[instrument(skip_all, fields(learner = "forest", n_trees = self.config.n_trees, n_samples = data.len()))]
    fn fit(&self, data: &Dataset<T>, seed: u64) -> CoreResult<Box<dyn Model<T>>> {
        Ok(Box::new(self.fit_model(data, seed)?))
    }
}

/// A fitted forest; the probability is the mean of the trees' leaf values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct ForestModel<T: Float> {
    trees: Vec<TreeModel<T>>,
    n_features: usize,
}

impl<T: Float> ForestModel<T> {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl<T: Float> Model<T> for ForestModel<T> {
    fn predict_proba_row(&self, row: &[T]) -> CoreResult<T> {
        check_row_width(row, self.n_features)?;
        let mut sum = T::ZERO;
        for tree in &self.trees {
            sum += tree.predict_proba_row(row)?;
        }
        Ok(sum / T::from_usize(self.trees.len()))
    }
}
