use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rebalance_core::estimator::{check_row_width, check_trainable};
use rebalance_core::{Class, Classifier, CoreError, CoreResult, Dataset, Float, Matrix, Model};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// How many candidate features to examine at each split.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
    Log2,
    Fraction(f64),
    Fixed(usize),
}

impl MaxFeatures {
    /// Concrete feature count for `n_features` columns, at least 1.
    pub fn resolve(self, n_features: usize) -> CoreResult<usize> {
        let resolved = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
        };
        if resolved == 0 || resolved > n_features {
            return Err(CoreError::InvalidParameter(format!(
                "max_features resolves to {resolved} for {n_features} features"
            )));
        }
        Ok(resolved)
    }
}

/// CART growth limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Nodes with fewer rows become leaves.
    pub min_samples_split: usize,
    /// Every child of a split keeps at least this many rows.
    pub min_samples_leaf: usize,
    /// A split must reduce weighted Gini impurity by at least this much.
    pub min_impurity_decrease: f64,
    pub max_features: MaxFeatures,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_impurity_decrease: 0.0,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    #[must_use]
    pub fn with_min_impurity_decrease(mut self, d: f64) -> Self {
        self.min_impurity_decrease = d;
        self
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.min_samples_split < 2 {
            return Err(CoreError::InvalidParameter(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(CoreError::InvalidParameter(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if !(self.min_impurity_decrease >= 0.0 && self.min_impurity_decrease.is_finite()) {
            return Err(CoreError::InvalidParameter(format!(
                "min_impurity_decrease must be non-negative, got {}",
                self.min_impurity_decrease
            )));
        }
        Ok(())
    }
}

/// A node in the decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
enum TreeNode<T: Float> {
    /// Internal node: rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: T,
        left: Box<TreeNode<T>>,
        right: Box<TreeNode<T>>,
    },
    /// Leaf: fraction of positive training rows that reached it.
    Leaf { proba: T, n_samples: usize },
}

/// Decision tree classifier using CART with Gini impurity.
///
/// Categorical columns hold level indices and are split like ordinal values.
#[derive(Debug, Clone, Default)]
pub struct DecisionTree {
    pub config: TreeConfig,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        DecisionTree { config }
    }

    /// Train and return the concrete model.
    pub fn fit_model<T: Float>(&self, data: &Dataset<T>, seed: u64) -> CoreResult<TreeModel<T>> {
        check_trainable(data)?;
        let indices: Vec<usize> = (0..data.len()).collect();
        TreeModel::grow(data.features(), data.classes(), &indices, &self.config, seed)
    }
}

impl<T: Float> Classifier<T> for DecisionTree {
    fn name(&self) -> String {
        "tree".into()
    }

    #[instrument(skip_all, fields(learner = "tree", n_samples = data.len()))]
    fn fit(&self, data: &Dataset<T>, seed: u64) -> CoreResult<Box<dyn Model<T>>> {
        let model = self.fit_model(data, seed)?;
        debug!(depth = model.depth(), leaves = model.n_leaves(), "tree fitted");
        Ok(Box::new(model))
    }
}

/// A fitted decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct TreeModel<T: Float> {
    root: TreeNode<T>,
    n_features: usize,
}

impl<T: Float> TreeModel<T> {
    /// Grow a tree on the rows of `x` listed in `indices` (repeats allowed,
    /// as in a bootstrap sample).
    pub fn grow(
        x: &Matrix<T>,
        classes: &[Class],
        indices: &[usize],
        config: &TreeConfig,
        seed: u64,
    ) -> CoreResult<Self> {
        config.validate()?;
        if indices.is_empty() {
            return Err(CoreError::EmptyDataset);
        }
        if x.nrows() != classes.len() {
            return Err(CoreError::ShapeMismatch {
                expected: vec![x.nrows()],
                got: vec![classes.len()],
            });
        }
        let max_features = config.max_features.resolve(x.ncols())?;
        let mut builder = Builder {
            x,
            classes,
            config,
            max_features,
            n_total: indices.len(),
            rng: StdRng::seed_from_u64(seed),
        };
        let root = builder.build(indices.to_vec(), 0)?;
        Ok(TreeModel {
            root,
            n_features: x.ncols(),
        })
    }

    pub fn depth(&self) -> usize {
        fn walk<T: Float>(node: &TreeNode<T>) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    pub fn n_leaves(&self) -> usize {
        fn walk<T: Float>(node: &TreeNode<T>) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        walk(&self.root)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl<T: Float> Model<T> for TreeModel<T> {
    fn predict_proba_row(&self, row: &[T]) -> CoreResult<T> {
        check_row_width(row, self.n_features)?;
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { proba, .. } => return Ok(*proba),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

struct Builder<'a, T: Float> {
    x: &'a Matrix<T>,
    classes: &'a [Class],
    config: &'a TreeConfig,
    max_features: usize,
    n_total: usize,
    rng: StdRng,
}

struct BestSplit<T> {
    feature: usize,
    threshold: T,
    child_gini: f64,
}

/// Gini impurity of a binary node: 2p(1 - p).
fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

impl<'a, T: Float> Builder<'a, T> {
    fn leaf(&self, indices: &[usize]) -> TreeNode<T> {
        let positives = self.count_positive(indices);
        TreeNode::Leaf {
            proba: T::from_usize(positives) / T::from_usize(indices.len()),
            n_samples: indices.len(),
        }
    }

    fn count_positive(&self, indices: &[usize]) -> usize {
        indices.iter().filter(|&&i| self.classes[i].is_positive()).count()
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> CoreResult<TreeNode<T>> {
        let n = indices.len();
        let positives = self.count_positive(&indices);
        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || positives == 0
            || positives == n
        {
            return Ok(self.leaf(&indices));
        }

        let parent_gini = gini(positives, n);
        let best = match self.best_split(&indices, positives)? {
            Some(best) => best,
            None => return Ok(self.leaf(&indices)),
        };

        let decrease = n as f64 / self.n_total as f64 * (parent_gini - best.child_gini);
        if decrease < self.config.min_impurity_decrease || decrease <= 0.0 {
            return Ok(self.leaf(&indices));
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &i in &indices {
            if self.x.get(i, best.feature)? <= best.threshold {
                left.push(i);
            } else {
                right.push(i);
            }
        }
        if left.is_empty() || right.is_empty() {
            return Ok(self.leaf(&indices));
        }

        let left_node = self.build(left, depth + 1)?;
        let right_node = self.build(right, depth + 1)?;
        Ok(TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left_node),
            right: Box::new(right_node),
        })
    }

    /// Lowest weighted child impurity over the candidate features. Ties keep
    /// the first feature and threshold examined.
    fn best_split(&mut self, indices: &[usize], positives: usize) -> CoreResult<Option<BestSplit<T>>> {
        let p = self.x.ncols();
        let mut candidates: Vec<usize> = if self.max_features < p {
            index::sample(&mut self.rng, p, self.max_features).into_vec()
        } else {
            (0..p).collect()
        };
        candidates.sort_unstable();

        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf;
        let mut best: Option<BestSplit<T>> = None;
        let mut pairs: Vec<(T, bool)> = Vec::with_capacity(n);

        for feature in candidates {
            pairs.clear();
            for &i in indices {
                pairs.push((self.x.get(i, feature)?, self.classes[i].is_positive()));
            }
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0;
            for k in 0..n - 1 {
                if pairs[k].1 {
                    left_pos += 1;
                }
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }
                let left_n = k + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let child = (left_n as f64 * gini(left_pos, left_n)
                    + right_n as f64 * gini(positives - left_pos, right_n))
                    / n as f64;
                if best.as_ref().map_or(true, |b| child < b.child_gini) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (pairs[k].0 + pairs[k + 1].0) * T::HALF,
                        child_gini: child,
                    });
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rebalance_core::{Feature, Schema};

    fn steps() -> Dataset<f64> {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let classes = (0..8).map(|i| Class::from_bool(i >= 4)).collect();
        Dataset::from_numeric(&rows, classes).unwrap()
    }

    #[test]
    fn test_decision_tree_classifier() {
        let data = steps();
        let model = DecisionTree::default().fit(&data, 0).unwrap();
        let proba = model.predict_proba(data.features()).unwrap();

        // Should get 100% accuracy on training data
        for (i, p) in proba.iter().enumerate() {
            let expected = if i >= 4 { 1.0 } else { 0.0 };
            assert_relative_eq!(*p, expected);
        }
    }

    #[test]
    fn test_split_threshold_is_midpoint() {
        let model = DecisionTree::default().fit_model(&steps(), 0).unwrap();
        assert_eq!(model.depth(), 1);
        assert_eq!(model.n_leaves(), 2);
        assert_eq!(model.predict_proba_row(&[3.5]).unwrap(), 0.0);
        assert_eq!(model.predict_proba_row(&[3.51]).unwrap(), 1.0);
    }

    #[test]
    fn test_leaf_holds_positive_fraction() {
        // Identical rows cannot be separated; the leaf keeps the class mix.
        let data = Dataset::from_numeric(
            &[vec![1.0], vec![1.0], vec![1.0], vec![1.0]],
            vec![Class::Positive, Class::Negative, Class::Negative, Class::Negative],
        )
        .unwrap();
        let model = DecisionTree::default().fit_model(&data, 0).unwrap();
        assert_relative_eq!(model.predict_proba_row(&[1.0]).unwrap(), 0.25);
    }

    #[test]
    fn test_depth_and_leaf_limits() {
        let rows: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let classes = (0..16).map(|i| Class::from_bool(i % 2 == 0)).collect();
        let data = Dataset::from_numeric(&rows, classes).unwrap();

        let stump = DecisionTree::new(TreeConfig::default().with_max_depth(1))
            .fit_model(&data, 0)
            .unwrap();
        assert!(stump.depth() <= 1);

        let coarse = DecisionTree::new(TreeConfig::default().with_min_samples_leaf(4))
            .fit_model(&data, 0)
            .unwrap();
        assert!(coarse.n_leaves() <= 4);

        let pruned = DecisionTree::new(TreeConfig::default().with_min_impurity_decrease(0.5))
            .fit_model(&data, 0)
            .unwrap();
        assert_eq!(pruned.n_leaves(), 1);
    }

    #[test]
    fn test_categorical_levels_split() {
        let schema = Schema::new(vec![Feature::categorical(
            "grade",
            vec!["a".into(), "b".into(), "c".into()],
        )]);
        let rows: Vec<Vec<f64>> = (0..9).map(|i| vec![(i % 3) as f64]).collect();
        let classes = (0..9).map(|i| Class::from_bool(i % 3 == 2)).collect();
        let data = Dataset::new(schema, Matrix::from_rows(&rows).unwrap(), classes).unwrap();

        let model = DecisionTree::default().fit_model(&data, 0).unwrap();
        assert_eq!(model.predict_proba_row(&[2.0]).unwrap(), 1.0);
        assert_eq!(model.predict_proba_row(&[0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10).unwrap(), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1).unwrap(), 1);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(5).unwrap(), 3);
        assert!(MaxFeatures::Fixed(6).resolve(5).is_err());
        assert!(MaxFeatures::Fixed(0).resolve(5).is_err());
    }

    #[test]
    fn test_invalid_config_and_row() {
        let bad = DecisionTree::new(TreeConfig::default().with_min_samples_split(1));
        assert!(bad.fit_model(&steps(), 0).is_err());
        let model = DecisionTree::default().fit_model(&steps(), 0).unwrap();
        assert!(model.predict_proba_row(&[1.0, 2.0]).is_err());
    }
}
