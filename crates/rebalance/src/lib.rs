//! # rebalance
//!
//! Tools for binary classification when the positive class is rare.
//!
//! ## Modules
//!
//! - **core**: `Matrix`, `Dataset` with mixed numeric/categorical schema, `Classifier`/`Model` traits
//! - **neighbors**: Mixed-type distances and brute-force k-nearest-neighbor search
//! - **sampling**: SMOTE and SMOTE-NC oversampling with percent, factor or balance rates
//! - **metrics**: Confusion matrix, ROC AUC, log loss, decision-threshold tuning
//! - **preprocessing**: StandardScaler, one-hot design encoder, stratified holdout split
//! - **linear**: Logistic regression
//! - **tree**: Decision tree (CART), random forest
//! - **pipeline**: Cross-validation, SMOTE-wrapped classifiers, benchmarks, grid/random search
//! - **datasets**: Synthetic imbalanced data generator
//! - **io**: CSV datasets, JSON configs and reports

/// Core data types and estimator traits.
pub use rebalance_core as core;

/// Distance metrics and nearest neighbors.
pub use rebalance_neighbors as neighbors;

/// Minority oversampling.
pub use rebalance_sampling as sampling;

/// Evaluation metrics and threshold tuning.
pub use rebalance_metrics as metrics;

/// Data preprocessing.
pub use rebalance_preprocessing as preprocessing;

/// Linear models.
pub use rebalance_linear as linear;

/// Tree-based models.
pub use rebalance_tree as tree;

/// Cross-validation, benchmarks and hyperparameter search.
pub use rebalance_pipeline as pipeline;

/// Synthetic datasets.
pub use rebalance_datasets as datasets;

/// I/O utilities.
pub use rebalance_io as io;
