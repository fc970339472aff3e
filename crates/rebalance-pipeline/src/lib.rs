//! Model evaluation for imbalanced binary classification.
//!
//! Splits come from a seeded [`CrossValidator`]. A [`SmoteClassifier`]
//! oversamples inside `fit`, so synthetic rows only ever join a training
//! partition. [`Benchmark`] runs several learners over the same splits and
//! reports fixed-threshold and tuned-threshold metrics, while
//! [`HyperparameterSearch`] strategies score candidate configurations.

pub mod benchmark;
pub mod cv;
pub mod error;
pub mod search;
pub mod smote_wrapper;

pub use benchmark::{
    evaluate_split, Benchmark, BenchmarkConfig, BenchmarkResult, FoldPredictions, FoldResult,
    Learner, LearnerResult, MetricSummary, ThresholdSummary,
};
pub use cv::{CrossValidator, CvStrategy, Split};
pub use error::{PipelineError, PipelineResult};
pub use search::{
    GridSearch, HyperparameterSearch, ParamDomain, ParamSet, ParamSpace, ParamValue, RandomSearch,
    Scoring, SearchResult, Trial,
};
pub use smote_wrapper::{mix_seeds, SmoteClassifier};
