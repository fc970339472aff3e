pub mod matrix;
pub mod dataset;
pub mod dtype;
pub mod error;
pub mod estimator;

pub use matrix::Matrix;
pub use dataset::{Class, ClassCounts, Dataset, Feature, FeatureKind, Sample, Schema};
pub use dtype::Float;
pub use error::{CoreError, CoreResult, SourceError};
pub use estimator::{Classifier, Model};
