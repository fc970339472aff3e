use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Core error type for matrix, dataset and estimator operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Index out of bounds: index {index} for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Feature '{feature}' has {levels} levels, got category index {value}")]
    InvalidCategory {
        feature: String,
        levels: usize,
        value: f64,
    },

    #[error("Non-finite value at row {row}, column {col}")]
    NonFiniteValue { row: usize, col: usize },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failure inside a component built on the core types, such as a
    /// resampling step run during `fit`. The original error is kept.
    #[error("{context}")]
    Component {
        context: String,
        #[source]
        source: SourceError,
    },
}

impl CoreError {
    pub fn component<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoreError::Component {
            context: context.into(),
            source: SourceError(Arc::new(error)),
        }
    }

    /// The wrapped component error, if this is one of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            CoreError::Component { source, .. } => source.0.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Shared handle to a component error. Two handles compare equal when they
/// point at the same error.
#[derive(Debug, Clone)]
pub struct SourceError(Arc<dyn std::error::Error + Send + Sync>);

impl PartialEq for SourceError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
