use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NeighborsError {
    #[error("Row has {got} features, distance expects {expected}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Requested k = {k} neighbors but only {available} candidates exist")]
    InvalidK { k: usize, available: usize },

    #[error("Query index {index} out of range for {size} reference rows")]
    QueryOutOfRange { index: usize, size: usize },

    #[error("Distance evaluated to a non-finite value")]
    NonFinite,
}

pub type NeighborsResult<T> = Result<T, NeighborsError>;
