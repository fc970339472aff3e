use rebalance_core::CoreError;
use rebalance_neighbors::NeighborsError;
use thiserror::Error;

/// Errors from oversampling. All are caller misconfiguration; none are retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Invalid oversampling configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Need at least k + 1 = {required} minority samples, found {found}")]
    InsufficientMinoritySamples { required: usize, found: usize },

    #[error("Training set is empty")]
    EmptyDataset,

    #[error("Distance computation failed: {0}")]
    DistanceComputationError(#[from] NeighborsError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SamplingResult<T> = Result<T, SamplingError>;
