use rebalance_core::CoreError;
use rebalance_metrics::MetricsError;
use rebalance_sampling::SamplingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid fold count {folds}: need at least 2")]
    InvalidFolds { folds: usize },

    #[error("Too few samples: {n_samples} rows cannot fill {folds} folds")]
    TooFewSamples { n_samples: usize, folds: usize },

    #[error("Search space produced no candidates")]
    EmptySearchSpace,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Core(CoreError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Oversampling failures raised inside `fit` come back as `Sampling`.
impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err.downcast_ref::<SamplingError>() {
            Some(sampling) => PipelineError::Sampling(sampling.clone()),
            None => PipelineError::Core(err),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
