use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("No predictions to evaluate")]
    EmptyInput,

    #[error("Length mismatch: {predictions} predictions for {labels} labels")]
    LengthMismatch { predictions: usize, labels: usize },

    #[error("Probability at index {index} is not finite")]
    NonFiniteProbability { index: usize },
}

pub type MetricsResult<T> = Result<T, MetricsError>;

pub(crate) fn check_lengths(predictions: usize, labels: usize) -> MetricsResult<()> {
    if predictions != labels {
        return Err(MetricsError::LengthMismatch { predictions, labels });
    }
    if labels == 0 {
        return Err(MetricsError::EmptyInput);
    }
    Ok(())
}
