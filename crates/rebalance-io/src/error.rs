use rebalance_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Column '{0}' not found in header")]
    MissingColumn(String),

    #[error("File has a header but no data rows")]
    EmptyFile,

    #[error("Row {row}: target value '{value}' is neither the positive nor the negative label")]
    UnknownLabel { row: usize, value: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type IoResult<T> = Result<T, IoError>;
