use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("malformed input in {file}: {reason}")]
    MalformedInput { file: String, reason: String },
    #[error("invalid parameter: {0}")]
    ParameterDomain(String),
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("vector not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
