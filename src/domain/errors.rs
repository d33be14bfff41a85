use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown model identifier '{identifier}' for task {task}")]
    UnknownIdentifier { task: String, identifier: String },
    #[error("unable to load model from {path}: {reason}")]
    ModelLoadError { path: String, reason: String },
    #[error("media source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("inference failed: {0}")]
    InferenceError(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
