use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("inference error: {0}")]
    Inference(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("operation failed: {0}")]
    OperationFailed(String),
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            DomainError::NotFound(e.to_string())
        } else {
            DomainError::OperationFailed(e.to_string())
        }
    }
}

impl From<image::ImageError> for DomainError {
    fn from(e: image::ImageError) -> Self {
        DomainError::Image(e.to_string())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
