use thiserror::Error;

#[derive(Debug, Error)]
pub enum FiledockError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}
