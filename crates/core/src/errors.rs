use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("project name must not be empty")]
    EmptyName,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("unknown collision policy: {0}")]
    UnknownPolicy(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage io error: {0}")]
    StorageIo(String),
    #[error("internal error: {0}")]
    Internal(String),
}
