use classcache_api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassCacheError {
    #[error("Invalid merge input: {0}")]
    InvalidMergeInput(String),
    #[error("Type {fqn} is stored as {stored} but was given as {given}")]
    VariantMismatch {
        fqn: String,
        stored: &'static str,
        given: &'static str,
    },
    #[error("Lock poisoned while acquiring {0} access")]
    LockPoisoned(&'static str),
    #[error("Invalid type pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<ApiError> for ClassCacheError {
    fn from(err: ApiError) -> Self {
        ClassCacheError::InvalidMergeInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClassCacheError>;
