#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing fully-qualified name")]
    MissingFqn,
    #[error("Unsupported type kind '{kind}' for {fqn}")]
    UnsupportedKind { fqn: String, kind: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
