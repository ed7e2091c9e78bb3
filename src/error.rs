use thiserror::Error;

/// Failure taxonomy for the verification core.
///
/// Gateway rate limiting is handled by the reconnect loop in `main` and
/// never surfaces through this type.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("external AI service error: {0}")]
    ExternalService(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
