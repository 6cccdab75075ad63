//! Typed error hierarchy shared by init-time and ingress operations.

use thiserror::Error;

/// Error kinds an operator or a frontend can branch on, per the engine's
/// error handling contract. Never raised mid-block: render errors are
/// logged and substituted with silence instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<hound::Error> for EngineError {
    fn from(e: hound::Error) -> Self {
        EngineError::InvalidArgument(format!("wav decode: {e}"))
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::InvalidArgument(format!("yaml parse: {e}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::InvalidArgument(format!("json parse: {e}"))
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::InvalidArgument(format!("toml parse: {e}"))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::NotFound(format!("io: {e}"))
    }
}
