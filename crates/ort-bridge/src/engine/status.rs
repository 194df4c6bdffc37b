use thiserror::Error;

/// Category of an engine failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Fail,
    InvalidArgument,
    NotImplemented,
    RuntimeException,
}

/// Non-OK status returned by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct EngineError {
    pub code: StatusCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Fail, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotImplemented, message)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
