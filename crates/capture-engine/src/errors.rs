use sessioncap_core_types::SessionError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("capture already completed")]
    AlreadyCompleted,
    #[error("session cookie not captured yet")]
    SessionNotReady,
    #[error("username override is empty")]
    InvalidUsername,
    #[error("engine stopped")]
    Stopped,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for SessionError {
    fn from(value: EngineError) -> Self {
        SessionError::new(value.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
