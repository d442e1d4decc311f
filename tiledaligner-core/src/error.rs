//! Error types shared across the aligner core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Reference lookup failed: {0}")]
    ReferenceLookupFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl AlignError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn lookup<S: Into<String>>(message: S) -> Self {
        Self::ReferenceLookupFailed(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }
}

pub type AlignResult<T> = Result<T, AlignError>;
