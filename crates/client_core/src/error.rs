use shared::{
    error::{ApiError, ErrorCode},
    geometry::GeometryError,
};
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Failures surfaced by queries and mutations.
///
/// `Clone` because one failed round trip is delivered to every caller that
/// attached to it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("malformed geometry: {0}")]
    MalformedGeometry(#[from] GeometryError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
}

impl CacheError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedPayload(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    pub(crate) fn from_api(status: u16, error: ApiError) -> Self {
        match error.code {
            ErrorCode::NotFound => Self::NotFound(error.message),
            _ => Self::Transport {
                status: Some(status),
                message: error.message,
            },
        }
    }
}
