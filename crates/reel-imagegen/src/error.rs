//! Image source error types.

use std::time::Duration;

use reel_models::FetchFailureKind;
use thiserror::Error;

pub type ImageGenResult<T> = Result<T, ImageGenError>;

#[derive(Debug, Error)]
pub enum ImageGenError {
    #[error("Invalid image source configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response is not a recognised image: {0}")]
    InvalidImage(String),
}

impl ImageGenError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Classify a reqwest error, separating timeouts from other transport errors.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ImageGenError::Timeout(_)
            | ImageGenError::Network(_)
            | ImageGenError::RateLimited { .. } => true,
            ImageGenError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Per-frame failure classification.
    pub fn failure_kind(&self) -> FetchFailureKind {
        match self {
            ImageGenError::Timeout(_) => FetchFailureKind::Timeout,
            ImageGenError::Network(_) | ImageGenError::InvalidUrl(_) | ImageGenError::InvalidConfig(_) => {
                FetchFailureKind::Transport
            }
            ImageGenError::RateLimited { .. } => FetchFailureKind::RateLimited,
            ImageGenError::Status { status, .. } => FetchFailureKind::UpstreamStatus(*status),
            ImageGenError::InvalidImage(_) => FetchFailureKind::InvalidImage,
        }
    }
}
