//! Worker error types.

use std::time::Duration;

use reel_media::MediaError;
use reel_models::{FailureKind, JobFailure, RequestError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Only {succeeded} of {requested} frames were generated, {required} required")]
    InsufficientFrames {
        succeeded: usize,
        required: u32,
        requested: u32,
    },

    #[error("Assembly failed: {0}")]
    AssemblyFailed(#[source] MediaError),

    #[error("Workspace error: {0}")]
    Workspace(#[source] MediaError),

    #[error("Job exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Metadata store error: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            WorkerError::InvalidRequest(_) => FailureKind::InvalidRequest,
            WorkerError::ConfigError(_) => FailureKind::Configuration,
            WorkerError::InsufficientFrames { .. } => FailureKind::InsufficientFrames,
            WorkerError::AssemblyFailed(_) => FailureKind::Assembly,
            WorkerError::Timeout(_) => FailureKind::Timeout,
            WorkerError::Workspace(_) | WorkerError::Metadata(_) | WorkerError::Io(_) => {
                FailureKind::Internal
            }
        }
    }

    /// User-facing failure. Low-level detail stays in the logs.
    pub fn failure(&self) -> JobFailure {
        let message = match self {
            WorkerError::InvalidRequest(e) => e.to_string(),
            WorkerError::ConfigError(_) => {
                "The video service is misconfigured. Please contact the administrator.".to_string()
            }
            WorkerError::InsufficientFrames {
                succeeded: 0,
                ..
            } => "No frames could be generated. The image service may be busy, please try again."
                .to_string(),
            WorkerError::InsufficientFrames {
                succeeded,
                required,
                requested,
            } => format!(
                "Only {} of {} frames could be generated ({} needed). Please try again.",
                succeeded, requested, required
            ),
            WorkerError::AssemblyFailed(_) => {
                "The frames were generated but the video could not be assembled.".to_string()
            }
            WorkerError::Timeout(limit) => format!(
                "Video generation took longer than {} seconds and was stopped.",
                limit.as_secs()
            ),
            WorkerError::Workspace(_) | WorkerError::Metadata(_) | WorkerError::Io(_) => {
                "An internal error occurred while generating the video.".to_string()
            }
        };

        JobFailure {
            kind: self.kind(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_hides_low_level_detail() {
        let err = WorkerError::AssemblyFailed(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("[libx264 @ 0x55d] broken pipe".to_string()),
            Some(1),
        ));
        let failure = err.failure();

        assert_eq!(failure.kind, FailureKind::Assembly);
        assert!(!failure.message.contains("libx264"));
        assert!(!failure.message.contains("FFmpeg"));
    }

    #[test]
    fn test_insufficient_frames_messages() {
        let none = WorkerError::InsufficientFrames {
            succeeded: 0,
            required: 1,
            requested: 15,
        }
        .failure();
        assert_eq!(none.kind, FailureKind::InsufficientFrames);
        assert!(none.message.starts_with("No frames"));

        let some = WorkerError::InsufficientFrames {
            succeeded: 3,
            required: 5,
            requested: 15,
        }
        .failure();
        assert!(some.message.contains("3 of 15"));
    }

    #[test]
    fn test_request_errors_pass_through() {
        let failure = WorkerError::from(RequestError::EmptyPrompt).failure();
        assert_eq!(failure.kind, FailureKind::InvalidRequest);
        assert_eq!(failure.message, "Prompt is required");
    }
}
