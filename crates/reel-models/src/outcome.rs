//! Outbound job outcomes for the web layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::video::VideoArtifact;

/// Classified reason a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    Configuration,
    InsufficientFrames,
    Assembly,
    Timeout,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Configuration => "configuration",
            FailureKind::InsufficientFrames => "insufficient_frames",
            FailureKind::Assembly => "assembly",
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
        }
    }

    /// Whether the caller can fix the failure by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FailureKind::InvalidRequest)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-visible failure with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum GenerationOutcome {
    Completed {
        artifact: VideoArtifact,
        frames_requested: u32,
        frames_generated: u32,
    },
    Failed(JobFailure),
}

impl GenerationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, GenerationOutcome::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_shape() {
        let outcome = GenerationOutcome::Failed(JobFailure {
            kind: FailureKind::InsufficientFrames,
            message: "No frames could be generated".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "insufficient_frames");
        assert!(!outcome.is_completed());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(FailureKind::InvalidRequest.is_client_error());
        assert!(!FailureKind::Assembly.is_client_error());
    }
}
