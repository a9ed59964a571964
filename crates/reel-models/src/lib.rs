//! Shared data models for PromptReel.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests, limits and jobs
//! - Frame requests, per-frame results and ordered frame sets
//! - Encoding and output settings
//! - Finished video artifacts, metadata records and job outcomes

pub mod encoding;
pub mod frame;
pub mod job;
pub mod outcome;
pub mod video;

// Re-export common types
pub use encoding::{EncodingConfig, OutputSettings, Resolution};
pub use frame::{FetchFailureKind, FetchedFrame, FrameFailure, FrameRequest, FrameResult, FrameSet};
pub use job::{GenerationJob, GenerationLimits, GenerationRequest, JobId, RequestError};
pub use outcome::{FailureKind, GenerationOutcome, JobFailure};
pub use video::{VideoArtifact, VideoRecord};
