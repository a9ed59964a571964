//! Finished videos and their metadata records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::encoding::Resolution;
use crate::job::{GenerationJob, JobId};

/// An encoded video published to the artifact directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoArtifact {
    /// Job that produced this video
    pub job_id: JobId,
    /// Unique filename inside the artifact directory
    pub filename: String,
    /// Absolute or configured-relative path of the published file
    pub path: PathBuf,
    /// Measured (or planned, if probing is unavailable) duration
    pub duration_secs: f64,
    pub resolution: Resolution,
    pub fps: u32,
    pub size_bytes: u64,
    /// Number of distinct frames that made it into the video
    pub frames_used: u32,
    pub created_at: DateTime<Utc>,
}

/// Record handed to the metadata sink after a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Same value as the job ID
    pub id: String,
    pub filename: String,
    pub prompt: String,
    /// Frames actually used in the video
    pub num_frames: u32,
    pub duration_secs: f64,
    pub resolution: Resolution,
    pub fps: u32,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn new(job: &GenerationJob, artifact: &VideoArtifact) -> Self {
        Self {
            id: job.id.to_string(),
            filename: artifact.filename.clone(),
            prompt: job.prompt.clone(),
            num_frames: artifact.frames_used,
            duration_secs: artifact.duration_secs,
            resolution: artifact.resolution,
            fps: artifact.fps,
            file_size: artifact.size_bytes,
            created_at: artifact.created_at,
        }
    }
}
