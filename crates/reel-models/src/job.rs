//! Generation requests and jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::encoding::{OutputSettings, Resolution};
use crate::frame::FrameRequest;

/// Longest prompt accepted from callers, in characters.
pub const MAX_PROMPT_CHARS: u64 = 1000;

/// Unique identifier for a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while turning an inbound request into a job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("Prompt must be at most {max} characters")]
    PromptTooLong { max: u64 },

    #[error("Frame count {requested} is outside the allowed range {min}..={max}")]
    FrameCountOutOfRange { requested: u32, min: u32, max: u32 },

    #[error("Duration {requested}s is outside the allowed range {min}s..={max}s")]
    DurationOutOfRange { requested: f64, min: f64, max: f64 },
}

/// Inbound request from the web layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerationRequest {
    /// Text prompt describing the video
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,

    /// Requested number of frames (defaults to the configured value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_frames: Option<u32>,

    /// Requested video length in seconds (defaults to the configured value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl GenerationRequest {
    /// Create a request with the configured defaults.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            num_frames: None,
            duration_secs: None,
        }
    }

    pub fn with_frames(mut self, num_frames: u32) -> Self {
        self.num_frames = Some(num_frames);
        self
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    /// Validate against the configured limits and build a job.
    ///
    /// The prompt is trimmed first. Out-of-range overrides are rejected,
    /// never clamped.
    pub fn into_job(
        self,
        limits: &GenerationLimits,
        output: OutputSettings,
        seed: u64,
    ) -> Result<GenerationJob, RequestError> {
        let trimmed = Self {
            prompt: self.prompt.trim().to_string(),
            ..self
        };

        if let Err(errors) = trimmed.validate() {
            let prompt_errors = errors.field_errors();
            return Err(match prompt_errors.get("prompt") {
                Some(_) if trimmed.prompt.is_empty() => RequestError::EmptyPrompt,
                _ => RequestError::PromptTooLong {
                    max: MAX_PROMPT_CHARS,
                },
            });
        }

        let frame_count = limits.resolve_frames(trimmed.num_frames)?;
        let target_duration_secs = limits.resolve_duration(trimmed.duration_secs)?;

        Ok(GenerationJob {
            id: JobId::new(),
            prompt: trimmed.prompt,
            frame_count,
            target_duration_secs,
            fps: output.fps,
            resolution: output.resolution,
            seed,
            created_at: Utc::now(),
        })
    }
}

/// Configured bounds and defaults for inbound requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationLimits {
    pub min_frames: u32,
    pub max_frames: u32,
    pub default_frames: u32,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub default_duration_secs: f64,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            min_frames: 10,
            max_frames: 20,
            default_frames: 15,
            min_duration_secs: 4.0,
            max_duration_secs: 6.0,
            default_duration_secs: 5.0,
        }
    }
}

impl GenerationLimits {
    /// Check that the bounds are ordered and the defaults lie within them.
    pub fn check(&self) -> Result<(), String> {
        if self.min_frames == 0 || self.min_frames > self.max_frames {
            return Err(format!(
                "frame bounds must satisfy 0 < min <= max (got {}..={})",
                self.min_frames, self.max_frames
            ));
        }
        if !(self.min_frames..=self.max_frames).contains(&self.default_frames) {
            return Err(format!(
                "default frame count {} is outside {}..={}",
                self.default_frames, self.min_frames, self.max_frames
            ));
        }
        if !(self.min_duration_secs.is_finite() && self.max_duration_secs.is_finite())
            || self.min_duration_secs <= 0.0
            || self.min_duration_secs > self.max_duration_secs
        {
            return Err(format!(
                "duration bounds must satisfy 0 < min <= max (got {}s..={}s)",
                self.min_duration_secs, self.max_duration_secs
            ));
        }
        if !(self.min_duration_secs..=self.max_duration_secs).contains(&self.default_duration_secs) {
            return Err(format!(
                "default duration {}s is outside {}s..={}s",
                self.default_duration_secs, self.min_duration_secs, self.max_duration_secs
            ));
        }
        Ok(())
    }

    fn resolve_frames(&self, requested: Option<u32>) -> Result<u32, RequestError> {
        match requested {
            None => Ok(self.default_frames),
            Some(n) if (self.min_frames..=self.max_frames).contains(&n) => Ok(n),
            Some(n) => Err(RequestError::FrameCountOutOfRange {
                requested: n,
                min: self.min_frames,
                max: self.max_frames,
            }),
        }
    }

    fn resolve_duration(&self, requested: Option<f64>) -> Result<f64, RequestError> {
        match requested {
            None => Ok(self.default_duration_secs),
            Some(d) if d.is_finite() && (self.min_duration_secs..=self.max_duration_secs).contains(&d) => {
                Ok(d)
            }
            Some(d) => Err(RequestError::DurationOutOfRange {
                requested: d,
                min: self.min_duration_secs,
                max: self.max_duration_secs,
            }),
        }
    }
}

/// One end-to-end prompt-to-video run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    /// Unique job ID
    pub id: JobId,

    /// Trimmed source prompt
    pub prompt: String,

    /// Number of frames requested upstream
    pub frame_count: u32,

    /// Target video length in seconds
    pub target_duration_secs: f64,

    /// Output frame rate
    pub fps: u32,

    /// Output resolution
    pub resolution: Resolution,

    /// Base seed; frame `i` is generated with `seed + i`
    pub seed: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Target duration as a `Duration`.
    pub fn target_duration(&self) -> Duration {
        Duration::from_secs_f64(self.target_duration_secs)
    }

    /// Output settings for this job.
    pub fn output(&self) -> OutputSettings {
        OutputSettings {
            fps: self.fps,
            resolution: self.resolution,
        }
    }

    /// Build one request per frame index, `0..frame_count`.
    ///
    /// Each frame gets its own scene suffix and seed so the upstream returns
    /// distinct images for the same prompt.
    pub fn frame_requests(&self) -> Vec<FrameRequest> {
        (0..self.frame_count)
            .map(|index| FrameRequest {
                job_id: self.id.clone(),
                index,
                prompt: format!("{}, cinematic scene {}", self.prompt, index + 1),
                seed: self.seed + u64::from(index),
            })
            .collect()
    }

    /// Filename of the published video.
    pub fn output_filename(&self) -> String {
        format!("reel_{}.mp4", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_from(request: GenerationRequest) -> Result<GenerationJob, RequestError> {
        request.into_job(&GenerationLimits::default(), OutputSettings::default(), 42)
    }

    #[test]
    fn test_defaults_applied() {
        let job = job_from(GenerationRequest::new("  a quiet harbour at dawn  ")).unwrap();
        assert_eq!(job.prompt, "a quiet harbour at dawn");
        assert_eq!(job.frame_count, 15);
        assert!((job.target_duration_secs - 5.0).abs() < f64::EPSILON);
        assert_eq!(job.fps, 24);
        assert_eq!(job.resolution, Resolution::new(1920, 1080));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert_eq!(
            job_from(GenerationRequest::new("   ")).unwrap_err(),
            RequestError::EmptyPrompt
        );
    }

    #[test]
    fn test_long_prompt_rejected() {
        let prompt = "x".repeat(1001);
        assert!(matches!(
            job_from(GenerationRequest::new(prompt)).unwrap_err(),
            RequestError::PromptTooLong { max: 1000 }
        ));
    }

    #[test]
    fn test_frame_bounds() {
        assert!(job_from(GenerationRequest::new("p").with_frames(10)).is_ok());
        assert!(job_from(GenerationRequest::new("p").with_frames(20)).is_ok());
        assert!(matches!(
            job_from(GenerationRequest::new("p").with_frames(9)).unwrap_err(),
            RequestError::FrameCountOutOfRange { requested: 9, .. }
        ));
        assert!(matches!(
            job_from(GenerationRequest::new("p").with_frames(21)).unwrap_err(),
            RequestError::FrameCountOutOfRange { requested: 21, .. }
        ));
    }

    #[test]
    fn test_duration_bounds() {
        assert!(job_from(GenerationRequest::new("p").with_duration(4.0)).is_ok());
        assert!(job_from(GenerationRequest::new("p").with_duration(6.0)).is_ok());
        assert!(job_from(GenerationRequest::new("p").with_duration(6.5)).is_err());
        assert!(job_from(GenerationRequest::new("p").with_duration(f64::NAN)).is_err());
    }

    #[test]
    fn test_frame_requests_cover_every_index() {
        let job = job_from(GenerationRequest::new("a cat").with_frames(12)).unwrap();
        let requests = job.frame_requests();

        assert_eq!(requests.len(), 12);
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.index as usize, i);
            assert_eq!(request.seed, 42 + i as u64);
            assert_eq!(request.job_id, job.id);
        }
        assert_eq!(requests[0].prompt, "a cat, cinematic scene 1");
        assert_eq!(requests[11].prompt, "a cat, cinematic scene 12");
    }

    #[test]
    fn test_limits_check() {
        assert!(GenerationLimits::default().check().is_ok());

        let inverted = GenerationLimits {
            min_frames: 20,
            max_frames: 10,
            ..Default::default()
        };
        assert!(inverted.check().is_err());

        let bad_default = GenerationLimits {
            default_duration_secs: 9.0,
            ..Default::default()
        };
        assert!(bad_default.check().is_err());
    }
}
