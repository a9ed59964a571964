//! Worker configuration.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reel_imagegen::ImageSourceConfig;
use reel_models::{EncodingConfig, GenerationLimits, OutputSettings, Resolution};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum frame fetches in flight across all jobs in this process
    pub max_fetch_parallel: usize,
    /// Fewest successful frames a job may be assembled from
    pub min_success_frames: u32,
    /// Bounds and defaults for inbound requests
    pub limits: GenerationLimits,
    /// Frame rate and resolution of every video
    pub output: OutputSettings,
    /// Encoder settings
    pub encoding: EncodingConfig,
    /// Root for job workspaces
    pub work_dir: PathBuf,
    /// Artifact directory; published videos stay here until deleted externally
    pub output_dir: PathBuf,
    /// JSON file backing the metadata store
    pub metadata_path: PathBuf,
    /// Outer deadline covering fetch, collect and assemble
    pub job_timeout: Duration,
    /// Budget for the fetch phase; frames still in flight when it runs out
    /// are dropped and the job continues with what arrived
    pub fetch_timeout: Duration,
    /// Deadline for the FFmpeg encode alone
    pub encode_timeout: Duration,
    /// Upstream image source
    pub image_source: ImageSourceConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_fetch_parallel: 4,
            min_success_frames: 1,
            limits: GenerationLimits::default(),
            output: OutputSettings::default(),
            encoding: EncodingConfig::default(),
            work_dir: PathBuf::from("/tmp/promptreel"),
            output_dir: PathBuf::from("static/videos"),
            metadata_path: PathBuf::from("video_metadata.json"),
            job_timeout: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(150),
            encode_timeout: Duration::from_secs(120),
            image_source: ImageSourceConfig::default(),
        }
    }
}

/// Parse `key` if it is set and non-blank, otherwise keep `default`.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> WorkerResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match parse_opt(lookup, key)? {
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

fn parse_opt<F, T>(lookup: &F, key: &str) -> WorkerResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|raw| !raw.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            WorkerError::config_error(format!("{} has invalid value {:?}: {}", key, raw, e))
        }),
    }
}

/// Absolute, lexically normalized form of `path` for containment checks.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults. A variable that is set but does
    /// not parse fails with a message naming it.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_limits = defaults.limits;

        let mut encoding = defaults.encoding;
        if let Some(preset) = lookup("REEL_VIDEO_PRESET") {
            encoding.preset = preset;
        }
        if let Some(bitrate) = lookup("REEL_VIDEO_BITRATE") {
            encoding.video_bitrate = bitrate;
        }
        if let Some(crf) = parse_opt(&lookup, "REEL_VIDEO_CRF")? {
            encoding.crf = Some(crf);
        }

        let secs = |key: &str, default: Duration| -> WorkerResult<Duration> {
            parse_var(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        Ok(Self {
            max_fetch_parallel: parse_var(&lookup, "REEL_MAX_FETCH_PARALLEL", defaults.max_fetch_parallel)?,
            min_success_frames: parse_var(&lookup, "REEL_MIN_SUCCESS_FRAMES", defaults.min_success_frames)?,
            limits: GenerationLimits {
                min_frames: parse_var(&lookup, "REEL_MIN_FRAMES", default_limits.min_frames)?,
                max_frames: parse_var(&lookup, "REEL_MAX_FRAMES", default_limits.max_frames)?,
                default_frames: parse_var(&lookup, "REEL_DEFAULT_FRAMES", default_limits.default_frames)?,
                min_duration_secs: parse_var(&lookup, "REEL_MIN_DURATION_SECS", default_limits.min_duration_secs)?,
                max_duration_secs: parse_var(&lookup, "REEL_MAX_DURATION_SECS", default_limits.max_duration_secs)?,
                default_duration_secs: parse_var(
                    &lookup,
                    "REEL_DEFAULT_DURATION_SECS",
                    default_limits.default_duration_secs,
                )?,
            },
            output: OutputSettings {
                fps: parse_var(&lookup, "REEL_FPS", defaults.output.fps)?,
                resolution: Resolution::new(
                    parse_var(&lookup, "REEL_WIDTH", defaults.output.resolution.width)?,
                    parse_var(&lookup, "REEL_HEIGHT", defaults.output.resolution.height)?,
                ),
            },
            encoding,
            work_dir: lookup("REEL_WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
            output_dir: lookup("REEL_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            metadata_path: lookup("REEL_METADATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.metadata_path),
            job_timeout: secs("REEL_JOB_TIMEOUT_SECS", defaults.job_timeout)?,
            fetch_timeout: secs("REEL_FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            encode_timeout: secs("REEL_ENCODE_TIMEOUT_SECS", defaults.encode_timeout)?,
            image_source: ImageSourceConfig::from_lookup(&lookup)
                .map_err(|e| WorkerError::config_error(e.to_string()))?,
        })
    }

    /// Reject configurations that cannot run a job.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_fetch_parallel == 0 {
            return Err(WorkerError::config_error("max_fetch_parallel must be at least 1"));
        }

        self.limits.check().map_err(WorkerError::config_error)?;

        if self.min_success_frames == 0 {
            return Err(WorkerError::config_error("min_success_frames must be at least 1"));
        }
        if self.min_success_frames > self.limits.max_frames {
            return Err(WorkerError::config_error(format!(
                "min_success_frames ({}) exceeds max_frames ({})",
                self.min_success_frames, self.limits.max_frames
            )));
        }

        if self.output.fps == 0 {
            return Err(WorkerError::config_error("fps must be greater than zero"));
        }
        if !self.output.resolution.is_encodable() {
            return Err(WorkerError::config_error(format!(
                "resolution {} must be non-zero and even",
                self.output.resolution
            )));
        }

        if self.work_dir.as_os_str().is_empty() || self.output_dir.as_os_str().is_empty() {
            return Err(WorkerError::config_error("work_dir and output_dir must be set"));
        }
        let (work_dir, output_dir) = (normalize(&self.work_dir), normalize(&self.output_dir));
        if work_dir.starts_with(&output_dir) || output_dir.starts_with(&work_dir) {
            return Err(WorkerError::config_error(format!(
                "work_dir ({}) and output_dir ({}) must not overlap",
                self.work_dir.display(),
                self.output_dir.display()
            )));
        }

        if self.job_timeout.is_zero() || self.fetch_timeout.is_zero() || self.encode_timeout.is_zero() {
            return Err(WorkerError::config_error("timeouts must be greater than zero"));
        }
        // Fetch and encode must both fit, with room left to collect and probe
        let phases = self.fetch_timeout.checked_add(self.encode_timeout);
        if phases.map_or(true, |total| total >= self.job_timeout) {
            return Err(WorkerError::config_error(format!(
                "job_timeout ({}s) must exceed fetch_timeout ({}s) plus encode_timeout ({}s)",
                self.job_timeout.as_secs_f64(),
                self.fetch_timeout.as_secs_f64(),
                self.encode_timeout.as_secs_f64()
            )));
        }

        self.image_source
            .validate()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;

        Ok(())
    }
}
