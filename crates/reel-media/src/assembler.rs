//! Clip assembly: ordered frames in, rendered video out.
//!
//! Rendering, sizing and probing all happen inside the job workspace.
//! [`publish_artifact`] is the only step that touches the output directory.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reel_models::{EncodingConfig, FrameSet, GenerationJob, Resolution, VideoArtifact};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;
use crate::probe::probe_video;
use crate::timeline::{build_timeline, Timeline};
use crate::workspace::Workspace;

const CONCAT_LIST_NAME: &str = "timeline.ffconcat";
const RENDER_NAME: &str = "render.mp4";

/// Everything an assembler needs for one job.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    pub job: &'a GenerationJob,
    pub frames: &'a FrameSet,
    pub workspace: &'a Workspace,
}

/// Turns an ordered frame set into a video rendered inside the workspace.
///
/// The returned artifact's `path` points into the workspace until it is
/// handed to [`publish_artifact`].
#[async_trait]
pub trait ClipAssembler: Send + Sync {
    async fn assemble(&self, request: AssemblyRequest<'_>) -> MediaResult<VideoArtifact>;
}

/// Assembler backed by the FFmpeg concat demuxer.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    encoding: EncodingConfig,
    encode_timeout: Duration,
}

impl FfmpegAssembler {
    pub fn new(encoding: EncodingConfig, encode_timeout: Duration) -> Self {
        Self {
            encoding,
            encode_timeout,
        }
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    /// Filter chain that fills the frame (cropping overflow) and fixes the rate.
    pub fn frame_filter(&self, resolution: Resolution, fps: u32) -> String {
        let (w, h) = (resolution.width, resolution.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase:flags=lanczos,crop={w}:{h},setsar=1,fps={fps},format={pix}",
            pix = self.encoding.pixel_format
        )
    }

    fn encode_command(&self, job: &GenerationJob, timeline: &Timeline, list: &Path, render: &Path) -> FfmpegCommand {
        FfmpegCommand::new(list, render)
            .concat_input()
            .video_filter(self.frame_filter(job.resolution, job.fps))
            .frame_rate(job.fps)
            .output_duration(timeline.target())
            .output_args(self.encoding.to_ffmpeg_args())
    }
}

#[async_trait]
impl ClipAssembler for FfmpegAssembler {
    async fn assemble(&self, request: AssemblyRequest<'_>) -> MediaResult<VideoArtifact> {
        let AssemblyRequest {
            job,
            frames,
            workspace,
        } = request;

        if !job.resolution.is_encodable() {
            return Err(MediaError::invalid_settings(format!(
                "resolution {} must be non-zero and even",
                job.resolution
            )));
        }

        let timeline = build_timeline(frames, job.target_duration(), job.output())?;
        debug!(
            job_id = %job.id,
            segments = timeline.segments().len(),
            per_frame_ms = timeline.per_frame().as_millis() as u64,
            "Timeline planned"
        );

        let list_path = workspace.path().join(CONCAT_LIST_NAME);
        fs::write(&list_path, timeline.to_concat_list()).await?;

        let render_path = workspace.path().join(RENDER_NAME);
        let cmd = self.encode_command(job, &timeline, &list_path, &render_path);

        let job_id = job.id.to_string();
        let total = timeline.total();
        FfmpegRunner::new()
            .with_timeout(self.encode_timeout)
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    job_id = %job_id,
                    frame = progress.frame,
                    percent = progress.percentage(total),
                    "Encoding"
                );
            })
            .await?;

        let size_bytes = fs::metadata(&render_path).await?.len();
        if size_bytes == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} is empty after encoding",
                render_path.display()
            )));
        }

        let (duration_secs, resolution, fps) = match probe_video(&render_path).await {
            Ok(info) => (info.duration, info.resolution(), info.fps.round() as u32),
            Err(e) => {
                warn!(job_id = %job.id, "Probe unavailable, reporting planned values: {}", e);
                (timeline.total().as_secs_f64(), job.resolution, job.fps)
            }
        };

        debug!(job_id = %job.id, duration_secs, size_bytes, "Video rendered");

        Ok(VideoArtifact {
            job_id: job.id.clone(),
            filename: job.output_filename(),
            path: render_path,
            duration_secs,
            resolution,
            fps,
            size_bytes,
            frames_used: timeline.distinct_frames() as u32,
            created_at: Utc::now(),
        })
    }
}

/// Move a rendered artifact into `output_dir` under its final filename.
///
/// Nothing is visible in `output_dir` until this succeeds. On failure the
/// rendered file is left where it was.
pub async fn publish_artifact(artifact: VideoArtifact, output_dir: &Path) -> MediaResult<VideoArtifact> {
    if !artifact.path.exists() {
        return Err(MediaError::FileNotFound(artifact.path.clone()));
    }

    let published = output_dir.join(&artifact.filename);
    move_file(&artifact.path, &published).await?;

    info!(
        job_id = %artifact.job_id,
        path = %published.display(),
        duration_secs = artifact.duration_secs,
        size_bytes = artifact.size_bytes,
        "Video published"
    );

    Ok(VideoArtifact {
        path: published,
        ..artifact
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use reel_models::{GenerationLimits, GenerationRequest, OutputSettings};

    fn assembler() -> FfmpegAssembler {
        FfmpegAssembler::new(EncodingConfig::default(), Duration::from_secs(60))
    }

    fn job() -> GenerationJob {
        GenerationRequest::new("lighthouse at dusk")
            .with_duration(5.0)
            .into_job(&GenerationLimits::default(), OutputSettings::default(), 1)
            .unwrap()
    }

    #[test]
    fn test_frame_filter() {
        let filter = assembler().frame_filter(Resolution::new(1920, 1080), 24);
        assert_eq!(
            filter,
            "scale=1920:1080:force_original_aspect_ratio=increase:flags=lanczos,crop=1920:1080,setsar=1,fps=24,format=yuv420p"
        );
    }

    #[test]
    fn test_encode_command_args() {
        let job = job();
        let frames: FrameSet = (0..3)
            .map(|index| reel_models::FetchedFrame {
                index,
                path: PathBuf::from(format!("/w/frame_{:03}.png", index)),
                byte_len: 1,
            })
            .collect();
        let timeline = build_timeline(&frames, job.target_duration(), job.output()).unwrap();

        let args = assembler()
            .encode_command(&job, &timeline, Path::new("/w/timeline.ffconcat"), Path::new("/w/render.mp4"))
            .build_args();

        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "5.000000");
        let r = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[r + 1], "24");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"8000k".to_string()));
    }

    fn frames(count: u32) -> FrameSet {
        (0..count)
            .map(|index| reel_models::FetchedFrame {
                index,
                path: PathBuf::from(format!("/w/frame_{:03}.png", index)),
                byte_len: 1,
            })
            .collect()
    }

    fn seconds_after(args: &[String], flag: &str) -> f64 {
        let pos = args.iter().position(|a| a == flag).unwrap();
        args[pos + 1].parse().unwrap()
    }

    #[test]
    fn test_concat_durations_match_output_duration() {
        for frame_count in 10..=20 {
            for secs in [4.0, 5.0, 6.0] {
                let job = GenerationRequest::new("lighthouse at dusk")
                    .with_frames(frame_count)
                    .with_duration(secs)
                    .into_job(&GenerationLimits::default(), OutputSettings::default(), 1)
                    .unwrap();
                let timeline = build_timeline(&frames(frame_count), job.target_duration(), job.output()).unwrap();

                let listed: f64 = timeline
                    .to_concat_list()
                    .lines()
                    .filter_map(|line| line.strip_prefix("duration "))
                    .map(|d| d.parse::<f64>().unwrap())
                    .sum();

                let args = assembler()
                    .encode_command(&job, &timeline, Path::new("/w/timeline.ffconcat"), Path::new("/w/render.mp4"))
                    .build_args();
                let limit = seconds_after(&args, "-t");

                assert!((limit - secs).abs() < 1e-6, "{} frames, {}s: -t {}", frame_count, secs, limit);
                assert!((listed - limit).abs() < 1e-5, "{} frames, {}s: listed {}", frame_count, secs, listed);
            }
        }
    }

    fn rendered(workspace: &Path, job: &GenerationJob) -> VideoArtifact {
        let path = workspace.join(RENDER_NAME);
        std::fs::write(&path, b"not really an mp4").unwrap();
        VideoArtifact {
            job_id: job.id.clone(),
            filename: job.output_filename(),
            path,
            duration_secs: 5.0,
            resolution: job.resolution,
            fps: job.fps,
            size_bytes: 17,
            frames_used: 10,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_moves_render_into_output_dir() {
        let root = tempfile::TempDir::new().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let job = job();

        let artifact = rendered(&work, &job);
        let render_path = artifact.path.clone();
        let published = publish_artifact(artifact, &root.path().join("videos")).await.unwrap();

        assert_eq!(published.path, root.path().join("videos").join(job.output_filename()));
        assert!(published.path.exists());
        assert!(!render_path.exists());
        assert_eq!(published.size_bytes, 17);
    }

    #[tokio::test]
    async fn test_publish_without_render_leaves_output_dir_untouched() {
        let root = tempfile::TempDir::new().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let job = job();

        let artifact = rendered(&work, &job);
        std::fs::remove_file(&artifact.path).unwrap();

        let result = publish_artifact(artifact, &root.path().join("videos")).await;

        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
        assert!(!root.path().join("videos").exists());
    }
}
