//! FFmpeg CLI wrapper for turning still frames into a clip.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout and progress parsing
//! - Timeline planning (per-frame durations, extend, trim, concat list)
//! - The `ClipAssembler` seam and its FFmpeg implementation
//! - Job-scoped workspaces that are always removed

pub mod assembler;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod timeline;
pub mod workspace;

pub use assembler::{publish_artifact, AssemblyRequest, ClipAssembler, FfmpegAssembler};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use timeline::{build_timeline, extend, trim, Timeline, TimelineSegment};
pub use workspace::{frame_file_name, Workspace, WorkspaceManager};
