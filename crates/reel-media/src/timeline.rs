//! Timeline planning: how long each fetched frame stays on screen.
//!
//! All arithmetic is in integer microseconds so totals are exact.
//! The plan is:
//! 1. `per_frame = max(target / n, frame_interval)` (floor division)
//! 2. one segment per frame, in index order
//! 3. `extend` with whole copies of the sequence while the total falls short,
//!    then `trim` trailing segments so the total equals the target exactly
//!
//! The result is written as an `ffconcat` list for FFmpeg's concat demuxer.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reel_models::{FrameSet, OutputSettings};

use crate::error::{MediaError, MediaResult};

/// One frame shown for a fixed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineSegment {
    pub frame_index: u32,
    pub path: PathBuf,
    pub duration_us: u64,
}

/// Ordered segments whose durations sum to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    segments: Vec<TimelineSegment>,
    target_us: u64,
    per_frame_us: u64,
}

impl Timeline {
    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn total_us(&self) -> u64 {
        total_us(&self.segments)
    }

    pub fn total(&self) -> Duration {
        Duration::from_micros(self.total_us())
    }

    pub fn target(&self) -> Duration {
        Duration::from_micros(self.target_us)
    }

    /// Planned on-screen time of each frame before extension and trimming.
    pub fn per_frame(&self) -> Duration {
        Duration::from_micros(self.per_frame_us)
    }

    /// Frame indices in playback order.
    pub fn frame_order(&self) -> Vec<u32> {
        self.segments.iter().map(|s| s.frame_index).collect()
    }

    /// Distinct frames that appear in the timeline.
    pub fn distinct_frames(&self) -> usize {
        let mut indices = self.frame_order();
        indices.sort_unstable();
        indices.dedup();
        indices.len()
    }

    /// Render as an `ffconcat` list.
    ///
    /// The demuxer ignores the duration of the final entry, so the last file
    /// is listed once more without one.
    pub fn to_concat_list(&self) -> String {
        let mut list = String::from("ffconcat version 1.0\n");

        for segment in &self.segments {
            let _ = writeln!(list, "file {}", quote_concat_path(&segment.path));
            let _ = writeln!(list, "duration {}", format_seconds(segment.duration_us));
        }
        if let Some(last) = self.segments.last() {
            let _ = writeln!(list, "file {}", quote_concat_path(&last.path));
        }

        list
    }
}

/// Plan the timeline for the successful frames of a job.
pub fn build_timeline(
    frames: &FrameSet,
    target: Duration,
    output: OutputSettings,
) -> MediaResult<Timeline> {
    if frames.is_empty() {
        return Err(MediaError::EmptyTimeline);
    }
    if output.fps == 0 {
        return Err(MediaError::invalid_settings("fps must be greater than zero"));
    }

    let target_us = u64::try_from(target.as_micros())
        .map_err(|_| MediaError::invalid_settings("target duration is too long"))?;
    if target_us == 0 {
        return Err(MediaError::invalid_settings("target duration must be greater than zero"));
    }

    let interval_us = output.frame_interval_us();
    let per_frame_us = per_frame_duration_us(target_us, frames.len() as u64, interval_us);

    let segments: Vec<TimelineSegment> = frames
        .iter()
        .map(|frame| TimelineSegment {
            frame_index: frame.index,
            path: frame.path.clone(),
            duration_us: per_frame_us,
        })
        .collect();

    let segments = trim(extend(segments, target_us), target_us, interval_us);

    Ok(Timeline {
        segments,
        target_us,
        per_frame_us,
    })
}

/// Even share of the target per frame, never shorter than one output frame.
pub fn per_frame_duration_us(target_us: u64, frame_count: u64, interval_us: u64) -> u64 {
    if frame_count == 0 {
        return 0;
    }
    (target_us / frame_count).max(interval_us)
}

/// Append whole copies of the sequence until it is at least `target_us` long.
pub fn extend(segments: Vec<TimelineSegment>, target_us: u64) -> Vec<TimelineSegment> {
    let cycle_us = total_us(&segments);
    if cycle_us == 0 || cycle_us >= target_us {
        return segments;
    }

    let copies = target_us.div_ceil(cycle_us) as usize;
    let base = segments;
    let mut extended = Vec::with_capacity(base.len() * copies);
    for _ in 0..copies {
        extended.extend(base.iter().cloned());
    }
    extended
}

/// Cut trailing time so the sequence is exactly `target_us` long.
///
/// A leftover tail shorter than `min_segment_us` is folded into the segment
/// before it rather than flashed on screen for less than one output frame.
pub fn trim(segments: Vec<TimelineSegment>, target_us: u64, min_segment_us: u64) -> Vec<TimelineSegment> {
    let mut trimmed = Vec::with_capacity(segments.len());
    let mut elapsed = 0u64;

    for mut segment in segments {
        if elapsed >= target_us {
            break;
        }
        let remaining = target_us - elapsed;
        if segment.duration_us > remaining {
            segment.duration_us = remaining;
        }
        elapsed += segment.duration_us;
        trimmed.push(segment);
    }

    if trimmed.len() > 1 {
        let tail_is_short = trimmed
            .last()
            .is_some_and(|last| last.duration_us < min_segment_us);
        if tail_is_short {
            if let Some(tail) = trimmed.pop() {
                if let Some(prev) = trimmed.last_mut() {
                    prev.duration_us += tail.duration_us;
                }
            }
        }
    }

    trimmed
}

fn total_us(segments: &[TimelineSegment]) -> u64 {
    segments.iter().map(|s| s.duration_us).sum()
}

fn format_seconds(us: u64) -> String {
    format!("{}.{:06}", us / 1_000_000, us % 1_000_000)
}

/// Single-quote a path for the concat demuxer; `'` becomes `'\''`.
fn quote_concat_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}
