//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Keys FFmpeg writes in `-progress` blocks.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "stream_0_0_q",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output time in microseconds
    pub out_time_us: i64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

/// How a stderr line relates to the progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrLine {
    /// A progress key was consumed; the block is not finished yet
    Partial,
    /// A progress block ended; carries the current snapshot
    Snapshot(FfmpegProgress),
    /// Anything else: FFmpeg diagnostics
    Diagnostic,
}

impl FfmpegProgress {
    /// Feed one stderr line into the running snapshot.
    pub fn apply_line(&mut self, line: &str) -> StderrLine {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            return StderrLine::Diagnostic;
        };
        if !PROGRESS_KEYS.contains(&key) {
            return StderrLine::Diagnostic;
        }

        match key {
            // out_time_ms is microseconds despite the name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_us = us;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return StderrLine::Snapshot(self.clone());
            }
            _ => {}
        }

        StderrLine::Partial
    }

    /// Progress percentage against the planned output length.
    pub fn percentage(&self, total: Duration) -> f64 {
        let total_us = total.as_micros() as f64;
        if total_us <= 0.0 {
            return 0.0;
        }
        ((self.out_time_us.max(0) as f64 / total_us) * 100.0).min(100.0)
    }

    /// Estimated time remaining at the current speed.
    pub fn eta(&self, total: Duration) -> Option<Duration> {
        if self.speed <= 0.0 || self.out_time_us <= 0 {
            return None;
        }

        let remaining_us = total.as_micros() as i64 - self.out_time_us;
        if remaining_us <= 0 {
            return Some(Duration::ZERO);
        }

        Some(Duration::from_secs_f64(remaining_us as f64 / 1_000_000.0 / self.speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_progress_block() {
        let mut progress = FfmpegProgress::default();

        assert_eq!(progress.apply_line("frame=48"), StderrLine::Partial);
        assert_eq!(progress.apply_line("out_time_us=2000000"), StderrLine::Partial);
        assert_eq!(progress.apply_line("speed=1.5x"), StderrLine::Partial);

        match progress.apply_line("progress=continue") {
            StderrLine::Snapshot(snapshot) => {
                assert_eq!(snapshot.frame, 48);
                assert_eq!(snapshot.out_time_us, 2_000_000);
                assert!(!snapshot.is_complete);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }

        progress.apply_line("progress=end");
        assert!(progress.is_complete);
    }

    #[test]
    fn test_diagnostics_are_not_progress() {
        let mut progress = FfmpegProgress::default();
        assert_eq!(
            progress.apply_line("[concat @ 0x5581] Impossible to open 'frame_003.png'"),
            StderrLine::Diagnostic
        );
        assert_eq!(
            progress.apply_line("Error while filtering: key=value"),
            StderrLine::Diagnostic
        );
        assert_eq!(progress.apply_line("speed=N/A"), StderrLine::Partial);
        assert_eq!(progress.speed, 0.0);
    }

    #[test]
    fn test_percentage_and_eta() {
        let progress = FfmpegProgress {
            out_time_us: 2_500_000,
            speed: 2.0,
            ..Default::default()
        };
        let total = Duration::from_secs(5);

        assert!((progress.percentage(total) - 50.0).abs() < 0.01);
        let eta = progress.eta(total).unwrap();
        assert!((eta.as_secs_f64() - 1.25).abs() < 0.01);
    }
}
