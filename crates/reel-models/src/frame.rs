//! Per-frame requests, results and the ordered frame set.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::job::JobId;

/// One upstream call for one frame index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRequest {
    pub job_id: JobId,
    /// Stable position of this frame in the final video
    pub index: u32,
    /// Prompt text sent upstream (not yet encoded)
    pub prompt: String,
    pub seed: u64,
}

/// Why a single frame could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureKind {
    /// Per-call timeout elapsed
    Timeout,
    /// Connection, TLS or body read error
    Transport,
    /// Upstream answered 429
    RateLimited,
    /// Any other non-2xx status
    UpstreamStatus(u16),
    /// Body was not a recognised image
    InvalidImage,
    /// Writing the frame file failed
    Storage,
    /// The fetch task panicked or was cancelled
    Aborted,
}

impl FetchFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailureKind::Timeout => "timeout",
            FetchFailureKind::Transport => "transport",
            FetchFailureKind::RateLimited => "rate_limited",
            FetchFailureKind::UpstreamStatus(_) => "upstream_status",
            FetchFailureKind::InvalidImage => "invalid_image",
            FetchFailureKind::Storage => "storage",
            FetchFailureKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailureKind::UpstreamStatus(status) => write!(f, "upstream_status({})", status),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// A frame stored in the job workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FetchedFrame {
    pub index: u32,
    /// Frame file inside the workspace
    pub path: PathBuf,
    pub byte_len: u64,
}

/// A frame that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameFailure {
    pub index: u32,
    pub kind: FetchFailureKind,
    /// Low-level detail, for logs only
    pub detail: String,
}

/// Outcome of one `FrameRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FrameResult {
    Fetched(FetchedFrame),
    Failed(FrameFailure),
}

impl FrameResult {
    pub fn fetched(index: u32, path: impl Into<PathBuf>, byte_len: u64) -> Self {
        Self::Fetched(FetchedFrame {
            index,
            path: path.into(),
            byte_len,
        })
    }

    pub fn failed(index: u32, kind: FetchFailureKind, detail: impl Into<String>) -> Self {
        Self::Failed(FrameFailure {
            index,
            kind,
            detail: detail.into(),
        })
    }

    pub fn index(&self) -> u32 {
        match self {
            FrameResult::Fetched(frame) => frame.index,
            FrameResult::Failed(failure) => failure.index,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, FrameResult::Fetched(_))
    }
}

/// Successful frames in ascending index order.
///
/// Each index appears at most once; gaps are dropped frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSet {
    frames: BTreeMap<u32, FetchedFrame>,
}

impl FrameSet {
    /// Partition results into the ordered success set and the failures.
    ///
    /// Arrival order is irrelevant. If an index shows up twice, the first
    /// success wins and later duplicates are ignored.
    pub fn partition<I>(results: I) -> (Self, Vec<FrameFailure>)
    where
        I: IntoIterator<Item = FrameResult>,
    {
        let mut frames = BTreeMap::new();
        let mut failures = Vec::new();

        for result in results {
            match result {
                FrameResult::Fetched(frame) => {
                    frames.entry(frame.index).or_insert(frame);
                }
                FrameResult::Failed(failure) => failures.push(failure),
            }
        }

        failures.sort_by_key(|f| f.index);
        (Self { frames }, failures)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = &FetchedFrame> {
        self.frames.values()
    }

    /// Indices in ascending order.
    pub fn indices(&self) -> Vec<u32> {
        self.frames.keys().copied().collect()
    }
}

impl FromIterator<FetchedFrame> for FrameSet {
    fn from_iter<T: IntoIterator<Item = FetchedFrame>>(iter: T) -> Self {
        Self::partition(iter.into_iter().map(FrameResult::Fetched)).0
    }
}
