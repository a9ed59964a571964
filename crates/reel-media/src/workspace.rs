//! Job-scoped scratch directories.
//!
//! Every job gets one exclusive directory under the configured root. The
//! handle owns the directory: `release` removes it explicitly, and dropping
//! an unreleased handle removes it too, so timeouts, panics and cancelled
//! futures still clean up.

use std::path::{Path, PathBuf};

use reel_models::JobId;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Frame file name; zero padding keeps lexical order equal to index order.
pub fn frame_file_name(index: u32, extension: &str) -> String {
    format!("frame_{:03}.{}", index, extension)
}

/// Allocates workspaces under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named directory for `job_id`.
    pub fn acquire(&self, job_id: &JobId) -> MediaResult<Workspace> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            MediaError::workspace(format!("cannot create {}: {}", self.root.display(), e))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(&self.root)
            .map_err(|e| {
                MediaError::workspace(format!("cannot allocate in {}: {}", self.root.display(), e))
            })?;

        debug!(job_id = %job_id, path = %dir.path().display(), "Workspace acquired");

        Ok(Workspace {
            job_id: job_id.clone(),
            dir: Some(dir),
        })
    }
}

/// Exclusive scratch directory for one job.
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    dir: Option<TempDir>,
}

impl Workspace {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        // Only `release` takes the directory, and it consumes `self`
        self.dir.as_ref().map(TempDir::path).unwrap_or_else(|| Path::new(""))
    }

    /// Path for the frame at `index`.
    pub fn frame_path(&self, index: u32, extension: &str) -> PathBuf {
        self.path().join(frame_file_name(index, extension))
    }

    /// Remove the directory and everything in it.
    pub fn release(mut self) -> MediaResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let path = dir.path().to_path_buf();

        dir.close().map_err(|e| {
            MediaError::workspace(format!("cannot remove {}: {}", path.display(), e))
        })?;

        debug!(job_id = %self.job_id, path = %path.display(), "Workspace released");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(job_id = %self.job_id, path = %path.display(), "Failed to remove abandoned workspace: {}", e);
            } else {
                debug!(job_id = %self.job_id, path = %path.display(), "Abandoned workspace removed");
            }
        }
    }
}
