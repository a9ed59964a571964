//! Structured job logging.

use tracing::{error, info, warn, Span};

use reel_models::{FrameFailure, GenerationJob, JobId};

/// Logs one job's lifecycle with its ID attached to every event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
        }
    }

    pub fn log_start(&self, job: &GenerationJob) {
        info!(
            job_id = %self.job_id,
            frames = job.frame_count,
            duration_secs = job.target_duration_secs,
            seed = job.seed,
            "Job started: {}", job.prompt
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, "Job progress: {}", message);
    }

    /// One line per dropped frame, in index order.
    pub fn log_frame_failures(&self, failures: &[FrameFailure]) {
        for failure in failures {
            warn!(
                job_id = %self.job_id,
                frame_index = failure.index,
                kind = %failure.kind,
                "Frame dropped: {}", failure.detail
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}
