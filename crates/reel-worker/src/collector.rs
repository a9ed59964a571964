//! Ordered, partial-tolerant aggregation of fetch results.

use reel_models::{FrameResult, FrameSet, GenerationJob};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Decides whether enough frames arrived to assemble a video.
#[derive(Debug, Clone, Copy)]
pub struct FrameCollector {
    min_success_frames: u32,
}

impl FrameCollector {
    pub fn new(min_success_frames: u32) -> Self {
        Self { min_success_frames }
    }

    /// Frames needed for `job`; never more than the job asked for.
    pub fn required_for(&self, job: &GenerationJob) -> u32 {
        self.min_success_frames.min(job.frame_count).max(1)
    }

    /// Sort successes by index and enforce the success threshold.
    pub fn collect(
        &self,
        job: &GenerationJob,
        results: Vec<FrameResult>,
        logger: &JobLogger,
    ) -> WorkerResult<FrameSet> {
        let (frames, failures) = FrameSet::partition(results);

        logger.log_frame_failures(&failures);
        for failure in &failures {
            metrics::record_frame_failed(failure.kind);
        }
        metrics::record_frames_fetched(frames.len() as u64);

        let required = self.required_for(job);
        if frames.len() < required as usize {
            return Err(WorkerError::InsufficientFrames {
                succeeded: frames.len(),
                required,
                requested: job.frame_count,
            });
        }

        if !failures.is_empty() {
            logger.log_warning(&format!(
                "Continuing with {} of {} frames",
                frames.len(),
                job.frame_count
            ));
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{FetchFailureKind, GenerationLimits, GenerationRequest, OutputSettings};

    fn job(frames: u32) -> GenerationJob {
        GenerationRequest::new("desert caravan")
            .with_frames(frames)
            .into_job(&GenerationLimits::default(), OutputSettings::default(), 5)
            .unwrap()
    }

    fn results(total: u32, failing: &[u32]) -> Vec<FrameResult> {
        (0..total)
            .map(|i| {
                if failing.contains(&i) {
                    FrameResult::failed(i, FetchFailureKind::RateLimited, "429")
                } else {
                    FrameResult::fetched(i, format!("frame_{:03}.png", i), 1)
                }
            })
            .collect()
    }

    #[test]
    fn test_partial_failure_keeps_order() {
        let job = job(20);
        let logger = JobLogger::new(&job.id);
        let frames = FrameCollector::new(1)
            .collect(&job, results(20, &[1, 4, 6]), &logger)
            .unwrap();

        let expected: Vec<u32> = (0..20).filter(|i| ![1, 4, 6].contains(i)).collect();
        assert_eq!(frames.indices(), expected);
    }

    #[test]
    fn test_total_failure_is_insufficient() {
        let job = job(10);
        let logger = JobLogger::new(&job.id);
        let all: Vec<u32> = (0..10).collect();

        let err = FrameCollector::new(1)
            .collect(&job, results(10, &all), &logger)
            .unwrap_err();

        assert!(matches!(
            err,
            WorkerError::InsufficientFrames {
                succeeded: 0,
                required: 1,
                requested: 10
            }
        ));
    }

    #[test]
    fn test_threshold_is_enforced() {
        let job = job(10);
        let logger = JobLogger::new(&job.id);
        let collector = FrameCollector::new(8);

        assert!(collector.collect(&job, results(10, &[0, 1]), &logger).is_ok());
        assert!(collector.collect(&job, results(10, &[0, 1, 2]), &logger).is_err());
    }

    #[test]
    fn test_threshold_capped_at_requested_frames() {
        let collector = FrameCollector::new(15);
        assert_eq!(collector.required_for(&job(10)), 10);
        assert_eq!(collector.required_for(&job(20)), 15);
    }
}
