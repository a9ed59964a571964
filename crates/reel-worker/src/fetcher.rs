//! Concurrent frame fetching.
//!
//! One spawned task per frame index, gated by a process-wide semaphore.
//! Failures are data: every task resolves to a `FrameResult` and nothing is
//! cancelled when a sibling fails. `fetch_all` returns once all N tasks have
//! finished or the fetch budget runs out; frames still in flight at that
//! point are aborted and reported as timeouts, and the ones that arrived are
//! kept.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use reel_imagegen::ImageSourceClient;
use reel_media::{frame_file_name, Workspace};
use reel_models::{FetchFailureKind, FrameRequest, FrameResult, GenerationJob, Resolution};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::metrics;

/// Aborts still-running fetch tasks if the owning future is dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Fetches all frames of a job from the image source.
#[derive(Clone)]
pub struct FrameFetcher {
    client: Arc<ImageSourceClient>,
    permits: Arc<Semaphore>,
    budget: Option<Duration>,
}

impl FrameFetcher {
    /// `permits` is shared by every job in the process.
    pub fn new(client: Arc<ImageSourceClient>, permits: Arc<Semaphore>) -> Self {
        Self {
            client,
            permits,
            budget: None,
        }
    }

    /// Stop waiting for frames after `budget`.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Fetch frames `0..job.frame_count` into `workspace`.
    ///
    /// The returned results are in index order, one per requested frame.
    pub async fn fetch_all(&self, job: &GenerationJob, workspace: &Workspace) -> Vec<FrameResult> {
        let requests = job.frame_requests();
        let indices: Vec<u32> = requests.iter().map(|r| r.index).collect();

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let client = Arc::clone(&self.client);
                let permits = Arc::clone(&self.permits);
                let dir = workspace.path().to_path_buf();
                let resolution = job.resolution;

                tokio::spawn(async move {
                    // Closed only if the pipeline is shutting down
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return FrameResult::failed(request.index, FetchFailureKind::Aborted, "fetch pool closed");
                    };
                    fetch_one(&client, &request, resolution, dir).await
                })
            })
            .collect();

        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        let deadline = self
            .budget
            .and_then(|budget| tokio::time::Instant::now().checked_add(budget));
        let job_id = &job.id;

        join_all(handles.into_iter().zip(indices).map(|(mut handle, index)| async move {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        handle.abort();
                        debug!(job_id = %job_id, frame_index = index, "Fetch budget exhausted");
                        return FrameResult::failed(
                            index,
                            FetchFailureKind::Timeout,
                            "fetch budget exhausted before the frame arrived",
                        );
                    }
                },
                None => handle.await,
            };

            match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(job_id = %job_id, frame_index = index, "Fetch task did not finish: {}", e);
                    FrameResult::failed(index, FetchFailureKind::Aborted, e.to_string())
                }
            }
        }))
        .await
    }
}

async fn fetch_one(
    client: &ImageSourceClient,
    request: &FrameRequest,
    resolution: Resolution,
    dir: PathBuf,
) -> FrameResult {
    let started = Instant::now();

    let image = match client.fetch_frame(request, resolution).await {
        Ok(image) => image,
        Err(e) => {
            debug!(job_id = %request.job_id, frame_index = request.index, "Frame fetch failed: {}", e);
            return FrameResult::failed(request.index, e.failure_kind(), e.to_string());
        }
    };

    let path = dir.join(frame_file_name(request.index, image.extension()));
    if let Err(e) = tokio::fs::write(&path, &image.bytes).await {
        return FrameResult::failed(
            request.index,
            FetchFailureKind::Storage,
            format!("cannot write {}: {}", path.display(), e),
        );
    }

    metrics::record_frame_fetch_duration(started.elapsed().as_secs_f64());
    debug!(
        job_id = %request.job_id,
        frame_index = request.index,
        bytes = image.len(),
        "Frame stored"
    );

    FrameResult::fetched(request.index, path, image.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use reel_imagegen::ImageSourceConfig;
    use reel_media::WorkspaceManager;
    use reel_models::{GenerationLimits, GenerationRequest, OutputSettings};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn fetcher(server: &MockServer, parallel: usize) -> FrameFetcher {
        let client = ImageSourceClient::new(ImageSourceConfig {
            base_url: server.uri(),
            max_retries: 0,
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap();
        FrameFetcher::new(Arc::new(client), Arc::new(Semaphore::new(parallel)))
    }

    fn job(frames: u32) -> GenerationJob {
        GenerationRequest::new("harbor at night")
            .with_frames(frames)
            .into_job(&GenerationLimits::default(), OutputSettings::default(), 100)
            .unwrap()
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_siblings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"scene%203$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_MAGIC))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let job = job(10);
        let workspace = WorkspaceManager::new(root.path()).acquire(&job.id).unwrap();

        let results = fetcher(&server, 4).fetch_all(&job, &workspace).await;

        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().map(FrameResult::index).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
        match &results[2] {
            FrameResult::Failed(failure) => assert_eq!(failure.kind, FetchFailureKind::UpstreamStatus(500)),
            other => panic!("frame 2 should fail, got {:?}", other),
        }
        assert_eq!(results.iter().filter(|r| r.is_fetched()).count(), 9);
        assert!(workspace.frame_path(0, "png").exists());
        assert!(!workspace.frame_path(2, "png").exists());
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(PNG_MAGIC)
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let job = job(10);
        let workspace = WorkspaceManager::new(root.path()).acquire(&job.id).unwrap();

        let started = Instant::now();
        let results = fetcher(&server, 2).fetch_all(&job, &workspace).await;

        // Ten 150ms calls, two at a time: at least five rounds
        assert!(started.elapsed() >= Duration::from_millis(750));
        assert!(results.iter().all(FrameResult::is_fetched));
    }

    #[tokio::test]
    async fn test_budget_keeps_frames_that_arrived() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"scene%20(4|7)$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(PNG_MAGIC)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_MAGIC))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let job = job(10);
        let workspace = WorkspaceManager::new(root.path()).acquire(&job.id).unwrap();

        let started = Instant::now();
        let results = fetcher(&server, 10)
            .with_budget(Duration::from_millis(400))
            .fetch_all(&job, &workspace)
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            match result {
                FrameResult::Failed(failure) => {
                    assert!(i == 3 || i == 6, "frame {} should have arrived", i);
                    assert_eq!(failure.kind, FetchFailureKind::Timeout);
                }
                FrameResult::Fetched(frame) => assert!(frame.path.exists()),
            }
        }
        assert_eq!(results.iter().filter(|r| r.is_fetched()).count(), 8);
    }
}
