//! End-to-end generation: request in, outcome out.
//!
//! ```text
//! request -> job -> [workspace: fetch -> collect -> assemble] -> publish -> metadata
//! ```
//!
//! The bracketed part runs under the job deadline, and fetching has its own
//! smaller budget inside it. Publishing happens only after that part has
//! succeeded, so a failed or timed-out job never leaves a file in the output
//! directory. The workspace is released on every path out, and dropped (and
//! so removed) if the run itself is cancelled.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use reel_imagegen::ImageSourceClient;
use reel_media::{publish_artifact, AssemblyRequest, ClipAssembler, FfmpegAssembler, Workspace, WorkspaceManager};
use reel_models::{GenerationJob, GenerationOutcome, GenerationRequest, VideoArtifact, VideoRecord};
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::collector::FrameCollector;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::fetcher::FrameFetcher;
use crate::logging::JobLogger;
use crate::metadata::{JsonMetadataStore, MetadataSink};
use crate::metrics;

/// A finished job before it is turned into an outcome.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job: GenerationJob,
    pub artifact: VideoArtifact,
    pub frames_generated: u32,
}

/// Runs generation jobs. Share one instance per process so the fetch bound
/// applies across concurrent jobs.
pub struct GenerationPipeline {
    config: WorkerConfig,
    fetcher: FrameFetcher,
    collector: FrameCollector,
    workspaces: WorkspaceManager,
    assembler: Arc<dyn ClipAssembler>,
    metadata: Arc<dyn MetadataSink>,
}

impl GenerationPipeline {
    /// Validate the configuration and wire the pipeline.
    ///
    /// Fails before any network call if the configuration is unusable.
    pub fn new(
        config: WorkerConfig,
        assembler: Arc<dyn ClipAssembler>,
        metadata: Arc<dyn MetadataSink>,
    ) -> WorkerResult<Self> {
        config.validate()?;

        let client = ImageSourceClient::new(config.image_source.clone())
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        let permits = Arc::new(Semaphore::new(config.max_fetch_parallel));

        Ok(Self {
            fetcher: FrameFetcher::new(Arc::new(client), permits).with_budget(config.fetch_timeout),
            collector: FrameCollector::new(config.min_success_frames),
            workspaces: WorkspaceManager::new(&config.work_dir),
            assembler,
            metadata,
            config,
        })
    }

    /// Pipeline with the FFmpeg assembler and the JSON metadata store.
    pub fn from_config(config: WorkerConfig) -> WorkerResult<Self> {
        let assembler = FfmpegAssembler::new(config.encoding.clone(), config.encode_timeout);
        let metadata = JsonMetadataStore::new(&config.metadata_path);
        Self::new(config, Arc::new(assembler), Arc::new(metadata))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one request to completion. Never panics on job failure.
    pub async fn run(&self, request: GenerationRequest) -> GenerationOutcome {
        let started = Instant::now();

        match self.generate(request).await {
            Ok(done) => {
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                GenerationOutcome::Completed {
                    frames_requested: done.job.frame_count,
                    frames_generated: done.frames_generated,
                    artifact: done.artifact,
                }
            }
            Err(e) => {
                let failure = e.failure();
                if failure.kind.is_client_error() {
                    tracing::info!(kind = %failure.kind, "Request rejected: {}", e);
                } else {
                    tracing::error!(kind = %failure.kind, "Generation failed: {}", e);
                }
                metrics::record_job_failed(failure.kind);
                GenerationOutcome::Failed(failure)
            }
        }
    }

    /// Run one request, returning the typed error on failure.
    pub async fn generate(&self, request: GenerationRequest) -> WorkerResult<CompletedJob> {
        let seed: u64 = rand::rng().random_range(1..=1_000_000);
        let job = request.into_job(&self.config.limits, self.config.output, seed)?;

        let logger = JobLogger::new(&job.id);
        let span = logger.create_span();
        logger.log_start(&job);

        let workspace = self.workspaces.acquire(&job.id).map_err(WorkerError::Workspace)?;

        let deadline = self.config.job_timeout;
        let processed = tokio::time::timeout(deadline, self.process(&job, &workspace, &logger))
            .instrument(span)
            .await;

        let result = match processed {
            Ok(Ok((rendered, frames_generated))) => publish_artifact(rendered, &self.config.output_dir)
                .await
                .map(|artifact| (artifact, frames_generated))
                .map_err(WorkerError::AssemblyFailed),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(WorkerError::Timeout(deadline)),
        };

        if let Err(e) = workspace.release() {
            logger.log_error(&format!("Workspace cleanup failed: {}", e));
        }

        let (artifact, frames_generated) = result?;

        let record = VideoRecord::new(&job, &artifact);
        if let Err(e) = self.metadata.record(&record).await {
            logger.log_warning(&format!("Video published but metadata was not recorded: {}", e));
        }

        logger.log_completion(&format!(
            "{} ({} of {} frames, {:.2}s)",
            artifact.filename, frames_generated, job.frame_count, artifact.duration_secs
        ));

        Ok(CompletedJob {
            job,
            artifact,
            frames_generated,
        })
    }

    async fn process(
        &self,
        job: &GenerationJob,
        workspace: &Workspace,
        logger: &JobLogger,
    ) -> WorkerResult<(VideoArtifact, u32)> {
        let results = self.fetcher.fetch_all(job, workspace).await;

        let frames = self.collector.collect(job, results, logger)?;
        let frames_generated = frames.len() as u32;
        logger.log_progress(&format!(
            "{} of {} frames ready, assembling",
            frames_generated, job.frame_count
        ));

        let encode_started = Instant::now();
        let artifact = self
            .assembler
            .assemble(AssemblyRequest {
                job,
                frames: &frames,
                workspace,
            })
            .await
            .map_err(WorkerError::AssemblyFailed)?;
        metrics::record_encode_duration(encode_started.elapsed().as_secs_f64());

        Ok((artifact, frames_generated))
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
