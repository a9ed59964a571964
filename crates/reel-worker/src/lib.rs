//! Prompt-to-video generation pipeline.
//!
//! This crate provides:
//! - Concurrent, bounded frame fetching with per-frame failure isolation
//! - Ordered, threshold-checked frame collection
//! - The generation pipeline bracketed by a job workspace and deadline
//! - A metadata sink for published videos
//! - Configuration, structured logging and metrics

pub mod collector;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod pipeline;

pub use collector::FrameCollector;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use fetcher::FrameFetcher;
pub use logging::JobLogger;
pub use metadata::{JsonMetadataStore, MetadataDocument, MetadataSink};
pub use pipeline::{CompletedJob, GenerationPipeline};
