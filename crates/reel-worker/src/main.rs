//! Prompt-to-video generation binary.

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{GenerationOutcome, GenerationRequest};
use reel_worker::{GenerationPipeline, WorkerConfig};

/// Generate a short video from a text prompt.
#[derive(Debug, Parser)]
#[command(name = "reel-worker", version, about)]
struct Cli {
    /// Text prompt describing the video
    prompt: String,

    /// Number of frames to request (defaults to the configured default)
    #[arg(short = 'n', long)]
    num_frames: Option<u32>,

    /// Target duration in seconds (defaults to the configured default)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Pretty-print the JSON outcome
    #[arg(long)]
    pretty: bool,

    /// Serve Prometheus metrics on this address while running
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reel_worker=info,reel_media=info,reel_imagegen=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for HTTPS to the image source)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        match reel_worker::metrics::init_metrics(addr) {
            Ok(()) => info!("Metrics listening on {}", addr),
            Err(e) => warn!("Failed to start metrics exporter: {}", e),
        }
    }

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    info!(
        image_source = %config.image_source.base_url,
        max_fetch_parallel = config.max_fetch_parallel,
        fetch_timeout_secs = config.fetch_timeout.as_secs(),
        job_timeout_secs = config.job_timeout.as_secs(),
        work_dir = %config.work_dir.display(),
        output_dir = %config.output_dir.display(),
        "Starting reel-worker"
    );

    let pipeline = match GenerationPipeline::from_config(config) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create pipeline: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut request = GenerationRequest::new(cli.prompt);
    request.num_frames = cli.num_frames;
    request.duration_secs = cli.duration;

    // Dropping the run future on Ctrl-C aborts fetches, kills FFmpeg and removes the workspace
    let outcome = tokio::select! {
        outcome = pipeline.run(request) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            return ExitCode::from(130);
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&outcome)
    } else {
        serde_json::to_string(&outcome)
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize outcome: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match outcome {
        GenerationOutcome::Completed { .. } => ExitCode::SUCCESS,
        GenerationOutcome::Failed(failure) if failure.kind.is_client_error() => ExitCode::from(2),
        GenerationOutcome::Failed(_) => ExitCode::FAILURE,
    }
}
