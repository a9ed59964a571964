use std::time::Duration;

use image::{Rgb, RgbImage};
use reel_media::{probe_video, publish_artifact, AssemblyRequest, ClipAssembler, FfmpegAssembler, MediaError, WorkspaceManager};
use reel_models::{
    EncodingConfig, FetchedFrame, FrameSet, GenerationLimits, GenerationRequest, OutputSettings, Resolution,
};
use tempfile::TempDir;

fn small_output() -> OutputSettings {
    OutputSettings {
        fps: 24,
        resolution: Resolution::new(320, 180),
    }
}

fn job(frames: u32, secs: f64) -> reel_models::GenerationJob {
    GenerationRequest::new("paper boats on a pond")
        .with_frames(frames)
        .with_duration(secs)
        .into_job(&GenerationLimits::default(), small_output(), 11)
        .unwrap()
}

#[tokio::test]
async fn empty_frame_set_is_an_assembly_error() {
    let root = TempDir::new().unwrap();
    let job = job(10, 4.0);
    let workspace = WorkspaceManager::new(root.path().join("work")).acquire(&job.id).unwrap();
    let assembler = FfmpegAssembler::new(EncodingConfig::default(), Duration::from_secs(30));

    let frames = FrameSet::default();
    let result = assembler
        .assemble(AssemblyRequest {
            job: &job,
            frames: &frames,
            workspace: &workspace,
        })
        .await;

    assert!(matches!(result, Err(MediaError::EmptyTimeline)));
    assert!(!root.path().join("videos").join(job.output_filename()).exists());
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe in PATH"]
async fn encodes_frames_to_target_duration() {
    let root = TempDir::new().unwrap();
    let job = job(10, 5.0);
    let workspace = WorkspaceManager::new(root.path().join("work")).acquire(&job.id).unwrap();

    // Odd sizes and aspect ratios exercise the scale and crop chain
    let sizes = [(640, 480), (300, 500), (1024, 1024)];
    let frames: FrameSet = [0u32, 2, 3, 5, 8]
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            let (w, h) = sizes[i % sizes.len()];
            let path = workspace.frame_path(index, "png");
            RgbImage::from_pixel(w, h, Rgb([(index * 25) as u8, 80, 160]))
                .save(&path)
                .unwrap();
            FetchedFrame {
                index,
                byte_len: std::fs::metadata(&path).unwrap().len(),
                path,
            }
        })
        .collect();

    let assembler = FfmpegAssembler::new(
        EncodingConfig::default().with_preset("ultrafast"),
        Duration::from_secs(120),
    );
    let rendered = assembler
        .assemble(AssemblyRequest {
            job: &job,
            frames: &frames,
            workspace: &workspace,
        })
        .await
        .unwrap();
    assert!(rendered.path.starts_with(workspace.path()));
    assert!(!root.path().join("videos").exists());

    let artifact = publish_artifact(rendered, &root.path().join("videos")).await.unwrap();

    let frame_interval = 1.0 / 24.0;
    assert!((artifact.duration_secs - 5.0).abs() <= frame_interval + 1e-3);
    assert_eq!(artifact.resolution, Resolution::new(320, 180));
    assert_eq!(artifact.fps, 24);
    assert_eq!(artifact.frames_used, 5);
    assert!(artifact.path.starts_with(root.path().join("videos")));

    let info = probe_video(&artifact.path).await.unwrap();
    assert!(!info.has_audio);
    assert_eq!(info.codec, "h264");

    workspace.release().unwrap();
    assert_eq!(std::fs::read_dir(root.path().join("work")).unwrap().count(), 0);
}
