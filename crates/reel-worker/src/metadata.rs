//! Metadata sink for finished videos.
//!
//! The admin and statistics surfaces read this data; the pipeline only
//! appends to it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reel_models::VideoRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{WorkerError, WorkerResult};

/// Receives one record per published video.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn record(&self, record: &VideoRecord) -> WorkerResult<()>;
}

/// On-disk document: newest video first plus a running total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
    #[serde(default)]
    pub total_generated: u64,
}

/// JSON file store. Writes go through a sibling temp file and a rename.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing file is an empty document.
    pub async fn load(&self) -> WorkerResult<MetadataDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                WorkerError::metadata(format!("{} is not valid metadata: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MetadataDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, document: &MetadataDocument) -> WorkerResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| WorkerError::metadata(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataSink for JsonMetadataStore {
    async fn record(&self, record: &VideoRecord) -> WorkerResult<()> {
        let _guard = self.lock.lock().await;

        let mut document = self.load().await?;
        document.videos.insert(0, record.clone());
        document.total_generated += 1;
        self.save(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reel_models::Resolution;
    use tempfile::TempDir;

    fn record(id: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            filename: format!("reel_{}.mp4", id),
            prompt: "city in the rain".to_string(),
            num_frames: 15,
            duration_secs: 5.0,
            resolution: Resolution::new(1920, 1080),
            fps: 24,
            file_size: 1024,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_records_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = JsonMetadataStore::new(dir.path().join("meta").join("video_metadata.json"));

        store.record(&record("a")).await.unwrap();
        store.record(&record("b")).await.unwrap();

        let document = store.load().await.unwrap();
        assert_eq!(document.total_generated, 2);
        assert_eq!(
            document.videos.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert!(!dir.path().join("meta").join("video_metadata.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonMetadataStore::new(dir.path().join("none.json"));
        assert_eq!(store.load().await.unwrap(), MetadataDocument::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video_metadata.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonMetadataStore::new(&path);
        assert!(matches!(
            store.record(&record("c")).await,
            Err(WorkerError::Metadata(_))
        ));
    }
}
