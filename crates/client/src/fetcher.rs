//! Artifact download and persistence.
//!
//! [`ArtifactFetcher`] streams every image of a completed task into the
//! output directory. Downloads are independent: a failure is logged,
//! reported as [`GenerationEvent::ArtifactFailed`], and skipped, and the
//! batch returns whatever subset succeeded in original index order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aigc_core::naming::{artifact_filename, capture_timestamp};
use aigc_core::protocol::{TaskHandle, TaskStatus};
use chrono::Utc;
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::broadcast;

use crate::events::GenerationEvent;
use crate::transport::{Transport, TransportError};

/// Write buffer size; bounds memory per download regardless of image size.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// One image written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub source_url: String,
    pub local_path: PathBuf,
    /// 1-based position in the task's image list.
    pub sequence_index: u32,
}

/// Per-image failure. Never fatal to the batch.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Download failed: {0}")]
    Download(#[from] TransportError),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads task images into a local directory.
pub struct ArtifactFetcher {
    transport: Arc<dyn Transport>,
    output_dir: PathBuf,
    concurrency: usize,
    event_tx: Option<broadcast::Sender<GenerationEvent>>,
}

impl ArtifactFetcher {
    /// * `concurrency` - maximum simultaneous downloads; `0` is treated as `1`.
    pub fn new(transport: Arc<dyn Transport>, output_dir: PathBuf, concurrency: usize) -> Self {
        Self {
            transport,
            output_dir,
            concurrency: concurrency.max(1),
            event_tx: None,
        }
    }

    /// Publish per-image outcomes on `event_tx`.
    pub fn with_events(mut self, event_tx: broadcast::Sender<GenerationEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save every image of `status`, stamped with the current time and
    /// named after the handle's prompt.
    pub async fn save_artifacts(
        &self,
        handle: &TaskHandle,
        status: &TaskStatus,
    ) -> Vec<SavedArtifact> {
        self.save_artifacts_at(handle, status, capture_timestamp(Utc::now()))
            .await
    }

    /// Save every image of `status` using an explicit batch timestamp.
    ///
    /// The result holds the successful downloads only, sorted by
    /// sequence index.
    pub async fn save_artifacts_at(
        &self,
        handle: &TaskHandle,
        status: &TaskStatus,
        capture_ts: i64,
    ) -> Vec<SavedArtifact> {
        let task_id = handle.task_id.as_str();
        let prompt = handle.original_prompt.as_str();
        if status.images.is_empty() {
            tracing::warn!(task_id, "Completed task reported no images");
            return Vec::new();
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            // Each download will report its own write failure below.
            tracing::error!(
                output_dir = %self.output_dir.display(),
                error = %e,
                "Failed to create output directory",
            );
        }

        let mut saved: Vec<SavedArtifact> = futures::stream::iter(status.images.iter().cloned())
            .map(|(index, url)| {
                let path = self
                    .output_dir
                    .join(artifact_filename(prompt, capture_ts, index));
                async move {
                    let result = self.download_to(&url, &path).await;
                    (index, url, path, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|(index, url, path, result)| async move {
                match result {
                    Ok(bytes) => {
                        tracing::info!(task_id, index, bytes, path = %path.display(), "Saved image");
                        self.emit(GenerationEvent::ArtifactSaved {
                            task_id: task_id.to_string(),
                            index,
                            path: path.clone(),
                        });
                        Some(SavedArtifact {
                            source_url: url,
                            local_path: path,
                            sequence_index: index,
                        })
                    }
                    Err(e) => {
                        tracing::warn!(task_id, index, url = %url, error = %e, "Failed to save image");
                        self.emit(GenerationEvent::ArtifactFailed {
                            task_id: task_id.to_string(),
                            index,
                            url,
                            error: e.to_string(),
                        });
                        None
                    }
                }
            })
            .collect()
            .await;

        // Downloads finish in any order; restore the service's order.
        saved.sort_by_key(|artifact| artifact.sequence_index);

        tracing::info!(
            task_id,
            saved = saved.len(),
            requested = status.images.len(),
            "Image batch finished",
        );
        saved
    }

    // ---- private helpers ----

    /// Stream one URL into a new file at `path`, returning bytes written.
    ///
    /// An existing file is never overwritten. A partially written file is
    /// removed on failure.
    async fn download_to(&self, url: &str, path: &Path) -> Result<u64, PersistenceError> {
        let mut stream = self.transport.get_stream(url).await?;

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| io_error(path, e))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);

        let result: Result<u64, PersistenceError> = async {
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| io_error(path, e))?;
                written += chunk.len() as u64;
            }
            writer.flush().await.map_err(|e| io_error(path, e))?;
            Ok(written)
        }
        .await;

        if result.is_err() {
            drop(writer);
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::debug!(path = %path.display(), error = %e, "Failed to remove partial file");
            }
        }
        result
    }

    fn emit(&self, event: GenerationEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}
