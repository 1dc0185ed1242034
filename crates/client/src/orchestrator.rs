//! End-to-end generation workflow.
//!
//! [`Generator`] sequences submission, polling, and persistence for one
//! prompt at a time. Each stage's output is the next stage's input, so
//! the stages never overlap; any failure short-circuits the rest and is
//! reported as a [`WorkflowError`] tagged with the [`Stage`] it came from.
//!
//! Lifecycle events are broadcast via a [`tokio::sync::broadcast`]
//! channel. Call [`Generator::subscribe`] to receive them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, TokioClock};
use crate::config::GeneratorConfig;
use crate::events::GenerationEvent;
use crate::fetcher::{ArtifactFetcher, SavedArtifact};
use crate::poller::{PollError, Poller};
use crate::submitter::{SubmissionError, TaskSubmitter};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Broadcast channel capacity for workflow events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Workflow stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    /// The task was never started.
    Submission,
    /// The task started but never finished.
    Polling,
    /// The task finished but nothing could be saved.
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submission => "submission",
            Stage::Polling => "polling",
            Stage::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// The underlying cause of a workflow failure.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Polling(#[from] PollError),

    /// The task completed but zero images were written.
    #[error("No images were saved ({attempted} reported by the service)")]
    NoArtifactsSaved { attempted: usize },
}

/// A failed generation request.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {cause}")]
pub struct WorkflowError {
    pub stage: Stage,
    #[source]
    pub cause: StageError,
}

impl WorkflowError {
    fn new(stage: Stage, cause: impl Into<StageError>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// Runs generation requests against one service.
///
/// Holds no per-request state; concurrent `generate` calls on the same
/// instance are independent and share the underlying transport.
pub struct Generator {
    config: GeneratorConfig,
    submitter: TaskSubmitter,
    poller: Poller,
    fetcher: ArtifactFetcher,
    event_tx: broadcast::Sender<GenerationEvent>,
}

impl Generator {
    /// Build a generator with a [`ReqwestTransport`] and the Tokio timer.
    pub fn new(config: GeneratorConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        Ok(Self::with_parts(config, transport, Arc::new(TokioClock)))
    }

    /// Build a generator from explicit collaborators.
    ///
    /// Pass the same `transport` to several generators to share one
    /// connection pool (and any rate limiting it applies).
    pub fn with_parts(
        config: GeneratorConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let submitter = TaskSubmitter::new(
            Arc::clone(&transport),
            config.submit_url.clone(),
            config.strict_credentials,
        );
        let poller = Poller::new(Arc::clone(&transport), clock, config.query_url.clone())
            .with_events(event_tx.clone());
        let fetcher = ArtifactFetcher::new(
            transport,
            config.output_dir.clone(),
            config.download_concurrency,
        )
        .with_events(event_tx.clone());

        Self {
            config,
            submitter,
            poller,
            fetcher,
            event_tx,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Subscribe to workflow events.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.event_tx.subscribe()
    }

    /// Generate images for `prompt` and return the saved file paths.
    pub async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<PathBuf>, WorkflowError> {
        self.generate_with_cancel(prompt, width, height, &CancellationToken::new())
            .await
    }

    /// Like [`generate`](Self::generate), stopping early when `cancel`
    /// fires between poll attempts.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, WorkflowError> {
        let artifacts = self.generate_artifacts(prompt, width, height, cancel).await?;
        Ok(artifacts.into_iter().map(|a| a.local_path).collect())
    }

    /// Full workflow returning artifact details instead of bare paths.
    ///
    /// Succeeds when at least one image was saved; a partial batch is a
    /// success with fewer artifacts.
    pub async fn generate_artifacts(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<SavedArtifact>, WorkflowError> {
        match self.run(prompt, width, height, cancel).await {
            Ok(artifacts) => Ok(artifacts),
            Err(e) => {
                tracing::error!(stage = %e.stage, error = %e.cause, "Image generation failed");
                let _ = self.event_tx.send(GenerationEvent::Failed {
                    stage: e.stage,
                    error: e.cause.to_string(),
                });
                Err(e)
            }
        }
    }

    // ---- private helpers ----

    async fn run(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<SavedArtifact>, WorkflowError> {
        let handle = self
            .submitter
            .submit(prompt, width, height)
            .await
            .map_err(|e| WorkflowError::new(Stage::Submission, e))?;
        let _ = self.event_tx.send(GenerationEvent::Submitted {
            task_id: handle.task_id.clone(),
        });

        let status = self
            .poller
            .wait_for_completion(&handle, &self.config.poll, cancel)
            .await
            .map_err(|e| WorkflowError::new(Stage::Polling, e))?;

        if cancel.is_cancelled() {
            return Err(WorkflowError::new(Stage::Polling, PollError::Cancelled));
        }

        let artifacts = self.fetcher.save_artifacts(&handle, &status).await;
        if artifacts.is_empty() {
            return Err(WorkflowError::new(
                Stage::Persistence,
                StageError::NoArtifactsSaved {
                    attempted: status.images.len(),
                },
            ));
        }

        tracing::info!(
            task_id = %handle.task_id,
            saved = artifacts.len(),
            output_dir = %self.fetcher.output_dir().display(),
            "Image generation finished",
        );
        Ok(artifacts)
    }
}
