//! Completion polling for submitted tasks.
//!
//! [`Poller::wait_for_completion`] drives the
//! [`PollState`](aigc_core::polling::PollState) machine: one status
//! request per attempt, a [`Clock`] sleep between attempts, and a
//! [`CancellationToken`] checked before each attempt and during each
//! sleep. A poll request in flight is never interrupted.

use std::sync::Arc;

use aigc_core::polling::{PollBudget, PollFailure, PollState};
use aigc_core::protocol::{TaskHandle, TaskStatus};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::events::GenerationEvent;
use crate::messages::PollResponse;
use crate::transport::{Transport, TransportError};

/// Errors from the polling stage.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The attempt budget ran out before the task completed.
    #[error("Task did not complete within {attempts} poll attempts")]
    Timeout { attempts: u32 },

    /// A poll request failed. Polling stops at the first failure.
    #[error("Poll request failed: {0}")]
    Transport(#[from] TransportError),

    /// The caller cancelled the wait.
    #[error("Polling cancelled")]
    Cancelled,
}

/// Polls the status endpoint until a task reaches a terminal state.
pub struct Poller {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    query_url: String,
    event_tx: Option<broadcast::Sender<GenerationEvent>>,
}

impl Poller {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, query_url: String) -> Self {
        Self {
            transport,
            clock,
            query_url,
            event_tx: None,
        }
    }

    /// Publish progress updates on `event_tx`.
    pub fn with_events(mut self, event_tx: broadcast::Sender<GenerationEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Poll until the task completes, fails, runs out of attempts, or is
    /// cancelled.
    ///
    /// Issues at most `budget.max_attempts` requests and sleeps at most
    /// `max_attempts - 1` times.
    pub async fn wait_for_completion(
        &self,
        handle: &TaskHandle,
        budget: &PollBudget,
        cancel: &CancellationToken,
    ) -> Result<TaskStatus, PollError> {
        let mut state = PollState::start(budget);

        while let PollState::Polling { attempts_made } = state {
            if cancel.is_cancelled() {
                state = state.on_cancel();
                break;
            }

            let attempt = attempts_made + 1;
            let status = match self.poll_once(handle).await {
                Ok(status) => status,
                Err(e) => {
                    state = state.on_transport_error();
                    tracing::error!(
                        task_id = %handle.task_id,
                        attempt,
                        ?state,
                        error = %e,
                        "Poll request failed",
                    );
                    return Err(PollError::Transport(e));
                }
            };

            state = state.on_status(&status, budget);
            if state == PollState::Complete {
                tracing::info!(
                    task_id = %handle.task_id,
                    attempt,
                    image_count = status.images.len(),
                    "Generation task complete",
                );
                self.emit(GenerationEvent::Completed {
                    task_id: handle.task_id.clone(),
                    image_count: status.images.len(),
                });
                return Ok(status);
            }

            self.report_progress(handle, attempt, &status);

            // No sleep after the final attempt.
            if !state.is_terminal() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => state = state.on_cancel(),
                    _ = self.clock.sleep(budget.interval) => {}
                }
            }
        }

        Err(self.terminal_error(handle, state, budget))
    }

    // ---- private helpers ----

    /// Issue one status request and decode it.
    async fn poll_once(&self, handle: &TaskHandle) -> Result<TaskStatus, TransportError> {
        tracing::debug!(task_id = %handle.task_id, url = %self.query_url, "Polling task status");
        let response = self
            .transport
            .get_query(&self.query_url, &handle.poll_query())
            .await?;
        let parsed: PollResponse = response.json()?;
        Ok(parsed.into_status())
    }

    fn report_progress(&self, handle: &TaskHandle, attempt: u32, status: &TaskStatus) {
        tracing::info!(
            task_id = %handle.task_id,
            attempt,
            percent = status.progress_percent,
            "Generation progress",
        );
        self.emit(GenerationEvent::Progress {
            task_id: handle.task_id.clone(),
            attempt,
            percent: status.progress_percent,
        });
    }

    /// Map the state polling stopped in to its error. Completion and
    /// transport failures return early and never reach this point.
    fn terminal_error(
        &self,
        handle: &TaskHandle,
        state: PollState,
        budget: &PollBudget,
    ) -> PollError {
        if state == PollState::Failed(PollFailure::Cancelled) {
            tracing::info!(task_id = %handle.task_id, "Polling cancelled");
            return PollError::Cancelled;
        }
        tracing::warn!(
            task_id = %handle.task_id,
            attempts = budget.max_attempts,
            "Generation task timed out",
        );
        PollError::Timeout {
            attempts: budget.max_attempts,
        }
    }

    fn emit(&self, event: GenerationEvent) {
        if let Some(tx) = &self.event_tx {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }
}
