//! Task submission.
//!
//! [`TaskSubmitter`] posts a [`GenerationRequest`] to the submission
//! endpoint and turns the reply into a [`TaskHandle`] the poller can use.

use std::sync::Arc;

use aigc_core::protocol::{GenerationRequest, TaskHandle};

use crate::messages::SubmitResponse;
use crate::transport::{Transport, TransportError};

/// Errors from the submission stage.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The prompt or dimensions were rejected before any request was made.
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    /// The service replied, but without the fields needed to poll.
    #[error("Invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// `token` or `timestamp` was absent and strict mode is on.
    #[error("Submission response is missing {0}")]
    MissingCredentials(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Submits generation tasks.
pub struct TaskSubmitter {
    transport: Arc<dyn Transport>,
    submit_url: String,
    strict_credentials: bool,
}

impl TaskSubmitter {
    /// * `strict_credentials` - fail instead of carrying forward an empty
    ///   `token`/`timestamp` when the service omits them.
    pub fn new(transport: Arc<dyn Transport>, submit_url: String, strict_credentials: bool) -> Self {
        Self {
            transport,
            submit_url,
            strict_credentials,
        }
    }

    /// Validate the arguments, submit the task, and return its handle.
    ///
    /// The returned handle always has a non-empty `task_id`.
    pub async fn submit(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<TaskHandle, SubmissionError> {
        let request = GenerationRequest::new(prompt, width, height)
            .map_err(|e| SubmissionError::InvalidRequest(e.to_string()))?;
        self.submit_request(&request).await
    }

    /// Submit an already validated request.
    pub async fn submit_request(
        &self,
        request: &GenerationRequest,
    ) -> Result<TaskHandle, SubmissionError> {
        let response = self
            .transport
            .post_form(&self.submit_url, &request.form_fields())
            .await?;

        let body: serde_json::Value = response.json()?;
        let handle = self.parse_handle(body, request.prompt())?;

        tracing::info!(
            task_id = %handle.task_id,
            width = request.dimensions().width,
            height = request.dimensions().height,
            "Generation task submitted",
        );
        Ok(handle)
    }

    // ---- private helpers ----

    fn parse_handle(
        &self,
        body: serde_json::Value,
        prompt: &str,
    ) -> Result<TaskHandle, SubmissionError> {
        let parsed: SubmitResponse = serde_json::from_value(body)
            .map_err(|e| SubmissionError::InvalidResponseFormat(e.to_string()))?;

        if parsed.status.is_none() {
            return Err(SubmissionError::InvalidResponseFormat(
                "missing `status`".to_string(),
            ));
        }
        let task_id = parsed
            .taskid
            .map(|id| id.to_text())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                SubmissionError::InvalidResponseFormat("missing or empty `taskid`".to_string())
            })?;

        let token = self.credential(parsed.token.map(|t| t.to_text()), "token", &task_id)?;
        let timestamp =
            self.credential(parsed.timestamp.map(|t| t.to_text()), "timestamp", &task_id)?;

        Ok(TaskHandle {
            task_id,
            token,
            timestamp,
            original_prompt: prompt.to_string(),
        })
    }

    /// Resolve an optional credential field according to the strictness
    /// setting.
    fn credential(
        &self,
        value: Option<String>,
        field: &'static str,
        task_id: &str,
    ) -> Result<String, SubmissionError> {
        match value {
            Some(v) => Ok(v),
            None if self.strict_credentials => Err(SubmissionError::MissingCredentials(field)),
            None => {
                tracing::warn!(
                    task_id,
                    field,
                    "Submission response has no {field}, polling with an empty value",
                );
                Ok(String::new())
            }
        }
    }
}
