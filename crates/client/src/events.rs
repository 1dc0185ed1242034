//! Workflow events emitted by the [`Generator`](crate::Generator).
//!
//! These represent the lifecycle of one generation request as seen by
//! observers (progress bars, logs, UIs). Subscribe with
//! [`Generator::subscribe`](crate::Generator::subscribe).

use std::path::PathBuf;

use serde::Serialize;

use crate::orchestrator::Stage;

/// A lifecycle event for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GenerationEvent {
    /// The service accepted the task.
    Submitted { task_id: String },

    /// A poll reported the task as still running.
    Progress {
        task_id: String,
        /// 1-based poll attempt number.
        attempt: u32,
        /// Completion percentage (0-100).
        percent: u8,
    },

    /// The service reported the task as finished.
    Completed {
        task_id: String,
        /// Number of downloadable images reported.
        image_count: usize,
    },

    /// One image was written to disk.
    ArtifactSaved {
        task_id: String,
        index: u32,
        path: PathBuf,
    },

    /// One image could not be saved. The batch continues.
    ArtifactFailed {
        task_id: String,
        index: u32,
        url: String,
        /// Human-readable error description.
        error: String,
    },

    /// The workflow ended without a usable result.
    Failed { stage: Stage, error: String },
}
