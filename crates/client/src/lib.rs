//! Client for the AIGC asynchronous image-generation service.
//!
//! Implements the submit → poll → fetch → persist workflow on top of a
//! pluggable HTTP [`Transport`](transport::Transport). Start with
//! [`Generator`], which sequences the stages and reports a single
//! outcome per invocation.

pub mod clock;
pub mod config;
pub mod events;
pub mod fetcher;
pub mod messages;
pub mod orchestrator;
pub mod poller;
pub mod submitter;
pub mod transport;

pub use config::GeneratorConfig;
pub use events::GenerationEvent;
pub use fetcher::{ArtifactFetcher, PersistenceError, SavedArtifact};
pub use orchestrator::{Generator, Stage, StageError, WorkflowError};
pub use poller::{PollError, Poller};
pub use submitter::{SubmissionError, TaskSubmitter};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};
