//! Domain logic for the AIGC image-generation client.
//!
//! Everything in this crate is free of network I/O: protocol constants
//! and request construction, size presets, artifact naming, the poll
//! completion state machine, and the user preferences file.

pub mod error;
pub mod naming;
pub mod polling;
pub mod protocol;
pub mod settings;
pub mod types;
