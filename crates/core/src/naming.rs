//! Artifact naming convention.
//!
//! Generates filesystem-safe filenames for downloaded images.
//!
//! Convention: `{prompt_prefix}_{capture_timestamp}_{index}.jpg`
//!
//! - `prompt_prefix` = first [`PROMPT_PREFIX_CHARS`] characters of the
//!   prompt, keeping only alphanumerics, space, `-` and `_`
//! - `capture_timestamp` = one value shared by every image of a batch
//! - `index` = 1-based position of the image in the batch
//!
//! # Examples
//!
//! ```
//! use aigc_core::naming::artifact_filename;
//!
//! assert_eq!(artifact_filename("a cat/dog", 1700000000000, 2), "a catdog_1700000000000_2.jpg");
//! ```

use crate::types::Timestamp;

/// Number of prompt characters considered for the filename.
pub const PROMPT_PREFIX_CHARS: usize = 30;

/// Extension of every saved artifact. The service returns JPEG.
pub const ARTIFACT_EXTENSION: &str = "jpg";

/// Keep only the characters that are safe in a filename on every platform
/// we target.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .take(PROMPT_PREFIX_CHARS)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Capture timestamp for a batch, in Unix milliseconds.
pub fn capture_timestamp(now: Timestamp) -> i64 {
    now.timestamp_millis()
}

/// Build the filename for the `index`-th image (1-based) of a batch.
pub fn artifact_filename(prompt: &str, capture_ts: i64, index: u32) -> String {
    format!(
        "{}_{capture_ts}_{index}.{ARTIFACT_EXTENSION}",
        sanitize_prompt(prompt)
    )
}
