//! Wire-level constants and request/handle types for the AIGC service.
//!
//! The fixed field values below are requirements of the remote service,
//! not tunables. [`GenerationRequest`] produces the submission form body
//! and [`TaskHandle`] produces the poll query string.

use crate::error::CoreError;
use crate::types::Dimensions;

// ---------------------------------------------------------------------------
// Endpoints and headers
// ---------------------------------------------------------------------------

/// Default submission endpoint (form-encoded POST).
pub const DEFAULT_SUBMIT_URL: &str = "https://image.baidu.com/aigc/generate";
/// Default poll endpoint (query-string GET).
pub const DEFAULT_QUERY_URL: &str = "https://image.baidu.com/aigc/query";

/// Static client identifier sent on every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Content type of the submission request body.
pub const SUBMIT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Content type header sent with poll requests.
pub const QUERY_CONTENT_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Fixed protocol field values
// ---------------------------------------------------------------------------

/// Generation category (`querycate`).
pub const QUERY_CATEGORY: &str = "8";
/// Quality tier (`modelParameter[quality]`).
pub const MODEL_QUALITY: &str = "1";
/// Model identifier (`modelParameter[id]`).
pub const MODEL_ID: &str = "1";
/// Product source tag (`productSource`).
pub const PRODUCT_SOURCE: &str = "image";
/// Page tag sent with every poll (`source`).
pub const SOURCE_PAGE: &str = "wen_b_page";

/// Progress value the service reports for a finished task.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 4096;

// ---------------------------------------------------------------------------
// Size presets
// ---------------------------------------------------------------------------

/// Sizes offered by the desktop tool's generate dialog.
pub const SIZE_PRESETS: &[&str] = &["1024x1024", "1024x1536", "1536x1024"];

/// Validate a width/height pair.
pub fn validate_dimensions(width: u32, height: u32) -> Result<Dimensions, CoreError> {
    for (name, value) in [("width", width), ("height", height)] {
        if value == 0 || value > MAX_DIMENSION {
            return Err(CoreError::Validation(format!(
                "{name} must be between 1 and {MAX_DIMENSION}, got {value}"
            )));
        }
    }
    Ok(Dimensions { width, height })
}

/// Parse a `WIDTHxHEIGHT` size string such as `"1024x1536"`.
pub fn parse_size(size: &str) -> Result<Dimensions, CoreError> {
    let (w, h) = size
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| CoreError::Validation(format!("Size must look like WxH, got '{size}'")))?;

    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| CoreError::Validation(format!("Invalid size component '{part}'")))
    };

    validate_dimensions(parse(w)?, parse(h)?)
}

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// One image-generation submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    dimensions: Dimensions,
}

impl GenerationRequest {
    /// Build a request, rejecting blank prompts and out-of-range sizes.
    pub fn new(prompt: impl Into<String>, width: u32, height: u32) -> Result<Self, CoreError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(CoreError::Validation("Prompt must not be empty".to_string()));
        }
        let dimensions = validate_dimensions(width, height)?;
        Ok(Self { prompt, dimensions })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Form fields for the submission POST, in wire order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.prompt.clone()),
            ("querycate", QUERY_CATEGORY.to_string()),
            ("width", self.dimensions.width.to_string()),
            ("height", self.dimensions.height.to_string()),
            ("modelParameter[quality]", MODEL_QUALITY.to_string()),
            ("modelParameter[id]", MODEL_ID.to_string()),
            ("uploadPic", String::new()),
            ("productSource", PRODUCT_SOURCE.to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// TaskHandle / TaskStatus
// ---------------------------------------------------------------------------

/// Identifies a submitted task. Every poll must echo these values back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
    pub token: String,
    pub timestamp: String,
    pub original_prompt: String,
}

impl TaskHandle {
    /// Query parameters for one poll request, in wire order.
    pub fn poll_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("taskid", self.task_id.clone()),
            ("token", self.token.clone()),
            ("timestamp", self.timestamp.clone()),
            ("modelParameter[id]", MODEL_ID.to_string()),
            ("modelParameter[quality]", MODEL_QUALITY.to_string()),
            ("source", SOURCE_PAGE.to_string()),
            ("query", self.original_prompt.clone()),
            ("productSource", PRODUCT_SOURCE.to_string()),
        ]
    }
}

/// Status reported by a single poll. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskStatus {
    /// Both `isGenerate` and `progress == 100` were reported.
    pub is_complete: bool,
    /// Clamped to `0..=100`.
    pub progress_percent: u8,
    /// Image URLs in service order, paired with their 1-based position in
    /// the service's `picArr`. Empty until complete.
    pub images: Vec<(u32, String)>,
}

impl TaskStatus {
    /// Derive a status from the raw poll fields.
    ///
    /// Completion requires both signals; either one alone keeps the task
    /// in progress.
    pub fn from_poll(is_generate: bool, progress: i64, images: Vec<(u32, String)>) -> Self {
        let progress_percent = progress.clamp(0, i64::from(PROGRESS_COMPLETE)) as u8;
        Self {
            is_complete: is_generate && progress == i64::from(PROGRESS_COMPLETE),
            progress_percent,
            images,
        }
    }

    /// The image URLs alone, in order.
    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(|(_, url)| url.as_str())
    }
}
