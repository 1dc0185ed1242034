//! Response schemas for the submission and poll endpoints.
//!
//! The service is loose about scalar types (task ids and timestamps
//! arrive as strings or numbers), so those fields deserialize into
//! [`Scalar`]. Required fields are `Option`s here and are checked by the
//! submitter, which turns a missing field into a typed error.

use aigc_core::protocol::TaskStatus;
use serde::{Deserialize, Deserializer};

/// A JSON string or number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    /// Textual form, as echoed back to the service.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
        }
    }

    /// Integer value, accepting numeric strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        }
    }
}

/// Body of the submission endpoint.
///
/// `status` and `taskid` are required; `token` and `timestamp` are
/// optional.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Presence is required; the value itself is not interpreted, so an
    /// explicit `null` still counts as present.
    #[serde(default, deserialize_with = "present")]
    pub status: Option<serde_json::Value>,
    pub taskid: Option<Scalar>,
    pub token: Option<Scalar>,
    pub timestamp: Option<Scalar>,
}

/// Any value, including `null`, marks the key as present.
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// One generated image in a poll response.
#[derive(Debug, Clone, Deserialize)]
pub struct PicEntry {
    pub src: Option<String>,
}

/// Body of the poll endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    /// Missing or `null` means not yet generated.
    #[serde(rename = "isGenerate", default)]
    pub is_generate: Option<bool>,
    pub progress: Option<Scalar>,
    /// Present once the task has finished.
    #[serde(rename = "picArr")]
    pub pic_arr: Option<Vec<PicEntry>>,
}

impl PollResponse {
    /// Reduce the raw response to a [`TaskStatus`].
    ///
    /// Entries without a `src` are dropped; the remaining entries keep
    /// their 1-based position in `picArr`.
    pub fn into_status(self) -> TaskStatus {
        let progress = self.progress.as_ref().and_then(Scalar::as_i64).unwrap_or(0);
        let images = self
            .pic_arr
            .unwrap_or_default()
            .into_iter()
            .zip(1u32..)
            .filter_map(|(pic, index)| match pic.src {
                Some(src) if !src.trim().is_empty() => Some((index, src)),
                _ => None,
            })
            .collect();
        TaskStatus::from_poll(self.is_generate.unwrap_or(false), progress, images)
    }
}
