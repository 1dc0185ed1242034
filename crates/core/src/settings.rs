//! User preferences file (default output size and compression quality).
//!
//! The file is a small key-value document with a single `[SETTINGS]`
//! table:
//!
//! ```text
//! [SETTINGS]
//! width = 800
//! height = 600
//! compression_quality = 95
//! ```
//!
//! Missing keys fall back to their defaults. A missing file is created
//! with defaults on first load.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::protocol::validate_dimensions;

/// Default preferences file name, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "config.ini";

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;
pub const DEFAULT_COMPRESSION_QUALITY: u8 = 95;

/// Persisted user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub width: u32,
    pub height: u32,
    /// JPEG/WebP quality, `1..=100`.
    pub compression_quality: u8,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            compression_quality: DEFAULT_COMPRESSION_QUALITY,
        }
    }
}

/// On-disk layout: everything lives under `[SETTINGS]`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(rename = "SETTINGS", default)]
    settings: Preferences,
}

impl Preferences {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_dimensions(self.width, self.height)?;
        if !(1..=100).contains(&self.compression_quality) {
            return Err(CoreError::Validation(format!(
                "compression_quality must be between 1 and 100, got {}",
                self.compression_quality
            )));
        }
        Ok(())
    }

    /// Parse preferences from file contents.
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let doc: SettingsDocument = toml::from_str(contents)
            .map_err(|e| CoreError::Validation(format!("Malformed settings file: {e}")))?;
        doc.settings.validate()?;
        Ok(doc.settings)
    }

    /// Render preferences as file contents.
    pub fn to_toml_string(&self) -> Result<String, CoreError> {
        toml::to_string(&SettingsDocument { settings: *self })
            .map_err(|e| CoreError::Internal(format!("Failed to serialize settings: {e}")))
    }

    /// Load preferences from `path`, writing defaults if the file does
    /// not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let prefs = Self::default();
                prefs.save(path)?;
                Ok(prefs)
            }
            Err(e) => Err(CoreError::Internal(format!(
                "Failed to read settings file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Write preferences to `path`, replacing any previous contents.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        self.validate()?;
        let contents = self.to_toml_string()?;
        std::fs::write(path, contents).map_err(|e| {
            CoreError::Internal(format!(
                "Failed to write settings file {}: {e}",
                path.display()
            ))
        })
    }
}
