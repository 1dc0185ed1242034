//! Command-line arguments and how they combine with stored preferences
//! and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use aigc_client::GeneratorConfig;
use aigc_core::protocol::parse_size;
use aigc_core::settings::{Preferences, DEFAULT_SETTINGS_FILE};
use aigc_core::types::Dimensions;
use clap::{Args, Parser, Subcommand};

/// Generate images from a text prompt with the AIGC service.
#[derive(Debug, Parser)]
#[command(name = "aigc", version, about, long_about = None)]
pub struct Cli {
    /// Preferences file holding the default size and quality
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a prompt, wait for the result, and save the images
    Generate(GenerateArgs),

    /// Show or update stored preferences
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Text prompt describing the image
    pub prompt: String,

    /// Image width in pixels (defaults to the stored preference)
    #[arg(long, conflicts_with = "size")]
    pub width: Option<u32>,

    /// Image height in pixels (defaults to the stored preference)
    #[arg(long, conflicts_with = "size")]
    pub height: Option<u32>,

    /// Size as WIDTHxHEIGHT, e.g. 1024x1536
    #[arg(long, value_parser = parse_size)]
    pub size: Option<Dimensions>,

    /// Directory to save images into
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of status polls
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between status polls
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
}

impl GenerateArgs {
    /// Requested dimensions: `--size`, else `--width`/`--height`, else the
    /// stored preference for whichever side is missing.
    pub fn dimensions(&self, prefs: &Preferences) -> Dimensions {
        if let Some(size) = self.size {
            return size;
        }
        Dimensions {
            width: self.width.unwrap_or(prefs.width),
            height: self.height.unwrap_or(prefs.height),
        }
    }

    /// Flags take precedence over environment values.
    pub fn apply_overrides(&self, config: &mut GeneratorConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(attempts) = self.max_attempts {
            config.poll.max_attempts = attempts;
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll.interval = Duration::from_secs(secs);
        }
    }
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// New default width
    #[arg(long)]
    pub width: Option<u32>,

    /// New default height
    #[arg(long)]
    pub height: Option<u32>,

    /// New compression quality (1-100)
    #[arg(long)]
    pub quality: Option<u8>,
}

impl SettingsArgs {
    /// Apply the given values to `prefs`. Returns whether anything changed.
    pub fn apply(&self, prefs: &mut Preferences) -> bool {
        let before = *prefs;
        if let Some(width) = self.width {
            prefs.width = width;
        }
        if let Some(height) = self.height {
            prefs.height = height;
        }
        if let Some(quality) = self.quality {
            prefs.compression_quality = quality;
        }
        *prefs != before
    }
}
