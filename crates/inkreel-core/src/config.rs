use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InkreelError, InkreelResult};
use crate::types::{AspectRatio, Resolution};

/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 30;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub fps: u32,
    pub resolution: Resolution,
    pub aspect: AspectRatio,
    /// Length of the blended hand-off between consecutive scenes; 0 = hard cuts.
    pub transition_ms: u64,
    /// Fail the export when a positioned asset's raster cannot be resolved.
    pub strict_assets: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            resolution: Resolution::default(),
            aspect: AspectRatio::default(),
            transition_ms: 0,
            strict_assets: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg_path: String,
    /// libx264 preset.
    pub preset: String,
    /// Timeout for a single input/output queue poll.
    pub poll_timeout_ms: u64,
    /// Consecutive empty polls tolerated before the encoder counts as stalled.
    pub max_idle_polls: u32,
    /// Frames buffered between the job and the encoder process.
    pub input_queue: usize,
    /// Output chunks buffered between the encoder process and the muxer.
    pub output_queue: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            preset: "veryfast".to_string(),
            poll_timeout_ms: 10,
            max_idle_polls: 3_000,
            input_queue: 4,
            output_queue: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FontConfig {
    /// Font for scene text. Falls back to well-known system fonts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular: Option<PathBuf>,
    /// Font for subtitles. Falls back to `regular`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<PathBuf>,
    /// Scene text color as `#RRGGBB`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ink_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding built-in art, addressed as `<id>.png`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_dir: Option<PathBuf>,
    /// Hand cursor raster drawn while text is being written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_cursor: Option<PathBuf>,
    /// Background raster stretched behind every scene.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<PathBuf>,
}

/// Top-level configuration, usually read from `inkreel.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct InkreelConfig {
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub assets: AssetConfig,
}

impl InkreelConfig {
    pub fn load_from_file(path: &Path) -> InkreelResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| InkreelError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(contents: &str) -> InkreelResult<Self> {
        toml::from_str(contents).map_err(|e| InkreelError::Config(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> InkreelResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| InkreelError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
