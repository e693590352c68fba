use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::animation::AnimationStyle;

/// Unique identifier for a positioned asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an asset's raster comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AssetSource {
    /// Built-in art, addressed by identifier (e.g. `"lightbulb"`).
    Builtin(String),
    /// A user-supplied raster on disk.
    File(PathBuf),
}

impl std::fmt::Display for AssetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetSource::Builtin(id) => write!(f, "builtin:{}", id),
            AssetSource::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Anchor of an asset on the canvas: center, four corners, four edge centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    LeftCenter,
    RightCenter,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Placement {
    pub const ALL: [Placement; 9] = [
        Placement::Center,
        Placement::TopLeft,
        Placement::TopCenter,
        Placement::TopRight,
        Placement::LeftCenter,
        Placement::RightCenter,
        Placement::BottomLeft,
        Placement::BottomCenter,
        Placement::BottomRight,
    ];
}

fn default_scale() -> f64 {
    1.0
}

fn default_animation_duration_ms() -> u64 {
    1_000
}

/// An image placed and animated within exactly one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedAsset {
    pub id: AssetId,
    pub source: AssetSource,
    #[serde(default)]
    pub placement: Placement,
    /// Uniform scale factor applied to the decoded raster (> 0).
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Pixel offset added to the solved placement.
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
    #[serde(default)]
    pub animation: AnimationStyle,
    /// Stored for editors; reveal timing comes from the scene-wide stagger.
    #[serde(default)]
    pub delay_ms: u64,
    /// Stored for editors; reveal timing comes from the scene-wide stagger.
    #[serde(default = "default_animation_duration_ms")]
    pub duration_ms: u64,
}

impl PositionedAsset {
    pub fn new(id: impl Into<String>, source: AssetSource) -> Self {
        Self {
            id: AssetId::new(id),
            source,
            placement: Placement::Center,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            animation: AnimationStyle::None,
            delay_ms: 0,
            duration_ms: default_animation_duration_ms(),
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, x: f64, y: f64) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    pub fn with_animation(mut self, animation: AnimationStyle) -> Self {
        self.animation = animation;
        self
    }
}
