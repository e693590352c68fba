use serde::{Deserialize, Serialize};

use crate::animation::AnimationStyle;
use crate::transition::TransitionStyle;

/// Shortest scene duration accepted by validation.
pub const MIN_SCENE_DURATION_MS: u64 = 500;

/// Unique identifier for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_speech_rate() -> f32 {
    1.0
}

/// One timed unit of the animation: text, subtitle, and (through the project)
/// the assets it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    /// Sort key within the project. Unique, not necessarily contiguous.
    pub order_index: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtitle_text: String,
    pub duration_ms: u64,
    /// Narration speed multiplier (1.0 = normal).
    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,
    /// Reveal style of the scene text.
    #[serde(default)]
    pub animation: AnimationStyle,
    /// Hand-off into the next scene.
    #[serde(default)]
    pub transition: TransitionStyle,
}

impl Scene {
    pub fn new(id: impl Into<String>, order_index: i64, duration_ms: u64) -> Self {
        Self {
            id: SceneId::new(id),
            order_index,
            text: String::new(),
            subtitle_text: String::new(),
            duration_ms,
            speech_rate: 1.0,
            animation: AnimationStyle::None,
            transition: TransitionStyle::None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle_text = subtitle.into();
        self
    }

    pub fn with_animation(mut self, animation: AnimationStyle) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_transition(mut self, transition: TransitionStyle) -> Self {
        self.transition = transition;
        self
    }

    /// Text the narrator reads: the subtitle when present, else the scene text.
    pub fn narration_text(&self) -> &str {
        if self.subtitle_text.trim().is_empty() {
            &self.text
        } else {
            &self.subtitle_text
        }
    }
}
