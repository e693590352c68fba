use serde::{Deserialize, Serialize};

/// Visual hand-off from a scene to the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    /// Hard cut at the midpoint.
    #[default]
    None,
    /// Linear cross-fade.
    Fade,
    /// Outgoing slides off to the left while the incoming slides in from the right.
    Slide,
    /// Outgoing shrinks and fades out while the incoming grows and fades in.
    Zoom,
}

impl std::fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionStyle::None => write!(f, "none"),
            TransitionStyle::Fade => write!(f, "fade"),
            TransitionStyle::Slide => write!(f, "slide"),
            TransitionStyle::Zoom => write!(f, "zoom"),
        }
    }
}
