use serde::{Deserialize, Serialize};

/// How an asset (or a scene's text) appears during its reveal window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationStyle {
    #[default]
    None,
    FadeIn,
    FadeOut,
    ZoomIn,
    ZoomOut,
    /// Enters from the right edge, moving left.
    SlideLeft,
    /// Enters from the left edge, moving right.
    SlideRight,
    /// Enters from below, moving up.
    SlideUp,
    /// Enters from above, moving down.
    SlideDown,
    /// Simulated hand drawing; on text this shows the hand cursor.
    HandDraw,
}

impl AnimationStyle {
    pub const ALL: [AnimationStyle; 10] = [
        AnimationStyle::None,
        AnimationStyle::FadeIn,
        AnimationStyle::FadeOut,
        AnimationStyle::ZoomIn,
        AnimationStyle::ZoomOut,
        AnimationStyle::SlideLeft,
        AnimationStyle::SlideRight,
        AnimationStyle::SlideUp,
        AnimationStyle::SlideDown,
        AnimationStyle::HandDraw,
    ];
}

impl std::fmt::Display for AnimationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnimationStyle::None => "none",
            AnimationStyle::FadeIn => "fade_in",
            AnimationStyle::FadeOut => "fade_out",
            AnimationStyle::ZoomIn => "zoom_in",
            AnimationStyle::ZoomOut => "zoom_out",
            AnimationStyle::SlideLeft => "slide_left",
            AnimationStyle::SlideRight => "slide_right",
            AnimationStyle::SlideUp => "slide_up",
            AnimationStyle::SlideDown => "slide_down",
            AnimationStyle::HandDraw => "hand_draw",
        };
        f.write_str(name)
    }
}
