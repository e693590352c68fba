//! # inkreel-ir
//!
//! The Inkreel project model: timed scenes, the positioned assets each scene
//! owns, and the ordered storyboard handed to the renderer. Storage layers
//! (databases, editors) produce a [`Project`]; rendering only ever reads it.

pub mod animation;
pub mod asset;
pub mod project;
pub mod scene;
pub mod speech;
pub mod transition;
pub mod validate;

pub use animation::AnimationStyle;
pub use asset::{AssetId, AssetSource, Placement, PositionedAsset};
pub use project::{Project, Storyboard};
pub use scene::{Scene, SceneId, MIN_SCENE_DURATION_MS};
pub use speech::{SpeechEstimator, WordRateEstimator};
pub use transition::TransitionStyle;
pub use validate::{validate_project, validate_storyboard};
