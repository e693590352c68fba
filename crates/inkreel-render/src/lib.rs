//! # inkreel-render
//!
//! The Inkreel rendering engine. Turns scenes and their positioned assets into
//! RGBA frames on the CPU: frame scheduling, staggered asset animation,
//! placement, text reveal with a writing hand, subtitles, and scene
//! transitions.

pub mod animation;
pub mod compositor;
pub mod image_loader;
pub mod placement;
pub mod resources;
pub mod sequence;
pub mod text;
pub mod timeline;
pub mod transition;

pub use animation::{evaluate, AssetPose, AssetTransform, StaggerWindow};
pub use compositor::SceneCompositor;
pub use image_loader::{FileResolver, MemoryResolver, ResourceResolver};
pub use placement::place;
pub use resources::{LoadedResources, RenderResources};
pub use sequence::StoryboardRenderer;
pub use text::{FontWeight, TextRenderer};
pub use timeline::{FramePosition, Timeline};
pub use transition::{render_transition, render_transition_into};
