//! # inkreel-core
//!
//! Core types and primitives for the Inkreel whiteboard video engine.
//! This crate contains the foundational types shared by every Inkreel crate:
//! RGBA frame buffers, colors, canvas geometry, configuration,
//! and the crate-wide error type.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod math;
pub mod types;

pub use config::*;

pub use color::Color;
pub use error::{InkreelError, InkreelResult};
pub use frame::{Frame, FrameBuffer};
pub use math::{CanvasSize, Point2D, Size2D};
pub use types::{AspectRatio, Resolution};
