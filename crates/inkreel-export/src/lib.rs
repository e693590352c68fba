//! # inkreel-export
//!
//! The export job: renders every frame of a storyboard, feeds the encoder
//! and writes the container, with cancellation and progress reporting.

pub mod error;
pub mod job;
pub mod progress;

pub use error::ExportError;
pub use job::{ExportHandle, ExportJob, ExportOutcome, ExportSettings, MAX_FPS};
pub use progress::{CancellationToken, ExportProgress, ExportStatus};
