//! # inkreel-encode
//!
//! Encoding module: converts rendered RGBA frames to I420, streams them
//! through an H.264 encoder and writes the packets into an MP4 container.
//! The export loop only talks to the [`VideoEncoder`] and [`ContainerMuxer`]
//! traits; [`FfmpegBackend`] is the production pairing.

pub mod annexb;
pub mod clock;
pub mod codec;
pub mod ffmpeg;
pub mod mux;
pub mod yuv;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{
    ContainerMuxer, EncodedPacket, EncoderBackend, EncoderOutput, EncoderSettings, TrackFormat,
    VideoEncoder,
};
pub use ffmpeg::{FfmpegBackend, FfmpegEncoder};
pub use mux::{Mp4Muxer, Mp4Summary};
pub use yuv::{rgba_to_i420, rgba_to_i420_into, I420Frame};
