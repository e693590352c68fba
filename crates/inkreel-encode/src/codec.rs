//! The seams between the export loop, the video encoder, and the container
//! muxer. Both sides are polled with explicit timeouts; nothing blocks
//! indefinitely.

use std::path::Path;
use std::time::Duration;

use inkreel_core::{CanvasSize, InkreelResult};

use crate::yuv::I420Frame;

/// Fixed encoding parameters for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bit rate in bits per second.
    pub bit_rate: u64,
    /// Frames between forced keyframes.
    pub keyframe_interval: u32,
}

impl EncoderSettings {
    /// Bit rate `w × h × 4` and one keyframe per second.
    pub fn for_canvas(canvas: CanvasSize, fps: u32) -> Self {
        Self {
            width: canvas.width(),
            height: canvas.height(),
            fps,
            bit_rate: canvas.width() as u64 * canvas.height() as u64 * 4,
            keyframe_interval: fps.max(1),
        }
    }
}

/// One unit of encoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Annex-B byte stream (start-code delimited NAL units).
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
    pub keyframe: bool,
    /// Codec configuration (SPS/PPS) rather than a picture.
    pub config: bool,
}

impl EncodedPacket {
    pub fn config(data: Vec<u8>) -> Self {
        Self {
            data,
            pts_us: 0,
            keyframe: false,
            config: true,
        }
    }

    pub fn picture(data: Vec<u8>, pts_us: i64, keyframe: bool) -> Self {
        Self {
            data,
            pts_us,
            keyframe,
            config: false,
        }
    }
}

/// Result of polling the encoder for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderOutput {
    Packet(EncodedPacket),
    /// Nothing ready within the timeout.
    TryAgainLater,
    /// End of stream was signalled and every packet has been returned.
    EndOfStream,
}

/// Everything a muxer needs to declare a video track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Annex-B SPS/PPS from the encoder's config packet.
    pub codec_config: Vec<u8>,
}

/// A frame-in, packet-out video encoder.
pub trait VideoEncoder: Send {
    /// Offer a frame with its timestamp. Returns `Ok(false)` when the input
    /// queue stayed full for the whole timeout; the caller should drain
    /// output and retry.
    fn try_queue_frame(&mut self, frame: &I420Frame, pts_us: i64, timeout: Duration) -> InkreelResult<bool>;

    fn dequeue_packet(&mut self, timeout: Duration) -> InkreelResult<EncoderOutput>;

    /// No more frames will be queued. Remaining packets stay dequeueable.
    fn signal_end_of_stream(&mut self) -> InkreelResult<()>;

    /// Free every resource. Idempotent; safe in any state.
    fn release(&mut self);
}

/// A container writer with one or more tracks.
pub trait ContainerMuxer: Send {
    fn add_track(&mut self, format: &TrackFormat) -> InkreelResult<usize>;

    /// Begin writing samples. Called exactly once, after the tracks are added.
    fn start(&mut self) -> InkreelResult<()>;

    fn write_sample(&mut self, track: usize, packet: &EncodedPacket) -> InkreelResult<()>;

    /// Complete the container so it is playable and seekable.
    fn finish(&mut self) -> InkreelResult<()>;

    /// Free every resource. Idempotent; an unfinished output is discarded.
    fn release(&mut self);
}

/// Creates the encoder/muxer pair for one export.
pub trait EncoderBackend: Send + Sync {
    fn create_encoder(&self, settings: &EncoderSettings) -> InkreelResult<Box<dyn VideoEncoder>>;

    fn create_muxer(&self, output: &Path, settings: &EncoderSettings) -> InkreelResult<Box<dyn ContainerMuxer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_for_canvas() {
        let s = EncoderSettings::for_canvas(CanvasSize::even_floor(1281, 721), 30);
        assert_eq!((s.width, s.height), (1280, 720));
        assert_eq!(s.bit_rate, 1280 * 720 * 4);
        assert_eq!(s.keyframe_interval, 30);
    }

    #[test]
    fn test_packet_constructors() {
        assert!(EncodedPacket::config(vec![0, 0, 1, 0x67]).config);
        let p = EncodedPacket::picture(vec![1], 33_333, true);
        assert!(p.keyframe && !p.config);
    }
}
