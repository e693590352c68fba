//! End-to-end encode through a real `ffmpeg`. Skipped when it is not installed.

use std::time::Duration;

use inkreel_core::{CanvasSize, Color, EncoderConfig, Frame, FrameBuffer};
use inkreel_encode::{
    rgba_to_i420, ContainerMuxer, EncoderBackend, EncoderOutput, EncoderSettings, FfmpegBackend,
    Mp4Summary, TrackFormat,
};

const POLL: Duration = Duration::from_millis(10);

fn test_frame(index: u64) -> FrameBuffer {
    let shade = (index * 4 % 256) as f32 / 255.0;
    FrameBuffer::solid(64, 48, &Color::rgb(shade, 0.2, 1.0 - shade))
}

#[test]
fn encodes_and_muxes_with_ffmpeg() {
    let backend = FfmpegBackend::new(EncoderConfig::default());
    if !backend.is_available() {
        eprintln!("ffmpeg not available, skipping");
        return;
    }

    let settings = EncoderSettings::for_canvas(CanvasSize::even_floor(64, 48), 15);
    let path = std::env::temp_dir().join(format!("inkreel_ffmpeg_{}.mp4", std::process::id()));
    let mut encoder = backend.create_encoder(&settings).unwrap();
    let mut muxer = backend.create_muxer(&path, &settings).unwrap();
    let mut track = None;

    let mut drain = |encoder: &mut Box<dyn inkreel_encode::VideoEncoder>,
                     muxer: &mut Box<dyn ContainerMuxer>,
                     until_end: bool|
     -> bool {
        loop {
            match encoder.dequeue_packet(POLL).unwrap() {
                EncoderOutput::Packet(packet) if packet.config => {
                    if track.is_some() {
                        continue;
                    }
                    let index = muxer
                        .add_track(&TrackFormat {
                            width: settings.width,
                            height: settings.height,
                            fps: settings.fps,
                            codec_config: packet.data.clone(),
                        })
                        .unwrap();
                    muxer.start().unwrap();
                    track = Some(index);
                }
                EncoderOutput::Packet(packet) => {
                    muxer.write_sample(track.unwrap(), &packet).unwrap();
                }
                EncoderOutput::TryAgainLater if until_end => continue,
                EncoderOutput::TryAgainLater => return false,
                EncoderOutput::EndOfStream => return true,
            }
        }
    };

    for i in 0..30u64 {
        let yuv = rgba_to_i420(&test_frame(i)).unwrap();
        let pts = Frame::new(i).pts_micros(settings.fps);
        while !encoder.try_queue_frame(&yuv, pts, POLL).unwrap() {
            drain(&mut encoder, &mut muxer, false);
        }
        drain(&mut encoder, &mut muxer, false);
    }
    encoder.signal_end_of_stream().unwrap();
    assert!(drain(&mut encoder, &mut muxer, true));
    muxer.finish().unwrap();
    muxer.release();
    encoder.release();

    let summary = Mp4Summary::read(&path).unwrap();
    assert_eq!(summary.sample_count, 30);
    assert_eq!((summary.width, summary.height), (64, 48));
    assert_eq!(summary.keyframe_count, 2);
    assert!((summary.duration_secs() - 2.0).abs() < 0.05);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_binary_fails_to_create_encoder() {
    let backend = FfmpegBackend::new(EncoderConfig {
        ffmpeg_path: "/nonexistent/ffmpeg".into(),
        ..EncoderConfig::default()
    });
    assert!(!backend.is_available());
    let settings = EncoderSettings::for_canvas(CanvasSize::even_floor(64, 48), 30);
    assert!(backend.create_encoder(&settings).is_err());
}
