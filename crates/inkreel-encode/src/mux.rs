//! MP4 output for a single H.264 video track, written with the `mp4` crate,
//! plus a summary reader used to verify and inspect the result.
//!
//! Samples arrive with presentation timestamps but the container wants a
//! duration per sample, so each sample is held back until the next one
//! arrives. The last sample gets one nominal frame.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use inkreel_core::{InkreelError, InkreelResult};
use mp4::{AvcConfig, FourCC, MediaConfig, Mp4Config, Mp4Reader, Mp4Sample, Mp4Writer, TrackConfig, TrackType};
use tracing::{debug, info, warn};

use crate::annexb::{annexb_to_length_prefixed, parameter_sets};
use crate::codec::{ContainerMuxer, EncodedPacket, TrackFormat};

/// Media timescale of the video track (ticks per second).
pub const MP4_TIMESCALE: u32 = 90_000;
const MOVIE_TIMESCALE: u32 = 1_000;
/// Track id the `mp4` writer assigns to the first track.
const VIDEO_TRACK_ID: u32 = 1;
/// Media durations are stored in 32 bits; later samples are refused.
const MAX_MEDIA_TICKS: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuxState {
    Configuring,
    Started,
    Finished,
    Released,
}

#[derive(Debug, Clone)]
struct Track {
    format: TrackFormat,
    sps: Vec<u8>,
    pps: Vec<u8>,
}

#[derive(Debug, Clone)]
struct PendingSample {
    ticks: u64,
    keyframe: bool,
    data: Bytes,
}

fn mux_err(message: impl fmt::Display) -> InkreelError {
    InkreelError::Mux(message.to_string())
}

/// Microseconds to media ticks, rounded to nearest.
fn us_to_ticks(pts_us: i64) -> u64 {
    let us = pts_us.max(0) as u64;
    (us * MP4_TIMESCALE as u64 + 500_000) / 1_000_000
}

fn brand(code: &[u8; 4]) -> FourCC {
    FourCC { value: *code }
}

/// Writes one H.264 track into an `.mp4` file.
pub struct Mp4Muxer {
    path: PathBuf,
    /// The created file, until `start` hands it to the writer.
    file: Option<BufWriter<File>>,
    writer: Option<Mp4Writer<BufWriter<File>>>,
    state: MuxState,
    track: Option<Track>,
    pending: Option<PendingSample>,
    written: usize,
}

impl Mp4Muxer {
    /// Create (or truncate) the output file.
    pub fn create(path: &Path) -> InkreelResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .map_err(|e| mux_err(format!("failed to create {}: {}", path.display(), e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            writer: None,
            state: MuxState::Configuring,
            track: None,
            pending: None,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples accepted so far, including the one held back.
    pub fn sample_count(&self) -> usize {
        self.written + usize::from(self.pending.is_some())
    }

    fn last_ticks(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.ticks)
    }

    fn nominal_ticks(&self) -> u64 {
        let fps = self.track.as_ref().map_or(1, |t| t.format.fps.max(1));
        (MP4_TIMESCALE / fps).max(1) as u64
    }

    fn flush_sample(&mut self, sample: PendingSample, duration: u64) -> InkreelResult<()> {
        let duration = u32::try_from(duration).map_err(|_| mux_err("sample duration overflows 32 bits"))?;
        let writer = self.writer.as_mut().ok_or_else(|| mux_err("muxer already released"))?;
        writer
            .write_sample(
                VIDEO_TRACK_ID,
                &Mp4Sample {
                    start_time: sample.ticks,
                    duration,
                    rendering_offset: 0,
                    is_sync: sample.keyframe,
                    bytes: sample.data,
                },
            )
            .map_err(|e| mux_err(format!("failed to write sample: {}", e)))?;
        self.written += 1;
        Ok(())
    }
}

impl fmt::Debug for Mp4Muxer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mp4Muxer")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("samples", &self.sample_count())
            .finish()
    }
}

impl ContainerMuxer for Mp4Muxer {
    fn add_track(&mut self, format: &TrackFormat) -> InkreelResult<usize> {
        if self.state != MuxState::Configuring {
            return Err(mux_err("tracks must be added before start"));
        }
        if self.track.is_some() {
            return Err(mux_err("only one video track is supported"));
        }
        if u16::try_from(format.width).is_err() || u16::try_from(format.height).is_err() {
            return Err(mux_err(format!("{}x{} is too large for an avc1 track", format.width, format.height)));
        }
        let (sps, pps) = parameter_sets(&format.codec_config);
        let sps = sps
            .into_iter()
            .find(|s| s.len() >= 4)
            .ok_or_else(|| mux_err("codec config has no SPS"))?;
        let pps = pps
            .into_iter()
            .next()
            .ok_or_else(|| mux_err("codec config has no PPS"))?;
        debug!(
            "mp4 track: {}x{} @ {}fps, profile {} level {}",
            format.width, format.height, format.fps, sps[1], sps[3]
        );
        self.track = Some(Track {
            format: format.clone(),
            sps: sps.to_vec(),
            pps: pps.to_vec(),
        });
        Ok(0)
    }

    fn start(&mut self) -> InkreelResult<()> {
        if self.state != MuxState::Configuring {
            return Err(mux_err("muxer already started"));
        }
        let track = self
            .track
            .as_ref()
            .ok_or_else(|| mux_err("cannot start without a track"))?;
        let file = self.file.take().ok_or_else(|| mux_err("muxer already released"))?;

        let config = Mp4Config {
            major_brand: brand(b"isom"),
            minor_version: 512,
            compatible_brands: vec![brand(b"isom"), brand(b"iso2"), brand(b"avc1"), brand(b"mp41")],
            timescale: MOVIE_TIMESCALE,
        };
        let mut writer =
            Mp4Writer::write_start(file, &config).map_err(|e| mux_err(format!("failed to start mp4: {}", e)))?;
        writer
            .add_track(&TrackConfig {
                track_type: TrackType::Video,
                timescale: MP4_TIMESCALE,
                language: "und".to_string(),
                media_conf: MediaConfig::AvcConfig(AvcConfig {
                    width: track.format.width as u16,
                    height: track.format.height as u16,
                    seq_param_set: track.sps.clone(),
                    pic_param_set: track.pps.clone(),
                }),
            })
            .map_err(|e| mux_err(format!("failed to add video track: {}", e)))?;

        self.writer = Some(writer);
        self.state = MuxState::Started;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, packet: &EncodedPacket) -> InkreelResult<()> {
        if self.state != MuxState::Started {
            return Err(mux_err("write_sample before start"));
        }
        if track != 0 {
            return Err(mux_err(format!("unknown track {}", track)));
        }
        if packet.config {
            return Ok(());
        }

        let ticks = us_to_ticks(packet.pts_us);
        if let Some(last) = self.last_ticks() {
            if ticks <= last {
                return Err(mux_err(format!(
                    "non-increasing timestamp {}us after {} ticks",
                    packet.pts_us, last
                )));
            }
        }
        if ticks + self.nominal_ticks() > MAX_MEDIA_TICKS {
            return Err(mux_err(format!(
                "sample at {}us is past the longest duration an mp4 track can hold",
                packet.pts_us
            )));
        }

        let data = annexb_to_length_prefixed(&packet.data);
        if data.is_empty() {
            warn!("dropping empty sample at {}us", packet.pts_us);
            return Ok(());
        }

        let next = PendingSample {
            ticks,
            keyframe: packet.keyframe,
            data: Bytes::from(data),
        };
        if let Some(previous) = self.pending.replace(next) {
            let duration = ticks - previous.ticks;
            self.flush_sample(previous, duration)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> InkreelResult<()> {
        if self.state != MuxState::Started {
            return Err(mux_err("finish called before start"));
        }
        let last = self.pending.take().ok_or_else(|| mux_err("no samples were written"))?;
        let nominal = self.nominal_ticks();
        self.flush_sample(last, nominal)?;

        let mut writer = self.writer.take().ok_or_else(|| mux_err("muxer already released"))?;
        writer
            .write_end()
            .map_err(|e| mux_err(format!("failed to finalize mp4: {}", e)))?;
        writer.into_writer().flush()?;
        self.state = MuxState::Finished;

        info!("wrote {} samples to {}", self.written, self.path.display());
        Ok(())
    }

    fn release(&mut self) {
        if self.state == MuxState::Released {
            return;
        }
        let finished = self.state == MuxState::Finished;
        self.file = None;
        self.writer = None;
        self.pending = None;
        self.state = MuxState::Released;
        if !finished {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!("could not remove partial {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for Mp4Muxer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Key facts about the video track of an MP4 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mp4Summary {
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub keyframe_count: u32,
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// Media duration in ticks.
    pub duration: u64,
}

impl Mp4Summary {
    /// Read the summary from the file's header boxes without loading samples.
    pub fn read(path: &Path) -> InkreelResult<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let reader = Mp4Reader::read_header(BufReader::new(file), size)
            .map_err(|e| mux_err(format!("{}: {}", path.display(), e)))?;
        let track = reader
            .tracks()
            .values()
            .find(|t| matches!(t.track_type(), Ok(TrackType::Video)))
            .ok_or_else(|| mux_err(format!("{}: no video track", path.display())))?;

        let sample_count = track.sample_count();
        let keyframe_count = track
            .trak
            .mdia
            .minf
            .stbl
            .stss
            .as_ref()
            .map_or(sample_count, |stss| stss.entries.len() as u32);
        Ok(Self {
            width: track.width() as u32,
            height: track.height() as u32,
            sample_count,
            keyframe_count,
            timescale: track.timescale(),
            duration: track.trak.mdia.mdhd.duration,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.duration as f64 / self.timescale as f64
    }

    /// Average frame rate over the whole track.
    pub fn fps(&self) -> f64 {
        let secs = self.duration_secs();
        if secs == 0.0 {
            return 0.0;
        }
        self.sample_count as f64 / secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annexb::join_annexb;

    const SPS: &[u8] = &[0x67, 0x4d, 0x00, 0x1f, 0xaa];
    const PPS: &[u8] = &[0x68, 0xee, 0x3c, 0x80];

    fn format() -> TrackFormat {
        TrackFormat {
            width: 64,
            height: 48,
            fps: 30,
            codec_config: join_annexb([SPS, PPS]),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("inkreel_mp4_{}_{}.mp4", name, std::process::id()))
    }

    fn picture(i: i64) -> EncodedPacket {
        let nal: &[u8] = if i % 30 == 0 { &[0x65, 0x88, 0x80] } else { &[0x41, 0x9a, 0x80] };
        EncodedPacket::picture(join_annexb([nal]), i * 1_000_000 / 30, i % 30 == 0)
    }

    #[test]
    fn test_ticks_round() {
        assert_eq!(us_to_ticks(0), 0);
        assert_eq!(us_to_ticks(33_333), 3_000);
        assert_eq!(us_to_ticks(66_666), 6_000);
        assert_eq!(us_to_ticks(1_000_000), 90_000);
    }

    #[test]
    fn test_round_trip_summary() {
        let path = temp_path("roundtrip");
        let mut mux = Mp4Muxer::create(&path).unwrap();
        let track = mux.add_track(&format()).unwrap();
        mux.start().unwrap();
        mux.write_sample(track, &EncodedPacket::config(format().codec_config)).unwrap();
        for i in 0..45 {
            mux.write_sample(track, &picture(i)).unwrap();
        }
        assert_eq!(mux.sample_count(), 45);
        mux.finish().unwrap();
        mux.release();

        let summary = Mp4Summary::read(&path).unwrap();
        assert_eq!(summary.sample_count, 45);
        assert_eq!(summary.keyframe_count, 2);
        assert_eq!((summary.width, summary.height), (64, 48));
        assert_eq!(summary.timescale, MP4_TIMESCALE);
        assert!((summary.duration_secs() - 1.5).abs() < 0.01);
        assert!((summary.fps() - 30.0).abs() < 0.1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_samples_are_length_prefixed() {
        let path = temp_path("samples");
        let mut mux = Mp4Muxer::create(&path).unwrap();
        mux.add_track(&format()).unwrap();
        mux.start().unwrap();
        mux.write_sample(0, &picture(0)).unwrap();
        mux.write_sample(0, &picture(1)).unwrap();
        mux.finish().unwrap();
        drop(mux);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[4..8], b"ftyp");

        let file = File::open(&path).unwrap();
        let size = file.metadata().unwrap().len();
        let mut reader = Mp4Reader::read_header(BufReader::new(file), size).unwrap();
        let first = reader.read_sample(VIDEO_TRACK_ID, 1).unwrap().unwrap();
        assert_eq!(first.bytes.as_ref(), &[0, 0, 0, 3, 0x65, 0x88, 0x80]);
        assert!(first.is_sync);
        assert_eq!(first.duration, 3_000);
        let second = reader.read_sample(VIDEO_TRACK_ID, 2).unwrap().unwrap();
        assert!(!second.is_sync);
        assert_eq!(second.start_time, 3_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_state_machine_errors() {
        let path = temp_path("states");
        let mut mux = Mp4Muxer::create(&path).unwrap();
        assert!(mux.start().is_err());
        assert!(mux.write_sample(0, &picture(0)).is_err());
        let bad = TrackFormat {
            codec_config: join_annexb([PPS]),
            ..format()
        };
        assert!(mux.add_track(&bad).is_err());
        let huge = TrackFormat {
            width: 70_000,
            ..format()
        };
        assert!(mux.add_track(&huge).is_err());
        mux.add_track(&format()).unwrap();
        assert!(mux.add_track(&format()).is_err());
        mux.start().unwrap();
        assert!(mux.start().is_err());
        assert!(mux.finish().is_err(), "no samples yet");
        mux.write_sample(0, &picture(1)).unwrap();
        assert!(mux.write_sample(0, &picture(1)).is_err(), "repeated timestamp");
        assert!(mux.write_sample(1, &picture(2)).is_err());
        mux.release();
        mux.release();
    }

    #[test]
    fn test_refuses_samples_past_media_duration_limit() {
        let path = temp_path("limit");
        let mut mux = Mp4Muxer::create(&path).unwrap();
        mux.add_track(&format()).unwrap();
        mux.start().unwrap();
        mux.write_sample(0, &picture(0)).unwrap();

        // 13.3 hours at 90 kHz no longer fits a 32-bit media duration.
        let late = EncodedPacket::picture(join_annexb([&[0x41u8, 0x9a, 0x80][..]]), 47_900_000_000, false);
        let err = mux.write_sample(0, &late).unwrap_err();
        assert!(err.to_string().contains("longest duration"));

        // The earlier sample is untouched and the file still finishes.
        mux.finish().unwrap();
        drop(mux);
        assert_eq!(Mp4Summary::read(&path).unwrap().sample_count, 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unfinished_output_is_removed() {
        let path = temp_path("partial");
        let mut mux = Mp4Muxer::create(&path).unwrap();
        mux.add_track(&format()).unwrap();
        mux.start().unwrap();
        mux.write_sample(0, &picture(0)).unwrap();
        assert!(path.exists());
        mux.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_read_rejects_non_mp4() {
        let path = temp_path("garbage");
        std::fs::write(&path, b"definitely not an mp4 file").unwrap();
        assert!(Mp4Summary::read(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
