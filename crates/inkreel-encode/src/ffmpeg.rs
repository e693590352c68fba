//! H.264 encoding by streaming raw I420 frames through an `ffmpeg` child
//! process.
//!
//! The process is fed by a writer thread and drained by a reader thread, each
//! connected to the caller by a bounded channel, so neither pipe can fill up
//! and stall the other side.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use inkreel_core::{EncoderConfig, InkreelError, InkreelResult};
use tracing::{debug, info, warn};

use crate::annexb::{AccessUnitSplitter, StreamUnit};
use crate::codec::{
    ContainerMuxer, EncodedPacket, EncoderBackend, EncoderOutput, EncoderSettings, VideoEncoder,
};
use crate::mux::Mp4Muxer;
use crate::yuv::I420Frame;

const READ_CHUNK: usize = 64 * 1024;
const QUEUE_RETRY: Duration = Duration::from_millis(1);

/// Check if FFmpeg is available on the system.
pub fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

enum ReaderEvent {
    Chunk(Vec<u8>),
    Eof,
    Failed(String),
}

/// Encoder backed by an `ffmpeg` process running libx264.
pub struct FfmpegEncoder {
    child: Option<Child>,
    input: Option<SyncSender<Vec<u8>>>,
    output: Receiver<ReaderEvent>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<String>>,
    splitter: AccessUnitSplitter,
    pending_pts: VecDeque<i64>,
    ready: VecDeque<EncodedPacket>,
    frame_len: usize,
    end_of_stream: bool,
}

impl FfmpegEncoder {
    /// Start `ffmpeg` for the given settings.
    pub fn spawn(config: &EncoderConfig, settings: &EncoderSettings) -> InkreelResult<Self> {
        let size = format!("{}x{}", settings.width, settings.height);
        let fps = settings.fps.to_string();
        let gop = settings.keyframe_interval.to_string();
        let bit_rate = settings.bit_rate.to_string();

        let mut cmd = Command::new(&config.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        // Input: raw planar frames from stdin
        cmd.args([
            "-f", "rawvideo",
            "-pix_fmt", "yuv420p",
            "-s", &size,
            "-r", &fps,
            "-i", "-",
        ]);
        cmd.args([
            "-an",
            "-c:v", "libx264",
            "-preset", &config.preset,
            "-profile:v", "main",
            "-pix_fmt", "yuv420p",
            "-bf", "0",
            "-g", &gop,
            "-keyint_min", &gop,
            "-sc_threshold", "0",
            "-b:v", &bit_rate,
            "-f", "h264",
            "-",
        ]);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                InkreelError::Encode(format!("failed to start {}: {}", config.ffmpeg_path, e))
            })?;

        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(i), Some(o), Some(e)) => (i, o, e),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(InkreelError::Encode("failed to open ffmpeg pipes".into()));
            }
        };

        let (input_tx, input_rx) = mpsc::sync_channel::<Vec<u8>>(config.input_queue.max(1));
        let (output_tx, output_rx) = mpsc::sync_channel::<ReaderEvent>(config.output_queue.max(1));

        let writer = spawn_named("ffmpeg-writer", move || write_frames(stdin, input_rx))?;
        let reader = spawn_named("ffmpeg-reader", move || read_stream(stdout, output_tx))?;
        let stderr = spawn_named("ffmpeg-stderr", move || {
            let mut stderr = stderr;
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })?;

        info!(
            "started ffmpeg encoder {} @ {}fps, {} bps, keyframe every {} frames",
            size, settings.fps, settings.bit_rate, settings.keyframe_interval
        );

        Ok(Self {
            child: Some(child),
            input: Some(input_tx),
            output: output_rx,
            writer: Some(writer),
            reader: Some(reader),
            stderr: Some(stderr),
            splitter: AccessUnitSplitter::new(),
            pending_pts: VecDeque::new(),
            ready: VecDeque::new(),
            frame_len: settings.width as usize * settings.height as usize * 3 / 2,
            end_of_stream: false,
        })
    }

    fn accept_units(&mut self, units: Vec<StreamUnit>) -> InkreelResult<()> {
        for unit in units {
            let packet = match unit {
                StreamUnit::Config(data) => EncodedPacket::config(data),
                StreamUnit::Picture { data, keyframe } => {
                    let pts = self.pending_pts.pop_front().ok_or_else(|| {
                        InkreelError::Encode("encoder produced more pictures than frames queued".into())
                    })?;
                    EncodedPacket::picture(data, pts, keyframe)
                }
            };
            self.ready.push_back(packet);
        }
        Ok(())
    }

    /// Wait for the process after its output closed and report a failure.
    fn reap(&mut self) -> InkreelResult<()> {
        let status = match self.child.as_mut() {
            Some(child) => child
                .wait()
                .map_err(|e| InkreelError::Encode(format!("ffmpeg process error: {}", e)))?,
            None => return Ok(()),
        };
        self.child = None;
        if status.success() {
            return Ok(());
        }
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        Err(InkreelError::Encode(format!(
            "ffmpeg failed with status {}: {}",
            status,
            stderr.trim()
        )))
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn try_queue_frame(&mut self, frame: &I420Frame, pts_us: i64, timeout: Duration) -> InkreelResult<bool> {
        if frame.data.len() != self.frame_len {
            return Err(InkreelError::Encode(format!(
                "frame is {} bytes, encoder expects {}",
                frame.data.len(),
                self.frame_len
            )));
        }
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| InkreelError::Encode("frame queued after end of stream".into()))?;

        let deadline = Instant::now() + timeout;
        let mut data = frame.data.clone();
        loop {
            match input.try_send(data) {
                Ok(()) => {
                    self.pending_pts.push_back(pts_us);
                    return Ok(true);
                }
                Err(TrySendError::Full(back)) => {
                    if Instant::now() >= deadline {
                        return Ok(false);
                    }
                    data = back;
                    std::thread::sleep(QUEUE_RETRY.min(timeout));
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.reap()?;
                    return Err(InkreelError::Encode("ffmpeg stopped accepting frames".into()));
                }
            }
        }
    }

    fn dequeue_packet(&mut self, timeout: Duration) -> InkreelResult<EncoderOutput> {
        if let Some(packet) = self.ready.pop_front() {
            return Ok(EncoderOutput::Packet(packet));
        }
        if self.end_of_stream {
            return Ok(EncoderOutput::EndOfStream);
        }

        match self.output.recv_timeout(timeout) {
            Ok(ReaderEvent::Chunk(chunk)) => {
                let units = self.splitter.push(&chunk);
                self.accept_units(units)?;
            }
            Ok(ReaderEvent::Eof) | Err(RecvTimeoutError::Disconnected) => {
                let units = self.splitter.finish();
                self.accept_units(units)?;
                self.end_of_stream = true;
                self.reap()?;
                if !self.pending_pts.is_empty() {
                    warn!("{} queued frames produced no output", self.pending_pts.len());
                }
                debug!("ffmpeg output closed");
            }
            Ok(ReaderEvent::Failed(e)) => {
                return Err(InkreelError::Encode(format!("reading ffmpeg output: {}", e)));
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        Ok(match self.ready.pop_front() {
            Some(packet) => EncoderOutput::Packet(packet),
            None if self.end_of_stream => EncoderOutput::EndOfStream,
            None => EncoderOutput::TryAgainLater,
        })
    }

    fn signal_end_of_stream(&mut self) -> InkreelResult<()> {
        // Closing the channel ends the writer, which closes ffmpeg's stdin.
        self.input = None;
        Ok(())
    }

    fn release(&mut self) {
        self.input = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        // Disconnect the output queue so a reader parked on it exits.
        let (_, closed) = mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.output, closed));
        for handle in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_named<T: Send + 'static>(
    name: &str,
    f: impl FnOnce() -> T + Send + 'static,
) -> InkreelResult<JoinHandle<T>> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(InkreelError::Io)
}

fn write_frames(mut stdin: ChildStdin, frames: Receiver<Vec<u8>>) {
    for frame in frames {
        if let Err(e) = stdin.write_all(&frame) {
            debug!("ffmpeg stdin closed: {}", e);
            return;
        }
    }
    let _ = stdin.flush();
}

fn read_stream(mut stdout: ChildStdout, events: SyncSender<ReaderEvent>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let event = match stdout.read(&mut buf) {
            Ok(0) => {
                let _ = events.send(ReaderEvent::Eof);
                return;
            }
            Ok(n) => ReaderEvent::Chunk(buf[..n].to_vec()),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => ReaderEvent::Failed(e.to_string()),
        };
        let failed = matches!(event, ReaderEvent::Failed(_));
        if events.send(event).is_err() || failed {
            return;
        }
    }
}

/// The ffmpeg encoder paired with the native MP4 muxer.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    config: EncoderConfig,
}

impl FfmpegBackend {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn is_available(&self) -> bool {
        is_available(&self.config.ffmpeg_path)
    }
}

impl EncoderBackend for FfmpegBackend {
    fn create_encoder(&self, settings: &EncoderSettings) -> InkreelResult<Box<dyn VideoEncoder>> {
        Ok(Box::new(FfmpegEncoder::spawn(&self.config, settings)?))
    }

    fn create_muxer(&self, output: &Path, _settings: &EncoderSettings) -> InkreelResult<Box<dyn ContainerMuxer>> {
        Ok(Box::new(Mp4Muxer::create(output)?))
    }
}
