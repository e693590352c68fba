//! The export job state machine.
//!
//! One job renders every scheduled frame, converts it to I420, queues it on
//! the encoder and moves finished packets into the muxer. All waits are
//! bounded polls followed by a [`Clock::yield_now`]; a job that sees
//! `max_idle_polls` empty polls in a row fails instead of hanging.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use inkreel_core::{CanvasSize, Frame, InkreelConfig, InkreelError};
use inkreel_encode::{
    rgba_to_i420_into, Clock, ContainerMuxer, EncoderBackend, EncoderOutput, EncoderSettings,
    I420Frame, SystemClock, TrackFormat, VideoEncoder,
};
use inkreel_ir::{validate_storyboard, AssetSource, Storyboard};
use inkreel_render::{RenderResources, SceneCompositor, StoryboardRenderer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ExportError;
use crate::progress::{CancellationToken, ExportProgress, ExportStatus};

/// Highest accepted output frame rate.
pub const MAX_FPS: u32 = 240;

/// Output parameters of one export.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output: PathBuf,
    /// Output size; always even in both dimensions.
    pub canvas: CanvasSize,
    pub fps: u32,
    /// Scene hand-off length; 0 gives hard cuts.
    pub transition_ms: u64,
    /// Treat unresolved asset rasters as a configuration error.
    pub strict_assets: bool,
    /// Timeout of a single encoder queue or dequeue attempt.
    pub poll_timeout: Duration,
    pub max_idle_polls: u32,
}

impl ExportSettings {
    /// Settings for a `width × height` output, floored to even dimensions.
    pub fn new(output: impl Into<PathBuf>, width: u32, height: u32, fps: u32) -> Self {
        let encoder = inkreel_core::EncoderConfig::default();
        Self {
            output: output.into(),
            canvas: CanvasSize::even_floor(width, height),
            fps,
            transition_ms: 0,
            strict_assets: false,
            poll_timeout: Duration::from_millis(encoder.poll_timeout_ms),
            max_idle_polls: encoder.max_idle_polls,
        }
    }

    pub fn from_config(output: impl Into<PathBuf>, config: &InkreelConfig) -> Self {
        let canvas = config.export.aspect.canvas(config.export.resolution);
        Self {
            output: output.into(),
            canvas,
            fps: config.export.fps,
            transition_ms: config.export.transition_ms,
            strict_assets: config.export.strict_assets,
            poll_timeout: Duration::from_millis(config.encoder.poll_timeout_ms),
            max_idle_polls: config.encoder.max_idle_polls,
        }
    }

    pub fn with_transition_ms(mut self, transition_ms: u64) -> Self {
        self.transition_ms = transition_ms;
        self
    }

    pub fn with_strict_assets(mut self, strict: bool) -> Self {
        self.strict_assets = strict;
        self
    }

    pub fn with_polling(mut self, poll_timeout: Duration, max_idle_polls: u32) -> Self {
        self.poll_timeout = poll_timeout;
        self.max_idle_polls = max_idle_polls;
        self
    }

    fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings::for_canvas(self.canvas, self.fps)
    }
}

/// How a job ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The container was finalized at this path.
    Completed(PathBuf),
    /// Stopped by its cancellation token; any partial output is discarded.
    Cancelled,
}

type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// A single-use export of one storyboard to one output file.
pub struct ExportJob {
    id: Uuid,
    board: Storyboard,
    resources: RenderResources,
    compositor: SceneCompositor,
    settings: ExportSettings,
    backend: Arc<dyn EncoderBackend>,
    clock: Arc<dyn Clock>,
    progress: ExportProgress,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl ExportJob {
    pub fn new(
        board: Storyboard,
        resources: RenderResources,
        compositor: SceneCompositor,
        settings: ExportSettings,
        backend: Arc<dyn EncoderBackend>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            board,
            resources,
            compositor,
            settings,
            backend,
            clock: Arc::new(SystemClock),
            progress: ExportProgress::new(),
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Called on the worker after every frame with the completed fraction,
    /// which never decreases.
    pub fn on_progress(mut self, callback: impl FnMut(f32) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn progress(&self) -> ExportProgress {
        self.progress.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the export on the calling thread.
    pub fn run(self) -> Result<ExportOutcome, ExportError> {
        let progress = self.progress.clone();
        let id = self.id;
        let result = self.execute();
        let status = match &result {
            Ok(ExportOutcome::Completed(path)) => {
                info!("export {} complete: {}", id, path.display());
                ExportStatus::Complete
            }
            Ok(ExportOutcome::Cancelled) => {
                info!("export {} cancelled", id);
                ExportStatus::Cancelled
            }
            Err(e) => {
                warn!("export {} failed: {}", id, e);
                ExportStatus::Error
            }
        };
        progress.advance(status);
        result
    }

    /// Run the export on a dedicated `export-worker` thread.
    pub fn spawn(self) -> Result<ExportHandle, ExportError> {
        let id = self.id;
        let progress = self.progress.clone();
        let cancel = self.cancel.clone();
        let thread = std::thread::Builder::new()
            .name("export-worker".to_string())
            .spawn(move || self.run())
            .map_err(|e| ExportError::Resource(InkreelError::Io(e)))?;
        Ok(ExportHandle {
            id,
            progress,
            cancel,
            thread,
        })
    }

    fn execute(self) -> Result<ExportOutcome, ExportError> {
        let ExportJob {
            id,
            board,
            resources,
            compositor,
            settings,
            backend,
            clock,
            progress,
            cancel,
            mut on_progress,
        } = self;

        check_settings(&settings)?;
        check_storyboard(&board, &resources, settings.strict_assets)?;
        if cancel.is_cancelled() {
            return Ok(ExportOutcome::Cancelled);
        }

        let encoder_settings = settings.encoder_settings();
        let mut renderer =
            StoryboardRenderer::new(&board, &compositor, &resources, settings.canvas, settings.fps)
                .with_transition_ms(settings.transition_ms);
        let total = renderer.timeline().scheduled_frames();
        info!(
            "export {}: {} scenes, {} frames at {} @ {}fps -> {}",
            id,
            board.scenes.len(),
            total,
            settings.canvas,
            settings.fps,
            settings.output.display()
        );

        progress.advance(ExportStatus::Encoding);
        let encoder = backend
            .create_encoder(&encoder_settings)
            .map_err(ExportError::Resource)?;
        let mut pipeline = Pipeline {
            encoder: Some(encoder),
            muxer: None,
            track: None,
            codec_config: None,
            end_of_stream: false,
            settings: encoder_settings,
            poll_timeout: settings.poll_timeout,
            max_idle_polls: settings.max_idle_polls.max(1),
            clock,
        };
        pipeline.muxer = Some(
            backend
                .create_muxer(&settings.output, &encoder_settings)
                .map_err(ExportError::Resource)?,
        );

        let mut frame = renderer.new_frame();
        let mut yuv = I420Frame::new(settings.canvas.width(), settings.canvas.height());
        for index in 0..total {
            if cancel.is_cancelled() {
                debug!("export {} cancelled before frame {}", id, index);
                return Ok(ExportOutcome::Cancelled);
            }
            let Some(pos) = renderer.timeline().locate(index) else {
                break;
            };
            renderer.render_into(&mut frame, &pos);
            rgba_to_i420_into(&frame, &mut yuv).map_err(ExportError::Encode)?;
            let pts = Frame::new(index).pts_micros(settings.fps);
            pipeline.queue_frame(&yuv, pts)?;
            pipeline.drain()?;

            let fraction = progress.publish(index as f32 / total as f32);
            if let Some(callback) = on_progress.as_mut() {
                callback(fraction);
            }
        }

        pipeline.finalize(&progress)?;
        let fraction = progress.publish(1.0);
        if let Some(callback) = on_progress.as_mut() {
            callback(fraction);
        }
        Ok(ExportOutcome::Completed(settings.output))
    }
}

fn check_settings(settings: &ExportSettings) -> Result<(), ExportError> {
    if settings.fps == 0 || settings.fps > MAX_FPS {
        return Err(ExportError::Configuration(format!(
            "fps must be between 1 and {}, got {}",
            MAX_FPS, settings.fps
        )));
    }
    if settings.output.as_os_str().is_empty() {
        return Err(ExportError::Configuration("output path is empty".into()));
    }
    if settings.poll_timeout.is_zero() {
        return Err(ExportError::Configuration("poll timeout must be positive".into()));
    }
    Ok(())
}

fn check_storyboard(
    board: &Storyboard,
    resources: &RenderResources,
    strict_assets: bool,
) -> Result<(), ExportError> {
    if let Err(errors) = validate_storyboard(board) {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(ExportError::Configuration(messages.join("; ")));
    }

    let mut missing: Vec<&AssetSource> = Vec::new();
    for scene in &board.scenes {
        for asset in board.assets_for(&scene.id) {
            if resources.asset(&asset.source).is_none() && !missing.contains(&&asset.source) {
                missing.push(&asset.source);
            }
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
    if strict_assets {
        return Err(ExportError::Configuration(format!(
            "unresolved assets: {}",
            names.join(", ")
        )));
    }
    warn!("skipping unresolved assets: {}", names.join(", "));
    Ok(())
}

/// Encoder and muxer owned by a running job. Both are released when this is
/// dropped, whichever way the job ends.
struct Pipeline {
    encoder: Option<Box<dyn VideoEncoder>>,
    muxer: Option<Box<dyn ContainerMuxer>>,
    track: Option<usize>,
    codec_config: Option<Vec<u8>>,
    end_of_stream: bool,
    settings: EncoderSettings,
    poll_timeout: Duration,
    max_idle_polls: u32,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    fn encoder(&mut self) -> Result<&mut Box<dyn VideoEncoder>, ExportError> {
        self.encoder.as_mut().ok_or_else(released)
    }

    fn muxer(&mut self) -> Result<&mut Box<dyn ContainerMuxer>, ExportError> {
        self.muxer.as_mut().ok_or_else(released)
    }

    /// Offer one frame, draining output between attempts.
    fn queue_frame(&mut self, frame: &I420Frame, pts_us: i64) -> Result<(), ExportError> {
        let mut idle = 0u32;
        loop {
            let timeout = self.poll_timeout;
            let accepted = self
                .encoder()?
                .try_queue_frame(frame, pts_us, timeout)
                .map_err(ExportError::Encode)?;
            if accepted {
                return Ok(());
            }
            if self.drain()? == 0 {
                idle += 1;
                if idle >= self.max_idle_polls {
                    return Err(ExportError::Resource(InkreelError::Encode(format!(
                        "encoder accepted no input for {} polls",
                        idle
                    ))));
                }
            } else {
                idle = 0;
            }
            self.clock.yield_now();
        }
    }

    /// Move every ready packet into the muxer. Returns how many packets were
    /// taken from the encoder.
    fn drain(&mut self) -> Result<usize, ExportError> {
        let mut moved = 0;
        while !self.end_of_stream {
            let timeout = self.poll_timeout;
            let output = self
                .encoder()?
                .dequeue_packet(timeout)
                .map_err(ExportError::Encode)?;
            match output {
                EncoderOutput::Packet(packet) if packet.config => {
                    moved += 1;
                    if self.track.is_some() {
                        debug!("ignoring repeated codec configuration");
                    } else {
                        self.codec_config = Some(packet.data);
                    }
                }
                EncoderOutput::Packet(packet) => {
                    moved += 1;
                    let track = self.ensure_track()?;
                    self.muxer()?
                        .write_sample(track, &packet)
                        .map_err(ExportError::Encode)?;
                }
                EncoderOutput::TryAgainLater => break,
                EncoderOutput::EndOfStream => self.end_of_stream = true,
            }
        }
        Ok(moved)
    }

    /// Add the video track and start the muxer on the first picture.
    fn ensure_track(&mut self) -> Result<usize, ExportError> {
        if let Some(track) = self.track {
            return Ok(track);
        }
        let codec_config = self.codec_config.take().ok_or_else(|| {
            ExportError::Encode(InkreelError::Encode(
                "picture arrived before codec configuration".into(),
            ))
        })?;
        let format = TrackFormat {
            width: self.settings.width,
            height: self.settings.height,
            fps: self.settings.fps,
            codec_config,
        };
        let muxer = self.muxer()?;
        let track = muxer.add_track(&format).map_err(ExportError::Encode)?;
        muxer.start().map_err(ExportError::Encode)?;
        debug!("muxer started with track {}", track);
        self.track = Some(track);
        Ok(track)
    }

    /// Signal end of stream, drain everything and finalize the container.
    fn finalize(&mut self, progress: &ExportProgress) -> Result<(), ExportError> {
        self.encoder()?
            .signal_end_of_stream()
            .map_err(ExportError::Encode)?;
        progress.advance(ExportStatus::Muxing);

        let mut idle = 0u32;
        while !self.end_of_stream {
            if self.drain()? == 0 && !self.end_of_stream {
                idle += 1;
                if idle >= self.max_idle_polls {
                    return Err(ExportError::Resource(InkreelError::Encode(format!(
                        "encoder did not finish within {} polls",
                        idle
                    ))));
                }
            } else {
                idle = 0;
            }
            self.clock.yield_now();
        }

        if self.track.is_none() {
            return Err(ExportError::Encode(InkreelError::Encode(
                "encoder produced no pictures".into(),
            )));
        }
        self.muxer()?.finish().map_err(ExportError::Encode)
    }
}

fn released() -> ExportError {
    ExportError::Encode(InkreelError::Other("encoder pipeline already released".into()))
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            encoder.release();
        }
        if let Some(mut muxer) = self.muxer.take() {
            muxer.release();
        }
    }
}

/// A job running on its worker thread.
pub struct ExportHandle {
    id: Uuid,
    progress: ExportProgress,
    cancel: CancellationToken,
    thread: JoinHandle<Result<ExportOutcome, ExportError>>,
}

impl ExportHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn progress(&self) -> &ExportProgress {
        &self.progress
    }

    /// Request cancellation; the worker stops before its next frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<ExportOutcome, ExportError> {
        self.thread.join().unwrap_or_else(|_| {
            self.progress.advance(ExportStatus::Error);
            Err(ExportError::Encode(InkreelError::Other(
                "export worker panicked".into(),
            )))
        })
    }
}
