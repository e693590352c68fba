use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkreel_core::{AspectRatio, InkreelConfig, Resolution};
use inkreel_encode::{FfmpegBackend, Mp4Summary};
use inkreel_export::{ExportJob, ExportOutcome, ExportSettings};
use inkreel_ir::{validate_project, AssetSource, Project, WordRateEstimator};
use inkreel_render::{FileResolver, RenderResources, SceneCompositor, StoryboardRenderer, Timeline};
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "inkreel.toml";

#[derive(Parser)]
#[command(
    name = "inkreel",
    version,
    about = "Inkreel: whiteboard storyboards to MP4",
    long_about = "Inkreel renders a project of timed scenes (text written by hand, staged\nimages, subtitles) into an H.264 MP4."
)]
struct Cli {
    /// Configuration file (default: ./inkreel.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output overrides shared by `render` and `frame`.
#[derive(clap::Args, Debug, Default)]
struct OutputArgs {
    /// Frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Resolution class: 480p, 720p, 1080p
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Aspect ratio: 16:9, 9:16, 1:1
    #[arg(long)]
    aspect: Option<AspectRatio>,

    /// Stretch scenes so their narration fits
    #[arg(long)]
    fit_narration: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project file to MP4
    Render {
        /// Path to the project JSON file
        #[arg()]
        project: PathBuf,

        /// Output file path (default: <project>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: OutputArgs,

        /// Scene hand-off length in milliseconds (0 = hard cuts)
        #[arg(long)]
        transition_ms: Option<u64>,

        /// Fail when an asset image cannot be found
        #[arg(long)]
        strict_assets: bool,
    },

    /// Render a single frame to PNG
    Frame {
        /// Path to the project JSON file
        #[arg()]
        project: PathBuf,

        /// Global frame index
        #[arg(long)]
        index: u64,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        args: OutputArgs,
    },

    /// Print the video track summary of an MP4 file
    Probe {
        #[arg()]
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a project file for errors
    Validate {
        #[arg()]
        project: PathBuf,
    },

    /// Display version and encoder availability
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Render {
            project,
            output,
            args,
            transition_ms,
            strict_assets,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply(&mut config);
            if let Some(ms) = transition_ms {
                config.export.transition_ms = ms;
            }
            config.export.strict_assets |= strict_assets;
            let output = output.unwrap_or_else(|| project.with_extension("mp4"));
            cmd_render(&project, &output, &config, args.fit_narration)
        }
        Commands::Frame {
            project,
            index,
            output,
            args,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply(&mut config);
            cmd_frame(&project, index, &output, &config, args.fit_narration)
        }
        Commands::Probe { file, json } => cmd_probe(&file, json),
        Commands::Validate { project } => cmd_validate(&project),
        Commands::Info => {
            let config = load_config(cli.config.as_deref())?;
            cmd_info(&config)
        }
    }
}

impl OutputArgs {
    fn apply(&self, config: &mut InkreelConfig) {
        if let Some(fps) = self.fps {
            config.export.fps = fps;
        }
        if let Some(resolution) = self.resolution {
            config.export.resolution = resolution;
        }
        if let Some(aspect) = self.aspect {
            config.export.aspect = aspect;
        }
    }
}

/// Explicit config must load; the default file is optional.
fn load_config(path: Option<&Path>) -> Result<InkreelConfig> {
    match path {
        Some(path) => InkreelConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                InkreelConfig::load_from_file(default)
                    .with_context(|| format!("failed to load config: {}", default.display()))
            } else {
                Ok(InkreelConfig::default())
            }
        }
    }
}

fn load_project(path: &Path, fit_narration: bool) -> Result<Project> {
    let mut project = Project::load_from_file(path)
        .with_context(|| format!("failed to read project: {}", path.display()))?;
    if fit_narration {
        let stretched = project.fit_narration(&WordRateEstimator::default());
        if stretched > 0 {
            info!("stretched {} scenes to fit narration", stretched);
        }
    }
    if let Err(errors) = validate_project(&project) {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("project is invalid:\n  {}", messages.join("\n  "));
    }
    Ok(project)
}

fn load_resources(config: &InkreelConfig, project: &Project) -> RenderResources {
    let canvas = config.export.aspect.canvas(config.export.resolution);
    let resolver = FileResolver::new(config.assets.builtin_dir.clone());
    let hand = config.assets.hand_cursor.clone().map(AssetSource::File);
    let background = config.assets.background.clone().map(AssetSource::File);
    let loaded = RenderResources::load(
        &resolver,
        &project.storyboard(),
        hand.as_ref(),
        background.as_ref(),
        canvas,
    );
    for source in &loaded.missing {
        warn!("asset {} could not be loaded", source);
    }
    loaded.resources
}

fn cmd_render(project_path: &Path, output: &Path, config: &InkreelConfig, fit_narration: bool) -> Result<()> {
    let start = Instant::now();
    let project = load_project(project_path, fit_narration)?;
    println!("🎬 Rendering {} -> {}", project.name, output.display());

    let backend = FfmpegBackend::new(config.encoder.clone());
    if !backend.is_available() {
        anyhow::bail!(
            "ffmpeg not found at '{}'; install it or set encoder.ffmpeg_path",
            config.encoder.ffmpeg_path
        );
    }

    let resources = load_resources(config, &project);
    let compositor =
        SceneCompositor::from_config(&config.fonts).context("invalid font configuration")?;
    let settings = ExportSettings::from_config(output, config);
    println!(
        "   {} scenes, {} @ {}fps",
        project.scenes.len(),
        settings.canvas,
        settings.fps
    );

    let mut last_percent = None;
    let job = ExportJob::new(
        project.storyboard(),
        resources,
        compositor,
        settings,
        Arc::new(backend),
    )
    .on_progress(move |fraction| {
        let percent = (fraction * 100.0).floor() as u32;
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            eprint!("\r   {:>3}%", percent);
            let _ = std::io::stderr().flush();
        }
    });

    let outcome = job
        .spawn()
        .context("failed to start export")?
        .join()
        .context("export failed")?;
    eprintln!();

    match outcome {
        ExportOutcome::Completed(path) => {
            let summary = Mp4Summary::read(&path)
                .with_context(|| format!("failed to read back {}", path.display()))?;
            println!(
                "   ✓ {} frames, {:.2}s in {:.1}s",
                summary.sample_count,
                summary.duration_secs(),
                start.elapsed().as_secs_f64()
            );
            println!("   Output: {}", path.display());
        }
        ExportOutcome::Cancelled => println!("   Export cancelled"),
    }
    Ok(())
}

fn cmd_frame(
    project_path: &Path,
    index: u64,
    output: &Path,
    config: &InkreelConfig,
    fit_narration: bool,
) -> Result<()> {
    let project = load_project(project_path, fit_narration)?;
    let board = project.storyboard();
    let canvas = config.export.aspect.canvas(config.export.resolution);
    let resources = load_resources(config, &project);
    let compositor =
        SceneCompositor::from_config(&config.fonts).context("invalid font configuration")?;

    let mut renderer = StoryboardRenderer::new(&board, &compositor, &resources, canvas, config.export.fps)
        .with_transition_ms(config.export.transition_ms);
    let scheduled = renderer.timeline().scheduled_frames();
    let frame = renderer.render(index).with_context(|| {
        format!("frame {} is out of range (project has {} frames)", index, scheduled)
    })?;

    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.data)
        .context("frame buffer has the wrong size")?;
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("✓ Frame {} ({}) -> {}", index, canvas, output.display());
    Ok(())
}

fn cmd_probe(file: &Path, json: bool) -> Result<()> {
    let summary =
        Mp4Summary::read(file).with_context(|| format!("failed to probe {}", file.display()))?;
    if json {
        let value = serde_json::json!({
            "width": summary.width,
            "height": summary.height,
            "samples": summary.sample_count,
            "keyframes": summary.keyframe_count,
            "timescale": summary.timescale,
            "duration_secs": summary.duration_secs(),
            "fps": summary.fps(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{}", file.display());
    println!("   Size:      {}x{}", summary.width, summary.height);
    println!("   Frames:    {} ({} keyframes)", summary.sample_count, summary.keyframe_count);
    println!("   Duration:  {:.3}s", summary.duration_secs());
    println!("   Rate:      {:.2} fps", summary.fps());
    Ok(())
}

fn cmd_validate(project_path: &Path) -> Result<()> {
    let project = load_project(project_path, false)?;
    let board = project.storyboard();
    let timeline = Timeline::for_scenes(&board.scenes, inkreel_core::DEFAULT_FPS);
    println!("🔍 {}", project_path.display());
    println!(
        "   ✓ {} scenes, {:.2}s, {} frames at {}fps",
        board.scenes.len(),
        board.total_duration_ms() as f64 / 1000.0,
        timeline.scheduled_frames(),
        inkreel_core::DEFAULT_FPS
    );
    Ok(())
}

fn cmd_info(config: &InkreelConfig) -> Result<()> {
    let backend = FfmpegBackend::new(config.encoder.clone());
    println!("🎬 Inkreel");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("   Renderer:  CPU");
    println!("   Encoder:   ffmpeg/libx264 (H.264) -> MP4");
    println!(
        "   FFmpeg:    {}",
        if backend.is_available() {
            "available ✓"
        } else {
            "NOT FOUND ✗"
        }
    );
    Ok(())
}
