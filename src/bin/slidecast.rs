use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use slidecast::{
    PipelineConfig, StructuredContent, TimingMode, VideoRequest, VoiceGender,
    pipeline::render_preview_frame,
    speech::{TierPreference, VoiceConfig},
};

#[derive(Parser, Debug)]
#[command(name = "slidecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a narrated MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single slide frame as a PNG, without audio.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Structured content JSON. When omitted, a single-slide stub is
    /// built from --topic.
    #[arg(long = "in")]
    in_path: Option<PathBuf>,

    /// Topic for the stub content (and a fallback title).
    #[arg(long)]
    topic: Option<String>,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Timing mode.
    #[arg(long, value_enum, default_value_t = TimingMode::Detailed)]
    mode: TimingMode,

    /// Narration voice gender.
    #[arg(long, value_enum, default_value_t = VoiceGender::Female)]
    voice_gender: VoiceGender,

    /// Backend-specific voice name override.
    #[arg(long)]
    voice_name: Option<String>,

    /// Skip the premium narration backend even when credentials exist.
    #[arg(long)]
    free_only: bool,

    /// Output width in pixels (must be even).
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels (must be even).
    #[arg(long)]
    height: Option<u32>,

    /// Output frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Font file to render text with (probes system fonts when omitted).
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Structured content JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Slide index (0-based).
    #[arg(long)]
    slide: usize,

    /// Time within the slide, in seconds.
    #[arg(long, default_value_t = 1.0)]
    at_secs: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Font file to render text with (probes system fonts when omitted).
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn read_content_json(path: &Path) -> anyhow::Result<StructuredContent> {
    let f = File::open(path).with_context(|| format!("open content '{}'", path.display()))?;
    let r = BufReader::new(f);
    let content: StructuredContent =
        serde_json::from_reader(r).with_context(|| "parse structured content JSON")?;
    Ok(content)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let content = match (&args.in_path, &args.topic) {
        (Some(path), _) => read_content_json(path)?,
        (None, Some(topic)) => StructuredContent::topic_stub(topic),
        (None, None) => anyhow::bail!("either --in or --topic is required"),
    };

    let mut cfg = PipelineConfig::from_env();
    if let Some(w) = args.width {
        cfg.canvas.width = w;
    }
    if let Some(h) = args.height {
        cfg.canvas.height = h;
    }
    if let Some(fps) = args.fps {
        cfg.fps = fps;
    }
    if args.font.is_some() {
        cfg.font_path = args.font.clone();
    }
    cfg.validate()?;

    let voice = VoiceConfig {
        gender: args.voice_gender,
        voice_name: args.voice_name.clone(),
        max_tier: if args.free_only {
            TierPreference::Free
        } else {
            TierPreference::Premium
        },
    };

    let request = VideoRequest {
        content,
        mode: args.mode,
        voice,
        out_path: args.out.clone(),
    };
    let video = slidecast::generate(&request, &cfg)?;

    eprintln!(
        "wrote {} ({:.1}s, {}x{} @ {} fps)",
        video.path.display(),
        video.total_duration_secs,
        video.width,
        video.height,
        video.fps
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let content = read_content_json(&args.in_path)?;

    let mut cfg = PipelineConfig::from_env();
    if args.font.is_some() {
        cfg.font_path = args.font.clone();
    }

    let frame = render_preview_frame(&content, args.slide, args.at_secs, &cfg)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
