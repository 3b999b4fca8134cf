use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use slidereel::{
    ExportFormat, ExportRequest, ExportSession, QualityTier, Surface, TransitionEffect,
};

#[derive(Parser, Debug)]
#[command(name = "slidereel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export slide images to a WebM video or animated GIF.
    Export(ExportArgs),
    /// Report ffmpeg availability and the video codec that would be used.
    Probe,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input slide images, in playback order.
    #[arg(required = true)]
    slides: Vec<PathBuf>,

    /// Output container format.
    #[arg(long, value_enum, default_value_t = FormatChoice::Webm)]
    format: FormatChoice,

    /// Frames per second (GIF output is clamped to 30).
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Seconds each slide is held on screen.
    #[arg(long, default_value_t = 2.0)]
    hold: f64,

    /// Seconds each inter-slide transition lasts (0 disables transitions).
    #[arg(long, default_value_t = 0.5)]
    transition: f64,

    /// Transition effect between adjacent slides.
    #[arg(long, value_enum, default_value_t = EffectChoice::Fade)]
    effect: EffectChoice,

    /// Video bitrate tier.
    #[arg(long, value_enum, default_value_t = QualityChoice::Medium)]
    quality: QualityChoice,

    /// Play the GIF once instead of looping forever.
    #[arg(long)]
    no_loop: bool,

    /// JSON file holding a full export request; overrides the individual
    /// timing/effect flags.
    #[arg(long)]
    request: Option<PathBuf>,

    /// Output path. Defaults to video-export-<timestamp>.<ext>.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the estimated duration and size, then exit without encoding.
    #[arg(long)]
    estimate: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Webm,
    Gif,
}

impl From<FormatChoice> for ExportFormat {
    fn from(c: FormatChoice) -> Self {
        match c {
            FormatChoice::Webm => Self::Webm,
            FormatChoice::Gif => Self::Gif,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EffectChoice {
    Fade,
    Crossfade,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    Zoom,
    #[value(name = "none")]
    None,
}

impl From<EffectChoice> for TransitionEffect {
    fn from(c: EffectChoice) -> Self {
        match c {
            EffectChoice::Fade => Self::Fade,
            EffectChoice::Crossfade => Self::Crossfade,
            EffectChoice::SlideLeft => Self::SlideLeft,
            EffectChoice::SlideRight => Self::SlideRight,
            EffectChoice::SlideUp => Self::SlideUp,
            EffectChoice::SlideDown => Self::SlideDown,
            EffectChoice::Zoom => Self::Zoom,
            EffectChoice::None => Self::Cut,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    High,
    Medium,
    Low,
}

impl From<QualityChoice> for QualityTier {
    fn from(c: QualityChoice) -> Self {
        match c {
            QualityChoice::High => Self::High,
            QualityChoice::Medium => Self::Medium,
            QualityChoice::Low => Self::Low,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Probe => cmd_probe(),
    }
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let request = match &args.request {
        Some(path) => read_request_json(path)?,
        None => ExportRequest {
            format: args.format.into(),
            frame_rate: args.fps,
            hold_seconds: args.hold,
            transition_seconds: args.transition,
            effect: args.effect.into(),
            quality: args.quality.into(),
            loop_forever: !args.no_loop,
        },
    };

    if args.estimate {
        let est = request.estimate(args.slides.len());
        println!(
            "{} slides, ~{:.1}s, ~{:.1} MB",
            args.slides.len(),
            est.duration_seconds,
            est.approx_bytes as f64 / (1024.0 * 1024.0)
        );
        return Ok(());
    }

    let slides = load_slides(&args.slides, request.format)?;

    // Progress to stderr, one line per phase/decile change.
    let last = Mutex::new(None::<(slidereel::Phase, u8)>);
    let session = ExportSession::with_progress(move |u| {
        let step = (u.phase, u.percent / 10);
        let mut last = last.lock().unwrap();
        if *last != Some(step) {
            *last = Some(step);
            eprintln!("{:>3}% {}", u.percent, u.phase);
        }
    });

    let output = slidereel::export(&slides, &request, &session)?;

    let out_path = args
        .out
        .unwrap_or_else(|| PathBuf::from(output.suggested_filename()));
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out_path, &output.bytes)
        .with_context(|| format!("write '{}'", out_path.display()))?;

    eprintln!("wrote {} ({} bytes)", out_path.display(), output.bytes.len());
    Ok(())
}

fn cmd_probe() -> anyhow::Result<()> {
    if !slidereel::is_ffmpeg_on_path() {
        println!("ffmpeg: not found on PATH (WebM export unavailable; GIF export works)");
        return Ok(());
    }
    let codec = slidereel::probe_codec()?;
    println!(
        "ffmpeg: found; video codec: {} ({})",
        codec.encoder_name(),
        codec.container()
    );
    Ok(())
}

fn read_request_json(path: &Path) -> anyhow::Result<ExportRequest> {
    let f = File::open(path).with_context(|| format!("open request '{}'", path.display()))?;
    let r = BufReader::new(f);
    let request: ExportRequest =
        serde_json::from_reader(r).with_context(|| "parse export request JSON")?;
    Ok(request)
}

fn load_slides(paths: &[PathBuf], format: ExportFormat) -> anyhow::Result<Vec<Surface>> {
    let mut slides = Vec::with_capacity(paths.len());
    for path in paths {
        let img = image::open(path)
            .with_context(|| format!("open slide '{}'", path.display()))?
            .to_rgba8();
        let img = match format {
            // yuv420p needs even dimensions; crop a stray edge pixel.
            ExportFormat::Webm => crop_to_even(img, path)?,
            ExportFormat::Gif => img,
        };
        slides.push(Surface::from_rgba_image(&img)?);
    }
    Ok(slides)
}

fn crop_to_even(img: image::RgbaImage, path: &Path) -> anyhow::Result<image::RgbaImage> {
    let (w, h) = (img.width() & !1, img.height() & !1);
    if w == 0 || h == 0 {
        anyhow::bail!("slide '{}' is too small to export", path.display());
    }
    if (w, h) == (img.width(), img.height()) {
        return Ok(img);
    }
    tracing::debug!(slide = %path.display(), w, h, "cropping slide to even dimensions");
    Ok(image::imageops::crop_imm(&img, 0, 0, w, h).to_image())
}
