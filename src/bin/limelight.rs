use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use limelight::{DisplaySurface, EngineConfig, Pixmap, TransitionSpec, deck::DeckDoc};

#[derive(Parser, Debug)]
#[command(name = "limelight", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a single deck slide to a PNG.
    Frame(FrameArgs),
    /// Play a deck through its transitions in real time, writing one PNG
    /// per painted frame.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input deck JSON.
    #[arg(long = "deck")]
    deck_path: PathBuf,

    /// Slide index (0-based).
    #[arg(long, default_value_t = 0)]
    slide: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input deck JSON.
    #[arg(long = "deck")]
    deck_path: PathBuf,

    /// Directory for frame PNGs.
    #[arg(long)]
    out_dir: PathBuf,

    /// Paint rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn read_deck(path: &Path) -> anyhow::Result<DeckDoc> {
    let f = File::open(path).with_context(|| format!("open deck '{}'", path.display()))?;
    let doc: DeckDoc =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse deck JSON")?;
    Ok(doc)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let doc = read_deck(&args.deck_path)?;
    let base_dir = args.deck_path.parent().unwrap_or_else(|| Path::new("."));
    let lowered = doc.lower(base_dir)?;

    let deck_slide = lowered
        .slides
        .into_iter()
        .nth(args.slide)
        .with_context(|| format!("deck has no slide {}", args.slide))?;

    let surface = DisplaySurface::new(
        EngineConfig::default(),
        lowered.registry,
        doc.width,
        doc.height,
    )?;
    surface.show(deck_slide.slide, TransitionSpec::cut())?;

    let mut target = Pixmap::new(doc.width, doc.height)?;
    surface.paint(&mut target)?;
    write_png(&args.out, &target)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.fps > 0, "fps must be > 0");
    let doc = read_deck(&args.deck_path)?;
    let base_dir = args.deck_path.parent().unwrap_or_else(|| Path::new("."));
    let lowered = doc.lower(base_dir)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let surface = DisplaySurface::new(
        EngineConfig::default(),
        lowered.registry,
        doc.width,
        doc.height,
    )?;
    let mut target = Pixmap::new(doc.width, doc.height)?;
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    let mut frame_index: u64 = 0;

    for deck_slide in lowered.slides {
        surface.show(deck_slide.slide, deck_slide.transition)?;
        let hold = Duration::from_millis(deck_slide.hold_millis);
        let mut shown_at: Option<Instant> = None;

        loop {
            let started = Instant::now();
            surface.paint(&mut target)?;
            write_png(&frame_path(&args.out_dir, frame_index), &target)?;
            frame_index += 1;

            if shown_at.is_none() && !surface.is_transitioning()? {
                shown_at = Some(Instant::now());
            }
            if let Some(at) = shown_at
                && at.elapsed() >= hold
            {
                break;
            }
            thread::sleep(frame_time.saturating_sub(started.elapsed()));
        }
    }

    // Fade out and drain the final transition.
    surface.clear_default()?;
    loop {
        let started = Instant::now();
        surface.paint(&mut target)?;
        write_png(&frame_path(&args.out_dir, frame_index), &target)?;
        frame_index += 1;
        if !surface.is_transitioning()? {
            break;
        }
        thread::sleep(frame_time.saturating_sub(started.elapsed()));
    }

    eprintln!("wrote {frame_index} frames to {}", args.out_dir.display());
    Ok(())
}

fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("frame-{index:05}.png"))
}

fn write_png(path: &Path, frame: &Pixmap) -> anyhow::Result<()> {
    image::save_buffer_with_format(
        path,
        &frame.to_unpremultiplied(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}
