use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use pixelwave::{
    FrameRgba, ManualScheduler, PixelWave, PixelWaveOpts, PixmapSurface, SourceImage, Style,
    TimerScheduler,
};

#[derive(Parser, Debug)]
#[command(name = "pixelwave", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one shimmered frame as a PNG.
    Frame(FrameArgs),
    /// Render a paced frame sequence as numbered PNGs.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input image (PNG, JPEG, ...).
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    common: CommonArgs,

    /// Frame index to render; earlier frames are advanced through.
    #[arg(long, default_value_t = 0)]
    frame: u64,

    /// Starting fade-in intensity (0-100).
    #[arg(long, default_value_t = 100.0)]
    intensity: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input image (PNG, JPEG, ...).
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    common: CommonArgs,

    /// Number of frames to render.
    #[arg(long, default_value_t = 100)]
    frames: u64,

    /// Fallback timer frame rate.
    #[arg(long, default_value_t = 10)]
    framerate: u32,

    /// Starting fade-in intensity (0-100).
    #[arg(long, default_value_t = 0.0)]
    intensity: f64,

    /// Directory for frame_NNNNN.png output.
    #[arg(long = "out-dir")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Output region width in pixels.
    #[arg(long)]
    width: u32,

    /// Output region height in pixels.
    #[arg(long)]
    height: u32,

    /// Block size in pixels (square blocks).
    #[arg(long, default_value_t = 30)]
    pixel_size: u32,

    /// Border gutter width in pixels.
    #[arg(long, default_value_t = 0)]
    border: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn build_wave(
    in_path: &Path,
    common: &CommonArgs,
    intensity: f64,
    scheduler: Box<dyn pixelwave::FrameScheduler>,
) -> anyhow::Result<PixelWave> {
    let bytes =
        std::fs::read(in_path).with_context(|| format!("read image '{}'", in_path.display()))?;
    let source = SourceImage::decode(&bytes)?;

    let opts = PixelWaveOpts {
        style: Style {
            pixel_width: common.pixel_size,
            pixel_height: common.pixel_size,
            border_width: common.border,
        },
        initial_intensity: intensity,
        ..PixelWaveOpts::default()
    };
    Ok(PixelWave::new(
        source,
        Box::new(PixmapSurface::new(common.width, common.height)),
        scheduler,
        opts,
    ))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut wave = build_wave(
        &args.in_path,
        &args.common,
        args.intensity,
        Box::new(ManualScheduler::new()),
    )?;
    wave.setup()?;
    for _ in 0..args.frame {
        wave.run_frame()?;
    }

    write_png(&wave.surface().frame()?, &args.out)?;
    println!("wrote frame {} to {}", args.frame, args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut wave = build_wave(
        &args.in_path,
        &args.common,
        args.intensity,
        Box::new(TimerScheduler::new(args.framerate)),
    )?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create '{}'", args.out_dir.display()))?;

    // setup() paints frame 0 synchronously.
    wave.setup()?;
    write_png(&wave.surface().frame()?, &frame_path(&args.out_dir, 0))?;

    let mut written = 1u64;
    for index in 1..args.frames {
        if !wave.run_frame()? {
            break;
        }
        write_png(&wave.surface().frame()?, &frame_path(&args.out_dir, index))?;
        written += 1;
    }

    println!("wrote {} frames to {}", written, args.out_dir.display());
    Ok(())
}

fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

fn write_png(frame: &FrameRgba, path: &Path) -> anyhow::Result<()> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer size mismatch")?;
    img.save(path)
        .with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}
