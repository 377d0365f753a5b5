use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yuvframe::config::{self, ExtractConfig};
use yuvframe::extract::{self, InputKind};
use yuvframe::video::format::{OutputFormat, Resolution};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// yuvframe command line arguments
#[derive(Parser, Debug)]
#[command(name = "yuvframe")]
#[command(
    version,
    about = "Decode video frames or convert an image directory to NV12 / RGB24 / JPEG",
    long_about = None,
    after_help = "Examples:\n  \
        yuvframe video.mp4 -o output_dir -f yuv\n  \
        yuvframe image_dir -o output_dir --images-to-yuv\n  \
        ffmpeg -i in.mp4 -f rawvideo -pix_fmt bgr24 - | yuvframe - --raw-size 1920x1080 -f yuv"
)]
struct CliArgs {
    /// Video file, image directory, or raw BGR24 stream ("-" for stdin with --raw-size)
    input_path: PathBuf,

    /// Output directory (default: output_images)
    #[arg(short = 'o', long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Save every Nth frame (default: 1)
    #[arg(short = 'i', long, value_name = "N")]
    interval: Option<u32>,

    /// Output width (default: 640)
    #[arg(short = 'w', long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Output height (default: 360)
    #[arg(short = 'H', long, value_name = "PIXELS")]
    height: Option<u32>,

    /// Output format (video default: jpeg, image directory default: yuv)
    #[arg(short = 'f', long, value_enum)]
    format: Option<OutputFormat>,

    /// Convert every image in the input directory to YUV (NV12)
    #[arg(long)]
    images_to_yuv: bool,

    /// Treat the input as raw packed BGR24 frames of this size (e.g. 1920x1080)
    #[arg(long, value_name = "WxH")]
    raw_size: Option<Resolution>,

    /// JPEG quality 1-100 (default: 95)
    #[arg(short = 'q', long, value_name = "QUALITY")]
    jpeg_quality: Option<u8>,

    /// Worker threads for image directories (default: one per CPU)
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to FILE before running
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// Print a JSON summary to stdout when done
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::debug!("Starting yuvframe v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ExtractConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    if let Some(path) = &args.save_config {
        config::save_config(path, &config)?;
        tracing::info!("Configuration written to {}", path.display());
    }

    let input = InputKind::detect(&args.input_path, args.raw_size)?;
    match &input {
        InputKind::Video(_) | InputKind::RawBgr(..) if args.images_to_yuv => {
            tracing::warn!("Input is a file, ignoring --images-to-yuv and processing it as video");
        }
        _ => {}
    }

    let summary = extract::run(&input, &config)?;
    tracing::info!(
        "Finished: {} read, {} saved, {} failed, output in {}",
        summary.frames_read,
        summary.saved,
        summary.failed,
        config.output_dir
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

/// Apply command line overrides on top of the loaded configuration
fn apply_overrides(config: &mut ExtractConfig, args: &CliArgs) {
    if let Some(output) = &args.output {
        config.output_dir = output.to_string_lossy().to_string();
    }
    if let Some(interval) = args.interval {
        config.frame_interval = interval;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    // One -f flag drives whichever pipeline runs
    if let Some(format) = args.format {
        config.format = format;
        config.batch_format = format;
    }
    if let Some(quality) = args.jpeg_quality {
        config.jpeg_quality = quality;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "yuvframe=error",
        LogLevel::Warn => "yuvframe=warn",
        LogLevel::Info => "yuvframe=info",
        LogLevel::Verbose => "yuvframe=debug",
        LogLevel::Debug => "yuvframe=debug",
        LogLevel::Trace => "yuvframe=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    // Logs go to stderr so --json output on stdout stays machine-readable
    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
