use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::Arc;
use strip_vision::observer::LogObserver;
use strip_vision::pipeline::{DistributedFilter, FilterConfig, Narrowing, Raster, StripPlanner};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NarrowingArg {
    Wrap,
    Saturate,
}

impl From<NarrowingArg> for Narrowing {
    fn from(arg: NarrowingArg) -> Self {
        match arg {
            NarrowingArg::Wrap => Narrowing::Wrap,
            NarrowingArg::Saturate => Narrowing::Saturate,
        }
    }
}

/// Applies a distributed high-pass filter to an image file.
#[derive(Debug, Parser)]
#[command(name = "strip_tester", version)]
struct Args {
    /// Image to read.
    input: PathBuf,

    /// Where to write the filtered image. The format follows the extension.
    output: PathBuf,

    /// Kernel side length (odd, >= 3).
    #[arg(short, long, env = "STRIP_VISION_KERNEL_SIZE", default_value_t = 3)]
    kernel_size: usize,

    /// Participants including the coordinator. Defaults to one per core plus one.
    #[arg(short, long, env = "STRIP_VISION_WORKERS")]
    workers: Option<usize>,

    /// How sums outside 0..=255 are narrowed.
    #[arg(long, value_enum, default_value_t = NarrowingArg::Wrap)]
    narrowing: NarrowingArg,

    #[arg(long, env = "STRIP_VISION_LOG", default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Argument Parsing & Logging ---
    let args = Args::parse();
    TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to initialise logging")?;

    // --- 2. Image Input ---
    let decoded = image::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let raster = Raster::from_dynamic_image(&decoded);
    info!(
        "loaded {} ({}x{}, {} channels)",
        args.input.display(),
        raster.width(),
        raster.height(),
        raster.channels()
    );

    // --- 3. Filter Configuration ---
    let mut config = FilterConfig {
        kernel_size: args.kernel_size,
        narrowing: args.narrowing.into(),
        ..FilterConfig::default()
    };
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    config.validate().context("invalid filter configuration")?;
    info!(
        "{} of {} worker(s) will receive rows",
        StripPlanner::participants(raster.height(), config.worker_count),
        config.worker_count.saturating_sub(1).max(1)
    );

    // --- 4. Distributed Filtering ---
    let filter = DistributedFilter::new(config).with_observer(Arc::new(LogObserver::new()));
    let output = filter.apply(raster).await.context("filtering failed")?;

    // --- 5. Image Output ---
    let image = output
        .into_rgb_image()
        .context("filtered raster is not exportable")?;
    image
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!("Processing complete. Output saved to {}", args.output.display());
    Ok(())
}
