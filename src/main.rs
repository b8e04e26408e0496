//! Demo binary: feed image files through the invocation boundary as if a
//! pipeline had produced them, then keep the process alive while the
//! preview windows run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use preview_monitor::{
    invoke, ImageTensor, Invocation, MonitorLayout, PowerState, SessionRegistry, SubmitMode,
    TensorData,
};

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "preview-monitor", about = "Monitor-pinned image preview windows")]
struct Cli {
    /// Image files to display (decoded to RGB)
    #[arg(required = true, value_name = "FILE")]
    images: Vec<PathBuf>,

    /// Comparison image file (enables comparison mode)
    #[arg(long, value_name = "FILE")]
    compare: Option<PathBuf>,

    /// Monitor selector ("Monitor 1 (1920x1080)" or a bare index)
    #[arg(short, long, default_value = "0")]
    monitor: String,

    /// Fit mode: none|width|height|fit|fill|distort|center
    #[arg(long, default_value = "fit")]
    fit: String,

    /// Display mode: single|comparison|slideshow
    #[arg(long)]
    mode: Option<String>,

    /// Target resolution as WxH
    #[arg(long, default_value = "1920x1080")]
    resolution: String,

    /// Submission mode: new|append
    #[arg(long, default_value = "new")]
    submit: String,

    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    #[arg(long, default_value_t = 1.0)]
    gamma: f32,

    #[arg(long, default_value_t = 1.0)]
    saturation: f32,

    /// White canvas background instead of black
    #[arg(long)]
    white_matte: bool,

    /// Frame pacing: smart|15fps|30fps|60fps
    #[arg(long, default_value = "smart")]
    fps: String,

    /// Optional YAML file describing the monitor layout
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,

    /// Seconds to keep the windows open before tearing down
    #[arg(long, default_value_t = 60)]
    hold: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("preview_monitor={level}").parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
}

fn load_tensor(paths: &[PathBuf]) -> Result<ImageTensor> {
    let mut frames: Vec<(u32, u32, Vec<u8>)> = Vec::new();
    for path in paths {
        let img = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgb8();
        frames.push((img.width(), img.height(), img.into_raw()));
    }
    let (w, h, _) = frames[0];
    anyhow::ensure!(
        frames.iter().all(|f| f.0 == w && f.1 == h),
        "all images in one batch must share dimensions"
    );
    let mut data = Vec::with_capacity(frames.len() * (w * h * 3) as usize);
    for (_, _, bytes) in &frames {
        data.extend_from_slice(bytes);
    }
    let tensor = ImageTensor::new(
        vec![frames.len(), h as usize, w as usize, 3],
        TensorData::U8(data),
    )?;
    Ok(tensor)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let layout = match &cli.layout {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("loading layout from {}", path.display()))?;
            MonitorLayout::new(serde_yaml::from_str(&text).context("parsing monitor layout")?)
        }
        None => MonitorLayout::default(),
    };
    for label in layout.labels() {
        info!(%label, "known monitor");
    }

    let registry = SessionRegistry::new(layout);

    let images = load_tensor(&cli.images)?;
    let compare_images = cli
        .compare
        .as_ref()
        .map(|p| load_tensor(std::slice::from_ref(p)))
        .transpose()?;

    let mut invocation = Invocation::new(images);
    invocation.compare_images = compare_images;
    invocation.monitor = cli.monitor.clone();
    invocation.fit_mode = cli.fit.parse().context("parsing fit mode")?;
    invocation.display_mode = cli.mode.as_deref().map(str::parse).transpose()?;
    invocation.target_resolution = cli.resolution.clone();
    invocation.submit_mode = cli.submit.parse().unwrap_or(SubmitMode::New);
    invocation.gain = cli.gain;
    invocation.gamma = cli.gamma;
    invocation.saturation = cli.saturation;
    invocation.white_matte = cli.white_matte;
    invocation.fps_mode = cli.fps.parse().context("parsing fps mode")?;
    invocation.power_state = PowerState::On;

    let returned = invoke(&registry, invocation);
    info!(
        frames = returned.shape().first().copied().unwrap_or(1),
        hold_secs = cli.hold,
        "batch submitted, holding process open"
    );

    std::thread::sleep(Duration::from_secs(cli.hold));
    registry.shutdown_all();
    Ok(())
}
