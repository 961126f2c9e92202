//! camrec - continuous multi-camera recording.
//!
//! Captures from fixed USB cameras, stamps each frame with its camera label
//! and the wall-clock time, and writes time-boxed video segments per camera.

pub mod capture;
pub mod config;
pub mod recorder;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Context;
use clap::Parser;
use config::{CameraEntry, RecorderConfig};
use recorder::annotate;
use recorder::control::{self, ControlEvent};
use recorder::{NativeBackend, RecordingSupervisor, RunSummary, SessionSettings, SystemClock};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Record every configured camera until stopped
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./camrec.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Camera as LABEL=DEVICE_INDEX; repeat for several cameras
    #[arg(long = "camera", value_name = "LABEL=DEVICE")]
    pub cameras: Vec<CameraEntry>,

    /// Base output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Segment length in seconds
    #[arg(long)]
    pub rotate_secs: Option<u64>,

    /// Write a single segment per camera
    #[arg(long)]
    pub no_rotate: bool,

    /// Capture width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Capture height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Capture frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Four-character codec code, e.g. MJPG
    #[arg(long)]
    pub codec: Option<capture::FourCc>,

    /// Run without reading stop commands from stdin
    #[arg(long)]
    pub headless: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// List cameras and exit
    #[arg(long)]
    pub list_cameras: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Command-line flags win over file and environment
    pub fn apply(&self, config: &mut RecorderConfig) {
        if !self.cameras.is_empty() {
            config.cameras = self.cameras.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(secs) = self.rotate_secs {
            config.rotation.interval_secs = secs;
        }
        if self.no_rotate {
            config.rotation.enabled = false;
        }
        if let Some(width) = self.width {
            config.resolution.width = width;
        }
        if let Some(height) = self.height {
            config.resolution.height = height;
        }
        if let Some(fps) = self.fps {
            config.frame_rate = fps;
        }
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camrec=info,camrec_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Entry point for the `camrec` binary
pub fn run() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.list_cameras {
        for camera in capture::list_cameras() {
            println!("{}\t{}\t{}", camera.index, camera.name, camera.description);
        }
        return Ok(());
    }

    let mut config =
        RecorderConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    tracing::info!("Starting camrec v{}", env!("CARGO_PKG_VERSION"));
    if !recorder::writer::ffmpeg_available() {
        tracing::warn!("FFmpeg not found on PATH; segments cannot be created");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let summary = runtime.block_on(record(config, cli.headless))?;

    if let Some(path) = &cli.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    Ok(())
}

async fn record(config: RecorderConfig, headless: bool) -> anyhow::Result<RunSummary> {
    let font = annotate::load_font(config.font_path.as_deref())
        .context("Failed to load overlay font")?;
    let (tx, mut rx) = mpsc::unbounded_channel::<ControlEvent>();

    if headless {
        tracing::info!("Headless mode: stop with Ctrl-C or SIGTERM");
    } else {
        control::spawn_stdin_reader(tx.clone()).context("Failed to start stdin reader")?;
        tracing::info!("Type q + Enter to stop the next camera, a label to stop that camera, or all");
    }
    tokio::spawn(control::forward_shutdown_signals(tx));

    // Camera handles are not Send: everything device-related lives on this thread.
    let summary = tokio::task::spawn_blocking(move || {
        let settings = SessionSettings::from_config(&config, font);
        let mut supervisor =
            RecordingSupervisor::new(NativeBackend::new(config.warmup()), SystemClock, settings);
        supervisor.start(&config.camera_configs());
        supervisor.run(&mut rx)
    })
    .await
    .context("Capture loop panicked")?;

    Ok(summary)
}
