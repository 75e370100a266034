//! motion_watch - poll a frame source and report motion between frames.
//!
//! Each iteration:
//! 1. Grabs a frame from the configured source (retrying when none is available)
//! 2. Compares it against the previous frame with the motion filter
//! 3. Logs how much of the frame moved and, if configured, writes the mask as PNG
//! 4. Keeps the frame as the new previous frame

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use frame_motion::{open_source, MotionConfig, MotionWatch, SourceKind, Step};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Watch a camera feed and report frame-to-frame motion"
)]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "MOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Source kind: camera, http, proxy, browser or socket.
    #[arg(long)]
    source: Option<SourceKind>,

    /// Source location (device path, URL or host:port).
    #[arg(long)]
    url: Option<String>,

    /// Write every mask to this PNG path, overwriting the previous one.
    #[arg(long)]
    mask_path: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = MotionConfig::load_from(args.config.as_deref())?;
    if let Some(kind) = args.source {
        cfg.source.set_kind(kind);
    }
    if let Some(url) = args.url {
        cfg.source.url = url;
    }
    if let Some(path) = args.mask_path {
        cfg.mask_path = Some(path);
    }
    cfg.validate()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;

    let mut source = open_source(&cfg.source)?;
    source.connect()?;

    log::info!(
        "motion_watch running. source={} location={}",
        source.name(),
        cfg.source.url
    );
    log::info!(
        "pixel_threshold={} neighbor_threshold={}",
        cfg.motion.pixel_threshold,
        cfg.motion.neighbor_threshold
    );

    let mut watch = MotionWatch::new(&cfg);

    while running.load(Ordering::SeqCst) {
        if args.max_frames.is_some_and(|max| watch.frames_seen() >= max) {
            break;
        }

        if let Step::Idle = watch.step(source.as_mut())? {
            continue;
        }

        if !cfg.poll_interval.is_zero() {
            std::thread::sleep(cfg.poll_interval);
        }
    }

    log::info!("motion_watch stopped after {} frames", watch.frames_seen());
    Ok(())
}
