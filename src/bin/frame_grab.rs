//! frame_grab - grab a single frame from the configured source and save it.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use frame_motion::{open_source, MotionConfig, SourceKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Grab one grayscale frame and write it to disk")]
struct Args {
    /// Output image path (format follows the extension).
    #[arg(long, default_value = "frame.png")]
    out: PathBuf,

    /// JSON or TOML config file.
    #[arg(long, env = "MOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Source kind: camera, http, proxy, browser or socket.
    #[arg(long)]
    source: Option<SourceKind>,

    /// Source location (device path, URL or host:port).
    #[arg(long)]
    url: Option<String>,

    /// Grabs to attempt while the source has no frame ready.
    #[arg(long, default_value_t = 10)]
    attempts: u32,
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
    cfg.validate()?;

    let mut source = open_source(&cfg.source)?;
    source.connect()?;

    for attempt in 1..=args.attempts.max(1) {
        if let Some(frame) = source.grab()? {
            frame.save(&args.out)?;
            log::info!(
                "saved {}x{} frame from {} to {}",
                frame.width,
                frame.height,
                source.name(),
                args.out.display()
            );
            return Ok(());
        }
        log::warn!("attempt {}: no frame available", attempt);
    }

    Err(anyhow!(
        "{} produced no frame after {} attempts",
        source.name(),
        args.attempts.max(1)
    ))
}
