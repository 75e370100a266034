//! One iteration of the motion polling loop.
//!
//! `MotionWatch` owns the previous frame and the health-log timer so the loop
//! in `motion_watch` stays a thin driver around `step`.

use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::MotionConfig;
use crate::detect::MotionFilter;
use crate::frame::{Frame, MotionMask};
use crate::ingest::FrameSource;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// What a single `step` did.
#[derive(Debug)]
pub enum Step {
    /// The source had no frame; nothing was compared.
    Idle,
    /// First frame, or first frame after a size change. Kept as the reference.
    Reference,
    /// Compared against the previous frame.
    Compared(MotionMask),
}

pub struct MotionWatch {
    filter: MotionFilter,
    mask_path: Option<PathBuf>,
    health_interval: Duration,
    previous: Option<Frame>,
    frames_seen: u64,
    health_reports: u64,
    last_health_log: Instant,
}

impl MotionWatch {
    pub fn new(cfg: &MotionConfig) -> Self {
        Self {
            filter: cfg.motion,
            mask_path: cfg.mask_path.clone(),
            health_interval: HEALTH_LOG_INTERVAL,
            previous: None,
            frames_seen: 0,
            health_reports: 0,
            last_health_log: Instant::now(),
        }
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn health_reports(&self) -> u64 {
        self.health_reports
    }

    /// Grab one frame and compare it with the previous one.
    ///
    /// The health line is considered before grabbing, so a source that keeps
    /// returning no frame still reports its missed count.
    pub fn step(&mut self, source: &mut dyn FrameSource) -> Result<Step> {
        self.log_health_if_due(source);

        let Some(frame) = source.grab()? else {
            log::debug!("no frame available; retrying");
            return Ok(Step::Idle);
        };
        self.frames_seen += 1;

        let step = match self.previous.as_ref() {
            None => Step::Reference,
            Some(prev) if prev.dimensions() != frame.dimensions() => {
                log::warn!(
                    "frame size changed {}x{} -> {}x{}; restarting comparison",
                    prev.width,
                    prev.height,
                    frame.width,
                    frame.height
                );
                Step::Reference
            }
            Some(prev) => {
                let mask = self.filter.apply(prev, &frame)?;
                if mask.has_motion() {
                    log::info!(
                        "frame #{}: motion in {} pixels ({:.2}%)",
                        self.frames_seen,
                        mask.active_pixels(),
                        mask.coverage() * 100.0
                    );
                } else {
                    log::debug!("frame #{}: still", self.frames_seen);
                }
                if let Some(path) = &self.mask_path {
                    mask.save(path)?;
                }
                Step::Compared(mask)
            }
        };
        self.previous = Some(frame);
        Ok(step)
    }

    fn log_health_if_due(&mut self, source: &dyn FrameSource) {
        if self.last_health_log.elapsed() < self.health_interval {
            return;
        }
        let stats = source.stats();
        log::info!(
            "{} health={} frames={} missed={} location={}",
            source.name(),
            source.is_healthy(),
            stats.frames_captured,
            stats.frames_missed,
            stats.location
        );
        self.health_reports += 1;
        self.last_health_log = Instant::now();
    }
}
