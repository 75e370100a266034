//! Local camera frame source.
//!
//! This module provides `CameraSource` for grabbing frames from a local capture
//! device (device index 0 is `/dev/video0`).
//!
//! The camera source is responsible for:
//! - Opening the device once and holding it for the process lifetime
//! - Converting whatever the device delivers (GREY, YUYV, RGB3, BGR3) to grayscale
//! - Reporting failed reads as "no frame" so the loop simply retries
//!
//! `stub://` paths select a synthetic camera that renders a moving block over a
//! noisy BGR background.

use anyhow::{anyhow, Result};
use rand::Rng;
#[cfg(feature = "ingest-v4l2")]
use std::time::Instant;

#[cfg(feature = "ingest-v4l2")]
use super::HEALTH_GRACE;
use super::normalize::{normalize_to_gray, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://name`.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

impl From<&SourceSettings> for CameraConfig {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            device: settings.url.clone(),
            width: settings.width,
            height: settings.height,
        }
    }
}

/// Camera frame source.
///
/// Uses libv4l for real devices, with a synthetic fallback for `stub://` paths.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceCamera::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow!(
                "camera {} requires the ingest-v4l2 feature",
                config.device
            ))
        }
    }
}

impl FrameSource for CameraSource {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.grab(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.grab(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests
// ----------------------------------------------------------------------------

const SYNTHETIC_NOISE: u8 = 6;
const SYNTHETIC_BLOCK: u32 = 8;

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        let bgr = self.render_bgr();
        self.frame_count += 1;
        let gray = normalize_to_gray(
            &bgr,
            self.config.width,
            self.config.height,
            PixelFormat::Bgr24,
        )?;
        Frame::new(gray, self.config.width, self.config.height).map(Some)
    }

    /// Dark background with a little sensor noise and a bright block that moves
    /// one block width per frame.
    fn render_bgr(&self) -> Vec<u8> {
        let width = self.config.width;
        let height = self.config.height;
        let block = SYNTHETIC_BLOCK.min(width).min(height);
        let span = (width - block + 1) as u64;
        let block_x = ((self.frame_count * block as u64) % span) as u32;
        let block_y = (height - block) / 2;

        let mut rng = rand::thread_rng();
        let mut bgr = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = (block_x..block_x + block).contains(&x)
                    && (block_y..block_y + block).contains(&y);
                let base: u8 = if inside { 220 } else { 40 };
                let noisy = base.saturating_add(rng.gen_range(0..=SYNTHETIC_NOISE));
                bgr.extend_from_slice(&[noisy, noisy, noisy]);
            }
        }
        bgr
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_missed: 0,
            location: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Production camera using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
    missed_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[cfg(feature = "ingest-v4l2")]
#[ouroboros::self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Yuyv,
            frame_count: 0,
            missed_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use anyhow::Context;
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open camera {}", self.config.device))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read camera format after set failure")?
            }
        };

        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "camera {} negotiated unsupported pixel format {}",
                self.config.device,
                format.fourcc
            )
        })?;
        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("camera not connected; call connect() first"))?;
        let captured = state.with_stream_mut(|stream| stream.next().map(|(buf, _)| buf.to_vec()));
        let buf = match captured {
            Ok(buf) => buf,
            Err(err) => {
                log::debug!("CameraSource: read failed on {}: {}", self.config.device, err);
                self.missed_count += 1;
                self.last_error = Some(err.to_string());
                return Ok(None);
            }
        };

        let gray = match normalize_to_gray(&buf, self.active_width, self.active_height, self.format)
        {
            Ok(gray) => gray,
            Err(err) => {
                log::debug!("CameraSource: dropped torn frame: {}", err);
                self.missed_count += 1;
                return Ok(None);
            }
        };

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;
        Frame::new(gray, self.active_width, self.active_height).map(Some)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        match self.last_frame_at {
            Some(last) => last.elapsed() <= HEALTH_GRACE,
            None => self.state.is_some(),
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_missed: self.missed_count,
            location: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
