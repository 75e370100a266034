//! Frame ingestion sources.
//!
//! This module provides interchangeable grayscale frame sources:
//! - Local camera (V4L2, feature: ingest-v4l2; synthetic for `stub://` paths)
//! - HTTP pull, direct or through a camera proxy
//! - Headless browser screenshot (feature: ingest-browser)
//! - Raw TCP socket with a blank-line terminated header
//!
//! Every source hands out `Frame`s through `FrameSource::grab`. A source
//! returns `Ok(None)` when a read failed but the next call may succeed, and
//! `Err` when the failure is not recoverable.
//!
//! The source is picked once at startup from `SourceSettings::kind`.

#[cfg(feature = "ingest-browser")]
pub mod browser;
pub mod camera;
mod decode;
pub mod http;
mod normalize;
pub mod socket;

#[cfg(feature = "ingest-browser")]
pub use browser::BrowserSource;
pub use camera::CameraSource;
pub use decode::{decode_gray, decode_oriented};
pub use http::HttpSource;
pub use normalize::PixelFormat;
pub use socket::SocketSource;

use anyhow::Result;
use std::time::Duration;

use crate::config::{SourceKind, SourceSettings};
use crate::frame::Frame;

/// A place frames come from.
pub trait FrameSource {
    /// Source identifier.
    fn name(&self) -> &'static str;

    /// Acquire long-lived handles (device, browser process).
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Obtain the next frame.
    ///
    /// `Ok(None)` means nothing was available this time; the caller retries.
    fn grab(&mut self) -> Result<Option<Frame>>;

    /// Returns true while recent grabs are succeeding.
    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics common to every source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_missed: u64,
    pub location: String,
}

/// Build the source named by `settings.kind`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match settings.kind {
        SourceKind::Camera => Box::new(CameraSource::new(settings.into())?),
        SourceKind::Http => Box::new(HttpSource::new(http::HttpConfig::direct(&settings.url))?),
        SourceKind::Proxy => Box::new(HttpSource::new(http::HttpConfig::proxy(&settings.url))?),
        SourceKind::Browser => open_browser(settings)?,
        SourceKind::Socket => Box::new(SocketSource::new(settings.into())?),
    };
    Ok(source)
}

#[cfg(feature = "ingest-browser")]
fn open_browser(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(BrowserSource::new(settings.into())))
}

#[cfg(not(feature = "ingest-browser"))]
fn open_browser(_settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("browser source requires the ingest-browser feature")
}

/// How long a source may go without a frame before it reports unhealthy.
pub(crate) const HEALTH_GRACE: Duration = Duration::from_secs(5);
