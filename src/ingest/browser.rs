//! Headless browser screenshot source.
//!
//! This module provides `BrowserSource`, which points a headless Chromium at a
//! fixed page, locates the image element showing the camera feed and captures
//! that element as PNG on every grab. The capture is flipped 180 degrees and
//! resized like the raw socket source.
//!
//! The browser process is started by `connect()` and shut down when the source
//! is dropped.

use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use image::ImageFormat;
use std::sync::Arc;
use std::time::Instant;

use super::decode::decode_oriented;
use super::{FrameSource, SourceStats, HEALTH_GRACE};
use crate::config::SourceSettings;
use crate::frame::Frame;

/// Configuration for a browser source.
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    /// Page that shows the camera image.
    pub url: String,
    /// CSS selector of the image element.
    pub selector: String,
    pub width: u32,
    pub height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/".to_string(),
            selector: "img".to_string(),
            width: 960,
            height: 720,
        }
    }
}

impl From<&SourceSettings> for BrowserConfig {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            url: settings.url.clone(),
            selector: settings.selector.clone(),
            width: settings.width,
            height: settings.height,
        }
    }
}

/// Browser frame source.
pub struct BrowserSource {
    config: BrowserConfig,
    // Dropping the browser kills the Chromium process; keep it alive with the tab.
    session: Option<(Browser, Arc<Tab>)>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

impl BrowserSource {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            session: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn capture(&self) -> Result<Vec<u8>> {
        let (_, tab) = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("browser source not connected; call connect() first"))?;
        let element = tab
            .wait_for_element(&self.config.selector)
            .with_context(|| format!("locate element '{}'", self.config.selector))?;
        element
            .capture_screenshot(CaptureScreenshotFormatOption::Png)
            .context("capture element screenshot")
    }
}

impl FrameSource for BrowserSource {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn connect(&mut self) -> Result<()> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(|e| anyhow!("invalid browser launch options: {}", e))?;
        let browser = Browser::new(options).context("launch headless browser")?;
        let tab = browser.new_tab().context("open browser tab")?;
        tab.navigate_to(&self.config.url)
            .with_context(|| format!("navigate to {}", self.config.url))?;
        tab.wait_until_navigated()
            .with_context(|| format!("load {}", self.config.url))?;
        self.session = Some((browser, tab));

        log::info!(
            "BrowserSource: connected to {} (selector '{}')",
            self.config.url,
            self.config.selector
        );
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        let frame = self.capture().and_then(|png| {
            decode_oriented(
                &png,
                Some(ImageFormat::Png),
                self.config.width,
                self.config.height,
            )
        });
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.session.is_none() {
            return false;
        }
        match self.last_frame_at {
            Some(last) => last.elapsed() <= HEALTH_GRACE,
            None => true,
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_missed: 0,
            location: self.config.url.clone(),
        }
    }
}
