//! HTTP pull frame source.
//!
//! This module provides `HttpSource`, which issues one GET per grab against a
//! fixed endpoint and decodes the body as an image. The same source serves a
//! camera reached directly and one reached through a proxy endpoint; only the
//! URL and the reported name differ. Color payloads are reduced to luma.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Instant;
use url::Url;

use super::decode::decode_gray;
use super::{FrameSource, SourceStats, HEALTH_GRACE};
use crate::frame::Frame;

const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Configuration for an HTTP source.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Snapshot URL. Supported schemes: http, https.
    pub url: String,
    /// True when `url` is a proxy in front of the camera.
    pub via_proxy: bool,
}

impl HttpConfig {
    pub fn direct(url: &str) -> Self {
        Self {
            url: url.to_string(),
            via_proxy: false,
        }
    }

    pub fn proxy(url: &str) -> Self {
        Self {
            url: url.to_string(),
            via_proxy: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::direct("http://192.168.122.100/")
    }
}

/// HTTP frame source.
pub struct HttpSource {
    config: HttpConfig,
    agent: ureq::Agent,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

impl HttpSource {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse http source url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported http source scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        Ok(Self {
            config,
            agent: ureq::AgentBuilder::new().build(),
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .with_context(|| format!("fetch image from {}", self.config.url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)
            .context("read image body")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty image body from {}", self.config.url));
        }
        Ok(bytes)
    }
}

impl FrameSource for HttpSource {
    fn name(&self) -> &'static str {
        if self.config.via_proxy {
            "proxy"
        } else {
            "http"
        }
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        let frame = self.fetch().and_then(|bytes| decode_gray(&bytes));
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
        if self.last_error.is_some() {
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
