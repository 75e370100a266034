use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::MotionFilter;

const DEFAULT_CAMERA_URL: &str = "/dev/video0";
const DEFAULT_HTTP_URL: &str = "http://192.168.122.100/";
const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8080/camera";
const DEFAULT_BROWSER_URL: &str = "http://127.0.0.1:8000/";
const DEFAULT_SOCKET_ADDR: &str = "192.168.122.100:80";
const DEFAULT_SELECTOR: &str = "img";
const DEFAULT_WIDTH: u32 = 960;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_CAPTURE_WIDTH: u32 = 320;
const DEFAULT_CAPTURE_HEIGHT: u32 = 240;
const DEFAULT_REQUEST_TOKEN: &str = "GET /\n";
const DEFAULT_POLL_INTERVAL_MS: u64 = 0;

/// Which image source the loop reads from.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Camera,
    Http,
    Proxy,
    Browser,
    Socket,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Camera => "camera",
            SourceKind::Http => "http",
            SourceKind::Proxy => "proxy",
            SourceKind::Browser => "browser",
            SourceKind::Socket => "socket",
        }
    }

    fn default_url(&self) -> &'static str {
        match self {
            SourceKind::Camera => DEFAULT_CAMERA_URL,
            SourceKind::Http => DEFAULT_HTTP_URL,
            SourceKind::Proxy => DEFAULT_PROXY_URL,
            SourceKind::Browser => DEFAULT_BROWSER_URL,
            SourceKind::Socket => DEFAULT_SOCKET_ADDR,
        }
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "camera" => Ok(SourceKind::Camera),
            "http" => Ok(SourceKind::Http),
            "proxy" => Ok(SourceKind::Proxy),
            "browser" => Ok(SourceKind::Browser),
            "socket" => Ok(SourceKind::Socket),
            other => Err(anyhow!(
                "unknown source '{}'; expected camera, http, proxy, browser or socket",
                other
            )),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    source: Option<SourceConfigFile>,
    motion: Option<FilterConfigFile>,
    poll_interval_ms: Option<u64>,
    mask_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    kind: Option<SourceKind>,
    url: Option<String>,
    selector: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    capture_width: Option<u32>,
    capture_height: Option<u32>,
    request_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FilterConfigFile {
    pixel_threshold: Option<u8>,
    neighbor_threshold: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct MotionConfig {
    pub source: SourceSettings,
    pub motion: MotionFilter,
    pub poll_interval: Duration,
    pub mask_path: Option<PathBuf>,
}

/// Resolved source settings. `url` is a device path for cameras, a URL for
/// http/proxy/browser, and `host:port` for sockets.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub url: String,
    pub selector: String,
    /// Output frame size for sources that resize (browser, socket); preferred
    /// capture size for cameras.
    pub width: u32,
    pub height: u32,
    /// Resolution of the raw socket wire payload.
    pub capture_width: u32,
    pub capture_height: u32,
    pub request_token: Vec<u8>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self::for_kind(SourceKind::default())
    }
}

impl SourceSettings {
    pub fn for_kind(kind: SourceKind) -> Self {
        Self {
            kind,
            url: kind.default_url().to_string(),
            selector: DEFAULT_SELECTOR.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            capture_width: DEFAULT_CAPTURE_WIDTH,
            capture_height: DEFAULT_CAPTURE_HEIGHT,
            request_token: DEFAULT_REQUEST_TOKEN.as_bytes().to_vec(),
        }
    }

    /// Switch to another source kind, resetting the url to that kind's default.
    pub fn set_kind(&mut self, kind: SourceKind) {
        if self.kind != kind {
            self.kind = kind;
            self.url = kind.default_url().to_string();
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            motion: MotionFilter::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            mask_path: None,
        }
    }
}

impl MotionConfig {
    /// Load from `MOTION_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTION_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MotionConfigFile) -> Self {
        let source_file = file.source.unwrap_or_default();
        let kind = source_file.kind.unwrap_or_default();
        let defaults = SourceSettings::for_kind(kind);
        let source = SourceSettings {
            kind,
            url: source_file.url.unwrap_or(defaults.url),
            selector: source_file.selector.unwrap_or(defaults.selector),
            width: source_file.width.unwrap_or(defaults.width),
            height: source_file.height.unwrap_or(defaults.height),
            capture_width: source_file.capture_width.unwrap_or(defaults.capture_width),
            capture_height: source_file
                .capture_height
                .unwrap_or(defaults.capture_height),
            request_token: source_file
                .request_token
                .map(String::into_bytes)
                .unwrap_or(defaults.request_token),
        };
        let filter_defaults = MotionFilter::default();
        let motion = MotionFilter {
            pixel_threshold: file
                .motion
                .as_ref()
                .and_then(|motion| motion.pixel_threshold)
                .unwrap_or(filter_defaults.pixel_threshold),
            neighbor_threshold: file
                .motion
                .and_then(|motion| motion.neighbor_threshold)
                .unwrap_or(filter_defaults.neighbor_threshold),
        };
        Self {
            source,
            motion,
            poll_interval: Duration::from_millis(
                file.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            mask_path: file.mask_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var("MOTION_SOURCE") {
            if !kind.trim().is_empty() {
                self.source.set_kind(kind.parse()?);
            }
        }
        if let Ok(url) = std::env::var("MOTION_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(interval) = std::env::var("MOTION_POLL_INTERVAL_MS") {
            if !interval.trim().is_empty() {
                let millis: u64 = interval.trim().parse().map_err(|_| {
                    anyhow!("MOTION_POLL_INTERVAL_MS must be an integer number of milliseconds")
                })?;
                self.poll_interval = Duration::from_millis(millis);
            }
        }
        if let Ok(path) = std::env::var("MOTION_MASK_PATH") {
            if !path.trim().is_empty() {
                self.mask_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.source.kind == SourceKind::Socket {
            if self.source.capture_width == 0 || self.source.capture_height == 0 {
                return Err(anyhow!(
                    "socket capture width and height must be greater than zero"
                ));
            }
            if self.source.request_token.is_empty() {
                return Err(anyhow!("socket request token must not be empty"));
            }
        }
        if self.source.kind == SourceKind::Browser && self.source.selector.trim().is_empty() {
            return Err(anyhow!("browser selector must not be empty"));
        }
        self.motion.validate()
    }
}

fn read_config_file(path: &Path) -> Result<MotionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
