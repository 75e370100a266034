//! Raw TCP socket frame source.
//!
//! The camera board answers a short request token with a text header, a blank
//! line and a fixed-size BMP:
//!
//! ```text
//! HTTP/1.1 200\nContent-Type: image/png\n\n<BMP file>
//! ```
//!
//! The BMP is 8-bit grayscale with a 256-entry palette, so the file is a
//! 1078-byte header (14 file + 40 DIB + 1024 palette) followed by one byte per
//! pixel. The board closes the connection after every image, so each grab opens
//! a fresh connection.
//!
//! A single `read` is never assumed to return the whole response: bytes are
//! accumulated until the terminator is found (it may straddle two reads) and
//! then until the full payload has arrived.

use anyhow::{anyhow, Context, Result};
use image::ImageFormat;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Instant;

use super::decode::decode_oriented;
use super::{FrameSource, SourceStats, HEALTH_GRACE};
use crate::config::SourceSettings;
use crate::frame::Frame;

/// File header + DIB header + 256-entry palette of an 8-bit BMP.
pub const BMP_GRAY8_HEADER_LEN: usize = 14 + 40 + 256 * 4;

const HEADER_TERMINATOR: &[u8] = b"\n\n";
const MAX_HEADER_BYTES: usize = 4096;
const READ_CHUNK: usize = 8192;

/// Shape of one response on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFormat {
    pub request_token: Vec<u8>,
    /// Sensor resolution carried in the payload.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Bytes preceding the pixel data inside the payload.
    pub image_header_len: usize,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self {
            request_token: b"GET /\n".to_vec(),
            capture_width: 320,
            capture_height: 240,
            image_header_len: BMP_GRAY8_HEADER_LEN,
        }
    }
}

impl WireFormat {
    /// Payload bytes after the header terminator.
    pub fn payload_len(&self) -> Result<usize> {
        (self.capture_width as usize)
            .checked_mul(self.capture_height as usize)
            .and_then(|pixels| pixels.checked_add(self.image_header_len))
            .ok_or_else(|| anyhow!("socket payload size overflows"))
    }
}

/// Configuration for a socket source.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// `host:port` of the camera board.
    pub addr: String,
    pub wire: WireFormat,
    /// Output frame size after the 180 degree flip.
    pub width: u32,
    pub height: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            addr: "192.168.122.100:80".to_string(),
            wire: WireFormat::default(),
            width: 960,
            height: 720,
        }
    }
}

impl From<&SourceSettings> for SocketConfig {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            addr: settings.url.clone(),
            wire: WireFormat {
                request_token: settings.request_token.clone(),
                capture_width: settings.capture_width,
                capture_height: settings.capture_height,
                image_header_len: BMP_GRAY8_HEADER_LEN,
            },
            width: settings.width,
            height: settings.height,
        }
    }
}

/// Socket frame source.
pub struct SocketSource {
    config: SocketConfig,
    payload_len: usize,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

impl SocketSource {
    pub fn new(config: SocketConfig) -> Result<Self> {
        if config.wire.request_token.is_empty() {
            return Err(anyhow!("socket request token must not be empty"));
        }
        let payload_len = config.wire.payload_len()?;
        Ok(Self {
            config,
            payload_len,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect(&self.config.addr)
            .with_context(|| format!("connect to {}", self.config.addr))?;
        request_payload(&mut stream, &self.config.wire.request_token, self.payload_len)
    }
}

impl FrameSource for SocketSource {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        let frame = self.fetch().and_then(|payload| {
            decode_oriented(
                &payload,
                Some(ImageFormat::Bmp),
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
            location: self.config.addr.clone(),
        }
    }
}

/// Send `token` and read one response, returning exactly `payload_len` bytes
/// that follow the header terminator.
pub fn request_payload<S: Read + Write>(
    stream: &mut S,
    token: &[u8],
    payload_len: usize,
) -> Result<Vec<u8>> {
    stream.write_all(token).context("send request token")?;
    stream.flush().context("flush request token")?;
    read_payload(stream, payload_len)
}

/// Read a `header\n\npayload` response from `reader`.
pub fn read_payload<R: Read>(reader: &mut R, payload_len: usize) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::with_capacity(payload_len + 256);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut body_start: Option<usize> = None;
    let mut scanned = 0usize;

    loop {
        if body_start.is_none() {
            // Back up by one byte so a terminator split across reads is still found.
            let from = scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
            if let Some(pos) = find(&buffer[from..], HEADER_TERMINATOR) {
                body_start = Some(from + pos + HEADER_TERMINATOR.len());
            } else {
                scanned = buffer.len();
                if buffer.len() > MAX_HEADER_BYTES {
                    return Err(anyhow!(
                        "response header exceeds {} bytes without a blank line",
                        MAX_HEADER_BYTES
                    ));
                }
            }
        }

        if let Some(start) = body_start {
            if buffer.len() - start >= payload_len {
                return Ok(buffer[start..start + payload_len].to_vec());
            }
        }

        let read = match reader.read(&mut chunk) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("read socket response"),
        };
        if read == 0 {
            return Err(match body_start {
                Some(start) => anyhow!(
                    "connection closed after {} of {} payload bytes",
                    buffer.len() - start,
                    payload_len
                ),
                None => anyhow!("connection closed before the response header ended"),
            });
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
