//! Frame Motion
//!
//! Grabs grayscale frames from a pluggable source and marks where consecutive
//! frames differ.
//!
//! # Module Structure
//!
//! - `frame`: Grayscale `Frame` and binary `MotionMask`
//! - `ingest`: Frame sources (camera, HTTP, proxy, headless browser, raw socket)
//! - `detect`: The frame-difference motion filter
//! - `config`: File + environment configuration
//! - `watch`: One iteration of the polling loop (grab, compare, report)
//!
//! # Example
//!
//! ```no_run
//! use frame_motion::{detect_motion, open_source, MotionConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = MotionConfig::load()?;
//! let mut source = open_source(&cfg.source)?;
//! source.connect()?;
//!
//! let mut previous = None;
//! loop {
//!     let Some(frame) = source.grab()? else { continue };
//!     if let Some(prev) = previous.as_ref() {
//!         let mask = detect_motion(prev, &frame)?;
//!         println!("{} pixels moved", mask.active_pixels());
//!     }
//!     previous = Some(frame);
//! }
//! # }
//! ```

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod watch;

pub use config::{MotionConfig, SourceKind, SourceSettings};
pub use detect::{detect_motion, MotionFilter};
pub use frame::{Frame, MotionMask, MASK_ON};
pub use ingest::{open_source, FrameSource, SourceStats};
pub use watch::{MotionWatch, Step};
