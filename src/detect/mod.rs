//! Motion detection over consecutive grayscale frames.

mod motion;

pub use motion::{
    detect_motion, MotionFilter, DEFAULT_NEIGHBOR_THRESHOLD, DEFAULT_PIXEL_THRESHOLD,
};
