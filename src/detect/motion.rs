use anyhow::{anyhow, Result};

use crate::frame::{Frame, MotionMask};

/// Per-pixel intensity change that counts as "changed".
pub const DEFAULT_PIXEL_THRESHOLD: u8 = 50;

/// Changed cells a 3x3 neighborhood must exceed to survive noise suppression.
pub const DEFAULT_NEIGHBOR_THRESHOLD: u8 = 7;

/// Frame-difference motion filter.
///
/// The filter is stateless: callers keep the previous frame themselves and pass
/// both frames on every call.
///
/// 1. absolute difference per pixel
/// 2. `diff > pixel_threshold` gives a 0/1 change map
/// 3. each cell is replaced by the sum of its 3x3 neighborhood (itself included);
///    cells outside the frame take the value of the nearest edge cell
/// 4. `sum > neighbor_threshold` gives the final 0/1 map, dropping isolated changes
/// 5. set cells are scaled to 255
///
/// Edge replication makes border and corner cells more sensitive than a
/// zero-padded filter: a changed corner pixel counts 4 times in its own sum, so
/// a 2x2 change in a frame corner fires where zero padding would drop it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionFilter {
    pub pixel_threshold: u8,
    pub neighbor_threshold: u8,
}

impl Default for MotionFilter {
    fn default() -> Self {
        Self {
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            neighbor_threshold: DEFAULT_NEIGHBOR_THRESHOLD,
        }
    }
}

impl MotionFilter {
    pub fn new(pixel_threshold: u8, neighbor_threshold: u8) -> Result<Self> {
        let filter = Self {
            pixel_threshold,
            neighbor_threshold,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Reject thresholds that can never fire.
    pub fn validate(&self) -> Result<()> {
        if self.pixel_threshold == u8::MAX {
            return Err(anyhow!("pixel threshold must be below 255"));
        }
        if self.neighbor_threshold >= 9 {
            return Err(anyhow!(
                "neighbor threshold must be below 9 (a 3x3 neighborhood holds 9 cells)"
            ));
        }
        Ok(())
    }

    pub fn apply(&self, prev: &Frame, curr: &Frame) -> Result<MotionMask> {
        if prev.dimensions() != curr.dimensions() {
            return Err(anyhow!(
                "frame size changed between grabs: {}x{} -> {}x{}",
                prev.width,
                prev.height,
                curr.width,
                curr.height
            ));
        }
        let width = curr.width as usize;
        let height = curr.height as usize;

        let changed = self.change_map(prev.pixels(), curr.pixels());
        let sums = neighborhood_sums(&changed, width, height);
        let binary: Vec<u8> = sums
            .iter()
            .map(|&sum| u8::from(sum > self.neighbor_threshold))
            .collect();

        Ok(MotionMask::from_binary(binary, curr.width, curr.height))
    }

    fn change_map(&self, prev: &[u8], curr: &[u8]) -> Vec<u8> {
        prev.iter()
            .zip(curr)
            .map(|(&a, &b)| u8::from(a.abs_diff(b) > self.pixel_threshold))
            .collect()
    }
}

/// Run the default filter over two frames of identical size.
pub fn detect_motion(prev: &Frame, curr: &Frame) -> Result<MotionMask> {
    MotionFilter::default().apply(prev, curr)
}

/// 3x3 box sum of a 0/1 map with edge replication. Sums never exceed 9.
fn neighborhood_sums(map: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut sums = vec![0u8; map.len()];
    for y in 0..height {
        let rows = [y.saturating_sub(1), y, (y + 1).min(height - 1)];
        for x in 0..width {
            let cols = [x.saturating_sub(1), x, (x + 1).min(width - 1)];
            let mut sum = 0u8;
            for &row in &rows {
                let base = row * width;
                for &col in &cols {
                    sum += map[base + col];
                }
            }
            sums[y * width + x] = sum;
        }
    }
    sums
}
