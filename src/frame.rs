//! Grayscale frame and motion mask containers.
//!
//! - `Frame`: one decoded 8-bit grayscale image. Lives for a single loop iteration.
//! - `MotionMask`: binary image (0 or 255) derived from two frames.
//!
//! Both enforce `pixels.len() == width * height` at construction, so every
//! consumer can index rows without re-checking.

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;
use std::path::Path;

/// Mask value for "motion here".
pub const MASK_ON: u8 = 255;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded grayscale frame, row-major, one byte per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = pixel_count(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} ({}x{}), got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Frame filled with a single intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self> {
        let len = pixel_count(width, height)?;
        Self::new(vec![value; len], width, height)
    }

    pub fn from_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
        }
    }

    pub fn into_image(self) -> Result<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| anyhow!("frame buffer does not fit its dimensions"))
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Rotate by 180 degrees (flip both axes). Sources mounted upside down need this.
    pub fn rotated_180(self) -> Result<Self> {
        let image = self.into_image()?;
        Ok(Self::from_image(imageops::rotate180(&image)))
    }

    /// Resize to `width` x `height`. A no-op when the frame already has that size.
    pub fn resized(self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot resize frame to {}x{}", width, height));
        }
        if self.dimensions() == (width, height) {
            return Ok(self);
        }
        let image = self.into_image()?;
        Ok(Self::from_image(imageops::resize(
            &image,
            width,
            height,
            FilterType::Triangle,
        )))
    }

    /// Write the frame as an image file; format follows the path extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_gray(&self.pixels, self.width, self.height, path)
    }
}

// ----------------------------------------------------------------------------
// MotionMask
// ----------------------------------------------------------------------------

/// Binary motion mask. Every value is either 0 or `MASK_ON`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionMask {
    values: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl MotionMask {
    /// Build from a 0/1 mask, scaling set cells to `MASK_ON`.
    pub(crate) fn from_binary(mut values: Vec<u8>, width: u32, height: u32) -> Self {
        for value in values.iter_mut() {
            *value = if *value != 0 { MASK_ON } else { 0 };
        }
        Self {
            values,
            width,
            height,
        }
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels flagged as motion.
    pub fn active_pixels(&self) -> usize {
        self.values.iter().filter(|&&v| v == MASK_ON).count()
    }

    pub fn has_motion(&self) -> bool {
        self.values.iter().any(|&v| v == MASK_ON)
    }

    /// Fraction of the frame flagged as motion, in `0.0..=1.0`.
    pub fn coverage(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.active_pixels() as f32 / self.values.len() as f32
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_gray(&self.values, self.width, self.height, path)
    }
}

fn pixel_count(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero"));
    }
    width
        .checked_mul(height)
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn save_gray(values: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
    let image = GrayImage::from_raw(width, height, values.to_vec())
        .ok_or_else(|| anyhow!("buffer does not fit {}x{}", width, height))?;
    image
        .save(path)
        .with_context(|| format!("write image {}", path.display()))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 5], 2, 3).is_err());
        assert!(Frame::new(vec![], 0, 0).is_err());
        assert!(Frame::new(vec![0u8; 6], 2, 3).is_ok());
    }

    #[test]
    fn rotate_180_reverses_pixel_order() -> Result<()> {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 3, 2)?;
        let rotated = frame.rotated_180()?;
        assert_eq!(rotated.dimensions(), (3, 2));
        assert_eq!(rotated.pixels(), &[6, 5, 4, 3, 2, 1]);
        Ok(())
    }

    #[test]
    fn resize_changes_dimensions() -> Result<()> {
        let frame = Frame::filled(320, 240, 90)?;
        let resized = frame.resized(960, 720)?;
        assert_eq!(resized.dimensions(), (960, 720));
        assert!(resized.pixels().iter().all(|&p| p == 90));
        Ok(())
    }

    #[test]
    fn mask_scales_binary_values() {
        let mask = MotionMask::from_binary(vec![0, 1, 0, 1], 2, 2);
        assert_eq!(mask.values(), &[0, 255, 0, 255]);
        assert_eq!(mask.active_pixels(), 2);
        assert!(mask.has_motion());
        assert_eq!(mask.coverage(), 0.5);
    }

    #[test]
    fn mask_saves_as_png() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mask.png");
        let mask = MotionMask::from_binary(vec![1, 0, 0, 1], 2, 2);
        mask.save(&path)?;

        let loaded = image::open(&path)?.into_luma8();
        assert_eq!(loaded.into_raw(), vec![255, 0, 0, 255]);
        Ok(())
    }
}
