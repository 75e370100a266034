use anyhow::{anyhow, Result};

/// Pixel layouts a capture device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray8,
    Rgb24,
    Bgr24,
    /// YUV 4:2:2 packed as Y0 U Y1 V.
    Yuyv,
}

impl PixelFormat {
    /// Map a V4L2 fourcc to a supported layout.
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"GREY" => Some(PixelFormat::Gray8),
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"BGR3" => Some(PixelFormat::Bgr24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Yuyv => 2,
        }
    }
}

/// Convert a captured buffer into one luma byte per pixel.
pub(crate) fn normalize_to_gray(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    let expected = count
        .checked_mul(format.bytes_per_pixel())
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    // Drivers may pad the final buffer; anything shorter is a torn frame.
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    let pixels = &pixels[..expected];

    let gray = match format {
        PixelFormat::Gray8 => pixels.to_vec(),
        PixelFormat::Rgb24 => pixels
            .chunks_exact(3)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect(),
        PixelFormat::Bgr24 => pixels
            .chunks_exact(3)
            .map(|px| luma(px[2], px[1], px[0]))
            .collect(),
        PixelFormat::Yuyv => pixels.chunks_exact(2).map(|px| px[0]).collect(),
    };
    Ok(gray)
}

/// BT.601 luma.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299_f32 * r as f32 + 0.587_f32 * g as f32 + 0.114_f32 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}
