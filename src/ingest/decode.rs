use anyhow::{anyhow, Context, Result};
use image::ImageFormat;

use crate::frame::Frame;

const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Decode an encoded image (format sniffed from the bytes) into a grayscale frame.
/// Color images are reduced to luma.
pub fn decode_gray(bytes: &[u8]) -> Result<Frame> {
    decode_with(bytes, None)
}

/// Decode, rotate by 180 degrees and resize to `width` x `height`.
///
/// Used by sources whose camera is mounted upside down and whose native
/// resolution differs from the frames the loop works on.
pub fn decode_oriented(
    bytes: &[u8],
    format: Option<ImageFormat>,
    width: u32,
    height: u32,
) -> Result<Frame> {
    decode_with(bytes, format)?
        .rotated_180()?
        .resized(width, height)
}

fn decode_with(bytes: &[u8], format: Option<ImageFormat>) -> Result<Frame> {
    if bytes.is_empty() {
        return Err(anyhow!("empty image payload"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(anyhow!(
            "image payload of {} bytes exceeds {} byte limit",
            bytes.len(),
            MAX_IMAGE_BYTES
        ));
    }
    let image = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format)
            .with_context(|| format!("decode {:?} image", format))?,
        None => image::load_from_memory(bytes).context("decode image")?,
    };
    Ok(Frame::from_image(image.into_luma8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode_png(image: &image::DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_grayscale_png() -> Result<()> {
        let gray = GrayImage::from_raw(2, 2, vec![0, 64, 128, 255]).unwrap();
        let bytes = encode_png(&image::DynamicImage::ImageLuma8(gray));

        let frame = decode_gray(&bytes)?;
        assert_eq!(frame.dimensions(), (2, 2));
        assert_eq!(frame.pixels(), &[0, 64, 128, 255]);
        Ok(())
    }

    #[test]
    fn color_images_are_reduced_to_luma() -> Result<()> {
        let rgb = RgbImage::from_pixel(3, 1, Rgb([255, 255, 255]));
        let bytes = encode_png(&image::DynamicImage::ImageRgb8(rgb));

        let frame = decode_gray(&bytes)?;
        assert_eq!(frame.pixels(), &[255, 255, 255]);
        Ok(())
    }

    #[test]
    fn oriented_decode_flips_and_resizes() -> Result<()> {
        let gray = GrayImage::from_raw(2, 1, vec![10, 200]).unwrap();
        let bytes = encode_png(&image::DynamicImage::ImageLuma8(gray));

        let flipped = decode_oriented(&bytes, Some(ImageFormat::Png), 2, 1)?;
        assert_eq!(flipped.pixels(), &[200, 10]);

        let scaled = decode_oriented(&bytes, Some(ImageFormat::Png), 8, 6)?;
        assert_eq!(scaled.dimensions(), (8, 6));
        Ok(())
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_gray(b"not an image").is_err());
        assert!(decode_gray(&[]).is_err());
    }
}
