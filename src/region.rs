//! Image decoding and pixel-exact cropping.
//!
//! Sources with an alpha channel are flattened to RGB by dropping alpha (not
//! compositing), so every letter in a batch is written with the same colour
//! model. This loses transparency. Palette images are expanded by the decoder
//! and go through the same path.

use std::io::Cursor;

use image::{ColorType, DynamicImage, ImageFormat};

use crate::error::ExtractError;
use crate::scale::ScaledRegion;

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ExtractError> {
    let image = image::load_from_memory(bytes).map_err(ExtractError::ImageDecode)?;
    Ok(normalize_color(image))
}

pub fn normalize_color(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::L16 | ColorType::Rgb8 | ColorType::Rgb16 => image,
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Copies `[x, x + width) x [y, y + height)` without resampling.
pub fn crop(image: &DynamicImage, region: &ScaledRegion) -> DynamicImage {
    image.crop_imm(region.x, region.y, region.width, region.height)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExtractError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ExtractError::Encode)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn crop_is_pixel_exact() {
        let source = DynamicImage::ImageRgb8(gradient(40, 30));
        let region = ScaledRegion {
            x: 5,
            y: 7,
            width: 12,
            height: 9,
        };
        let cropped = crop(&source, &region);
        assert_eq!(cropped.dimensions(), (12, 9));
        for (x, y, pixel) in cropped.pixels() {
            assert_eq!(pixel, source.get_pixel(x + 5, y + 7));
        }
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let source = DynamicImage::ImageRgb8(gradient(20, 20));
        let region = ScaledRegion {
            x: 3,
            y: 4,
            width: 10,
            height: 6,
        };
        let cropped = crop(&source, &region);
        let bytes = encode_png(&cropped).expect("png");
        let decoded = decode_image(&bytes).expect("decode");
        assert_eq!(decoded.to_rgb8(), cropped.to_rgb8());
    }

    #[test]
    fn alpha_is_dropped() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0]));
        let normalized = normalize_color(DynamicImage::ImageRgba8(rgba));
        assert_eq!(normalized.color(), ColorType::Rgb8);
        assert_eq!(normalized.to_rgb8().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn grayscale_is_kept() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(3, 3));
        assert_eq!(normalize_color(gray).color(), ColorType::L8);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_image(b"definitely not an image").expect_err("decode");
        assert!(matches!(err, ExtractError::ImageDecode(_)));
        assert!(err.is_client_error());
    }
}
