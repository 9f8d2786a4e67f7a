//! Optional post-processing for brush packs and font tooling.
//!
//! The untouched crop is always kept. This only produces an extra, stylised
//! copy: grayscale, content-trimmed, size-capped, with luminance moved into
//! the alpha channel.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushOptimizer {
    pub max_size: u32,
    pub threshold: u8,
    pub padding_ratio: f32,
}

impl Default for BrushOptimizer {
    fn default() -> Self {
        Self {
            max_size: 512,
            threshold: 240,
            padding_ratio: 0.1,
        }
    }
}

impl BrushOptimizer {
    pub fn apply(&self, letter: &DynamicImage) -> DynamicImage {
        let mut luma = letter.to_luma8();
        if mean(&luma) > 127.0 {
            for pixel in luma.pixels_mut() {
                pixel[0] = 255 - pixel[0];
            }
        }

        let trimmed = match self.content_bounds(&luma) {
            Some((x, y, width, height)) => {
                image::imageops::crop_imm(&luma, x, y, width, height).to_image()
            }
            None => luma,
        };

        let mut gray = DynamicImage::ImageLuma8(trimmed);
        let max_size = self.max_size.max(1);
        if gray.width().max(gray.height()) > max_size {
            gray = gray.resize(max_size, max_size, FilterType::Lanczos3);
        }

        let gray = gray.to_luma8();
        let (width, height) = gray.dimensions();
        let rgba = RgbaImage::from_fn(width, height, |x, y| {
            let value = gray.get_pixel(x, y)[0];
            Rgba([0, 0, 0, 255 - value])
        });
        DynamicImage::ImageRgba8(rgba)
    }

    /// Padded bounding box of pixels darker than the threshold.
    fn content_bounds(&self, image: &GrayImage) -> Option<(u32, u32, u32, u32)> {
        let (width, height) = image.dimensions();
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[0] < self.threshold {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        if !found {
            return None;
        }

        let pad_x = ((max_x - min_x) as f32 * self.padding_ratio) as u32;
        let pad_y = ((max_y - min_y) as f32 * self.padding_ratio) as u32;
        let left = min_x.saturating_sub(pad_x);
        let top = min_y.saturating_sub(pad_y);
        let right = max_x.saturating_add(pad_x).saturating_add(1).min(width);
        let bottom = max_y.saturating_add(pad_y).saturating_add(1).min(height);
        Some((left, top, right - left, bottom - top))
    }
}

fn mean(image: &GrayImage) -> f64 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let total = image.pixels().map(|pixel| u64::from(pixel[0])).sum::<u64>();
    total as f64 / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn block(width: u32, height: u32, inside: u8, outside: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (10..20).contains(&x) && (5..15).contains(&y) {
                Luma([inside])
            } else {
                Luma([outside])
            }
        })
    }

    #[test]
    fn output_is_alpha_mask() {
        let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([100])));
        let output = BrushOptimizer::default().apply(&source).to_rgba8();
        assert_eq!(output.get_pixel(0, 0), &Rgba([0, 0, 0, 155]));
    }

    #[test]
    fn bright_backgrounds_are_inverted() {
        let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([200])));
        let output = BrushOptimizer::default().apply(&source).to_rgba8();
        // 200 inverts to 55, alpha is 255 - 55.
        assert_eq!(output.get_pixel(1, 1)[3], 200);
    }

    #[test]
    fn trims_to_padded_content() {
        let image = block(40, 30, 0, 120);
        let optimizer = BrushOptimizer {
            threshold: 60,
            padding_ratio: 0.0,
            ..BrushOptimizer::default()
        };
        let output = optimizer.apply(&DynamicImage::ImageLuma8(image));
        assert_eq!((output.width(), output.height()), (10, 10));
    }

    #[test]
    fn caps_the_longest_side() {
        let source = DynamicImage::ImageLuma8(block(200, 100, 250, 0));
        let optimizer = BrushOptimizer {
            max_size: 50,
            threshold: 255,
            ..BrushOptimizer::default()
        };
        let output = optimizer.apply(&source);
        assert_eq!((output.width(), output.height()), (50, 25));
    }

    #[test]
    fn huge_padding_clamps_to_the_image() {
        let optimizer = BrushOptimizer {
            threshold: 60,
            padding_ratio: 1.0e9,
            ..BrushOptimizer::default()
        };
        let output = optimizer.apply(&DynamicImage::ImageLuma8(block(20, 20, 0, 120)));
        assert_eq!((output.width(), output.height()), (20, 20));
    }
}
