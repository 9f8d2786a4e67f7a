use serde::Serialize;

use crate::batch::{CanvasRect, ImageInfo};
use crate::error::ExtractError;

/// Ratio between original pixel space and canvas space, shared by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    pub fn compute(
        original_width: f64,
        original_height: f64,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<Self, ExtractError> {
        if !is_usable_dimension(canvas_width) || !is_usable_dimension(canvas_height) {
            return Err(ExtractError::InvalidScale {
                width: canvas_width,
                height: canvas_height,
            });
        }
        Ok(Self {
            x: original_width / canvas_width,
            y: original_height / canvas_height,
        })
    }

    /// A missing canvas dimension means the canvas already is original resolution.
    pub fn for_canvas(
        original_width: u32,
        original_height: u32,
        canvas: &ImageInfo,
    ) -> Result<Self, ExtractError> {
        let original_width = f64::from(original_width);
        let original_height = f64::from(original_height);
        Self::compute(
            original_width,
            original_height,
            canvas.width.unwrap_or(original_width),
            canvas.height.unwrap_or(original_height),
        )
    }
}

fn is_usable_dimension(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// A rectangle in original pixel space, clamped inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaledRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Maps a canvas rectangle to original space. Returns `None` for a
/// degenerate region, i.e. when nothing of it survives clamping.
pub fn map_rectangle(
    rect: &CanvasRect,
    scale: ScaleFactors,
    original_width: u32,
    original_height: u32,
) -> Option<ScaledRegion> {
    let bound_w = i64::from(original_width);
    let bound_h = i64::from(original_height);

    let x = to_pixels(rect.x, scale.x).min(bound_w - 1).max(0);
    let y = to_pixels(rect.y, scale.y).min(bound_h - 1).max(0);
    let width = to_pixels(rect.width, scale.x).min(bound_w - x);
    let height = to_pixels(rect.height, scale.y).min(bound_h - y);

    if width <= 0 || height <= 0 {
        return None;
    }

    Some(ScaledRegion {
        x: u32::try_from(x).ok()?,
        y: u32::try_from(y).ok()?,
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
    })
}

// Truncates toward zero; `as` saturates on overflow and maps NaN to 0.
fn to_pixels(value: f64, factor: f64) -> i64 {
    (value * factor).trunc() as i64
}
