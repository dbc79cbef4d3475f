//! Coordinate remapping between the three spaces results move through:
//! the detection canvas (the upscaled working image the model sees), the
//! original image, and an arbitrary display surface.

use anyhow::Result;
use image::{DynamicImage, imageops::FilterType};

use facelens_utils::timing_guard;

use crate::detection::{BoundingBox, Landmark};

/// Uniform factor applied to an image before detection.
///
/// Small images are upscaled to the target width so the model sees enough
/// pixels; images at or above the target width are left alone. The factor is
/// never below 1.0.
pub fn upscale_factor(original_width: u32, target_width: u32) -> f32 {
    if original_width == 0 {
        return 1.0;
    }
    (target_width as f32 / original_width as f32).max(1.0)
}

/// The working image the detector runs on, plus the bookkeeping needed to map
/// its coordinates back to the original.
pub struct DetectionCanvas {
    /// The (possibly upscaled) image handed to the model.
    pub image: DynamicImage,
    /// Uniform upscale factor relative to the original, >= 1.0.
    pub factor: f32,
    /// Original image dimensions (width, height).
    pub original_size: (u32, u32),
}

impl DetectionCanvas {
    /// Prepare the detection canvas for an image.
    ///
    /// When the upscale factor is exactly 1.0 the original image is used as-is.
    pub fn prepare(image: &DynamicImage, target_width: u32) -> Self {
        let _guard = timing_guard("facelens_core::prepare_canvas", log::Level::Trace);
        let (orig_w, orig_h) = (image.width(), image.height());
        let factor = upscale_factor(orig_w, target_width);

        let canvas = if factor > 1.0 {
            let new_w = (orig_w as f32 * factor).round() as u32;
            let new_h = (orig_h as f32 * factor).round() as u32;
            image.resize_exact(new_w.max(1), new_h.max(1), FilterType::Triangle)
        } else {
            image.clone()
        };

        Self {
            image: canvas,
            factor,
            original_size: (orig_w, orig_h),
        }
    }

    /// Map a canvas-space box back to original-image pixel space.
    pub fn to_original_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let inv = 1.0 / self.factor;
        bbox.scaled(inv, inv)
    }

    /// Map canvas-space landmarks back to original-image pixel space.
    pub fn to_original_landmarks(&self, landmarks: &[Landmark]) -> Vec<Landmark> {
        let inv = 1.0 / self.factor;
        landmarks.iter().map(|lm| lm.scaled(inv, inv)).collect()
    }
}

/// Per-axis factors mapping original-image coordinates onto a display surface.
///
/// Unlike the canvas factor this mapping is allowed to be non-uniform.
pub fn display_scales(natural: (u32, u32), display: (u32, u32)) -> Result<(f32, f32)> {
    let (nat_w, nat_h) = natural;
    anyhow::ensure!(
        nat_w > 0 && nat_h > 0,
        "natural dimensions must be non-zero"
    );
    Ok((
        display.0 as f32 / nat_w as f32,
        display.1 as f32 / nat_h as f32,
    ))
}

/// Map an original-space box onto a display surface.
pub fn to_display_box(bbox: &BoundingBox, scale_x: f32, scale_y: f32) -> BoundingBox {
    bbox.scaled(scale_x, scale_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_never_downscales() {
        assert_eq!(upscale_factor(640, 1280), 2.0);
        assert_eq!(upscale_factor(1280, 1280), 1.0);
        assert_eq!(upscale_factor(1920, 1280), 1.0);
        assert_eq!(upscale_factor(0, 1280), 1.0);
    }

    #[test]
    fn prepare_upscales_small_images() {
        let image = DynamicImage::new_rgb8(320, 240);
        let canvas = DetectionCanvas::prepare(&image, 1280);
        assert_eq!(canvas.factor, 4.0);
        assert_eq!(canvas.image.width(), 1280);
        assert_eq!(canvas.image.height(), 960);
        assert_eq!(canvas.original_size, (320, 240));
    }

    #[test]
    fn prepare_leaves_large_images_alone() {
        let image = DynamicImage::new_rgb8(1600, 900);
        let canvas = DetectionCanvas::prepare(&image, 1280);
        assert_eq!(canvas.factor, 1.0);
        assert_eq!(canvas.image.width(), 1600);
    }

    #[test]
    fn canvas_round_trip_within_one_unit() {
        let image = DynamicImage::new_rgb8(640, 480);
        let canvas = DetectionCanvas::prepare(&image, 1280);
        assert_eq!(canvas.factor, 2.0);

        // A box detected on the canvas at factor 2 maps back at half magnitude.
        let detected = BoundingBox {
            x: 200.0,
            y: 100.0,
            width: 90.0,
            height: 110.0,
        };
        let original = canvas.to_original_box(&detected);
        assert!((original.x - 100.0).abs() <= 1.0);
        assert!((original.y - 50.0).abs() <= 1.0);
        assert!((original.width - 45.0).abs() <= 1.0);
        assert!((original.height - 55.0).abs() <= 1.0);
    }

    #[test]
    fn landmarks_follow_the_same_factor() {
        let image = DynamicImage::new_rgb8(640, 480);
        let canvas = DetectionCanvas::prepare(&image, 1280);
        let landmarks = vec![Landmark { x: 100.0, y: 60.0 }, Landmark { x: 30.0, y: 10.0 }];
        let mapped = canvas.to_original_landmarks(&landmarks);
        assert_eq!(mapped[0], Landmark { x: 50.0, y: 30.0 });
        assert_eq!(mapped[1], Landmark { x: 15.0, y: 5.0 });
    }

    #[test]
    fn display_scales_are_per_axis() {
        let (sx, sy) = display_scales((800, 600), (400, 150)).unwrap();
        assert_eq!(sx, 0.5);
        assert_eq!(sy, 0.25);

        let bbox = BoundingBox {
            x: 80.0,
            y: 40.0,
            width: 100.0,
            height: 200.0,
        };
        let display = to_display_box(&bbox, sx, sy);
        assert_eq!(display.x, 40.0);
        assert_eq!(display.y, 10.0);
        assert_eq!(display.width, 50.0);
        assert_eq!(display.height, 50.0);
    }

    #[test]
    fn display_scales_reject_zero_natural_size() {
        assert!(display_scales((0, 600), (400, 300)).is_err());
    }
}
