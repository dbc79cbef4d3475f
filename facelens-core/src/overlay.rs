//! Annotated overlay rendering: hollow boxes, semi-transparent fills,
//! landmark dots, and optional text labels.

use anyhow::{Context, Result};
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use facelens_utils::config::OverlaySettings;

use crate::detection::{BoundingBox, RefinedFace};

/// Render the overlay for an analyzed image.
///
/// Coordinates are expected in the image's own pixel space and are clamped to
/// its bounds before drawing. Labels are only drawn when a font path is
/// configured; boxes, fills and landmark dots render regardless.
pub fn render_overlay(
    image: &DynamicImage,
    faces: &[RefinedFace],
    settings: &OverlaySettings,
) -> Result<RgbaImage> {
    let mut canvas = image.to_rgba8();
    let (img_w, img_h) = canvas.dimensions();
    anyhow::ensure!(
        img_w > 0 && img_h > 0,
        "cannot render overlay on an image with zero dimensions"
    );

    let font = load_label_font(settings)?;

    let box_color = rgba(&settings.box_color);
    let fill_color = rgba(&settings.fill_color);
    let landmark_color = rgba(&settings.landmark_color);

    for face in faces {
        let rect = rect_from_bbox(&face.bbox, img_w, img_h);
        blend_fill(&mut canvas, rect, fill_color);
        draw_hollow_rect_mut(&mut canvas, rect, box_color);

        if settings.draw_landmarks {
            if let Some(landmarks) = face.landmarks.as_ref() {
                for lm in landmarks {
                    let cx = clamp_to_i32(lm.x, img_w);
                    let cy = clamp_to_i32(lm.y, img_h);
                    draw_filled_circle_mut(&mut canvas, (cx, cy), 2, landmark_color);
                }
            }
        }

        if let Some(font) = font.as_ref() {
            let label = format!(
                "{} yrs, {} {}%",
                face.age, face.gender, face.gender_confidence
            );
            let scale = PxScale::from(settings.label_scale);
            let text_y = (rect.top() - settings.label_scale as i32 - 2).max(0);
            draw_text_mut(&mut canvas, box_color, rect.left(), text_y, scale, font, &label);
        }
    }

    Ok(canvas)
}

fn load_label_font(settings: &OverlaySettings) -> Result<Option<FontVec>> {
    let Some(path) = settings.font_path.as_ref() else {
        return Ok(None);
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read label font {}", path.display()))?;
    let font = FontVec::try_from_vec(bytes)
        .with_context(|| format!("failed to parse label font {}", path.display()))?;
    Ok(Some(font))
}

fn rgba(color: &facelens_utils::RgbaColor) -> Rgba<u8> {
    Rgba([color.red, color.green, color.blue, color.alpha])
}

/// Alpha-blend a fill color over a rectangular region.
fn blend_fill(canvas: &mut RgbaImage, rect: Rect, fill: Rgba<u8>) {
    if fill[3] == 0 {
        return;
    }
    let (img_w, img_h) = canvas.dimensions();
    let x0 = rect.left().max(0) as u32;
    let y0 = rect.top().max(0) as u32;
    let x1 = (rect.right().max(0) as u32).min(img_w.saturating_sub(1));
    let y1 = (rect.bottom().max(0) as u32).min(img_h.saturating_sub(1));

    for y in y0..=y1 {
        for x in x0..=x1 {
            canvas.get_pixel_mut(x, y).blend(&fill);
        }
    }
}

fn rect_from_bbox(bbox: &BoundingBox, img_w: u32, img_h: u32) -> Rect {
    let max_x = (img_w - 1) as f32;
    let max_y = (img_h - 1) as f32;

    let x1 = bbox.x.clamp(0.0, max_x);
    let y1 = bbox.y.clamp(0.0, max_y);
    let x2 = (bbox.x + bbox.width).clamp(0.0, max_x);
    let y2 = (bbox.y + bbox.height).clamp(0.0, max_y);

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;

    Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height)
}

fn clamp_to_i32(value: f32, max_extent: u32) -> i32 {
    if max_extent == 0 {
        return 0;
    }
    value.clamp(0.0, (max_extent - 1) as f32).round() as i32
}
