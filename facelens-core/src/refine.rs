//! Multi-crop ensemble refinement of age and gender estimates.
//!
//! The initial detection's crop is re-run through the model at three padding
//! levels; age and gender probability are averaged over the crops that
//! produced a detection. The geometry of the output always comes from the
//! initial detection, never from a crop.

use anyhow::Result;
use image::DynamicImage;
use log::trace;

use crate::adapter::FaceModel;
use crate::detection::{BoundingBox, Detection, Gender};

/// Padding fractions applied per side, as a fraction of the box dimension.
pub const PADDING_FRACTIONS: [f32; 3] = [0.10, 0.25, 0.45];

/// Age and gender values produced by the ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedEstimate {
    /// Mean age over valid crops, rounded to whole years.
    pub age: f32,
    /// Heuristic age confidence percentage, 70..=95.
    pub age_confidence: f32,
    /// Label from the first crop that produced a detection.
    pub gender: Gender,
    /// Mean gender probability over valid crops as a rounded percentage.
    pub gender_confidence: f32,
}

/// Integer crop rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Expand a face box outward by `padding * dimension` per side and clamp the
/// result to the canvas bounds. Returns `None` when the clamped rectangle is
/// degenerate.
pub fn padded_crop_region(
    bbox: &BoundingBox,
    padding: f32,
    canvas_width: u32,
    canvas_height: u32,
) -> Option<CropRegion> {
    if canvas_width == 0 || canvas_height == 0 {
        return None;
    }

    let pad_x = padding * bbox.width;
    let pad_y = padding * bbox.height;

    let x0 = (bbox.x - pad_x).max(0.0).floor();
    let y0 = (bbox.y - pad_y).max(0.0).floor();
    let x1 = (bbox.x + bbox.width + pad_x).min(canvas_width as f32).ceil();
    let y1 = (bbox.y + bbox.height + pad_y)
        .min(canvas_height as f32)
        .ceil();

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(CropRegion {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Run the ensemble for one detection.
///
/// Crops are evaluated sequentially; a crop the model finds nothing in is
/// discarded rather than counted as zero. When every crop comes back empty
/// the initial detection's own estimates are used unchanged.
pub fn refine_detection(
    model: &dyn FaceModel,
    canvas: &DynamicImage,
    detection: &Detection,
) -> Result<RefinedEstimate> {
    let mut ages: Vec<f32> = Vec::with_capacity(PADDING_FRACTIONS.len());
    let mut probabilities: Vec<f32> = Vec::with_capacity(PADDING_FRACTIONS.len());
    let mut label: Option<Gender> = None;

    for &padding in PADDING_FRACTIONS.iter() {
        let Some(region) =
            padded_crop_region(&detection.bbox, padding, canvas.width(), canvas.height())
        else {
            trace!("skipping degenerate crop at padding {padding}");
            continue;
        };

        let crop = canvas.crop_imm(region.x, region.y, region.width, region.height);
        match model.detect_one(&crop)? {
            Some(found) => {
                ages.push(found.age);
                probabilities.push(found.gender_probability);
                if label.is_none() {
                    label = Some(found.gender);
                }
            }
            None => trace!("no face in crop at padding {padding}"),
        }
    }

    if ages.is_empty() {
        let age = detection.age.round();
        return Ok(RefinedEstimate {
            age,
            age_confidence: age_confidence(age),
            gender: detection.gender,
            gender_confidence: (detection.gender_probability * 100.0).round(),
        });
    }

    let age = (ages.iter().sum::<f32>() / ages.len() as f32).round();
    let mean_probability = probabilities.iter().sum::<f32>() / probabilities.len() as f32;

    Ok(RefinedEstimate {
        age,
        age_confidence: age_confidence(age),
        gender: label.unwrap_or(detection.gender),
        gender_confidence: (mean_probability * 100.0).round(),
    })
}

/// Presentation heuristic: confidence peaks at 90 for age 30 and decays half
/// a point per year of distance, bounded to `[70, 95]`.
pub fn age_confidence(age: f32) -> f32 {
    (90.0 - 0.5 * (age - 30.0).abs()).clamp(70.0, 95.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubModel, detection_with};

    fn canvas() -> DynamicImage {
        DynamicImage::new_rgb8(400, 300)
    }

    fn initial() -> Detection {
        detection_with(100.0, 80.0, 60.0, 70.0, 33.7, Gender::Female, 0.62)
    }

    #[test]
    fn averages_ages_and_probabilities() {
        let model = StubModel::with_crops(vec![
            Some(detection_with(0.0, 0.0, 10.0, 10.0, 20.0, Gender::Male, 0.8)),
            Some(detection_with(0.0, 0.0, 10.0, 10.0, 30.0, Gender::Female, 0.9)),
            Some(detection_with(0.0, 0.0, 10.0, 10.0, 40.0, Gender::Female, 0.7)),
        ]);

        let refined = refine_detection(&model, &canvas(), &initial()).expect("refine");
        assert_eq!(refined.age, 30.0);
        assert_eq!(refined.gender_confidence, 80.0);
        // Label comes from the first valid crop, not the majority.
        assert_eq!(refined.gender, Gender::Male);
        assert_eq!(refined.age_confidence, 90.0);
    }

    #[test]
    fn discards_empty_crops_instead_of_zeroing() {
        let model = StubModel::with_crops(vec![
            None,
            Some(detection_with(0.0, 0.0, 10.0, 10.0, 24.0, Gender::Female, 0.9)),
            None,
        ]);

        let refined = refine_detection(&model, &canvas(), &initial()).expect("refine");
        assert_eq!(refined.age, 24.0);
        assert_eq!(refined.gender, Gender::Female);
        assert_eq!(refined.gender_confidence, 90.0);
    }

    #[test]
    fn falls_back_to_initial_when_all_crops_fail() {
        let model = StubModel::with_crops(vec![None, None, None]);

        let refined = refine_detection(&model, &canvas(), &initial()).expect("refine");
        assert_eq!(refined.age, 34.0);
        assert_eq!(refined.gender, Gender::Female);
        assert_eq!(refined.gender_confidence, 62.0);
        assert_eq!(refined.age_confidence, age_confidence(34.0));
    }

    #[test]
    fn age_confidence_matches_curve() {
        assert_eq!(age_confidence(30.0), 90.0);
        assert_eq!(age_confidence(90.0), 70.0);
        assert_eq!(age_confidence(0.0), 75.0);
        for age in [-50.0, 0.0, 10.0, 30.0, 64.0, 120.0, 400.0] {
            let c = age_confidence(age);
            assert!((70.0..=95.0).contains(&c), "out of range for age {age}: {c}");
        }
    }

    #[test]
    fn crop_region_clamps_to_canvas() {
        let bbox = BoundingBox {
            x: -10.0,
            y: 5.0,
            width: 50.0,
            height: 40.0,
        };
        let region = padded_crop_region(&bbox, 0.25, 100, 60).expect("region");
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert!(region.x + region.width <= 100);
        assert!(region.y + region.height <= 60);
    }

    #[test]
    fn crop_region_rejects_degenerate_boxes() {
        let bbox = BoundingBox {
            x: 500.0,
            y: 500.0,
            width: 10.0,
            height: 10.0,
        };
        // Entirely outside the canvas.
        assert!(padded_crop_region(&bbox, 0.10, 100, 100).is_none());
        assert!(padded_crop_region(&bbox, 0.10, 0, 100).is_none());
    }
}
