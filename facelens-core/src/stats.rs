use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::RefinedFace;

/// Summary statistics for one analysis, computed fresh per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    /// Number of refined faces.
    pub total_faces: usize,
    /// Mean of per-face combined confidences, rounded; 0 when no faces.
    pub average_confidence: u32,
    /// Elapsed wall time formatted as seconds with one decimal, e.g. `"1.4s"`.
    pub processing_time: String,
    /// Original image size formatted `"{width}x{height}"`.
    pub image_size: String,
}

/// Aggregate stats over the refined faces of one image.
///
/// The per-face combined confidence is the rounded mean of age and gender
/// confidence; the average is the rounded mean of those. An empty face list
/// yields 0, never NaN.
pub fn aggregate(faces: &[RefinedFace], elapsed: Duration, image_size: (u32, u32)) -> AnalysisStats {
    let average_confidence = if faces.is_empty() {
        0
    } else {
        let sum: f32 = faces
            .iter()
            .map(|face| ((face.age_confidence + face.gender_confidence) / 2.0).round())
            .sum();
        (sum / faces.len() as f32).round() as u32
    };

    AnalysisStats {
        total_faces: faces.len(),
        average_confidence,
        processing_time: format_elapsed(elapsed),
        image_size: format_size(image_size),
    }
}

/// Format elapsed time as seconds with one decimal.
///
/// Ties round half away from zero, so 250 ms reads `"0.3s"`. `{:.1}`
/// formatting alone rounds half-to-even and would print `"0.2s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let tenths = (elapsed.as_secs_f32() * 10.0).round() / 10.0;
    format!("{tenths:.1}s")
}

/// Format image dimensions as `"{width}x{height}"`.
pub fn format_size((width, height): (u32, u32)) -> String {
    format!("{width}x{height}")
}
