use anyhow::Result;
use std::cmp::Ordering;
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};

use facelens_utils::config::DetectionSettings;

use crate::detection::{BoundingBox, Detection, Gender, Landmark};

/// Number of columns per fused output row:
/// bbox (4) + landmarks (10) + score (1) + age (1) + male probability (1).
pub const OUTPUT_COLS: usize = 17;

const SCORE_COL: usize = 14;
const AGE_COL: usize = 15;
const MALE_PROB_COL: usize = 16;

/// Parameters controlling how raw model outputs are filtered.
#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// Minimum confidence score for a detection to be considered valid.
    pub score_threshold: f32,
    /// The maximum number of detections to keep after sorting by score.
    pub max_faces: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            max_faces: 100,
        }
    }
}

impl From<DetectionSettings> for PostprocessConfig {
    fn from(settings: DetectionSettings) -> Self {
        PostprocessConfig {
            score_threshold: settings.score_threshold,
            max_faces: settings.max_faces,
        }
    }
}

impl From<&DetectionSettings> for PostprocessConfig {
    fn from(settings: &DetectionSettings) -> Self {
        settings.clone().into()
    }
}

/// Decode the fused model output into filtered detections.
///
/// Each row is
/// `[x, y, w, h, re_x, re_y, le_x, le_y, nt_x, nt_y, rcm_x, rcm_y, lcm_x, lcm_y, score, age, male_prob]`
/// in the model's input coordinate space. This function applies score
/// filtering, coordinate scaling back to the image the caller resized from,
/// and the `max_faces` cap. `male_prob` is the probability that the face is
/// male; the stored `gender_probability` is the probability of the label that
/// was actually picked.
///
/// # Arguments
///
/// * `output` - The raw fused output tensor.
/// * `scale_x` - The horizontal scale factor to map coordinates back.
/// * `scale_y` - The vertical scale factor to map coordinates back.
/// * `config` - The post-processing parameters.
pub fn apply_postprocess(
    output: &Tensor,
    scale_x: f32,
    scale_y: f32,
    config: &PostprocessConfig,
) -> Result<Vec<Detection>> {
    let rows = detection_rows(output)?;

    let mut detections = Vec::with_capacity(rows.nrows());
    for row in rows.rows() {
        let score = row[SCORE_COL];
        if !score.is_finite() || score < config.score_threshold {
            continue;
        }

        let bbox = BoundingBox {
            x: row[0] * scale_x,
            y: row[1] * scale_y,
            width: row[2] * scale_x,
            height: row[3] * scale_y,
        };
        if bbox.width <= 0.0 || bbox.height <= 0.0 {
            continue;
        }

        let landmarks = (0..5)
            .map(|lm| Landmark {
                x: row[4 + lm * 2] * scale_x,
                y: row[5 + lm * 2] * scale_y,
            })
            .collect();

        let age = row[AGE_COL];
        if !age.is_finite() || age < 0.0 {
            continue;
        }

        let male_prob = row[MALE_PROB_COL].clamp(0.0, 1.0);
        let (gender, gender_probability) = if male_prob >= 0.5 {
            (Gender::Male, male_prob)
        } else {
            (Gender::Female, 1.0 - male_prob)
        };

        detections.push(Detection {
            bbox,
            landmarks,
            score,
            age,
            gender,
            gender_probability,
        });
    }

    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    if config.max_faces > 0 && detections.len() > config.max_faces {
        detections.truncate(config.max_faces);
    }

    Ok(detections)
}

/// Extract the detection rows from the model's output tensor.
fn detection_rows<'a>(output: &'a Tensor) -> Result<ArrayView2<'a, f32>> {
    let shape = output.shape();
    let rows = match shape {
        [rows, OUTPUT_COLS] => *rows,
        [1, rows, OUTPUT_COLS] => *rows,
        other => anyhow::bail!(
            "model output must have shape [N, {}] or [1, N, {}] (got {:?})",
            OUTPUT_COLS,
            OUTPUT_COLS,
            other
        ),
    };

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("model output is not f32: {e}"))?;

    ArrayView2::from_shape((rows, OUTPUT_COLS), slice)
        .map_err(|_| anyhow::anyhow!("model output data is not contiguous"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor_from_rows(rows: &[[f32; OUTPUT_COLS]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_shape(&[rows.len(), OUTPUT_COLS], &flat).unwrap()
    }

    fn row(score: f32, age: f32, male_prob: f32) -> [f32; OUTPUT_COLS] {
        let mut row = [0.0f32; OUTPUT_COLS];
        row[0] = 10.0;
        row[1] = 20.0;
        row[2] = 30.0;
        row[3] = 40.0;
        for lm in 0..5 {
            row[4 + lm * 2] = 12.0 + lm as f32;
            row[5 + lm * 2] = 22.0 + lm as f32;
        }
        row[SCORE_COL] = score;
        row[AGE_COL] = age;
        row[MALE_PROB_COL] = male_prob;
        row
    }

    #[test]
    fn filters_by_score_and_scales_coordinates() {
        let tensor = tensor_from_rows(&[row(0.95, 34.2, 0.9), row(0.2, 28.0, 0.4)]);

        let detections = apply_postprocess(
            &tensor,
            2.0,
            0.5,
            &PostprocessConfig {
                score_threshold: 0.3,
                ..Default::default()
            },
        )
        .expect("postprocess should succeed");

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.score, 0.95);
        assert!((det.bbox.x - 20.0).abs() < f32::EPSILON);
        assert!((det.bbox.y - 10.0).abs() < f32::EPSILON);
        assert!((det.bbox.width - 60.0).abs() < f32::EPSILON);
        assert!((det.bbox.height - 20.0).abs() < f32::EPSILON);
        assert_eq!(det.landmarks.len(), 5);
        assert!((det.landmarks[0].x - 24.0).abs() < f32::EPSILON);
        assert!((det.landmarks[0].y - 11.0).abs() < f32::EPSILON);
        assert!((det.age - 34.2).abs() < f32::EPSILON);
    }

    #[test]
    fn picks_gender_label_from_male_probability() {
        let tensor = tensor_from_rows(&[row(0.9, 25.0, 0.8), row(0.9, 25.0, 0.3)]);

        let detections = apply_postprocess(&tensor, 1.0, 1.0, &PostprocessConfig::default())
            .expect("postprocess should succeed");

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].gender, Gender::Male);
        assert!((detections[0].gender_probability - 0.8).abs() < f32::EPSILON);
        assert_eq!(detections[1].gender, Gender::Female);
        assert!((detections[1].gender_probability - 0.7).abs() < 1e-6);
    }

    #[test]
    fn caps_detections_at_max_faces() {
        let rows: Vec<[f32; OUTPUT_COLS]> = (0..6)
            .map(|i| row(0.5 + i as f32 * 0.05, 30.0, 0.9))
            .collect();
        let tensor = tensor_from_rows(&rows);

        let detections = apply_postprocess(
            &tensor,
            1.0,
            1.0,
            &PostprocessConfig {
                score_threshold: 0.3,
                max_faces: 3,
            },
        )
        .expect("postprocess should succeed");

        assert_eq!(detections.len(), 3);
        // Highest scores first.
        assert!(detections[0].score >= detections[1].score);
        assert!(detections[1].score >= detections[2].score);
    }

    #[test]
    fn handles_batched_output_shape() {
        let flat: Vec<f32> = row(0.95, 30.0, 0.6).to_vec();
        let tensor = Tensor::from_shape(&[1, 1, OUTPUT_COLS], &flat).unwrap();

        let detections = apply_postprocess(&tensor, 1.0, 1.0, &PostprocessConfig::default())
            .expect("postprocess should succeed");
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn rejects_unexpected_column_count() {
        let tensor = Tensor::from_shape(&[1, 15], &[0.0f32; 15]).unwrap();
        assert!(apply_postprocess(&tensor, 1.0, 1.0, &PostprocessConfig::default()).is_err());
    }
}
