//! Value types flowing through the analysis pipeline.
//!
//! A [`Detection`] is the raw model output for one face, expressed in the
//! coordinate space of whatever image the model ran on. A [`RefinedFace`] is
//! the finished article: ensemble-averaged age/gender attached to the initial
//! detection's geometry, remapped to original-image pixel space. Pipeline
//! stages never mutate these in place; each stage produces new values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The x-coordinate of the top-left corner.
    pub x: f32,
    /// The y-coordinate of the top-left corner.
    pub y: f32,
    /// The width of the box.
    pub width: f32,
    /// The height of the box.
    pub height: f32,
}

impl BoundingBox {
    /// Return a copy with every coordinate multiplied by the given per-axis factors.
    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x: self.x * scale_x,
            y: self.y * scale_y,
            width: self.width * scale_x,
            height: self.height * scale_y,
        }
    }
}

/// Facial landmark coordinate (x, y) in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// The x-coordinate of the landmark.
    pub x: f32,
    /// The y-coordinate of the landmark.
    pub y: f32,
}

impl Landmark {
    /// Return a copy with both coordinates multiplied by the given per-axis factors.
    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x: self.x * scale_x,
            y: self.y * scale_y,
        }
    }
}

/// Predicted gender label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// One raw model result: geometry, detection score, and age/gender estimates.
///
/// Coordinates are in the space of the image the model ran on.
/// `gender_probability` is the probability of the *predicted* label, so it is
/// always in `[0.5, 1.0]` for a well-formed row.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// The bounding box of the detected face.
    pub bbox: BoundingBox,
    /// Five facial landmarks (right eye, left eye, nose tip, right mouth
    /// corner, left mouth corner).
    pub landmarks: Vec<Landmark>,
    /// The confidence score of the detection.
    pub score: f32,
    /// Estimated age in years.
    pub age: f32,
    /// Predicted gender label.
    pub gender: Gender,
    /// Probability of the predicted gender label, 0..=1.
    pub gender_probability: f32,
}

/// A face after ensemble refinement, in original-image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedFace {
    /// Opaque per-face identifier (UUID v4).
    pub id: String,
    /// Bounding box carried from the initial detection.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Ensemble-averaged age, rounded to a whole number of years.
    pub age: f32,
    /// Heuristic age confidence percentage, 70..=95.
    pub age_confidence: f32,
    /// Gender label from the first crop that produced a detection.
    pub gender: Gender,
    /// Averaged gender probability as a rounded percentage.
    pub gender_confidence: f32,
    /// Landmarks carried from the initial detection, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<Landmark>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refined_face_serializes_camel_case() {
        let face = RefinedFace {
            id: "abc".into(),
            bbox: BoundingBox {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
            },
            age: 30.0,
            age_confidence: 90.0,
            gender: Gender::Female,
            gender_confidence: 80.0,
            landmarks: None,
        };

        let value = serde_json::to_value(&face).expect("serialize");
        assert_eq!(value["box"]["width"], 3.0);
        assert_eq!(value["ageConfidence"], 90.0);
        assert_eq!(value["gender"], "female");
        assert_eq!(value["genderConfidence"], 80.0);
        assert!(value.get("landmarks").is_none());
    }

    #[test]
    fn bounding_box_scaled_applies_both_axes() {
        let bbox = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        };
        let scaled = bbox.scaled(2.0, 0.5);
        assert_eq!(scaled.x, 20.0);
        assert_eq!(scaled.y, 10.0);
        assert_eq!(scaled.width, 60.0);
        assert_eq!(scaled.height, 20.0);
    }
}
