//! Deterministic model stub shared by pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use image::DynamicImage;

use crate::adapter::FaceModel;
use crate::detection::{BoundingBox, Detection, Gender, Landmark};

/// Scripted stand-in for the ONNX model.
///
/// `detect` always returns the configured full-image detections; `detect_one`
/// pops scripted crop responses in order and returns `None` once exhausted.
pub struct StubModel {
    detections: Vec<Detection>,
    crops: Mutex<VecDeque<Option<Detection>>>,
}

impl StubModel {
    pub fn with_crops(crops: Vec<Option<Detection>>) -> Self {
        Self {
            detections: Vec::new(),
            crops: Mutex::new(crops.into()),
        }
    }

    pub fn with_detections(detections: Vec<Detection>, crops: Vec<Option<Detection>>) -> Self {
        Self {
            detections,
            crops: Mutex::new(crops.into()),
        }
    }
}

impl FaceModel for StubModel {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn detect_one(&self, _crop: &DynamicImage) -> Result<Option<Detection>> {
        let mut crops = self.crops.lock().expect("stub lock");
        Ok(crops.pop_front().flatten())
    }
}

/// Build a detection with five landmarks placed inside the box.
pub fn detection_with(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    age: f32,
    gender: Gender,
    gender_probability: f32,
) -> Detection {
    let landmarks = (0..5)
        .map(|i| Landmark {
            x: x + width * (0.2 + 0.1 * i as f32),
            y: y + height * 0.4,
        })
        .collect();

    Detection {
        bbox: BoundingBox {
            x,
            y,
            width,
            height,
        },
        landmarks,
        score: 0.9,
        age,
        gender,
        gender_probability,
    }
}
