//! The analysis pipeline: detect on the canvas, refine each face, remap to
//! original coordinates, aggregate stats.

use std::time::Instant;

use anyhow::Result;
use image::DynamicImage;
use log::debug;
use uuid::Uuid;

use facelens_utils::{config::DetectionSettings, timing_guard};

use crate::detection::{Detection, RefinedFace};
use crate::refine::refine_detection;
use crate::rescale::DetectionCanvas;
use crate::stats::{self, AnalysisStats};

/// Abstraction over the face-analysis model.
///
/// Implemented by the ONNX adapter in production and by a scripted stub in
/// tests. Detections come back in the coordinate space of the image passed in.
pub trait FaceModel: Send + Sync {
    /// Detect every face in an image.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// Detect the highest-scoring face in a crop, or `None` when the crop
    /// yields nothing.
    fn detect_one(&self, crop: &DynamicImage) -> Result<Option<Detection>>;
}

/// The complete result of analyzing one image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    /// Source file name.
    pub image_file_name: String,
    /// Original image width in pixels.
    pub width: u32,
    /// Original image height in pixels.
    pub height: u32,
    /// Refined faces in original-image pixel space.
    pub faces: Vec<RefinedFace>,
    /// Summary statistics for this run.
    pub stats: AnalysisStats,
}

/// Couples a [`FaceModel`] with detection settings and runs the pipeline.
pub struct FaceAnalyzer {
    model: Box<dyn FaceModel>,
    settings: DetectionSettings,
}

impl FaceAnalyzer {
    pub fn new(model: Box<dyn FaceModel>, settings: DetectionSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Analyze one image: prepare the detection canvas, detect, refine each
    /// face sequentially, and remap everything to original pixel space.
    pub fn analyze(&self, image: &DynamicImage, file_name: &str) -> Result<ImageAnalysis> {
        let started = Instant::now();

        let canvas = DetectionCanvas::prepare(image, self.settings.target_width);

        let detections = {
            let _guard = timing_guard("facelens_core::detect", log::Level::Debug);
            self.model.detect(&canvas.image)?
        };
        debug!(
            "{}: {} detections on a {:.2}x canvas",
            file_name,
            detections.len(),
            canvas.factor
        );

        let faces = {
            let _guard = timing_guard("facelens_core::refine", log::Level::Debug);
            detections
                .iter()
                .map(|detection| self.refine_one(&canvas, detection))
                .collect::<Result<Vec<_>>>()?
        };

        let stats = stats::aggregate(&faces, started.elapsed(), canvas.original_size);

        Ok(ImageAnalysis {
            image_file_name: file_name.to_string(),
            width: canvas.original_size.0,
            height: canvas.original_size.1,
            faces,
            stats,
        })
    }

    fn refine_one(&self, canvas: &DetectionCanvas, detection: &Detection) -> Result<RefinedFace> {
        let estimate = refine_detection(self.model.as_ref(), &canvas.image, detection)?;

        Ok(RefinedFace {
            id: Uuid::new_v4().to_string(),
            bbox: canvas.to_original_box(&detection.bbox),
            age: estimate.age,
            age_confidence: estimate.age_confidence,
            gender: estimate.gender,
            gender_confidence: estimate.gender_confidence,
            landmarks: Some(canvas.to_original_landmarks(&detection.landmarks)),
        })
    }
}
