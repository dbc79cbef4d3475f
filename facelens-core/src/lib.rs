//! Core FaceLens analysis primitives.
//!
//! This crate loads the fused face-analysis ONNX model, runs inference with
//! `tract-onnx`, and provides the ensemble refiner, coordinate rescaler,
//! stats aggregator, and overlay renderer.

/// The `FaceModel` trait and the end-to-end analysis pipeline.
pub mod adapter;
/// Value types for detections and refined faces.
pub mod detection;
/// ONNX model loading and execution.
pub mod model;
/// Annotated overlay rendering.
pub mod overlay;
/// Fused-output decoding (score filtering, gender labeling, face cap).
pub mod postprocess;
/// Multi-crop ensemble refinement of age/gender estimates.
pub mod refine;
/// Canvas/original/display coordinate remapping.
pub mod rescale;
/// Per-analysis summary statistics.
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{FaceAnalyzer, FaceModel, ImageAnalysis};
pub use detection::{BoundingBox, Detection, Gender, Landmark, RefinedFace};
pub use model::{InputSize, OnnxFaceModel};
pub use overlay::render_overlay;
pub use postprocess::{PostprocessConfig, apply_postprocess};
pub use refine::{PADDING_FRACTIONS, RefinedEstimate, age_confidence, refine_detection};
pub use rescale::{DetectionCanvas, display_scales, to_display_box, upscale_factor};
pub use stats::{AnalysisStats, aggregate};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
