use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, imageops::FilterType};
use log::{debug, warn};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact, TypedOp, tvec,
};

use facelens_utils::image_utils::{compute_resize_scales, resize_image, rgb_to_chw};

use crate::adapter::FaceModel;
use crate::detection::Detection;
use crate::postprocess::{PostprocessConfig, apply_postprocess};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Fixed spatial input resolution of the fused analysis network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
        }
    }
}

/// Wrapper around the fused face-analysis ONNX runnable model.
///
/// The network emits one tensor of shape `[N, 17]`: bounding box, five
/// landmarks, detection score, age estimate, and male probability per row.
/// This struct handles loading the graph, preparing it for execution, and
/// turning images into filtered [`Detection`]s.
#[derive(Debug)]
pub struct OnnxFaceModel {
    runnable: RunnableModel,
    input_size: InputSize,
    postprocess: PostprocessConfig,
}

impl OnnxFaceModel {
    /// Load and optimize the ONNX graph.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_size: InputSize,
        postprocess: PostprocessConfig,
    ) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());

        let runnable = match load_runnable_model(path, true) {
            Ok(model) => {
                debug!(
                    "analysis model {} optimized successfully ({}x{})",
                    path.display(),
                    input_size.width,
                    input_size.height
                );
                model
            }
            Err(opt_err) => {
                let optimize_msg = format!("{opt_err}");
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "analysis model {} failed optimized load ({}); falling back to decluttered graph (~2x slower).\nError chain:\n{}",
                    path.display(),
                    optimize_msg,
                    chain_msg.trim_end()
                );
                let decluttered = load_runnable_model(path, false).with_context(|| {
                    format!(
                        "fallback to decluttered analysis graph failed after optimize error: {optimize_msg}"
                    )
                })?;
                debug!(
                    "analysis model {} running in decluttered mode",
                    path.display()
                );
                decluttered
            }
        };

        Ok(Self {
            runnable,
            input_size,
            postprocess,
        })
    }

    /// Execute the network with a preprocessed tensor and return the fused
    /// `[N, 17]` output.
    pub fn run(&self, input: Tensor) -> Result<Tensor> {
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("model execution failed: {e}"))?;

        let mut tensors: Vec<Tensor> = outputs
            .into_iter()
            .map(|value| value.into_tensor())
            .collect();

        match tensors.len() {
            1 => Ok(tensors
                .pop()
                .ok_or_else(|| anyhow::anyhow!("model produced no outputs"))?),
            other => anyhow::bail!("expected a single fused output tensor, got {}", other),
        }
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    /// Resize an image to the network's input resolution and build the
    /// `[1, 3, H, W]` float tensor it expects.
    fn preprocess(&self, image: &DynamicImage) -> Result<(Tensor, f32, f32)> {
        let (orig_w, orig_h) = (image.width(), image.height());
        anyhow::ensure!(
            orig_w > 0 && orig_h > 0,
            "source image dimensions must be greater than zero"
        );

        let input_w = self.input_size.width;
        let input_h = self.input_size.height;
        let resized = if orig_w == input_w && orig_h == input_h {
            image.to_rgb8()
        } else {
            resize_image(image, input_w, input_h, FilterType::Triangle)
        };

        let chw = rgb_to_chw(&resized);
        let shape = [1usize, 3, input_h as usize, input_w as usize];
        let (data, offset) = chw.into_raw_vec_and_offset();
        debug_assert_eq!(offset, Some(0), "expected contiguous array");
        let tensor = Tensor::from_shape(&shape, &data)
            .map_err(|e| anyhow::anyhow!("failed to build input tensor: {e}"))?;

        let (scale_x, scale_y) = compute_resize_scales((orig_w, orig_h), (input_w, input_h))?;
        Ok((tensor, scale_x, scale_y))
    }
}

impl FaceModel for OnnxFaceModel {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (tensor, scale_x, scale_y) = self.preprocess(image)?;
        let output = self.run(tensor)?;
        apply_postprocess(&output, scale_x, scale_y, &self.postprocess)
    }

    fn detect_one(&self, crop: &DynamicImage) -> Result<Option<Detection>> {
        let mut detections = self.detect(crop)?;
        if detections.is_empty() {
            return Ok(None);
        }
        // `detect` sorts by descending score.
        Ok(Some(detections.swap_remove(0)))
    }
}

fn load_runnable_model(path: &Path, optimized: bool) -> Result<RunnableModel> {
    // Load the model and let it infer shape from the ONNX file. The declared
    // input shape must match what `preprocess` produces.
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize analysis graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make analysis graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check analysis graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter analysis graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make analysis graph runnable: {e}"))
    }
}
