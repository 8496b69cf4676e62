//! tract-onnx backed implementations of the model ports.
//!
//! Both models originate from a Keras export, so tensors are laid out NHWC
//! and the input facts are pinned to the batch-1 shapes the pipeline feeds.

use std::path::Path;

use image::{GrayImage, RgbImage};
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;
use tract_onnx::tract_hir::internal::DimLike;

use crate::error::{ModelError, PipelineError};
use crate::inference::{DigitClassifier, NUM_CLASSES, SegmentationModel};
use crate::models::ProbabilityMap;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

fn load_plan(path: &Path, shape: TVec<usize>) -> Result<OnnxPlan, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }
    let load = |e: TractError| ModelError::Load(format!("{}: {e}", path.display()));
    tract_onnx::onnx()
        .model_for_path(path)
        .map_err(load)?
        .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape))
        .map_err(load)?
        .into_optimized()
        .map_err(load)?
        .into_runnable()
        .map_err(load)
}

/// Channel count from the model's declared input shape (NHWC, last axis).
/// `None` when the shape is symbolic or not rank 4.
fn declared_channels(path: &Path) -> Result<Option<usize>, ModelError> {
    let load = |e: TractError| ModelError::Load(format!("{}: {e}", path.display()));
    let model = tract_onnx::onnx().model_for_path(path).map_err(load)?;
    let fact = model.input_fact(0).map_err(load)?;
    let Some(dims) = fact.shape.concretize() else {
        return Ok(None);
    };
    if dims.len() != 4 {
        return Ok(None);
    }
    Ok(dims[3].to_usize().ok())
}

fn inference_failure(e: TractError) -> PipelineError {
    PipelineError::Inference(e.to_string())
}

/// U-Net style foreground segmenter: RGB input, single-plane probability
/// output at the same resolution.
#[derive(Debug)]
pub struct OnnxSegmentation {
    plan: OnnxPlan,
    input_size: u32,
}

impl OnnxSegmentation {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, ModelError> {
        let n = input_size as usize;
        let plan = load_plan(path, tvec!(1, n, n, 3))?;
        Ok(Self { plan, input_size })
    }
}

impl SegmentationModel for OnnxSegmentation {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&self, image: &RgbImage) -> Result<ProbabilityMap, PipelineError> {
        let n = self.input_size as usize;
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, n, n, 3), |(_, y, x, c)| {
                image[(x as u32, y as u32)][c] as f32 / 255.0
            })
            .into();
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(inference_failure)?;
        let view = outputs[0].to_array_view::<f32>().map_err(inference_failure)?;
        if view.len() != n * n {
            return Err(PipelineError::Inference(format!(
                "segmentation output has {} values, expected {}",
                view.len(),
                n * n
            )));
        }
        let data: Vec<f32> = view.iter().copied().collect();
        ProbabilityMap::new(self.input_size, self.input_size, data).ok_or_else(|| {
            PipelineError::Inference("segmentation output shape mismatch".into())
        })
    }
}

/// 10-class digit classifier. The channel count is read from the model's
/// declared input shape; grayscale input is replicated for 3-channel models.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    input_size: u32,
    channels: u32,
}

impl OnnxClassifier {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, ModelError> {
        let channels = declared_channels(path)?.unwrap_or(3);
        let n = input_size as usize;
        let plan = load_plan(path, tvec!(1, n, n, channels))?;
        Ok(Self {
            plan,
            input_size,
            channels: channels as u32,
        })
    }
}

impl DigitClassifier for OnnxClassifier {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn channels(&self) -> u32 {
        self.channels
    }

    fn predict(&self, digit: &GrayImage) -> Result<[f32; NUM_CLASSES], PipelineError> {
        let n = self.input_size as usize;
        let c = self.channels as usize;
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, n, n, c), |(_, y, x, _)| {
                digit[(x as u32, y as u32)][0] as f32 / 255.0
            })
            .into();
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(inference_failure)?;
        let view = outputs[0].to_array_view::<f32>().map_err(inference_failure)?;
        if view.len() != NUM_CLASSES {
            return Err(PipelineError::Inference(format!(
                "classifier output has {} values, expected {NUM_CLASSES}",
                view.len()
            )));
        }
        let mut probabilities = [0f32; NUM_CLASSES];
        for (slot, value) in probabilities.iter_mut().zip(view.iter()) {
            *slot = *value;
        }
        Ok(probabilities)
    }
}
