pub mod onnx;

use image::{GrayImage, RgbImage};

use crate::error::PipelineError;
use crate::models::ProbabilityMap;

/// Side length of the square input the segmentation model expects.
pub const SEGMENTATION_INPUT_SIZE: u32 = 256;

/// Side length of the square input the digit classifier expects.
pub const DIGIT_INPUT_SIZE: u32 = 64;

/// Digit classes 0-9.
pub const NUM_CLASSES: usize = 10;

/// Capability boundary around the foreground segmentation model. The input
/// is an RGB image already resized to `input_size()` squared; the output is
/// a probability map at the same resolution.
///
/// Implementations are shared read-only across concurrent pipeline runs and
/// must never mutate internal state in `predict`.
pub trait SegmentationModel: Send + Sync {
    fn input_size(&self) -> u32 {
        SEGMENTATION_INPUT_SIZE
    }

    fn predict(&self, image: &RgbImage) -> Result<ProbabilityMap, PipelineError>;
}

/// Capability boundary around the digit classification model. The input is
/// one normalized grayscale digit image of `input_size()` squared; the
/// output is a 10-way probability distribution summing to 1 (up to
/// floating-point tolerance).
///
/// `channels()` reports the channel count the underlying model declares.
/// Single-channel models receive the grayscale plane directly; for
/// triple-channel models the implementation replicates it.
pub trait DigitClassifier: Send + Sync {
    fn input_size(&self) -> u32 {
        DIGIT_INPUT_SIZE
    }

    fn channels(&self) -> u32 {
        3
    }

    fn predict(&self, digit: &GrayImage) -> Result<[f32; NUM_CLASSES], PipelineError>;
}

/// Predicted label and its confidence: the index and value of the maximum
/// probability. Ties resolve to the lowest index.
pub fn argmax(probabilities: &[f32; NUM_CLASSES]) -> (u8, f32) {
    let mut best = 0usize;
    for (i, &p) in probabilities.iter().enumerate() {
        if p > probabilities[best] {
            best = i;
        }
    }
    (best as u8, probabilities[best])
}
