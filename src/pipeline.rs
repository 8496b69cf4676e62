//! The linear per-request pipeline: decode, segment, clean the mask,
//! extract the ROI, split into digits, classify, aggregate.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbImage, imageops};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::codec;
use crate::error::PipelineError;
use crate::inference::{DigitClassifier, NUM_CLASSES, SegmentationModel, argmax};
use crate::models::{BoundingBox, DigitPrediction, MeterReading};
use crate::processing::{digits, mask, normalize, roi};

/// Pipeline knobs, fixed at process start. Model input sizes come from the
/// ports themselves, not from here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Probability above which a pixel counts as foreground.
    pub mask_threshold: f32,
    /// Register length; the pipeline always emits exactly this many digits.
    pub num_digits: usize,
    /// Zero background pixels inside the ROI before cropping.
    pub mask_background: bool,
    /// Grayscale value below which a pixel counts as ink.
    pub ink_threshold: u8,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            mask_threshold: 0.3,
            num_digits: digits::NUM_DIGITS,
            mask_background: true,
            ink_threshold: digits::INK_THRESHOLD,
        }
    }
}

/// Success output of [`MeterReader::read_bytes_detailed`]: the reading plus
/// the side artifacts a caller may want for display or debugging.
#[derive(Debug)]
pub struct ReadingDetail {
    pub reading: MeterReading,
    /// Full per-digit class distributions, slice order.
    pub probabilities: Vec<[f32; NUM_CLASSES]>,
    /// Foreground bounding box in original-image coordinates.
    pub bounding_box: BoundingBox,
}

/// Orchestrates one sequential pipeline run per request. The models are
/// shared read-only, so a single reader serves concurrent callers through
/// `&self`.
pub struct MeterReader {
    segmentation: Arc<dyn SegmentationModel>,
    classifier: Arc<dyn DigitClassifier>,
    config: MeterConfig,
    debug_dir: Option<PathBuf>,
}

impl MeterReader {
    pub fn new(
        segmentation: Arc<dyn SegmentationModel>,
        classifier: Arc<dyn DigitClassifier>,
        config: MeterConfig,
    ) -> Self {
        debug!(
            segmentation_input = segmentation.input_size(),
            digit_input = classifier.input_size(),
            digit_channels = classifier.channels(),
            "pipeline models ready"
        );
        Self {
            segmentation,
            classifier,
            config,
            debug_dir: None,
        }
    }

    /// Save intermediate artifacts (cleaned mask, ROI, normalized digit
    /// crops) as PNGs under `dir`. Side outputs only; artifact failures are
    /// logged and never fail the reading.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Read a meter photograph from raw bytes.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<MeterReading, PipelineError> {
        self.read_bytes_detailed(bytes).map(|d| d.reading)
    }

    pub fn read_bytes_detailed(&self, bytes: &[u8]) -> Result<ReadingDetail, PipelineError> {
        let image = codec::decode(bytes)?;
        self.read_image_detailed(&image)
    }

    /// Read from an already-decoded RGB image.
    pub fn read_image(&self, image: &RgbImage) -> Result<MeterReading, PipelineError> {
        self.read_image_detailed(image).map(|d| d.reading)
    }

    pub fn read_image_detailed(&self, image: &RgbImage) -> Result<ReadingDetail, PipelineError> {
        let (width, height) = image.dimensions();
        debug!(width, height, "decoded input image");

        let seg_size = self.segmentation.input_size();
        let seg_input = imageops::resize(image, seg_size, seg_size, imageops::FilterType::Triangle);
        let map = self.segmentation.predict(&seg_input)?;

        let cleaned = mask::clean_mask(&map, width, height, self.config.mask_threshold);
        self.save_artifact("mask.png", &DynamicImage::ImageLuma8(cleaned.clone()));

        let (roi_image, bounding_box) =
            roi::extract_roi(image, &cleaned, self.config.mask_background)?;
        debug!(
            x_min = bounding_box.x_min,
            x_max = bounding_box.x_max,
            y_min = bounding_box.y_min,
            y_max = bounding_box.y_max,
            "extracted region of interest"
        );
        self.save_artifact("roi.png", &DynamicImage::ImageRgb8(roi_image.clone()));

        let slices = digits::split_fixed(&roi_image, self.config.num_digits, self.config.ink_threshold);

        let mut predictions = Vec::with_capacity(slices.len());
        let mut probabilities = Vec::with_capacity(slices.len());
        for (index, slice) in slices.iter().enumerate() {
            let normalized = normalize::normalize_digit(&slice.image, self.classifier.input_size());
            self.save_digit_artifact(index, &normalized);
            let probs = self.classifier.predict(&normalized)?;
            let (label, confidence) = argmax(&probs);
            debug!(index, label, confidence, "classified digit slice");
            predictions.push(DigitPrediction { label, confidence });
            probabilities.push(probs);
        }

        let reading = MeterReading::from_predictions(&predictions);
        debug!(value = %reading.value, average = reading.overall.average, "aggregated reading");
        Ok(ReadingDetail {
            reading,
            probabilities,
            bounding_box,
        })
    }

    fn save_digit_artifact(&self, index: usize, digit: &GrayImage) {
        self.save_artifact(
            &format!("digit_{index:02}.png"),
            &DynamicImage::ImageLuma8(digit.clone()),
        );
    }

    fn save_artifact(&self, name: &str, image: &DynamicImage) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        if let Err(e) = write_artifact(dir, name, image) {
            warn!(name, error = %e, "failed to save debug artifact");
        }
    }
}

fn write_artifact(dir: &Path, name: &str, image: &DynamicImage) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)?;
    let bytes = codec::encode_png(image)?;
    fs::write(dir.join(name), bytes)?;
    Ok(())
}
