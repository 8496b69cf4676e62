//! Builds labeled digit samples from a folder of cropped meter-register
//! images, using the contour-validated segmentation policy.
//!
//! Ground truth comes from the filename: `..._value_<a>_<b>.<ext>` encodes
//! the reading `a` followed by `b`, left-padded with zeros to the register
//! length. A sample whose contour count disagrees with its label is skipped
//! and logged, never partially emitted.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, imageops};
use tracing::{info, warn};

use crate::codec;
use crate::error::PipelineError;
use crate::processing::{digits, normalize};

/// Side length of the square training samples written out.
pub const SAMPLE_SIZE: u32 = 28;

/// Fraction of the digit's larger side added as white border before resizing.
const PAD_FRACTION: f32 = 0.15;

#[derive(Debug, Default, Clone, Copy)]
pub struct CurationSummary {
    /// Input images that produced a full set of samples.
    pub curated: usize,
    /// Input images skipped (bad label, unreadable, contour mismatch).
    pub skipped: usize,
    /// Total digit samples written.
    pub samples: usize,
}

pub struct DatasetCurator {
    num_digits: usize,
    sample_size: u32,
}

impl DatasetCurator {
    pub fn new(num_digits: usize) -> Self {
        Self {
            num_digits,
            sample_size: SAMPLE_SIZE,
        }
    }

    pub fn with_sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Curate every image in `input`, writing labeled samples to `output`.
    /// Per-file failures are logged and skipped; only directory-level i/o
    /// aborts the batch.
    pub fn curate_dir(&self, input: &Path, output: &Path) -> Result<CurationSummary, PipelineError> {
        fs::create_dir_all(output)?;

        let mut files: Vec<PathBuf> = fs::read_dir(input)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png")
                    })
            })
            .collect();
        files.sort();

        let mut summary = CurationSummary::default();
        for path in files {
            match self.curate_file(&path, output) {
                Ok(written) => {
                    summary.curated += 1;
                    summary.samples += written;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping sample");
                    summary.skipped += 1;
                }
            }
        }
        info!(
            curated = summary.curated,
            skipped = summary.skipped,
            samples = summary.samples,
            "dataset curation finished"
        );
        Ok(summary)
    }

    fn curate_file(&self, path: &Path, output: &Path) -> Result<usize, PipelineError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PipelineError::InvalidSample(path.display().to_string()))?;
        let labels = reading_from_stem(stem, self.num_digits).ok_or_else(|| {
            PipelineError::InvalidSample(format!("filename does not encode a reading: {stem}"))
        })?;

        let region = image::open(path)?.to_luma8();
        let boxes = digits::split_contours(&region, labels.len())?;

        let mut written = 0;
        for (index, (bbox, label)) in boxes.iter().zip(&labels).enumerate() {
            let digit =
                imageops::crop_imm(&region, bbox.x_min, bbox.y_min, bbox.width(), bbox.height())
                    .to_image();
            let padded = normalize::pad_white(&digit, PAD_FRACTION);
            let mut sample = imageops::resize(
                &padded,
                self.sample_size,
                self.sample_size,
                imageops::FilterType::CatmullRom,
            );
            // Classifier trains on white-on-black digits.
            imageops::invert(&mut sample);

            let name = format!("{stem}_{index}_{label}.png");
            let bytes = codec::encode_png(&DynamicImage::ImageLuma8(sample))?;
            fs::write(output.join(name), bytes)?;
            written += 1;
        }
        Ok(written)
    }
}

/// Parse the expected reading from a filename stem of the form
/// `..._value_<a>_<b>`, zero-padded on the left to `num_digits`.
pub fn reading_from_stem(stem: &str, num_digits: usize) -> Option<Vec<u8>> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 4 || parts[parts.len() - 3] != "value" {
        return None;
    }
    let raw = format!("{}{}", parts[parts.len() - 2], parts[parts.len() - 1]);
    if raw.is_empty() || raw.len() > num_digits || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut labels = vec![0u8; num_digits - raw.len()];
    labels.extend(raw.bytes().map(|b| b - b'0'));
    Some(labels)
}
