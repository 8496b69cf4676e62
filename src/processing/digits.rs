//! Splits the ROI into per-digit sub-images.
//!
//! Two interchangeable policies. The fixed-width split is canonical for
//! live inference: it always yields exactly `num_digits` slices, whatever
//! the image content. The contour-validated split is for dataset curation:
//! it rejects the whole sample when the detected digit count is wrong,
//! instead of forcing an answer.

use image::{GrayImage, RgbImage, imageops};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};

use crate::error::PipelineError;
use crate::models::{BoundingBox, DigitSlice};

/// Meters carry a fixed seven-digit register.
pub const NUM_DIGITS: usize = 7;

/// Pixels below this grayscale value count as ink on a light background.
pub const INK_THRESHOLD: u8 = 250;

/// Horizontal slice bounds `[start, end)` for the fixed-width policy.
///
/// Width is divided evenly; the last slice absorbs the integer-division
/// remainder, so the bounds always cover every column exactly once. Slice
/// width never drops below 1 even for degenerate ROIs narrower than
/// `num_digits`.
pub fn slice_bounds(roi_width: u32, num_digits: usize) -> Vec<(u32, u32)> {
    let roi_width = roi_width.max(1);
    let n = num_digits.max(1) as u32;
    let digit_width = (roi_width / n).max(1);
    let mut bounds = Vec::with_capacity(n as usize);
    for i in 0..n {
        let start = (i * digit_width).min(roi_width - 1);
        let end = if i == n - 1 {
            roi_width
        } else {
            ((i + 1) * digit_width).min(roi_width)
        };
        bounds.push((start, end.max(start + 1)));
    }
    bounds
}

/// Fixed-width split: always returns exactly `num_digits` slices. Each
/// slice is grayscaled and, when any ink is present, tightened to the ink's
/// bounding box to strip excess margin. Blank slices keep their full
/// geometric extent.
pub fn split_fixed(roi: &RgbImage, num_digits: usize, ink_threshold: u8) -> Vec<DigitSlice> {
    let height = roi.height();
    slice_bounds(roi.width(), num_digits)
        .into_iter()
        .map(|(start, end)| {
            let slice = imageops::crop_imm(roi, start, 0, end - start, height).to_image();
            let gray = imageops::grayscale(&slice);
            tighten_to_ink(gray, ink_threshold)
        })
        .collect()
}

fn tighten_to_ink(gray: GrayImage, ink_threshold: u8) -> DigitSlice {
    let mut ink: Option<BoundingBox> = None;
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] >= ink_threshold {
            continue;
        }
        match &mut ink {
            Some(b) => {
                b.x_min = b.x_min.min(x);
                b.x_max = b.x_max.max(x);
                b.y_min = b.y_min.min(y);
                b.y_max = b.y_max.max(y);
            }
            None => {
                ink = Some(BoundingBox {
                    x_min: x,
                    x_max: x,
                    y_min: y,
                    y_max: y,
                });
            }
        }
    }
    match ink {
        Some(b) => {
            let image =
                imageops::crop_imm(&gray, b.x_min, b.y_min, b.width(), b.height()).to_image();
            DigitSlice {
                image,
                tightened: Some(b),
            }
        }
        None => DigitSlice {
            image: gray,
            tightened: None,
        },
    }
}

/// Contour-validated split over an already-cropped digit region.
///
/// Inverts and Otsu-thresholds the region, takes external contour bounding
/// boxes, filters out speckle and merged/split artifacts by size, and sorts
/// survivors left to right. A survivor count other than `expected` rejects
/// the whole sample.
pub fn split_contours(
    region: &GrayImage,
    expected: usize,
) -> Result<Vec<BoundingBox>, PipelineError> {
    let mut inverted = region.clone();
    imageops::invert(&mut inverted);
    let level = otsu_level(&inverted);
    let binary = threshold(&inverted, level, ThresholdType::Binary);

    let region_w = region.width() as f32;
    let region_h = region.height() as f32;
    let mut boxes: Vec<BoundingBox> = find_contours::<u32>(&binary)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(contour_bounding_box)
        .filter(|b| {
            let w = b.width() as f32;
            let h = b.height() as f32;
            h > region_h * 0.2 && h < region_h * 1.1 && w > region_w * 0.05 && w < region_w * 0.25
        })
        .collect();
    boxes.sort_by_key(|b| b.x_min);

    if boxes.len() != expected {
        return Err(PipelineError::SegmentCountMismatch {
            expected,
            found: boxes.len(),
        });
    }
    Ok(boxes)
}

fn contour_bounding_box(contour: &Contour<u32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let mut bbox = BoundingBox {
        x_min: first.x,
        x_max: first.x,
        y_min: first.y,
        y_max: first.y,
    };
    for p in &contour.points {
        bbox.x_min = bbox.x_min.min(p.x);
        bbox.x_max = bbox.x_max.max(p.x);
        bbox.y_min = bbox.y_min.min(p.y);
        bbox.y_max = bbox.y_max.max(p.y);
    }
    Some(bbox)
}
