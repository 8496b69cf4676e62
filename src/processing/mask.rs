//! Reduces a raw foreground probability map to a clean binary mask at the
//! original image resolution.

use std::collections::HashMap;

use image::{GrayImage, Luma, imageops};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::models::ProbabilityMap;

/// Threshold, upscale, denoise and reduce a probability map to at most one
/// 8-connected foreground component at `(width, height)` resolution.
///
/// An all-zero mask is a valid output; emptiness is decided downstream, not
/// here.
pub fn clean_mask(map: &ProbabilityMap, width: u32, height: u32, threshold: f32) -> GrayImage {
    let binary = threshold_map(map, threshold);
    // Nearest-neighbor keeps the mask hard 0/255; an averaging filter would
    // reintroduce gray values at the edges.
    let resized = imageops::resize(&binary, width, height, imageops::FilterType::Nearest);
    // 3x3 structuring element: closing fills pinholes, opening drops speckle.
    let closed = close(&resized, Norm::LInf, 1);
    let opened = open(&closed, Norm::LInf, 1);
    keep_largest_component(&opened)
}

fn threshold_map(map: &ProbabilityMap, threshold: f32) -> GrayImage {
    GrayImage::from_fn(map.width(), map.height(), |x, y| {
        if map.get(x, y) > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Zeroes every 8-connected foreground component except the one with the
/// largest pixel area. Ties resolve to the lowest label so the result is
/// deterministic. An empty mask passes through unchanged.
pub fn keep_largest_component(mask: &GrayImage) -> GrayImage {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut areas: HashMap<u32, u64> = HashMap::new();
    for label in labeled.pixels() {
        if label[0] != 0 {
            *areas.entry(label[0]).or_insert(0) += 1;
        }
    }

    let Some((&winner, _)) = areas
        .iter()
        .max_by_key(|&(&label, &area)| (area, std::cmp::Reverse(label)))
    else {
        return GrayImage::new(mask.width(), mask.height());
    };

    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if labeled.get_pixel(x, y)[0] == winner {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
