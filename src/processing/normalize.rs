//! Converts digit sub-images to the layout the classifier expects.

use image::{GrayImage, Luma, imageops};

/// Resize a (possibly tightened) grayscale slice to the classifier's square
/// input size. Triangle filtering averages source pixels when shrinking,
/// which keeps thin strokes from aliasing away.
pub fn normalize_digit(slice: &GrayImage, size: u32) -> GrayImage {
    imageops::resize(slice, size, size, imageops::FilterType::Triangle)
}

/// Surround a digit crop with a white border proportional to its larger
/// side, used when building training samples.
pub fn pad_white(digit: &GrayImage, fraction: f32) -> GrayImage {
    let (w, h) = digit.dimensions();
    let pad = (w.max(h) as f32 * fraction) as u32;
    let mut canvas = GrayImage::from_pixel(w + 2 * pad, h + 2 * pad, Luma([255u8]));
    imageops::overlay(&mut canvas, digit, pad.into(), pad.into());
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_digit_has_the_requested_size() {
        let slice = GrayImage::from_pixel(37, 81, Luma([120u8]));
        let normalized = normalize_digit(&slice, 64);
        assert_eq!(normalized.dimensions(), (64, 64));
    }

    #[test]
    fn padding_is_proportional_to_the_larger_side() {
        let digit = GrayImage::from_pixel(10, 20, Luma([0u8]));
        let padded = pad_white(&digit, 0.15);
        // pad = floor(20 * 0.15) = 3 on each side
        assert_eq!(padded.dimensions(), (16, 26));
        assert_eq!(padded.get_pixel(0, 0)[0], 255);
        assert_eq!(padded.get_pixel(3, 3)[0], 0);
    }
}
