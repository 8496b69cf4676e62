//! Crops the source image to the bounding box of the detected foreground.

use image::{GrayImage, Rgb, RgbImage, imageops};

use crate::error::PipelineError;
use crate::models::BoundingBox;

/// Bounding box over all nonzero mask pixels, or `None` for an empty mask.
pub fn mask_bounding_box(mask: &GrayImage) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        match &mut bbox {
            Some(b) => {
                b.x_min = b.x_min.min(x);
                b.x_max = b.x_max.max(x);
                b.y_min = b.y_min.min(y);
                b.y_max = b.y_max.max(y);
            }
            None => {
                bbox = Some(BoundingBox {
                    x_min: x,
                    x_max: x,
                    y_min: y,
                    y_max: y,
                });
            }
        }
    }
    bbox
}

/// Zero every pixel outside the mask's foreground.
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if mask.get_pixel(x, y)[0] != 0 {
            *image.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Crop `image` to the foreground of `mask` (same dimensions). An empty
/// mask is the sole trigger of the `NO_DIGITS` failure mode. When
/// `mask_background` is set, background pixels are zeroed before cropping
/// to suppress non-digit texture inside the box.
pub fn extract_roi(
    image: &RgbImage,
    mask: &GrayImage,
    mask_background: bool,
) -> Result<(RgbImage, BoundingBox), PipelineError> {
    let bbox = mask_bounding_box(mask).ok_or(PipelineError::EmptyForeground)?;
    let masked;
    let source = if mask_background {
        masked = apply_mask(image, mask);
        &masked
    } else {
        image
    };
    let roi = imageops::crop_imm(source, bbox.x_min, bbox.y_min, bbox.width(), bbox.height())
        .to_image();
    Ok((roi, bbox))
}
