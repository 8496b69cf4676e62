use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::error::PipelineError;

/// Decode raw image bytes into an RGB8 buffer. Format is guessed from the
/// content, so the caller does not need to know the upload's file type.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Encode an image as PNG bytes, used for debug artifacts.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(PipelineError::Decode)?;
    Ok(buf.into_inner())
}
