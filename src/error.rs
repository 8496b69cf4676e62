use std::path::PathBuf;

use thiserror::Error;

/// Per-request pipeline failures. Each variant is a terminal state for the
/// request it occurred in; none of them is retried internally.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input bytes are not a readable image.
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The cleaned mask has zero foreground area.
    #[error("mask is empty, no digits detected")]
    EmptyForeground,

    /// Contour-validated segmentation found the wrong number of digit
    /// candidates. Only raised during dataset curation; the sample is
    /// skipped, never partially emitted.
    #[error("expected {expected} digit contours, found {found}")]
    SegmentCountMismatch { expected: usize, found: usize },

    /// A curation input that cannot be labeled (e.g. the filename does not
    /// encode a reading).
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// A model port failed at inference time.
    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable error code for the serving layer's failure shape.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "DECODE_ERROR",
            PipelineError::EmptyForeground => "NO_DIGITS",
            PipelineError::SegmentCountMismatch { .. } => "SEGMENT_COUNT_MISMATCH",
            PipelineError::InvalidSample(_) => "INVALID_SAMPLE",
            PipelineError::Inference(_) => "INFERENCE_ERROR",
            PipelineError::Io(_) => "IO_ERROR",
        }
    }
}

/// Startup-time model loading failures. Fatal to the process; there is no
/// per-request recovery from a missing or corrupt model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load model: {0}")]
    Load(String),
}
