pub mod codec;
pub mod curation;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod processing;

pub use curation::{CurationSummary, DatasetCurator};
pub use error::{ModelError, PipelineError};
pub use inference::{DigitClassifier, SegmentationModel};
pub use models::{BoundingBox, ConfidenceSummary, DigitPrediction, MeterReading, ProbabilityMap};
pub use pipeline::{MeterConfig, MeterReader, ReadingDetail};
