use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, Luma, Rgb, RgbImage};

use meterscan::error::PipelineError;
use meterscan::inference::{DigitClassifier, NUM_CLASSES, SegmentationModel};
use meterscan::models::ProbabilityMap;
use meterscan::pipeline::{MeterConfig, MeterReader};

/// Segmentation stub marking a fixed rectangle of the 256x256 map as
/// foreground, and counting how often it is invoked.
struct RectSegmentation {
    calls: AtomicUsize,
}

impl RectSegmentation {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl SegmentationModel for RectSegmentation {
    fn predict(&self, _image: &RgbImage) -> Result<ProbabilityMap, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProbabilityMap::from_fn(256, 256, |x, y| {
            if (64..192).contains(&x) && (96..160).contains(&y) {
                1.0
            } else {
                0.0
            }
        }))
    }
}

/// Segmentation stub that never finds foreground.
struct BlankSegmentation;

impl SegmentationModel for BlankSegmentation {
    fn predict(&self, _image: &RgbImage) -> Result<ProbabilityMap, PipelineError> {
        Ok(ProbabilityMap::from_fn(256, 256, |_, _| 0.0))
    }
}

/// Classifier stub: the i-th call is peaked at class `i % 10` with a
/// confidence that grows per call, so aggregation order is observable.
struct SequenceClassifier {
    calls: AtomicUsize,
}

impl SequenceClassifier {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl DigitClassifier for SequenceClassifier {
    fn channels(&self) -> u32 {
        1
    }

    fn predict(&self, digit: &GrayImage) -> Result<[f32; NUM_CLASSES], PipelineError> {
        assert_eq!(digit.dimensions(), (self.input_size(), self.input_size()));
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let peak = 0.5 + call as f32 * 0.05;
        let rest = (1.0 - peak) / (NUM_CLASSES - 1) as f32;
        let mut probs = [rest; NUM_CLASSES];
        probs[call % NUM_CLASSES] = peak;
        Ok(probs)
    }
}

fn meter_photo() -> RgbImage {
    RgbImage::from_pixel(512, 256, Rgb([255, 255, 255]))
}

#[test]
fn reading_has_fixed_cardinality_and_ordered_confidences() {
    let reader = MeterReader::new(
        Arc::new(RectSegmentation::new()),
        Arc::new(SequenceClassifier::new()),
        MeterConfig::default(),
    );

    let detail = reader.read_image_detailed(&meter_photo()).unwrap();
    let reading = &detail.reading;

    assert_eq!(reading.value, "0123456");
    assert_eq!(reading.value.len(), 7);
    assert_eq!(reading.confidences.len(), 7);
    assert_eq!(detail.probabilities.len(), 7);

    assert!((reading.confidences[0] - 0.5).abs() < 1e-6);
    assert!((reading.confidences[6] - 0.8).abs() < 1e-6);
    assert!(reading.overall.minimum >= 0.0);
    assert!(reading.overall.minimum <= reading.overall.average);
    assert!(reading.overall.average <= 1.0);
    assert!((reading.overall.minimum - 0.5).abs() < 1e-6);
}

#[test]
fn foreground_box_lands_where_the_mask_says() {
    let reader = MeterReader::new(
        Arc::new(RectSegmentation::new()),
        Arc::new(SequenceClassifier::new()),
        MeterConfig::default(),
    );

    // 256x256 map rectangle [64,192)x[96,160), nearest-upscaled to 512x256:
    // x doubles, y is unchanged. Morphology may shift edges by a pixel.
    let detail = reader.read_image_detailed(&meter_photo()).unwrap();
    let bbox = detail.bounding_box;
    assert!(bbox.x_min.abs_diff(128) <= 2, "x_min = {}", bbox.x_min);
    assert!(bbox.x_max.abs_diff(383) <= 2, "x_max = {}", bbox.x_max);
    assert!(bbox.y_min.abs_diff(96) <= 2, "y_min = {}", bbox.y_min);
    assert!(bbox.y_max.abs_diff(159) <= 2, "y_max = {}", bbox.y_max);
}

#[test]
fn empty_mask_terminates_with_no_digits() {
    let reader = MeterReader::new(
        Arc::new(BlankSegmentation),
        Arc::new(SequenceClassifier::new()),
        MeterConfig::default(),
    );

    let err = reader.read_image(&meter_photo()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyForeground));
    assert_eq!(err.code(), "NO_DIGITS");
}

#[test]
fn decode_failure_short_circuits_before_any_model_call() {
    let segmentation = Arc::new(RectSegmentation::new());
    let reader = MeterReader::new(
        segmentation.clone(),
        Arc::new(SequenceClassifier::new()),
        MeterConfig::default(),
    );

    let err = reader.read_bytes(b"definitely not an image").unwrap_err();
    assert_eq!(err.code(), "DECODE_ERROR");
    assert_eq!(segmentation.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn debug_dir_receives_mask_roi_and_digit_artifacts() {
    let dir = tempfile::TempDir::new().unwrap();
    let reader = MeterReader::new(
        Arc::new(RectSegmentation::new()),
        Arc::new(SequenceClassifier::new()),
        MeterConfig::default(),
    )
    .with_debug_dir(dir.path());

    reader.read_image(&meter_photo()).unwrap();

    assert!(dir.path().join("mask.png").exists());
    assert!(dir.path().join("roi.png").exists());
    for i in 0..7 {
        assert!(dir.path().join(format!("digit_{i:02}.png")).exists());
    }
}

#[test]
fn concurrent_requests_share_one_reader() {
    let reader = Arc::new(MeterReader::new(
        Arc::new(RectSegmentation::new()),
        Arc::new(SequenceClassifier::new()),
        MeterConfig::default(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let reader = reader.clone();
            std::thread::spawn(move || reader.read_image(&meter_photo()).unwrap())
        })
        .collect();

    for handle in handles {
        let reading = handle.join().unwrap();
        assert_eq!(reading.value.len(), 7);
    }
}

/// White region with `count` dark vertical bars sized to pass the contour
/// filter bands.
fn bar_region(count: u32) -> GrayImage {
    let mut region = GrayImage::from_pixel(70, 40, Luma([255u8]));
    for i in 0..count {
        let x0 = 4 + i * 9;
        for y in 5..35 {
            for x in x0..x0 + 5 {
                region.put_pixel(x, y, Luma([10u8]));
            }
        }
    }
    region
}

#[test]
fn curation_skips_bad_samples_and_keeps_going() {
    let input = tempfile::TempDir::new().unwrap();
    let output = tempfile::TempDir::new().unwrap();

    // Valid: 7 bars, filename encodes a 7-digit reading.
    bar_region(7)
        .save(input.path().join("m1_value_1234_567.png"))
        .unwrap();
    // Contour count mismatch: 5 bars against 7 expected digits.
    bar_region(5)
        .save(input.path().join("m2_value_7654_321.png"))
        .unwrap();
    // Filename does not encode a reading.
    bar_region(7).save(input.path().join("snapshot.png")).unwrap();

    let curator = meterscan::DatasetCurator::new(7);
    let summary = curator.curate_dir(input.path(), output.path()).unwrap();

    assert_eq!(summary.curated, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.samples, 7);

    // Samples only from the valid image, labeled left to right.
    for (i, label) in [1u8, 2, 3, 4, 5, 6, 7].iter().enumerate() {
        let name = format!("m1_value_1234_567_{i}_{label}.png");
        assert!(output.path().join(&name).exists(), "missing {name}");
    }
    let rejected: Vec<_> = std::fs::read_dir(output.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("m2_"))
        .collect();
    assert!(rejected.is_empty(), "rejected sample emitted partial data");
}
