use image::GrayImage;
use serde::Serialize;

/// Inclusive bounding box over foreground pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Per-pixel foreground probability map at the segmentation model's
/// resolution, row-major, values in [0, 1].
#[derive(Debug, Clone)]
pub struct ProbabilityMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ProbabilityMap {
    /// Builds a map from row-major data. Returns `None` when the buffer
    /// length does not match `width * height`.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// One ordered sub-image of the ROI, leftmost first. `tightened` is the ink
/// bounding box within the geometric slice, when any ink was found.
#[derive(Debug, Clone)]
pub struct DigitSlice {
    pub image: GrayImage,
    pub tightened: Option<BoundingBox>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DigitPrediction {
    pub label: u8,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConfidenceSummary {
    pub average: f32,
    pub minimum: f32,
}

/// Final reading: the digit string in slice order plus per-digit and
/// aggregate confidences. Constructed once per request, immutable.
#[derive(Debug, Clone, Serialize)]
pub struct MeterReading {
    #[serde(rename = "meter_value")]
    pub value: String,
    pub confidences: Vec<f32>,
    #[serde(rename = "overall_confidence")]
    pub overall: ConfidenceSummary,
}

impl MeterReading {
    /// Concatenates predicted labels in slice order and summarizes the
    /// confidences.
    pub fn from_predictions(predictions: &[DigitPrediction]) -> Self {
        let value: String = predictions
            .iter()
            .map(|p| char::from(b'0' + p.label))
            .collect();
        let confidences: Vec<f32> = predictions.iter().map(|p| p.confidence).collect();
        let minimum = confidences.iter().copied().fold(f32::INFINITY, f32::min);
        let average = confidences.iter().sum::<f32>() / confidences.len().max(1) as f32;
        Self {
            value,
            confidences,
            overall: ConfidenceSummary {
                average,
                minimum: if minimum.is_finite() { minimum } else { 0.0 },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_dimensions_are_inclusive() {
        let bbox = BoundingBox {
            x_min: 10,
            x_max: 59,
            y_min: 10,
            y_max: 59,
        };
        assert_eq!(bbox.width(), 50);
        assert_eq!(bbox.height(), 50);
        assert_eq!(bbox.area(), 2500);
    }

    #[test]
    fn probability_map_rejects_wrong_length() {
        assert!(ProbabilityMap::new(4, 4, vec![0.0; 15]).is_none());
        assert!(ProbabilityMap::new(4, 4, vec![0.0; 16]).is_some());
    }

    #[test]
    fn reading_concatenates_labels_in_order() {
        let predictions: Vec<DigitPrediction> = [3u8, 1, 4, 1, 5, 9, 2]
            .iter()
            .map(|&label| DigitPrediction {
                label,
                confidence: 0.5 + label as f32 / 100.0,
            })
            .collect();
        let reading = MeterReading::from_predictions(&predictions);
        assert_eq!(reading.value, "3141592");
        assert_eq!(reading.confidences.len(), 7);
        assert!((reading.overall.minimum - 0.51).abs() < 1e-6);
    }

    #[test]
    fn confidence_summary_is_well_ordered() {
        let predictions: Vec<DigitPrediction> = [0.9f32, 0.2, 0.7, 1.0, 0.4, 0.6, 0.8]
            .iter()
            .enumerate()
            .map(|(i, &confidence)| DigitPrediction {
                label: i as u8,
                confidence,
            })
            .collect();
        let reading = MeterReading::from_predictions(&predictions);
        assert!(reading.overall.minimum >= 0.0);
        assert!(reading.overall.minimum <= reading.overall.average);
        assert!(reading.overall.average <= 1.0);
    }
}
