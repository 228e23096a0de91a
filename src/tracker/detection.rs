//! Per-frame detection input.

use crate::error::DetectionError;
use crate::tracker::rect::Rect;

/// Detection input for the tracker.
///
/// Produced fresh every frame by the caller; the tracker only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box (min/max corners)
    pub bbox: Rect,
    /// Detection confidence score in [0, 1]
    pub score: f32,
    /// Optional class label
    pub class_id: Option<u32>,
    /// Optional appearance embedding
    pub feature: Option<Vec<f32>>,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), score)
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self {
            bbox,
            score,
            class_id: None,
            feature: None,
        }
    }

    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn with_feature(mut self, feature: Vec<f32>) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Check that the detection is usable by the tracker.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.bbox.is_finite() {
            return Err(DetectionError::NonFiniteBox);
        }
        if !self.bbox.is_ordered() {
            return Err(DetectionError::InvertedBox);
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(DetectionError::ScoreOutOfRange(self.score));
        }
        if let Some(feature) = &self.feature {
            if feature.iter().any(|v| !v.is_finite()) {
                return Err(DetectionError::NonFiniteFeature);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_detection() {
        let det = Detection::new(0.0, 0.0, 10.0, 10.0, 0.9).with_class(3);
        assert_eq!(det.validate(), Ok(()));
        assert_eq!(det.class_id, Some(3));
    }

    #[test]
    fn test_zero_area_is_valid() {
        let det = Detection::new(5.0, 5.0, 5.0, 9.0, 0.5);
        assert_eq!(det.validate(), Ok(()));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            Detection::new(f32::NAN, 0.0, 1.0, 1.0, 0.5).validate(),
            Err(DetectionError::NonFiniteBox)
        );
        assert_eq!(
            Detection::new(10.0, 0.0, 1.0, 1.0, 0.5).validate(),
            Err(DetectionError::InvertedBox)
        );
        assert_eq!(
            Detection::new(0.0, 0.0, 1.0, 1.0, 1.5).validate(),
            Err(DetectionError::ScoreOutOfRange(1.5))
        );
        assert_eq!(
            Detection::new(0.0, 0.0, 1.0, 1.0, 0.5)
                .with_feature(vec![1.0, f32::INFINITY])
                .validate(),
            Err(DetectionError::NonFiniteFeature)
        );
    }
}
