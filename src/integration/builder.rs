//! Builder for creating Detection objects from various input formats.

use crate::tracker::{Detection, Rect};

/// Builder for creating `Detection` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    bbox: Rect,
    score: f32,
    class_id: Option<u32>,
    feature: Option<Vec<f32>>,
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::from_center_size(cx, cy, w, h);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::from_tlwh(x, y, w, h);
        self
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class_id(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Attach an appearance embedding.
    pub fn feature(mut self, feature: Vec<f32>) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Build the final `Detection`.
    pub fn build(self) -> Detection {
        Detection {
            bbox: self.bbox,
            score: self.score,
            class_id: self.class_id,
            feature: self.feature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .tlbr(10.0, 20.0, 50.0, 80.0)
            .score(0.95)
            .class_id(2)
            .build();

        assert_eq!(det.score, 0.95);
        assert_eq!(det.class_id, Some(2));
        assert_eq!(det.bbox, Rect::new(10.0, 20.0, 50.0, 80.0));
        assert!(det.feature.is_none());
    }

    #[test]
    fn test_box_formats_agree() {
        let tlwh = DetectionBuilder::new().tlwh(10.0, 20.0, 40.0, 60.0).build();
        let xywh = DetectionBuilder::new().xywh(30.0, 50.0, 40.0, 60.0).build();
        assert_eq!(tlwh.bbox, Rect::new(10.0, 20.0, 50.0, 80.0));
        assert_eq!(tlwh.bbox, xywh.bbox);
    }
}
