//! Trait for object detection inference backends.

use crate::tracker::Detection;

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the tracker.
///
/// # Example
///
/// ```
/// use motrack_rs::{Detection, DetectionSource};
///
/// struct MyDetector;
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(
///         &mut self,
///         _input: &[u8],
///         _width: u32,
///         _height: u32,
///     ) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on raw image data and return detections.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}

/// Helper trait for converting model-specific outputs to `Detection`.
pub trait IntoDetections {
    /// Convert the output into a vector of detections.
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

/// Raw `[x1, y1, x2, y2, score]` rows, the layout most detector heads emit.
impl IntoDetections for Vec<[f32; 5]> {
    fn into_detections(self) -> Vec<Detection> {
        self.into_iter()
            .map(|[x1, y1, x2, y2, score]| Detection::new(x1, y1, x2, y2, score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Rect;

    #[test]
    fn test_rows_into_detections() {
        let dets = vec![[1.0f32, 2.0, 3.0, 4.0, 0.5]].into_detections();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(dets[0].score, 0.5);
    }
}
