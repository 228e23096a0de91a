/// Axis-aligned bounding box stored as a min/max corner pair.
///
/// Conversions to and from the other common representations are pure:
/// - TLBR: min x, min y, max x, max y (the storage layout)
/// - TLWH: min x, min y, width, height
/// - center + size: center x, center y, width, height
///
/// Boxes with zero extent are allowed and simply have zero area.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    /// Minimum x coordinate
    pub x1: f32,
    /// Minimum y coordinate
    pub y1: f32,
    /// Maximum x coordinate
    pub x2: f32,
    /// Maximum y coordinate
    pub y2: f32,
}

impl Rect {
    /// Create a Rect from its corners (TLBR format).
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Alias of [`Rect::new`] for symmetry with the other constructors.
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2, y2)
    }

    /// Create a Rect from TLWH format (min corner plus extent).
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    /// Create a Rect from its center and size.
    #[inline]
    pub fn from_center_size(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x1, self.y1, self.width(), self.height()]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Get the (width, height) of the bounding box.
    #[inline]
    pub fn size(&self) -> (f32, f32) {
        (self.width(), self.height())
    }

    /// Get the area of the bounding box. Inverted boxes count as empty.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True when every coordinate is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// True when min corner does not exceed max corner on either axis.
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    ///
    /// Returns 0 when the union is empty.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

use ndarray::Array2;

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_conversions() {
        let rect = Rect::from_tlwh(10.0, 20.0, 30.0, 40.0);

        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);
        assert_eq!(rect.center(), (25.0, 40.0));
        assert_eq!(rect.size(), (30.0, 40.0));
    }

    #[test]
    fn test_from_center_size() {
        let rect = Rect::from_center_size(25.0, 40.0, 30.0, 40.0);
        assert!((rect.x1 - 10.0).abs() < 1e-6);
        assert!((rect.y1 - 20.0).abs() < 1e-6);
        assert!((rect.x2 - 40.0).abs() < 1e-6);
        assert!((rect.y2 - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_conversions_leave_source_untouched() {
        let rect = Rect::new(1.0, 2.0, 5.0, 8.0);
        let tlwh = rect.to_tlwh();
        let back = Rect::from_tlwh(tlwh[0], tlwh[1], tlwh[2], tlwh[3]);
        assert_eq!(rect, back);
        assert_eq!(rect.to_tlbr(), [1.0, 2.0, 5.0, 8.0]);
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 15.0);

        // Intersection: 5x5 = 25
        // Union: 100 + 100 - 25 = 175
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_same_box() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_degenerate() {
        let point = Rect::new(3.0, 3.0, 3.0, 3.0);
        assert_eq!(point.iou(&point), 0.0);

        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&point), 0.0);
    }

    #[test]
    fn test_iou_batch_shape() {
        let a = [Rect::new(0.0, 0.0, 1.0, 1.0), Rect::new(0.0, 0.0, 2.0, 2.0)];
        let b = [Rect::new(0.0, 0.0, 1.0, 1.0)];
        let ious = iou_batch(&a, &b);
        assert_eq!(ious.dim(), (2, 1));
        assert!((ious[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((ious[[1, 0]] - 0.25).abs() < 1e-6);
    }
}
