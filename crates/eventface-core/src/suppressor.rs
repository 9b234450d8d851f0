//! Duplicate-detection suppression (greedy non-maximum suppression).
//!
//! The detector can report the same physical face more than once with
//! slightly shifted boxes. Suppression keeps the most confident detection of
//! every overlapping group, and the order it keeps them in becomes the
//! canonical face index order for the image.

use crate::types::{BoundingBox, DetectedFace};

/// Detections overlapping an already kept face at or above this IoU are dropped.
pub const IOU_THRESHOLD: f32 = 0.3;

/// Intersection-over-Union of two axis-aligned boxes.
///
/// Returns 0 when the union is empty, so degenerate boxes never divide by zero.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union_area = a.area() + b.area() - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

/// Remove duplicate detections of the same face.
///
/// Output is in confidence-descending order (ties keep detection order).
pub fn suppress(faces: Vec<DetectedFace>) -> Vec<DetectedFace> {
    let before = faces.len();
    let kept = non_max_suppression(faces, IOU_THRESHOLD, |f| (&f.bounding_box, f.confidence));
    if kept.len() < before {
        tracing::debug!(before, after = kept.len(), "suppressed duplicate detections");
    }
    kept
}

/// Greedy NMS over any item that exposes a box and a score.
///
/// Items are stably sorted by score, highest first, then each one is kept only
/// if its IoU with every already kept item is strictly below `iou_threshold`.
pub fn non_max_suppression<T, F>(mut items: Vec<T>, iou_threshold: f32, key: F) -> Vec<T>
where
    F: Fn(&T) -> (&BoundingBox, f32),
{
    // sort_by is stable, so equal scores stay in detection order.
    items.sort_by(|a, b| key(b).1.total_cmp(&key(a).1));

    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let (bbox, _) = key(&item);
        let distinct = kept.iter().all(|k| iou(bbox, key(k).0) < iou_threshold);
        if distinct {
            kept.push(item);
        }
    }
    kept
}
