//! Overlap clustering of raw detections

use std::cmp::Ordering;
use tracing::debug;

use crate::classifier::Detection;

impl Detection {
    /// Intersection over union of the two square windows
    #[must_use]
    pub fn iou(&self, other: &Detection) -> f64 {
        let a = self.window();
        let b = other.window();

        let x1 = a.x.max(b.x);
        let y1 = a.y.max(b.y);
        let x2 = a.right().min(b.right());
        let y2 = a.bottom().min(b.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = f64::from(x2 - x1) * f64::from(y2 - y1);
        let area_a = f64::from(a.width) * f64::from(a.height);
        let area_b = f64::from(b.width) * f64::from(b.height);

        intersection / (area_a + area_b - intersection)
    }
}

/// Highest score first; equal scores fall back to geometry so the order
/// does not depend on input order.
fn seed_order(a: &Detection, b: &Detection) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.row.cmp(&b.row))
        .then_with(|| a.col.cmp(&b.col))
        .then_with(|| a.scale.cmp(&b.scale))
}

/// Merge overlapping detections.
///
/// The best remaining detection seeds a cluster and absorbs every remaining
/// detection whose IoU with it exceeds `iou_threshold`. The seed is emitted
/// unchanged, since it already holds the cluster's maximum score. Output is
/// in descending score order.
#[must_use]
pub fn cluster(detections: &[Detection], iou_threshold: f64) -> Vec<Detection> {
    if detections.is_empty() {
        return Vec::new();
    }

    let mut sorted = detections.to_vec();
    sorted.sort_by(seed_order);

    let mut merged = vec![false; sorted.len()];
    let mut clusters = Vec::new();

    for i in 0..sorted.len() {
        if merged[i] {
            continue;
        }
        let seed = sorted[i];
        merged[i] = true;

        for j in (i + 1)..sorted.len() {
            if !merged[j] && seed.iou(&sorted[j]) > iou_threshold {
                merged[j] = true;
            }
        }
        clusters.push(seed);
    }

    debug!(
        "Clustered {} detections into {} (IoU threshold: {})",
        detections.len(),
        clusters.len(),
        iou_threshold
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(row: i32, col: i32, scale: i32, score: f32) -> Detection {
        Detection {
            row,
            col,
            scale,
            score,
        }
    }

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = det(50, 50, 40, 1.0);
        assert_eq!(a.iou(&a), 1.0);

        let far = det(200, 200, 40, 1.0);
        assert_eq!(a.iou(&far), 0.0);

        // Touching edges share no area
        let touching = det(50, 90, 40, 1.0);
        assert_eq!(a.iou(&touching), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // 40x40 windows shifted by 20 columns: 800 / (1600 + 1600 - 800)
        let a = det(50, 50, 40, 1.0);
        let b = det(50, 70, 40, 1.0);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn test_near_duplicates_merge_into_best() {
        let best = det(50, 50, 40, 10.0);
        let other = det(52, 51, 40, 8.0);
        // 39 x 38 shared pixels: 1482 / 1718
        assert!(best.iou(&other) > 0.86);

        assert_eq!(cluster(&[other, best], 0.5), vec![best]);
    }

    #[test]
    fn test_low_overlap_kept_apart() {
        let a = det(50, 50, 40, 10.0);
        let b = det(50, 75, 40, 8.0);
        assert!(a.iou(&b) < 0.5);

        let clusters = cluster(&[b, a], 0.5);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.contains(&a));
        assert!(clusters.contains(&b));
    }

    #[test]
    fn test_merge_uses_seed_not_chain() {
        // b overlaps both a and c, but a and c barely overlap;
        // b is absorbed by a, so c survives on its own
        let a = det(50, 50, 40, 9.0);
        let b = det(50, 62, 40, 8.0);
        let c = det(50, 80, 40, 7.0);
        let clusters = cluster(&[c, b, a], 0.3);
        assert_eq!(clusters, vec![a, c]);
    }

    #[test]
    fn test_equal_scores_are_deterministic() {
        let a = det(10, 10, 20, 5.0);
        let b = det(12, 10, 20, 5.0);
        assert_eq!(cluster(&[a, b], 0.5), cluster(&[b, a], 0.5));
        assert_eq!(cluster(&[b, a], 0.5), vec![a]);
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster(&[], 0.2).is_empty());
    }
}
