//! Post-processing shared by model-backed detectors.

use crate::detect::result::Detection;

/// Per-class greedy non-maximum suppression.
///
/// Output is ordered by descending confidence. A candidate is dropped when a
/// kept detection of the same class overlaps it above `iou_threshold`.
#[cfg_attr(not(feature = "backend-tract"), allow(dead_code))]
pub(crate) fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
