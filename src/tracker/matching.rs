//! Matching utilities for multi-object tracking.
//!
//! Association runs in two passes:
//! 1. an optimal one-to-one assignment maximizing total affinity over the
//!    pairs that pass the `min_iou` gate;
//! 2. an optional relaxation that lets a track also claim leftover
//!    detections whose affinity with it reaches `multi_match_min_iou`. This
//!    deliberately breaks the one-to-one property so that near-duplicate
//!    detections of one object are absorbed instead of spawning a twin track.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::ConfigError;
use crate::tracker::detection::Detection;
use crate::tracker::rect::Rect;

/// Row `i` of a `size`-row cost matrix pays `i * TIE_BREAK_STEP / size`, so
/// between assignments of equal total affinity the one using lower rows wins.
/// Summed over all rows the penalty stays below `TIE_BREAK_STEP * size / 2`.
const TIE_BREAK_STEP: f64 = 1e-6;

/// Cost of leaving a row or column unassigned.
const NO_MATCH_COST: f64 = 1.0;

/// Configuration for the association step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum affinity for a pair to be matched at all
    pub min_iou: f32,
    /// Affinity above which a track may claim extra detections; `None` disables it
    pub multi_match_min_iou: Option<f32>,
    /// Share of the affinity driven by feature similarity; `None` ignores features
    pub feature_weight: Option<f32>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_iou: 0.1,
            multi_match_min_iou: None,
            feature_weight: None,
        }
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_iou > 0.0 && self.min_iou <= 1.0) {
            return Err(ConfigError::InvalidMinIou(self.min_iou));
        }
        if let Some(multi) = self.multi_match_min_iou {
            if multi.is_nan() || multi < self.min_iou {
                return Err(ConfigError::MultiMatchBelowMinIou {
                    min: self.min_iou,
                    multi,
                });
            }
        }
        if let Some(weight) = self.feature_weight {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::OutOfUnitRange {
                    name: "feature_weight",
                    value: weight,
                });
            }
        }
        Ok(())
    }
}

/// Predicted track state as seen by the matcher.
#[derive(Debug, Clone, Copy)]
pub struct TrackCandidate<'a> {
    pub bbox: Rect,
    pub feature: Option<&'a [f32]>,
}

/// How a pair was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Part of the optimal one-to-one assignment
    Primary,
    /// Claimed by the relaxation pass
    MultiMatch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub track: usize,
    pub detection: usize,
    pub affinity: f32,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    /// Primary matches ordered by track index, then relaxation matches
    pub matches: Vec<Match>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Cosine similarity clamped to [0, 1]. `None` when the vectors cannot be compared.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot / (norm_a * norm_b)).clamp(0.0, 1.0))
}

/// Compute the affinity matrix between tracks and detections.
///
/// Affinity is the IoU, scaled by `(1 - w) + w * similarity` when a feature
/// weight `w` is set and both sides carry comparable features.
pub fn affinity_matrix(
    tracks: &[TrackCandidate<'_>],
    detections: &[Detection],
    feature_weight: Option<f32>,
) -> Array2<f32> {
    let mut affinity = Array2::zeros((tracks.len(), detections.len()));
    for (i, track) in tracks.iter().enumerate() {
        for (j, det) in detections.iter().enumerate() {
            let iou = track.bbox.iou(&det.bbox);
            let similarity = match (feature_weight, track.feature, det.feature.as_deref()) {
                (Some(w), Some(a), Some(b)) => {
                    cosine_similarity(a, b).map(|sim| (1.0 - w) + w * sim)
                }
                _ => None,
            };
            affinity[[i, j]] = iou * similarity.unwrap_or(1.0);
        }
    }
    affinity
}

/// Maximum-weight one-to-one assignment over pairs with affinity >= `min_affinity`.
pub fn linear_assignment(affinity: &Array2<f32>, min_affinity: f32) -> AssignmentResult {
    let (num_rows, num_cols) = affinity.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let row_penalty = TIE_BREAK_STEP / size as f64;
    let mut padded = Array2::<f64>::from_elem((size, size), NO_MATCH_COST);

    for i in 0..num_rows {
        for j in 0..num_cols {
            let a = affinity[[i, j]];
            if a >= min_affinity {
                padded[[i, j]] = NO_MATCH_COST - a as f64 + i as f64 * row_penalty;
            }
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && affinity[[row_idx, col_idx]] >= min_affinity {
                    matches.push(Match {
                        track: row_idx,
                        detection: col_idx,
                        affinity: affinity[[row_idx, col_idx]],
                        kind: MatchKind::Primary,
                    });
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(err) => {
            warn!(?err, "assignment solver failed, leaving everything unmatched");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Hand leftover detections with affinity >= `threshold` to their best track.
///
/// Highest affinity wins, lower row on ties. Tracks may receive several.
fn relax_multi_match(affinity: &Array2<f32>, threshold: f32, result: &mut AssignmentResult) {
    let (num_rows, _) = affinity.dim();
    let mut still_unmatched = Vec::with_capacity(result.unmatched_detections.len());
    let mut claimed_tracks = vec![false; num_rows];

    for &det in &result.unmatched_detections {
        let mut best: Option<(usize, f32)> = None;
        for row in 0..num_rows {
            let a = affinity[[row, det]];
            if a >= threshold && best.is_none_or(|(_, best_a)| a > best_a) {
                best = Some((row, a));
            }
        }
        match best {
            Some((row, a)) => {
                result.matches.push(Match {
                    track: row,
                    detection: det,
                    affinity: a,
                    kind: MatchKind::MultiMatch,
                });
                claimed_tracks[row] = true;
            }
            None => still_unmatched.push(det),
        }
    }

    result.unmatched_detections = still_unmatched;
    // A gated primary pass never leaves such a track unmatched; this only
    // keeps the two lists disjoint if `min_iou` is tiny enough for the
    // tie-break penalty to outweigh a pair.
    result.unmatched_tracks.retain(|&row| !claimed_tracks[row]);
}

/// Associate predicted tracks with detections.
pub fn match_detections(
    tracks: &[TrackCandidate<'_>],
    detections: &[Detection],
    config: &MatchingConfig,
) -> AssignmentResult {
    let affinity = affinity_matrix(tracks, detections, config.feature_weight);
    let mut result = linear_assignment(&affinity, config.min_iou);

    if let Some(threshold) = config.multi_match_min_iou {
        if !result.unmatched_detections.is_empty() && !tracks.is_empty() {
            relax_multi_match(&affinity, threshold, &mut result);
        }
    }

    for m in &result.matches {
        trace!(
            track = m.track,
            detection = m.detection,
            affinity = m.affinity,
            kind = ?m.kind,
            "matched"
        );
    }

    result
}
