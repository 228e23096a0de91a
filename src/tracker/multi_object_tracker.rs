//! Multi-object tracker: owns every track and drives the per-frame cycle.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, DetectionError, StepError};
use crate::tracker::detection::Detection;
use crate::tracker::matching::{self, MatchKind, MatchingConfig, TrackCandidate};
use crate::tracker::motion_model::{ModelPreset, ModelSpec, MotionModel};
use crate::tracker::track::{Track, TrackConfig, TrackSnapshot};
use crate::tracker::track_id::{IdAllocator, IdPolicy, TrackId};

/// Birth and death rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// A track is removed once this many consecutive steps pass without a match
    pub max_staleness: u32,
    /// Steps alive required before `active_tracks_default` reports a track
    pub min_steps_alive: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_staleness: 12,
            min_steps_alive: 3,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_staleness == 0 {
            return Err(ConfigError::ZeroMaxStaleness);
        }
        Ok(())
    }
}

/// Configuration for the MultiObjectTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Default time between frames, in seconds
    pub dt: f64,
    pub model: ModelSpec,
    pub matching: MatchingConfig,
    pub lifecycle: LifecycleConfig,
    pub track: TrackConfig,
    pub id_policy: IdPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 30.0,
            model: ModelSpec::default(),
            matching: MatchingConfig::default(),
            lifecycle: LifecycleConfig::default(),
            track: TrackConfig::default(),
            id_policy: IdPolicy::Sequential,
        }
    }
}

impl TrackerConfig {
    /// Replace the motion model with a preset.
    pub fn with_preset(mut self, preset: ModelPreset) -> Self {
        self.model = preset.spec();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep(self.dt));
        }
        self.model.validate()?;
        self.matching.validate()?;
        self.lifecycle.validate()?;
        self.track.validate()
    }
}

/// Which tracks a query reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTracksFilter {
    pub min_steps_alive: u32,
    /// Exclusive upper bound on staleness
    pub max_staleness: u32,
    /// Exclusive upper bound on staleness / successful matches
    pub max_staleness_to_positive_ratio: f32,
}

impl Default for ActiveTracksFilter {
    fn default() -> Self {
        Self {
            min_steps_alive: 0,
            max_staleness: u32::MAX,
            max_staleness_to_positive_ratio: f32::INFINITY,
        }
    }
}

impl ActiveTracksFilter {
    fn accepts(&self, track: &Track) -> bool {
        track.is_confirmed(self.min_steps_alive)
            && track.staleness() < self.max_staleness
            && track.staleness_ratio() < self.max_staleness_to_positive_ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Unmatched for `max_staleness` steps
    Stale,
    /// Motion state diverged
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectedDetection {
    /// Index into the detections passed to `step`
    pub index: usize,
    pub error: DetectionError,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedPair {
    pub track_id: TrackId,
    /// Index into the detections passed to `step`
    pub detection: usize,
    pub affinity: f32,
    pub kind: MatchKind,
}

/// What happened during one `step`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// 1-based index of the step
    pub frame: u64,
    pub matches: Vec<MatchedPair>,
    /// Tracks that were only predicted this step
    pub unmatched_tracks: Vec<TrackId>,
    pub born: Vec<TrackId>,
    pub removed: Vec<(TrackId, RemovalReason)>,
    pub rejected: Vec<RejectedDetection>,
    /// Per input detection: the track it updated or created; `None` if rejected
    pub detection_track_ids: Vec<Option<TrackId>>,
}

/// Tracks an unknown number of objects across frames.
///
/// `step` must be called serially; queries borrow the tracker immutably and
/// return owned snapshots.
#[derive(Debug)]
pub struct MultiObjectTracker {
    tracks: BTreeMap<TrackId, Track>,
    model: MotionModel,
    config: TrackerConfig,
    ids: IdAllocator,
    frame_count: u64,
}

impl MultiObjectTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tracks: BTreeMap::new(),
            model: MotionModel::new(config.model)?,
            ids: IdAllocator::new(config.id_policy),
            config,
            frame_count: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of live tracks, confirmed or not.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of completed steps.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Process one frame with an explicit time delta.
    pub fn step(&mut self, detections: &[Detection], dt: f64) -> Result<StepReport, StepError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(StepError::InvalidTimeStep(dt));
        }
        Ok(self.advance(detections, dt))
    }

    /// Process one frame using the configured time delta.
    pub fn step_default(&mut self, detections: &[Detection]) -> StepReport {
        self.advance(detections, self.config.dt)
    }

    fn advance(&mut self, detections: &[Detection], dt: f64) -> StepReport {
        self.frame_count += 1;
        let mut report = StepReport {
            frame: self.frame_count,
            detection_track_ids: vec![None; detections.len()],
            ..StepReport::default()
        };

        // Step 0: keep malformed detections out of matching
        let mut origin = Vec::with_capacity(detections.len());
        for (index, det) in detections.iter().enumerate() {
            match det.validate() {
                Ok(()) => origin.push(index),
                Err(error) => {
                    warn!(frame = self.frame_count, index, %error, "rejecting detection");
                    report.rejected.push(RejectedDetection { index, error });
                }
            }
        }
        let valid: Cow<'_, [Detection]> = if report.rejected.is_empty() {
            Cow::Borrowed(detections)
        } else {
            Cow::Owned(origin.iter().map(|&i| detections[i].clone()).collect())
        };

        // Step 1: predict every track, dropping any that diverged
        for track in self.tracks.values_mut() {
            track.predict(&self.model, dt);
        }
        let removed = &mut report.removed;
        self.tracks.retain(|&id, track| {
            if !track.is_invalid() {
                return true;
            }
            warn!(track_id = %id, dt, "motion state diverged, removing track");
            removed.push((id, RemovalReason::Invalid));
            false
        });

        // Step 2: associate predicted boxes with detections
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        let assignment = {
            let candidates: Vec<TrackCandidate<'_>> = self
                .tracks
                .values()
                .map(|t| TrackCandidate {
                    bbox: t.rect(),
                    feature: t.feature(),
                })
                .collect();
            matching::match_detections(&candidates, &valid, &self.config.matching)
        };

        // Step 3: correct matched tracks
        for m in &assignment.matches {
            let track_id = ids[m.track];
            if let Some(track) = self.tracks.get_mut(&track_id) {
                track.update(&valid[m.detection], &self.model, &self.config.track);
            }
            let index = origin[m.detection];
            report.detection_track_ids[index] = Some(track_id);
            report.matches.push(MatchedPair {
                track_id,
                detection: index,
                affinity: m.affinity,
                kind: m.kind,
            });
        }
        report.unmatched_tracks = assignment.unmatched_tracks.iter().map(|&i| ids[i]).collect();

        // Step 4: start tracks for leftover detections
        for &j in &assignment.unmatched_detections {
            let tracks = &self.tracks;
            let id = self.ids.allocate(|id| tracks.contains_key(&id));
            let index = origin[j];
            debug!(track_id = %id, detection = index, "track born");
            self.tracks.insert(id, Track::new(id, &valid[j], &self.model));
            report.born.push(id);
            report.detection_track_ids[index] = Some(id);
        }

        // Step 5: purge dead tracks
        let max_staleness = self.config.lifecycle.max_staleness;
        let removed = &mut report.removed;
        self.tracks.retain(|&id, track| {
            let reason = if track.is_invalid() {
                RemovalReason::Invalid
            } else if track.is_stale(max_staleness) {
                RemovalReason::Stale
            } else {
                return true;
            };
            debug!(track_id = %id, ?reason, steps_alive = track.steps_alive(), "track removed");
            removed.push((id, reason));
            false
        });

        debug!(
            frame = report.frame,
            matched = report.matches.len(),
            born = report.born.len(),
            removed = report.removed.len(),
            rejected = report.rejected.len(),
            live = self.tracks.len(),
            "step complete"
        );
        report
    }

    /// Snapshots of tracks alive for at least `min_steps_alive` steps, by ascending id.
    pub fn active_tracks(&self, min_steps_alive: u32) -> Vec<TrackSnapshot> {
        self.active_tracks_with(&ActiveTracksFilter {
            min_steps_alive,
            ..ActiveTracksFilter::default()
        })
    }

    /// Same as [`active_tracks`](Self::active_tracks) with the configured threshold.
    pub fn active_tracks_default(&self) -> Vec<TrackSnapshot> {
        self.active_tracks(self.config.lifecycle.min_steps_alive)
    }

    pub fn active_tracks_with(&self, filter: &ActiveTracksFilter) -> Vec<TrackSnapshot> {
        self.tracks
            .values()
            .filter(|t| filter.accepts(t))
            .map(Track::snapshot)
            .collect()
    }

    /// Snapshot of one live track.
    pub fn track(&self, id: TrackId) -> Option<TrackSnapshot> {
        self.tracks.get(&id).map(Track::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::track_state::TrackState;

    fn det(x: f32) -> Detection {
        Detection::new(x, 0.0, x + 10.0, 10.0, 0.9)
    }

    #[test]
    fn test_diverged_track_is_removed_before_matching() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        let id = tracker.step_default(&[det(0.0)]).born[0];

        let report = tracker.step(&[], 1e200).unwrap();
        assert_eq!(report.removed, vec![(id, RemovalReason::Invalid)]);
        assert!(tracker.is_empty());

        let report = tracker.step_default(&[det(0.0)]);
        assert!(report.matches.is_empty());
        assert!(report.removed.is_empty());
        assert_eq!(report.born.len(), 1);
        assert_ne!(report.born[0], id);
        assert_eq!(report.detection_track_ids, vec![Some(report.born[0])]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = TrackerConfig {
            matching: MatchingConfig {
                min_iou: 0.5,
                multi_match_min_iou: Some(0.4),
                feature_weight: None,
            },
            ..TrackerConfig::default()
        };
        assert!(matches!(
            MultiObjectTracker::new(config),
            Err(ConfigError::MultiMatchBelowMinIou { .. })
        ));

        let config = TrackerConfig {
            dt: 0.0,
            ..TrackerConfig::default()
        };
        assert_eq!(
            MultiObjectTracker::new(config).err(),
            Some(ConfigError::InvalidTimeStep(0.0))
        );

        let config = TrackerConfig {
            lifecycle: LifecycleConfig {
                max_staleness: 0,
                min_steps_alive: 1,
            },
            ..TrackerConfig::default()
        };
        assert_eq!(
            MultiObjectTracker::new(config).err(),
            Some(ConfigError::ZeroMaxStaleness)
        );
    }

    #[test]
    fn test_birth_and_match() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();

        let report = tracker.step_default(&[det(0.0), det(100.0)]);
        assert_eq!(report.born, vec![TrackId::new(1), TrackId::new(2)]);
        assert!(report.matches.is_empty());
        assert_eq!(
            report.detection_track_ids,
            vec![Some(TrackId::new(1)), Some(TrackId::new(2))]
        );

        // detections arrive in the opposite order
        let report = tracker.step_default(&[det(101.0), det(1.0)]);
        assert!(report.born.is_empty());
        assert_eq!(
            report.detection_track_ids,
            vec![Some(TrackId::new(2)), Some(TrackId::new(1))]
        );
        assert_eq!(tracker.len(), 2);
        assert_eq!(
            tracker.track(TrackId::new(1)).map(|t| t.state),
            Some(TrackState::Tracked)
        );
    }

    #[test]
    fn test_rejected_detection_does_not_abort_step() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        let bad = Detection::new(f32::NAN, 0.0, 10.0, 10.0, 0.9);
        let report = tracker.step_default(&[bad, det(0.0)]);

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 0);
        assert_eq!(report.rejected[0].error, DetectionError::NonFiniteBox);
        assert_eq!(report.detection_track_ids, vec![None, Some(TrackId::new(1))]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_invalid_dt_leaves_state_untouched() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        tracker.step_default(&[det(0.0)]);

        assert!(matches!(
            tracker.step(&[det(0.0)], f64::NAN),
            Err(StepError::InvalidTimeStep(_))
        ));
        assert_eq!(
            tracker.step(&[], -1.0),
            Err(StepError::InvalidTimeStep(-1.0))
        );
        assert_eq!(tracker.frame_count(), 1);
        assert_eq!(tracker.track(TrackId::new(1)).map(|t| t.steps_alive), Some(1));
    }

    #[test]
    fn test_ids_are_per_instance() {
        let mut a = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        let mut b = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        a.step_default(&[det(0.0), det(50.0)]);
        let report = b.step_default(&[det(0.0)]);
        assert_eq!(report.born, vec![TrackId::new(1)]);
    }

    #[test]
    fn test_active_filter_ratio() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        tracker.step_default(&[det(0.0)]);
        for _ in 0..3 {
            tracker.step_default(&[]);
        }
        // staleness 3 after a single match
        assert_eq!(tracker.active_tracks(1).len(), 1);
        let filter = ActiveTracksFilter {
            min_steps_alive: 1,
            max_staleness_to_positive_ratio: 3.0,
            ..ActiveTracksFilter::default()
        };
        assert!(tracker.active_tracks_with(&filter).is_empty());
    }
}
