//! Single object track for multi-object tracking.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::tracker::detection::Detection;
use crate::tracker::motion_model::MotionModel;
use crate::tracker::rect::Rect;
use crate::tracker::track_id::TrackId;
use crate::tracker::track_state::TrackState;

/// How a track's class label follows its matched detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassPolicy {
    /// Keep the label of the detection that created the track
    FixedAtBirth,
    /// Take the label of the latest labelled detection
    Latest,
    /// Take the most frequently matched label; the current label wins ties
    #[default]
    MajorityVote,
}

/// Per-track smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Weight of the previous score in the exponential moving average
    pub score_gamma: f32,
    /// Weight of the previous feature in the exponential moving average
    pub feature_gamma: f32,
    pub class_policy: ClassPolicy,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            score_gamma: 0.8,
            feature_gamma: 0.9,
            class_policy: ClassPolicy::MajorityVote,
        }
    }
}

impl TrackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("score_gamma", self.score_gamma),
            ("feature_gamma", self.feature_gamma),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        Ok(())
    }
}

/// Owned copy of the externally visible track fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub bbox: Rect,
    pub class_id: Option<u32>,
    pub score: f32,
    pub steps_alive: u32,
    pub staleness: u32,
    pub state: TrackState,
}

/// Single object track.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    state: TrackState,
    class_id: Option<u32>,
    class_votes: BTreeMap<u32, u32>,
    score: f32,
    feature: Option<Vec<f32>>,
    /// Steps since birth, counting the birth step
    steps_alive: u32,
    /// Successful matches, counting the birth detection
    steps_positive: u32,
    /// Steps since the last successful match
    staleness: u32,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    bbox: Rect,
}

impl Track {
    /// Create a new track from an unmatched detection.
    pub fn new(id: TrackId, detection: &Detection, model: &MotionModel) -> Self {
        let (mean, covariance) = model.initiate(&detection.bbox);
        let mut class_votes = BTreeMap::new();
        if let Some(class_id) = detection.class_id {
            class_votes.insert(class_id, 1);
        }

        Self {
            id,
            state: TrackState::Born,
            class_id: detection.class_id,
            class_votes,
            score: detection.score,
            feature: detection.feature.clone(),
            steps_alive: 1,
            steps_positive: 1,
            staleness: 0,
            bbox: model.to_rect(&mean),
            mean,
            covariance,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn class_id(&self) -> Option<u32> {
        self.class_id
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn feature(&self) -> Option<&[f32]> {
        self.feature.as_deref()
    }

    pub fn steps_alive(&self) -> u32 {
        self.steps_alive
    }

    pub fn steps_positive(&self) -> u32 {
        self.steps_positive
    }

    pub fn staleness(&self) -> u32 {
        self.staleness
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Current box estimate.
    pub fn rect(&self) -> Rect {
        self.bbox
    }

    /// Advance one step. Always counts as a miss until `update` says otherwise.
    pub fn predict(&mut self, model: &MotionModel, dt: f64) {
        let (mean, covariance) = model.predict(&self.mean, &self.covariance, dt);
        self.mean = mean;
        self.covariance = covariance;
        self.bbox = model.to_rect(&self.mean);

        self.steps_alive += 1;
        self.staleness += 1;
        self.state = TrackState::Coasting;
    }

    /// Correct with a matched detection.
    pub fn update(&mut self, detection: &Detection, model: &MotionModel, config: &TrackConfig) {
        let corrected = model
            .correct(&self.mean, &self.covariance, &detection.bbox)
            .filter(|(mean, covariance)| mean.iter().chain(covariance).all(|v| v.is_finite()));
        match corrected {
            Some((mean, covariance)) => {
                self.mean = mean;
                self.covariance = covariance;
            }
            None => {
                warn!(track_id = %self.id, "degenerate correction, re-initializing state");
                let (mean, covariance) = model.initiate(&detection.bbox);
                self.mean = mean;
                self.covariance = covariance;
            }
        }
        self.bbox = model.to_rect(&self.mean);

        let gamma = config.score_gamma;
        self.score = gamma * self.score + (1.0 - gamma) * detection.score;

        if let Some(feature) = &detection.feature {
            self.blend_feature(feature, config.feature_gamma);
        }
        if let Some(class_id) = detection.class_id {
            self.vote_class(class_id, config.class_policy);
        }

        self.staleness = 0;
        self.steps_positive += 1;
        self.state = TrackState::Tracked;
    }

    fn blend_feature(&mut self, feature: &[f32], gamma: f32) {
        match &mut self.feature {
            Some(current) if current.len() == feature.len() => {
                for (c, f) in current.iter_mut().zip(feature) {
                    *c = gamma * *c + (1.0 - gamma) * f;
                }
            }
            _ => self.feature = Some(feature.to_vec()),
        }
    }

    fn vote_class(&mut self, class_id: u32, policy: ClassPolicy) {
        match policy {
            ClassPolicy::FixedAtBirth => {}
            ClassPolicy::Latest => self.class_id = Some(class_id),
            ClassPolicy::MajorityVote => {
                let votes = self.class_votes.entry(class_id).or_insert(0);
                *votes += 1;
                let votes = *votes;
                let current = self
                    .class_id
                    .and_then(|c| self.class_votes.get(&c).copied())
                    .unwrap_or(0);
                if votes > current {
                    self.class_id = Some(class_id);
                }
            }
        }
    }

    pub fn is_confirmed(&self, min_steps_alive: u32) -> bool {
        self.steps_alive >= min_steps_alive
    }

    pub fn is_stale(&self, max_staleness: u32) -> bool {
        self.staleness >= max_staleness
    }

    /// True when the mean or covariance has diverged to non-finite values.
    pub fn is_invalid(&self) -> bool {
        self.mean.iter().chain(&self.covariance).any(|v| !v.is_finite())
    }

    /// Staleness relative to the number of successful matches.
    pub fn staleness_ratio(&self) -> f32 {
        self.staleness as f32 / self.steps_positive.max(1) as f32
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            bbox: self.bbox,
            class_id: self.class_id,
            score: self.score,
            steps_alive: self.steps_alive,
            staleness: self.staleness,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::motion_model::ModelSpec;
    use approx::assert_relative_eq;

    fn model() -> MotionModel {
        MotionModel::new(ModelSpec::default()).unwrap()
    }

    fn det(class_id: u32) -> Detection {
        Detection::new(0.0, 0.0, 10.0, 10.0, 0.5).with_class(class_id)
    }

    #[test]
    fn test_birth() {
        let model = model();
        let track = Track::new(TrackId::new(7), &det(1), &model);
        assert_eq!(track.state(), TrackState::Born);
        assert_eq!(track.steps_alive(), 1);
        assert_eq!(track.staleness(), 0);
        assert_eq!(track.class_id(), Some(1));
        assert_eq!(track.rect(), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(!track.is_confirmed(2));
        assert!(track.is_confirmed(1));
    }

    #[test]
    fn test_predict_counts_miss() {
        let model = model();
        let mut track = Track::new(TrackId::new(1), &det(1), &model);
        track.predict(&model, 1.0 / 30.0);
        track.predict(&model, 1.0 / 30.0);
        assert_eq!(track.state(), TrackState::Coasting);
        assert_eq!(track.steps_alive(), 3);
        assert_eq!(track.staleness(), 2);
        assert!(track.is_stale(2));
        assert!(!track.is_stale(3));
        assert_relative_eq!(track.staleness_ratio(), 2.0);
    }

    #[test]
    fn test_update_resets_staleness_and_blends_score() {
        let model = model();
        let config = TrackConfig::default();
        let mut track = Track::new(TrackId::new(1), &det(1), &model);

        track.predict(&model, 1.0 / 30.0);
        let matched = Detection::new(0.0, 0.0, 10.0, 10.0, 1.0);
        track.update(&matched, &model, &config);

        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(track.staleness(), 0);
        assert_eq!(track.steps_positive(), 2);
        assert_relative_eq!(track.score(), 0.8 * 0.5 + 0.2 * 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_class_policies() {
        let model = model();
        let step = |track: &mut Track, class_id: u32, policy: ClassPolicy| {
            let config = TrackConfig {
                class_policy: policy,
                ..TrackConfig::default()
            };
            track.predict(&model, 1.0);
            track.update(&det(class_id), &model, &config);
        };

        let mut fixed = Track::new(TrackId::new(1), &det(1), &model);
        step(&mut fixed, 2, ClassPolicy::FixedAtBirth);
        assert_eq!(fixed.class_id(), Some(1));

        let mut latest = Track::new(TrackId::new(2), &det(1), &model);
        step(&mut latest, 2, ClassPolicy::Latest);
        assert_eq!(latest.class_id(), Some(2));

        let mut vote = Track::new(TrackId::new(3), &det(1), &model);
        step(&mut vote, 2, ClassPolicy::MajorityVote);
        // 1 vs 1: current label kept
        assert_eq!(vote.class_id(), Some(1));
        step(&mut vote, 2, ClassPolicy::MajorityVote);
        assert_eq!(vote.class_id(), Some(2));
    }

    #[test]
    fn test_feature_smoothing() {
        let model = model();
        let config = TrackConfig::default();
        let mut track = Track::new(TrackId::new(1), &det(1), &model);
        assert!(track.feature().is_none());

        track.update(&det(1).with_feature(vec![1.0, 0.0]), &model, &config);
        assert_eq!(track.feature(), Some(&[1.0, 0.0][..]));

        track.update(&det(1).with_feature(vec![0.0, 1.0]), &model, &config);
        let feature = track.feature().unwrap();
        assert_relative_eq!(feature[0], 0.9, epsilon = 1e-6);
        assert_relative_eq!(feature[1], 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_divergence_is_detected_and_recovered_on_update() {
        let model = model();
        let mut track = Track::new(TrackId::new(1), &det(1), &model);
        track.predict(&model, 1e200);
        // velocity is zero so only the covariance blows up
        assert!(track.mean.iter().all(|v| v.is_finite()));
        assert!(track.is_invalid());

        track.update(&det(1), &model, &TrackConfig::default());
        assert!(!track.is_invalid());
        assert_eq!(track.staleness(), 0);
        assert_relative_eq!(track.rect().x2, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let model = model();
        let mut track = Track::new(TrackId::new(4), &det(1), &model);
        let snapshot = track.snapshot();
        track.predict(&model, 1.0);
        assert_eq!(snapshot.steps_alive, 1);
        assert_eq!(track.steps_alive(), 2);
        assert_eq!(snapshot.id, TrackId::new(4));
    }
}
