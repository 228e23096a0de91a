//! TrackerPipeline for combining detection with tracking.

use crate::error::ConfigError;
use crate::tracker::{MultiObjectTracker, TrackSnapshot, TrackerConfig};

use super::DetectionSource;

/// A combined tracker that bundles detection inference with the tracker.
///
/// Frames are assumed to arrive at the configured `dt`.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: MultiObjectTracker,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    /// Create a new tracking pipeline with the given detector and tracker config.
    pub fn new(detector: D, config: TrackerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            detector,
            tracker: MultiObjectTracker::new(config)?,
        })
    }

    /// Create a new tracking pipeline with default tracker configuration.
    pub fn with_default_config(detector: D) -> Result<Self, ConfigError> {
        Self::new(detector, TrackerConfig::default())
    }

    /// Process a single frame and return the confirmed tracks.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<TrackSnapshot>, D::Error> {
        let detections = self.detector.detect(input, width, height)?;
        self.tracker.step_default(&detections);
        Ok(self.tracker.active_tracks_default())
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &MultiObjectTracker {
        &self.tracker
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn tracker_mut(&mut self) -> &mut MultiObjectTracker {
        &mut self.tracker
    }
}
