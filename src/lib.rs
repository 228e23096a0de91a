//! Multi-object tracking of per-frame bounding-box detections.
//!
//! [`MultiObjectTracker`] assigns stable identities to unordered, noisy
//! detections, smooths their boxes with a configurable Kalman motion model
//! and exposes the currently confirmed tracks as owned snapshots.
//!
//! ```
//! use motrack_rs::{Detection, MultiObjectTracker, TrackerConfig};
//!
//! let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
//! for _ in 0..3 {
//!     tracker.step(&[Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)], 1.0 / 30.0).unwrap();
//! }
//! assert_eq!(tracker.active_tracks(3).len(), 1);
//! ```

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::{ConfigError, DetectionError, StepError};
pub use integration::{DetectionBuilder, DetectionSource, IntoDetections, TrackerPipeline};
pub use tracker::{
    ActiveTracksFilter, ClassPolicy, Detection, IdPolicy, LifecycleConfig, MatchingConfig,
    ModelPreset, ModelSpec, MultiObjectTracker, Rect, StepReport, TrackConfig, TrackId,
    TrackSnapshot, TrackState, TrackerConfig,
};
