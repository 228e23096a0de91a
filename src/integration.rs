//! Integration module for connecting object detection backends with the tracker.
//!
//! Detectors are external; this module only defines the seam they plug into
//! and a pipeline that feeds their output through `MultiObjectTracker`.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use pipeline::TrackerPipeline;
