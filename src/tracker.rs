mod detection;
mod matching;
mod motion_model;
mod multi_object_tracker;
mod rect;
mod track;
mod track_id;
mod track_state;

pub use detection::Detection;
pub use matching::{
    AssignmentResult, Match, MatchKind, MatchingConfig, TrackCandidate, affinity_matrix,
    cosine_similarity, linear_assignment, match_detections,
};
pub use motion_model::{ModelPreset, ModelSpec, MotionModel};
pub use multi_object_tracker::{
    ActiveTracksFilter, LifecycleConfig, MatchedPair, MultiObjectTracker, RejectedDetection,
    RemovalReason, StepReport, TrackerConfig,
};
pub use rect::{Rect, iou_batch};
pub use track::{ClassPolicy, Track, TrackConfig, TrackSnapshot};
pub use track_id::{IdAllocator, IdPolicy, TrackId};
pub use track_state::TrackState;
