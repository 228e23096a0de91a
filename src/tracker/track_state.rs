/// Track state enumeration for object tracking lifecycle.
///
/// Removed tracks are dropped from the tracker, so there is no dead state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created from an unmatched detection this step
    #[default]
    Born,
    /// Matched to a detection on the latest step
    Tracked,
    /// Not matched on the latest step; motion model only
    Coasting,
}
