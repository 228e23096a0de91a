use thiserror::Error;

/// Configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),
    #[error("{name} must be finite and positive, got {value}")]
    NonPositiveVariance { name: &'static str, value: f64 },
    #[error("{name} must be 2 for planar boxes, got {value}")]
    UnsupportedDimension { name: &'static str, value: usize },
    #[error("min_iou must lie in (0, 1], got {0}")]
    InvalidMinIou(f32),
    #[error("multi_match_min_iou ({multi}) must not be below min_iou ({min})")]
    MultiMatchBelowMinIou { min: f32, multi: f32 },
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },
    #[error("max_staleness must be at least 1")]
    ZeroMaxStaleness,
}

/// Why a detection was excluded from a step.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DetectionError {
    #[error("box has non-finite coordinates")]
    NonFiniteBox,
    #[error("box corners are inverted (negative extent)")]
    InvertedBox,
    #[error("score {0} is outside [0, 1]")]
    ScoreOutOfRange(f32),
    #[error("feature vector contains non-finite values")]
    NonFiniteFeature,
}

/// Failure of a single `step` call. The tracker is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StepError {
    #[error("time step must be finite and non-negative, got {0}")]
    InvalidTimeStep(f64),
}
