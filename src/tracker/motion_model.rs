//! Linear kinematic motion model and Kalman filter for bounding box tracking.
//!
//! The state holds, for every position axis, the position followed by its
//! derivatives up to `order_pos`, then the same chain for every size axis up
//! to `order_size`. Positions are box centers, sizes are box extents. The
//! measurement is `[cx, cy, w, h]`.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracker::rect::Rect;

/// Motion model configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// Highest derivative tracked for position (1 = velocity, 2 = acceleration)
    pub order_pos: usize,
    /// Number of position axes
    pub dim_pos: usize,
    /// Highest derivative tracked for size
    pub order_size: usize,
    /// Number of size axes
    pub dim_size: usize,
    /// Process noise variance for position chains
    pub q_var_pos: f64,
    /// Measurement noise variance for position
    pub r_var_pos: f64,
    /// Process noise variance for size chains
    pub q_var_size: f64,
    /// Measurement noise variance for size
    pub r_var_size: f64,
    /// Diagonal of the covariance a new track starts with
    pub p_cov_p0: f64,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            order_pos: 1,
            dim_pos: 2,
            order_size: 0,
            dim_size: 2,
            q_var_pos: 70.0,
            r_var_pos: 0.1,
            q_var_size: 10.0,
            r_var_size: 1.0,
            p_cov_p0: 1000.0,
        }
    }
}

impl ModelSpec {
    /// Length of the state vector described by this spec.
    pub fn state_length(&self) -> usize {
        self.dim_pos * (self.order_pos + 1) + self.dim_size * (self.order_size + 1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim_pos != 2 {
            return Err(ConfigError::UnsupportedDimension {
                name: "dim_pos",
                value: self.dim_pos,
            });
        }
        if self.dim_size != 2 {
            return Err(ConfigError::UnsupportedDimension {
                name: "dim_size",
                value: self.dim_size,
            });
        }
        let variances = [
            ("q_var_pos", self.q_var_pos),
            ("r_var_pos", self.r_var_pos),
            ("q_var_size", self.q_var_size),
            ("r_var_size", self.r_var_size),
            ("p_cov_p0", self.p_cov_p0),
        ];
        for (name, value) in variances {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveVariance { name, value });
            }
        }
        Ok(())
    }
}

/// Named motion model presets. Noise parameters come from [`ModelSpec::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPreset {
    /// Position and size held constant between corrections
    StaticBox2d,
    /// Constant velocity, static box size
    ConstantVelocityStaticSize2d,
    /// Constant acceleration, static box size
    ConstantAccelerationStaticSize2d,
    /// Constant velocity for both position and size
    ConstantVelocityAndSize2d,
}

impl ModelPreset {
    pub fn spec(self) -> ModelSpec {
        let (order_pos, order_size) = match self {
            ModelPreset::StaticBox2d => (0, 0),
            ModelPreset::ConstantVelocityStaticSize2d => (1, 0),
            ModelPreset::ConstantAccelerationStaticSize2d => (2, 0),
            ModelPreset::ConstantVelocityAndSize2d => (1, 1),
        };
        ModelSpec {
            order_pos,
            order_size,
            ..ModelSpec::default()
        }
    }
}

impl From<ModelPreset> for ModelSpec {
    fn from(preset: ModelPreset) -> Self {
        preset.spec()
    }
}

const MEASUREMENT_DIM: usize = 4;

#[derive(Debug, Clone)]
pub struct MotionModel {
    spec: ModelSpec,
    update_mat: Array2<f64>,
    measurement_cov: Array2<f64>,
}

impl MotionModel {
    pub fn new(spec: ModelSpec) -> Result<Self, ConfigError> {
        spec.validate()?;

        let n = spec.state_length();
        let mut model = Self {
            spec,
            update_mat: Array2::zeros((MEASUREMENT_DIM, n)),
            measurement_cov: Array2::zeros((MEASUREMENT_DIM, MEASUREMENT_DIM)),
        };

        for axis in 0..2 {
            let pos = model.pos_index(axis);
            let size = model.size_index(axis);
            model.update_mat[[axis, pos]] = 1.0;
            model.update_mat[[2 + axis, size]] = 1.0;
            model.measurement_cov[[axis, axis]] = spec.r_var_pos;
            model.measurement_cov[[2 + axis, 2 + axis]] = spec.r_var_size;
        }

        Ok(model)
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn state_length(&self) -> usize {
        self.spec.state_length()
    }

    #[inline]
    fn pos_index(&self, axis: usize) -> usize {
        axis * (self.spec.order_pos + 1)
    }

    #[inline]
    fn size_index(&self, axis: usize) -> usize {
        self.spec.dim_pos * (self.spec.order_pos + 1) + axis * (self.spec.order_size + 1)
    }

    /// Build the transition matrix `F` and the diagonal process noise `Q` for `dt`.
    ///
    /// Each derivative chain uses the kinematic block
    /// `F[i][j] = dt^(j-i) / (j-i)!` and the diagonal of the discrete white
    /// noise model driven through the highest derivative.
    pub fn transition(&self, dt: f64) -> (Array2<f64>, Array2<f64>) {
        let n = self.state_length();
        let mut motion_mat = Array2::<f64>::eye(n);
        let mut motion_cov = Array2::<f64>::zeros((n, n));

        let chains = (0..self.spec.dim_pos)
            .map(|axis| (self.pos_index(axis), self.spec.order_pos, self.spec.q_var_pos))
            .chain((0..self.spec.dim_size).map(|axis| {
                (self.size_index(axis), self.spec.order_size, self.spec.q_var_size)
            }));

        for (base, order, q_var) in chains {
            for i in 0..=order {
                for j in (i + 1)..=order {
                    motion_mat[[base + i, base + j]] = dt.powi((j - i) as i32) / factorial(j - i);
                }
                let gamma = dt.powi((order - i) as i32) / factorial(order - i);
                motion_cov[[base + i, base + i]] = q_var * gamma * gamma;
            }
        }

        (motion_mat, motion_cov)
    }

    /// Map a box onto the measurement space: `[cx, cy, w, h]`.
    pub fn measurement(bbox: &Rect) -> [f64; 4] {
        let (cx, cy) = bbox.center();
        let (w, h) = bbox.size();
        [cx as f64, cy as f64, w as f64, h as f64]
    }

    /// Initial state for a box: zero derivatives, scaled identity covariance.
    pub fn initiate(&self, bbox: &Rect) -> (Array1<f64>, Array2<f64>) {
        let n = self.state_length();
        let z = Self::measurement(bbox);

        let mut mean = Array1::<f64>::zeros(n);
        for axis in 0..2 {
            mean[self.pos_index(axis)] = z[axis];
            mean[self.size_index(axis)] = z[2 + axis];
        }

        let covariance = Array2::<f64>::eye(n) * self.spec.p_cov_p0;
        (mean, covariance)
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        dt: f64,
    ) -> (Array1<f64>, Array2<f64>) {
        let (motion_mat, motion_cov) = self.transition(dt);

        let new_mean = motion_mat.dot(mean);
        let new_covariance = motion_mat.dot(covariance).dot(&motion_mat.t()) + motion_cov;

        (new_mean, symmetrize(new_covariance))
    }

    /// Project the state distribution onto the measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + &self.measurement_cov;

        (mean_proj, covariance_proj)
    }

    /// Kalman correction with a measured box.
    ///
    /// Returns `None` if the innovation covariance cannot be inverted.
    pub fn correct(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        bbox: &Rect,
    ) -> Option<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement = Array1::from_vec(Self::measurement(bbox).to_vec());
        let innovation = measurement - projected_mean;

        // K = P * H^T * S^-1
        let s_inv = invert_4x4(&projected_cov)?;
        let pht = covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        let new_mean = mean + &kalman_gain.dot(&innovation);

        // P = (I - K * H) * P
        let identity = Array2::<f64>::eye(self.state_length());
        let new_covariance = (identity - kalman_gain.dot(&self.update_mat)).dot(covariance);

        Some((new_mean, symmetrize(new_covariance)))
    }

    /// Box described by the 0th-order terms of a state vector.
    pub fn to_rect(&self, mean: &Array1<f64>) -> Rect {
        let cx = mean[self.pos_index(0)] as f32;
        let cy = mean[self.pos_index(1)] as f32;
        let w = (mean[self.size_index(0)] as f32).max(0.0);
        let h = (mean[self.size_index(1)] as f32).max(0.0);
        Rect::from_center_size(cx, cy, w, h)
    }
}

fn factorial(k: usize) -> f64 {
    (1..=k).map(|v| v as f64).product()
}

fn symmetrize(m: Array2<f64>) -> Array2<f64> {
    (&m + &m.t()) * 0.5
}

/// Invert a 4x4 matrix using nalgebra (pure Rust).
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}
