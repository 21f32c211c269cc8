//! 相对位姿估计
//!
//! Recovers the rotation and unit translation between two calibrated views
//! from their point correspondences.

#[cfg(feature = "opencv")]
pub mod cv;
mod essential;

pub use essential::EightPointEstimator;

use crate::camera::CalibrationMatrix;
use crate::config::MIN_CORRESPONDENCES;
use crate::error::GeometryError;
use crate::global_types::{Keypoints, RelativePose};

/// Failure of a pose estimator: either the geometry has no acceptable
/// solution, or the backend itself broke.
#[derive(Debug)]
pub enum EstimateError {
    Geometry(GeometryError),
    Backend(anyhow::Error),
}

impl From<GeometryError> for EstimateError {
    fn from(err: GeometryError) -> Self {
        EstimateError::Geometry(err)
    }
}

/// `estimate(a, b, k)` returns the motion with `x_b = R * x_a + t`, `|t| = 1`.
pub trait RelativePoseEstimator {
    fn estimate(
        &mut self,
        points_a: &Keypoints,
        points_b: &Keypoints,
        calibration: &CalibrationMatrix,
    ) -> Result<RelativePose, EstimateError>;

    /// Fewest correspondences the estimator can work with.
    fn min_correspondences(&self) -> usize {
        MIN_CORRESPONDENCES
    }
}

impl<E: RelativePoseEstimator + ?Sized> RelativePoseEstimator for &mut E {
    fn estimate(
        &mut self,
        points_a: &Keypoints,
        points_b: &Keypoints,
        calibration: &CalibrationMatrix,
    ) -> Result<RelativePose, EstimateError> {
        (**self).estimate(points_a, points_b, calibration)
    }

    fn min_correspondences(&self) -> usize {
        (**self).min_correspondences()
    }
}
