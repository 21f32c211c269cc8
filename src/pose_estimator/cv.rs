use opencv::core::{Mat, Vector};
use opencv::prelude::*;

use super::{EstimateError, RelativePoseEstimator};
use crate::camera::CalibrationMatrix;
use crate::config::EssentialConfig;
use crate::error::GeometryError;
use crate::global_cast::{keypoints_to_cv, Matrix3d, Vector3d};
use crate::global_types::{Keypoints, RelativePose};

/// `findEssentialMat` (RANSAC) followed by `recoverPose`.
#[derive(Debug, Clone)]
pub struct EssentialMatEstimator {
    config: EssentialConfig,
}

impl EssentialMatEstimator {
    pub fn new(config: &EssentialConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn solve(
        &self,
        points_a: &Keypoints,
        points_b: &Keypoints,
        calibration: &CalibrationMatrix,
    ) -> opencv::Result<Option<(RelativePose, i32)>> {
        let aa = keypoints_to_cv(points_a);
        let bb = keypoints_to_cv(points_b);
        let cam_mat = Mat::try_from(&Matrix3d(*calibration.matrix()))?;

        let mut mask = Vector::<u8>::new();
        let essential = opencv::calib3d::find_essential_mat(
            &aa,
            &bb,
            &cam_mat,
            opencv::calib3d::RANSAC,
            self.config.probability,
            self.config.threshold,
            self.config.max_iterations,
            &mut mask,
        )?;
        // several solutions may come stacked, keep the first
        if essential.rows() < 3 || essential.cols() != 3 {
            return Ok(None);
        }
        let essential = if essential.rows() > 3 {
            essential.row_bounds(0, 3)?.try_clone()?
        } else {
            essential
        };

        let mut rot = Mat::default();
        let mut trans = Mat::default();
        let inlier_cnt = opencv::calib3d::recover_pose_estimated(
            &essential, &aa, &bb, &cam_mat, &mut rot, &mut trans, &mut mask,
        )?;

        let rotation = Matrix3d::try_from(&rot)?.0;
        let translation = Vector3d::try_from(&trans)?.0;
        Ok(Some((
            RelativePose {
                rotation,
                translation,
            },
            inlier_cnt,
        )))
    }
}

impl RelativePoseEstimator for EssentialMatEstimator {
    fn estimate(
        &mut self,
        points_a: &Keypoints,
        points_b: &Keypoints,
        calibration: &CalibrationMatrix,
    ) -> Result<RelativePose, EstimateError> {
        let solved = self
            .solve(points_a, points_b, calibration)
            .map_err(|e| EstimateError::Backend(e.into()))?;
        match solved {
            None => Err(GeometryError::NoSolution("RANSAC found no essential matrix".to_string()).into()),
            Some((_, inliers)) if inliers <= 0 => Err(GeometryError::NoSolution(
                "no points in front of both cameras".to_string(),
            )
            .into()),
            Some((pose, inliers)) => {
                log::trace!("recoverPose inliers: {}/{}", inliers, points_a.len());
                Ok(pose)
            }
        }
    }
}
