//! Synthetic pinhole scene for tests: fixed landmarks observed by a list of
//! camera poses. Frames are plain indices.

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::camera::{CalibrationMatrix, CameraTrait};
use crate::feature_tracker::{FeatureDetector, FeatureTracker};
use crate::global_types::{Correspondences, Keypoints};

/// Rotation about the camera y axis (yaw), degrees.
pub fn yaw(degrees: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::y_axis(), degrees.to_radians()).into_inner()
}

pub struct SyntheticScene {
    pub calibration: CalibrationMatrix,
    pub landmarks: Vec<Vector3<f64>>,
    /// World to camera, `x_c = R x_w + t`.
    pub poses: Vec<(Matrix3<f64>, Vector3<f64>)>,
}

impl SyntheticScene {
    pub fn new(poses: Vec<(Matrix3<f64>, Vector3<f64>)>) -> Self {
        let calibration =
            CalibrationMatrix::new(Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0))
                .unwrap();
        let mut landmarks = Vec::new();
        for i in 0..8 {
            for j in 0..6 {
                let x = -3.5 + i as f64;
                let y = -2.5 + j as f64;
                let z = 8.0 + ((i * 3 + j * 5) % 7) as f64 * 1.5;
                landmarks.push(Vector3::new(x, y, z));
            }
        }
        Self {
            calibration,
            landmarks,
            poses,
        }
    }

    pub fn project(&self, frame: usize) -> Keypoints {
        let (r, t) = &self.poses[frame];
        self.landmarks
            .iter()
            .map(|x| self.calibration.project(&(r * x + t)))
            .collect()
    }
}

impl FeatureDetector<usize> for SyntheticScene {
    fn detect(&mut self, image: &usize) -> anyhow::Result<Keypoints> {
        Ok(self.project(*image))
    }
}

impl FeatureTracker<usize> for SyntheticScene {
    /// Matches each previous point to the landmark it was projected from.
    fn track(&mut self, prev: &usize, cur: &usize, prev_pts: &Keypoints) -> anyhow::Result<Correspondences> {
        let in_prev = self.project(*prev);
        let in_cur = self.project(*cur);
        let mut tracks = Correspondences::default();
        for p in prev_pts {
            if let Some(k) = in_prev.iter().position(|q| (q - p).norm() < 1e-6) {
                tracks.prev.push(*p);
                tracks.cur.push(in_cur[k]);
            }
        }
        Ok(tracks)
    }
}
