//! 相机模型
//!
//! Only the pinhole model is supported; images are assumed undistorted.

mod pinhole_camera;
pub use pinhole_camera::CalibrationMatrix;

use nalgebra::Vector3;

use crate::global_types::Keypoint;

/// 相机的trait
pub trait CameraTrait {
    /// Pixel to ray on the normalized image plane (z = 1).
    fn lift_projective(&self, p: &Keypoint) -> Vector3<f64>;
    /// Camera-frame point to pixel.
    fn project(&self, p: &Vector3<f64>) -> Keypoint;
}
