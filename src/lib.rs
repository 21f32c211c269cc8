//! Monocular visual odometry.
//!
//! Tracks sparse keypoints through an image sequence, recovers the relative
//! motion between consecutive frames from the essential matrix and chains
//! it into a global camera trajectory. Without ground truth the trajectory
//! is only known up to scale.
//!
//! nalgebra <https://docs.rs/nalgebra/latest/nalgebra/>
//!
//! opencv <https://docs.rs/opencv/latest/opencv/all.html>

pub mod camera;
pub mod config;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod feature_tracker;
#[cfg(feature = "opencv")]
pub mod global_cast;
pub mod global_types;
pub mod pose_estimator;
pub mod save;
pub mod utility;

#[cfg(test)]
mod test_utils;

pub use camera::CalibrationMatrix;
pub use config::{DetectorKind, OdometryConfig};
pub use error::{ConfigError, GeometryError, OdometryError, SequencingError};
pub use estimator::{EngineState, ScaleProvider, VisualOdometry};
pub use global_types::{GlobalPose, RelativePose};
