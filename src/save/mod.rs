//! 轨迹保存与读取
//!
//! KITTI odometry pose format, shared by the estimated trajectory and the
//! ground truth used for true-scale runs.

mod trajectory;

pub use trajectory::{parse_trajectory, read_trajectory, PoseRecord, TrajectoryWriter};
