//! 特征追踪
//!
//! Keypoint detection and sparse optical-flow tracking. The odometry engine
//! only sees the two traits below; [`cv`] holds the production backends.

#[cfg(feature = "opencv")]
pub mod cv;

use crate::global_types::{Correspondences, Keypoints};

/// Image to keypoints.
pub trait FeatureDetector<I: ?Sized> {
    fn detect(&mut self, image: &I) -> anyhow::Result<Keypoints>;
}

/// Tracks `prev_pts` from `prev` into `cur`. Pairs the tracker marks
/// invalid are dropped, the two returned sets stay index-aligned.
pub trait FeatureTracker<I: ?Sized> {
    fn track(&mut self, prev: &I, cur: &I, prev_pts: &Keypoints) -> anyhow::Result<Correspondences>;
}

impl<I: ?Sized, D: FeatureDetector<I> + ?Sized> FeatureDetector<I> for &mut D {
    fn detect(&mut self, image: &I) -> anyhow::Result<Keypoints> {
        (**self).detect(image)
    }
}

impl<I: ?Sized, T: FeatureTracker<I> + ?Sized> FeatureTracker<I> for &mut T {
    fn track(&mut self, prev: &I, cur: &I, prev_pts: &Keypoints) -> anyhow::Result<Correspondences> {
        (**self).track(prev, cur, prev_pts)
    }
}

/// 删除状态为 false 的点。
#[inline]
pub fn reduce_vector<T: Clone>(v: &[T], status: &[bool]) -> Vec<T> {
    status
        .iter()
        .zip(v.iter())
        .filter(|(state, _)| **state)
        .map(|(_, p)| p.clone())
        .collect()
}
