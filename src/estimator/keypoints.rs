//! 关键点生命周期
//!
//! Once per frame the active keypoints are either kept for tracking or
//! thrown away and re-detected on the reference image. Replacement is
//! wholesale: surviving tracks are never merged with fresh detections.

use std::borrow::Cow;

use crate::feature_tracker::FeatureDetector;
use crate::global_types::Keypoints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointPhase {
    /// Enough live tracks, keep them.
    Tracking,
    /// Too few tracks left, re-detect.
    Replenishing,
}

pub trait ReplenishPolicy {
    fn phase(&self, live: usize) -> KeypointPhase;
}

/// Re-detect when fewer than `min_keypoints` survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountThreshold {
    pub min_keypoints: usize,
}

impl ReplenishPolicy for CountThreshold {
    fn phase(&self, live: usize) -> KeypointPhase {
        if live < self.min_keypoints {
            KeypointPhase::Replenishing
        } else {
            KeypointPhase::Tracking
        }
    }
}

pub struct KeypointLifecycle {
    policy: Box<dyn ReplenishPolicy>,
}

impl KeypointLifecycle {
    pub fn new(policy: impl ReplenishPolicy + 'static) -> Self {
        Self {
            policy: Box::new(policy),
        }
    }

    pub fn with_threshold(min_keypoints: usize) -> Self {
        Self::new(CountThreshold { min_keypoints })
    }

    pub fn phase(&self, live: usize) -> KeypointPhase {
        self.policy.phase(live)
    }

    /// Points to track out of `image` this frame. Nothing is written back:
    /// the caller commits the result only once the frame succeeds.
    pub fn prepare<'a, I, D>(
        &self,
        detector: &mut D,
        image: &I,
        points: &'a Keypoints,
    ) -> anyhow::Result<(KeypointPhase, Cow<'a, Keypoints>)>
    where
        I: ?Sized,
        D: FeatureDetector<I> + ?Sized,
    {
        match self.phase(points.len()) {
            KeypointPhase::Tracking => Ok((KeypointPhase::Tracking, Cow::Borrowed(points))),
            KeypointPhase::Replenishing => {
                let fresh = detector.detect(image)?;
                log::debug!(
                    "replenishing keypoints: {} live, {} detected",
                    points.len(),
                    fresh.len()
                );
                Ok((KeypointPhase::Replenishing, Cow::Owned(fresh)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    struct CountingDetector {
        calls: usize,
    }

    impl FeatureDetector<()> for CountingDetector {
        fn detect(&mut self, _image: &()) -> anyhow::Result<Keypoints> {
            self.calls += 1;
            Ok(vec![Point2::new(1.0, 1.0); 50])
        }
    }

    #[test]
    fn test_count_threshold() {
        let policy = CountThreshold { min_keypoints: 10 };
        assert_eq!(policy.phase(0), KeypointPhase::Replenishing);
        assert_eq!(policy.phase(9), KeypointPhase::Replenishing);
        assert_eq!(policy.phase(10), KeypointPhase::Tracking);
        assert_eq!(policy.phase(2000), KeypointPhase::Tracking);
    }

    #[test]
    fn test_prepare_keeps_live_points() {
        let lifecycle = KeypointLifecycle::with_threshold(3);
        let mut detector = CountingDetector { calls: 0 };
        let points = vec![Point2::new(5.0, 5.0); 3];
        let (phase, kept) = lifecycle.prepare(&mut detector, &(), &points).unwrap();
        assert_eq!(phase, KeypointPhase::Tracking);
        assert!(matches!(kept, Cow::Borrowed(_)));
        assert_eq!(kept.len(), 3);
        assert_eq!(detector.calls, 0);
    }

    #[test]
    fn test_prepare_replaces_wholesale() {
        let lifecycle = KeypointLifecycle::with_threshold(3);
        let mut detector = CountingDetector { calls: 0 };
        let points = vec![Point2::new(5.0, 5.0); 2];
        let (phase, fresh) = lifecycle.prepare(&mut detector, &(), &points).unwrap();
        assert_eq!(phase, KeypointPhase::Replenishing);
        assert_eq!(fresh.len(), 50);
        assert!(fresh.iter().all(|p| *p == Point2::new(1.0, 1.0)));
        assert_eq!(detector.calls, 1);
    }

    #[test]
    fn test_custom_policy() {
        struct Always;
        impl ReplenishPolicy for Always {
            fn phase(&self, _live: usize) -> KeypointPhase {
                KeypointPhase::Replenishing
            }
        }
        let lifecycle = KeypointLifecycle::new(Always);
        assert_eq!(lifecycle.phase(1_000_000), KeypointPhase::Replenishing);
    }
}
