//! True-scale correction from a ground-truth trajectory.

use crate::error::ConfigError;
use crate::save::PoseRecord;

/// Inter-frame translation magnitude read from ground truth. The trajectory
/// must be sampled at the same rate and alignment as the image sequence.
#[derive(Debug, Clone)]
pub struct ScaleProvider {
    ground_truth: Vec<PoseRecord>,
}

impl ScaleProvider {
    pub fn new(ground_truth: Vec<PoseRecord>) -> Self {
        Self { ground_truth }
    }

    /// True-scale mode needs a ground-truth source; without the mode any
    /// trajectory given is ignored.
    pub fn from_options(
        true_scale: bool,
        ground_truth: Option<Vec<PoseRecord>>,
    ) -> Result<Option<Self>, ConfigError> {
        match (true_scale, ground_truth) {
            (true, Some(gt)) => Ok(Some(Self::new(gt))),
            (true, None) => Err(ConfigError::MissingGroundTruth),
            (false, Some(_)) => {
                log::warn!("ground truth given without true-scale mode, ignored");
                Ok(None)
            }
            (false, None) => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.ground_truth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ground_truth.is_empty()
    }

    /// Distance between the ground-truth positions of frames
    /// `frame_index - 1` and `frame_index`.
    pub fn scale_at(&self, frame_index: usize) -> Result<f64, ConfigError> {
        if frame_index == 0 {
            return Err(ConfigError::InvalidConfig(
                "scale of frame 0 is undefined".to_string(),
            ));
        }
        self.scale_between(frame_index - 1, frame_index)
    }

    /// Distance between the ground-truth positions of frames `from` and `to`.
    pub fn scale_between(&self, from: usize, to: usize) -> Result<f64, ConfigError> {
        let last = from.max(to);
        if last >= self.ground_truth.len() {
            return Err(ConfigError::GroundTruthTooShort {
                required: last + 1,
                available: self.ground_truth.len(),
            });
        }
        let prev = self.ground_truth[from].translation();
        let cur = self.ground_truth[to].translation();
        Ok((cur - prev).norm())
    }

    /// Fails up front if a sequence of `frames` images would run past the end
    /// of the ground truth.
    pub fn ensure_covers(&self, frames: usize) -> Result<(), ConfigError> {
        if self.ground_truth.len() < frames {
            return Err(ConfigError::GroundTruthTooShort {
                required: frames,
                available: self.ground_truth.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    fn at(x: f64, y: f64, z: f64) -> PoseRecord {
        PoseRecord {
            rotation: Matrix3::identity(),
            translation: Vector3::new(x, y, z),
        }
    }

    #[test]
    fn test_scale_at() {
        let provider = ScaleProvider::new(vec![at(5.0, 5.0, 5.0), at(0.0, 0.0, 0.0), at(1.0, 0.0, 0.0)]);
        assert_eq!(provider.scale_at(2).unwrap(), 1.0);
        assert_relative_eq!(provider.scale_at(1).unwrap(), 75f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_scale_between_spans_gap() {
        let provider = ScaleProvider::new(vec![
            at(0.0, 0.0, 0.0),
            at(0.0, 0.0, 1.0),
            at(0.0, 0.0, 1.5),
            at(0.0, 0.0, 11.5),
        ]);
        assert_relative_eq!(provider.scale_between(1, 3).unwrap(), 10.5, epsilon = 1e-12);
        assert_eq!(provider.scale_between(2, 3).unwrap(), provider.scale_at(3).unwrap());
        assert!(matches!(
            provider.scale_between(1, 4),
            Err(ConfigError::GroundTruthTooShort {
                required: 5,
                available: 4
            })
        ));
    }

    #[test]
    fn test_scale_past_end() {
        let provider = ScaleProvider::new(vec![at(0.0, 0.0, 0.0), at(1.0, 0.0, 0.0)]);
        assert!(matches!(
            provider.scale_at(2),
            Err(ConfigError::GroundTruthTooShort {
                required: 3,
                available: 2
            })
        ));
        assert!(provider.scale_at(0).is_err());
        assert!(provider.ensure_covers(2).is_ok());
        assert!(provider.ensure_covers(3).is_err());
    }

    #[test]
    fn test_from_options() {
        assert!(matches!(
            ScaleProvider::from_options(true, None),
            Err(ConfigError::MissingGroundTruth)
        ));
        assert!(ScaleProvider::from_options(false, None).unwrap().is_none());
        assert!(ScaleProvider::from_options(false, Some(vec![at(0.0, 0.0, 0.0)]))
            .unwrap()
            .is_none());
        let provider = ScaleProvider::from_options(true, Some(vec![at(0.0, 0.0, 0.0)]))
            .unwrap()
            .unwrap();
        assert_eq!(provider.len(), 1);
    }
}
