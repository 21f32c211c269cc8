//! 估计器
//!
//! Monocular visual odometry: composes per-frame relative poses into a
//! global trajectory. The first two frames bootstrap the pose, every later
//! frame is a steady-state update.
//!
//! The engine holds only read-only collaborators and policy; all mutable
//! trajectory data lives in the caller's [EngineState], so one engine can
//! drive any number of independent sequences.

mod keypoints;
mod scale;
mod state;

pub use keypoints::{CountThreshold, KeypointLifecycle, KeypointPhase, ReplenishPolicy};
pub use scale::ScaleProvider;
pub use state::{Anchor, EngineState};

use nalgebra::{Matrix3, Vector3};

use crate::camera::CalibrationMatrix;
use crate::config::OdometryConfig;
use crate::error::{ConfigError, GeometryError, OdometryError, Result, SequencingError, Stage};
use crate::feature_tracker::{FeatureDetector, FeatureTracker};
use crate::global_types::{Correspondences, GlobalPose, RelativePose};
use crate::pose_estimator::{EstimateError, RelativePoseEstimator};

/// Translation step of a frame, rotated by the global rotation from
/// *before* this frame's rotation update. With a scale, the unit direction
/// gets the scale as its magnitude.
pub fn translation_increment(
    rotation_before: &Matrix3<f64>,
    translation: &Vector3<f64>,
    scale: Option<f64>,
) -> Vector3<f64> {
    match scale {
        None => rotation_before * translation,
        Some(scale) => match translation.try_normalize(f64::EPSILON) {
            Some(direction) => rotation_before * direction * scale,
            None => {
                log::warn!("zero relative translation, scale {} dropped", scale);
                Vector3::zeros()
            }
        },
    }
}

fn provider(frame: usize, stage: Stage) -> impl FnOnce(anyhow::Error) -> OdometryError {
    move |source| OdometryError::Provider {
        frame,
        stage,
        source,
    }
}

pub struct VisualOdometry<'k, D, T, E> {
    detector: D,
    tracker: T,
    estimator: E,
    calibration: &'k CalibrationMatrix,
    lifecycle: KeypointLifecycle,
    scale: Option<ScaleProvider>,
    min_correspondences: usize,
    orthonormalize_every: Option<usize>,
}

impl<'k, D, T, E> VisualOdometry<'k, D, T, E>
where
    E: RelativePoseEstimator,
{
    pub fn new(
        detector: D,
        tracker: T,
        estimator: E,
        calibration: &'k CalibrationMatrix,
        config: &OdometryConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let min_correspondences = config
            .min_correspondences
            .max(estimator.min_correspondences());
        Ok(Self {
            detector,
            tracker,
            estimator,
            calibration,
            lifecycle: KeypointLifecycle::with_threshold(config.min_keypoints),
            scale: None,
            min_correspondences,
            orthonormalize_every: config.orthonormalize_every,
        })
    }

    /// Enables true-scale mode.
    pub fn with_scale(mut self, scale: Option<ScaleProvider>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_policy(mut self, policy: impl ReplenishPolicy + 'static) -> Self {
        self.lifecycle = KeypointLifecycle::new(policy);
        self
    }

    pub fn is_true_scale(&self) -> bool {
        self.scale.is_some()
    }

    /// Relative pose of `cur` with respect to `prev`: the estimator gets
    /// `(cur, prev)`, so `x_prev = R x_cur + t`.
    fn relative_pose(&mut self, frame: usize, tracks: &Correspondences) -> Result<RelativePose> {
        if tracks.len() < self.min_correspondences {
            return Err(OdometryError::Geometry {
                frame,
                source: GeometryError::TooFewCorrespondences {
                    found: tracks.len(),
                    required: self.min_correspondences,
                },
            });
        }
        self.estimator
            .estimate(&tracks.cur, &tracks.prev, self.calibration)
            .map_err(|err| match err {
                EstimateError::Geometry(source) => OdometryError::Geometry { frame, source },
                EstimateError::Backend(source) => OdometryError::Provider {
                    frame,
                    stage: Stage::Estimate,
                    source,
                },
            })
    }

    /// Bootstraps the trajectory from the first two frames. The global pose
    /// becomes the raw relative pose of `image2` against `image1`, unscaled
    /// even in true-scale mode.
    pub fn initialize<I>(&mut self, state: &mut EngineState<I>, image1: I, image2: I) -> Result<GlobalPose>
    where
        D: FeatureDetector<I>,
        T: FeatureTracker<I>,
    {
        if state.is_initialized() {
            return Err(SequencingError::AlreadyInitialized.into());
        }

        let keypoints = self
            .detector
            .detect(&image1)
            .map_err(provider(0, Stage::Detect))?;
        let tracks = self
            .tracker
            .track(&image1, &image2, &keypoints)
            .map_err(provider(1, Stage::Track))?;
        let relative = self.relative_pose(1, &tracks)?;

        state.pose = GlobalPose::new(relative.rotation, relative.translation);
        state.anchor = Some(Anchor {
            image: image2,
            points: tracks.cur,
            frame: 1,
        });
        state.frame_index = 2;

        log::info!(
            "initialized with {} of {} keypoints tracked",
            state.active_points().len(),
            keypoints.len()
        );
        Ok(state.pose)
    }

    /// Processes the next frame. On any error the state is left untouched.
    pub fn update<I>(&mut self, state: &mut EngineState<I>, image: I) -> Result<GlobalPose>
    where
        D: FeatureDetector<I>,
        T: FeatureTracker<I>,
    {
        let frame = state.frame_index;
        let anchor = state
            .anchor
            .as_ref()
            .ok_or(SequencingError::NotInitialized)?;

        let (phase, prev_pts) = self
            .lifecycle
            .prepare(&mut self.detector, &anchor.image, &anchor.points)
            .map_err(provider(frame, Stage::Detect))?;
        let tracks = self
            .tracker
            .track(&anchor.image, &image, &prev_pts)
            .map_err(provider(frame, Stage::Track))?;
        let relative = self.relative_pose(frame, &tracks)?;
        // the anchor is the previous frame unless frames were skipped
        let scale = match &self.scale {
            Some(gt) => Some(gt.scale_between(anchor.frame, frame)?),
            None => None,
        };

        // translation first, it uses the rotation before this frame
        let increment = translation_increment(&state.pose.rotation, &relative.translation, scale);
        state.pose.translation += increment;
        state.pose.compose_rotation(&relative.rotation);
        if let Some(every) = self.orthonormalize_every {
            if frame % every == 0 {
                state.pose.orthonormalize();
            }
        }

        log::debug!(
            "frame {}: {:?}, {} tracked, step {:.4}",
            frame,
            phase,
            tracks.len(),
            increment.norm()
        );
        state.anchor = Some(Anchor {
            image,
            points: tracks.cur,
            frame,
        });
        state.frame_index += 1;
        Ok(state.pose)
    }
}
