//! OpenCV 特征检测与光流追踪

use anyhow::Result;
use opencv::{
    core::*,
    features2d::{FastFeatureDetector, FastFeatureDetector_DetectorType, ORB_ScoreType, ORB, SIFT},
    imgproc::{COLOR_GRAY2BGR, LINE_8},
    prelude::*,
};

use super::{reduce_vector, FeatureDetector, FeatureTracker};
use crate::config::{DetectorConfig, DetectorKind, TrackerConfig, FLOW_BACK_TOLERANCE};
use crate::global_cast::{keypoints_from_cv, keypoints_to_cv};
use crate::global_types::{Correspondences, Keypoint, Keypoints};

enum Backend {
    Fast(Ptr<FastFeatureDetector>),
    Sift(Ptr<SIFT>),
    Orb(Ptr<ORB>),
    Gftt { max_corners: i32, min_distance: f64 },
}

/// Keypoint detector selected by [DetectorKind].
pub struct OpenCvDetector {
    kind: DetectorKind,
    backend: Backend,
}

impl OpenCvDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let backend = match config.kind {
            DetectorKind::Fast => Backend::Fast(FastFeatureDetector::create(
                config.fast_threshold,
                true,
                FastFeatureDetector_DetectorType::TYPE_9_16,
            )?),
            DetectorKind::Sift => {
                Backend::Sift(SIFT::create(config.max_features, 3, 0.04, 10.0, 1.6, false)?)
            }
            DetectorKind::Orb => Backend::Orb(ORB::create(
                config.max_features,
                1.2,
                8,
                31,
                0,
                2,
                ORB_ScoreType::HARRIS_SCORE,
                31,
                20,
            )?),
            DetectorKind::Gftt => Backend::Gftt {
                max_corners: config.max_features,
                min_distance: config.min_distance,
            },
        };
        log::info!("feature detector: {:?}", config.kind);
        Ok(Self {
            kind: config.kind,
            backend,
        })
    }

    pub fn kind(&self) -> DetectorKind {
        self.kind
    }
}

impl FeatureDetector<Mat> for OpenCvDetector {
    fn detect(&mut self, image: &Mat) -> Result<Keypoints> {
        let mask = Mat::default();
        let mut keypoints = Vector::<KeyPoint>::new();
        match &mut self.backend {
            Backend::Fast(detector) => detector.detect(image, &mut keypoints, &mask)?,
            Backend::Sift(detector) => detector.detect(image, &mut keypoints, &mask)?,
            Backend::Orb(detector) => detector.detect(image, &mut keypoints, &mask)?,
            Backend::Gftt {
                max_corners,
                min_distance,
            } => {
                let mut corners = Vector::<Point2f>::new();
                opencv::imgproc::good_features_to_track(
                    image,
                    &mut corners,
                    *max_corners,
                    0.01,
                    *min_distance,
                    &mask,
                    3,
                    false,
                    0.04,
                )?;
                return Ok(keypoints_from_cv(&corners));
            }
        }
        let points: Vector<Point2f> = keypoints.iter().map(|kp| kp.pt()).collect();
        Ok(keypoints_from_cv(&points))
    }
}

/// 金字塔 LK 光流追踪
#[derive(Debug, Clone)]
pub struct LucasKanadeTracker {
    config: TrackerConfig,
}

impl LucasKanadeTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn criteria(&self) -> Result<TermCriteria> {
        Ok(TermCriteria::new(
            TermCriteria_EPS + TermCriteria_COUNT,
            self.config.max_iterations,
            self.config.epsilon,
        )?)
    }

    /// 判断点是否在图像边界内。
    #[inline]
    fn in_border(pt: &Point2f, rows: i32, cols: i32) -> bool {
        const BORDER_SIZE: i32 = 1;
        let img_x = pt.x.round() as i32;
        let img_y = pt.y.round() as i32;

        img_x >= BORDER_SIZE
            && img_x < cols - BORDER_SIZE
            && img_y >= BORDER_SIZE
            && img_y < rows - BORDER_SIZE
    }

    /// 计算两个点之间的欧几里得距离。
    #[inline]
    fn distance(a: &Point2f, b: &Point2f) -> f32 {
        let dx = a.x - b.x;
        let dy = a.y - b.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl FeatureTracker<Mat> for LucasKanadeTracker {
    fn track(&mut self, prev: &Mat, cur: &Mat, prev_pts: &Keypoints) -> Result<Correspondences> {
        if prev_pts.is_empty() {
            return Ok(Correspondences::default());
        }
        let prev_cv = keypoints_to_cv(prev_pts);
        let mut cur_cv = Vector::<Point2f>::new();
        let mut status = Vector::<u8>::new();
        let mut err = Vector::<f32>::new();
        let win = Size::new(self.config.window_size, self.config.window_size);
        opencv::video::calc_optical_flow_pyr_lk(
            prev,
            cur,
            &prev_cv,
            &mut cur_cv,
            &mut status,
            &mut err,
            win,
            self.config.max_level,
            self.criteria()?,
            0,
            1e-4,
        )?;

        let mut valid: Vec<bool> = status.iter().map(|s| s != 0).collect();

        // reverse check
        if self.config.flow_back {
            let mut reverse_status = Vector::<u8>::new();
            let mut reverse_pts = prev_cv.clone();
            opencv::video::calc_optical_flow_pyr_lk(
                cur,
                prev,
                &cur_cv,
                &mut reverse_pts,
                &mut reverse_status,
                &mut err,
                win,
                1,
                self.criteria()?,
                opencv::video::OPTFLOW_USE_INITIAL_FLOW,
                1e-4,
            )?;
            for (i, v) in valid.iter_mut().enumerate() {
                *v = *v
                    && reverse_status.get(i)? != 0
                    && Self::distance(&prev_cv.get(i)?, &reverse_pts.get(i)?)
                        <= FLOW_BACK_TOLERANCE;
            }
        }

        // in_border
        let (rows, cols) = (cur.rows(), cur.cols());
        for (v, pt) in valid.iter_mut().zip(cur_cv.iter()) {
            *v = *v && Self::in_border(&pt, rows, cols);
        }

        let cur_pts = keypoints_from_cv(&cur_cv);
        Ok(Correspondences {
            prev: reduce_vector(prev_pts, &valid),
            cur: reduce_vector(&cur_pts, &valid),
        })
    }
}

/// 绘制当前活跃的特征点
pub fn draw_track(cur_img: &Mat, points: &[Keypoint]) -> Result<Mat> {
    let mut img_track = Mat::default();
    if cur_img.channels() == 1 {
        opencv::imgproc::cvt_color(cur_img, &mut img_track, COLOR_GRAY2BGR, 0)?;
    } else {
        img_track = cur_img.try_clone()?;
    }

    for p in points {
        opencv::imgproc::circle(
            &mut img_track,
            Point2i::new(p.x as i32, p.y as i32),
            2,
            Scalar::from((0, 255, 0)),
            2,
            LINE_8,
            0,
        )?;
    }
    Ok(img_track)
}
