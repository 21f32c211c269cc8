//! Tuning constants and the run configuration.

use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 关键点数量低于该值时重新检测。
pub const MIN_NUM_FEATURES: usize = 2000;
/// Essential matrix estimation needs at least this many correspondences.
pub const MIN_CORRESPONDENCES: usize = 8;
/// 光流窗口大小
pub const LK_WINDOW_SIZE: i32 = 21;
pub const LK_MAX_LEVEL: i32 = 3;
pub const LK_MAX_ITERATIONS: i32 = 30;
pub const LK_EPSILON: f64 = 0.01;
/// 反向光流检查的最大误差（像素）
pub const FLOW_BACK_TOLERANCE: f32 = 0.5;
pub const FAST_THRESHOLD: i32 = 25;
pub const MAX_FEATURES: i32 = 4000;
pub const MIN_DIST: f64 = 10.0;
pub const RANSAC_PROBABILITY: f64 = 0.999;
pub const RANSAC_THRESHOLD: f64 = 1.0;
pub const RANSAC_MAX_ITERATIONS: i32 = 1000;
/// 最小视差（像素），低于该值视为纯旋转
pub const MIN_PARALLAX: f64 = 0.5;

/// Keypoint detector family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Fast,
    Sift,
    Orb,
    /// Shi-Tomasi corners, `goodFeaturesToTrack`.
    Gftt,
}

impl FromStr for DetectorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FAST" => Ok(DetectorKind::Fast),
            "SIFT" => Ok(DetectorKind::Sift),
            "ORB" => Ok(DetectorKind::Orb),
            "GFTT" => Ok(DetectorKind::Gftt),
            _ => Err(ConfigError::UnsupportedDetector(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub window_size: i32,
    pub max_level: i32,
    pub max_iterations: i32,
    pub epsilon: f64,
    /// 反向光流，然后匹配正向光流，进行特征点筛选。
    pub flow_back: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_size: LK_WINDOW_SIZE,
            max_level: LK_MAX_LEVEL,
            max_iterations: LK_MAX_ITERATIONS,
            epsilon: LK_EPSILON,
            flow_back: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    pub fast_threshold: i32,
    /// Feature budget of SIFT, ORB and GFTT.
    pub max_features: i32,
    /// GFTT minimum distance between corners.
    pub min_distance: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Fast,
            fast_threshold: FAST_THRESHOLD,
            max_features: MAX_FEATURES,
            min_distance: MIN_DIST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EssentialConfig {
    pub probability: f64,
    /// RANSAC inlier threshold in pixels.
    pub threshold: f64,
    pub max_iterations: i32,
    /// Mean rotation-compensated parallax (pixels) below which the native
    /// estimator treats the motion as a pure rotation.
    pub min_parallax: f64,
}

impl Default for EssentialConfig {
    fn default() -> Self {
        Self {
            probability: RANSAC_PROBABILITY,
            threshold: RANSAC_THRESHOLD,
            max_iterations: RANSAC_MAX_ITERATIONS,
            min_parallax: MIN_PARALLAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    /// Keypoints are re-detected when fewer than this survive tracking.
    pub min_keypoints: usize,
    pub min_correspondences: usize,
    /// Re-orthonormalize the global rotation every n frames. Off by default.
    pub orthonormalize_every: Option<usize>,
    pub tracker: TrackerConfig,
    pub detector: DetectorConfig,
    pub essential: EssentialConfig,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            min_keypoints: MIN_NUM_FEATURES,
            min_correspondences: MIN_CORRESPONDENCES,
            orthonormalize_every: None,
            tracker: TrackerConfig::default(),
            detector: DetectorConfig::default(),
            essential: EssentialConfig::default(),
        }
    }
}

impl OdometryConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_keypoints == 0 {
            return Err(ConfigError::InvalidConfig(
                "min_keypoints must be positive".to_string(),
            ));
        }
        if self.min_correspondences < MIN_CORRESPONDENCES {
            return Err(ConfigError::InvalidConfig(format!(
                "min_correspondences must be at least {}",
                MIN_CORRESPONDENCES
            )));
        }
        if self.orthonormalize_every == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "orthonormalize_every must be positive".to_string(),
            ));
        }
        if self.tracker.window_size < 3 || self.tracker.max_level < 0 {
            return Err(ConfigError::InvalidConfig(
                "tracker window must be at least 3 px and max_level non-negative".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.essential.probability) || self.essential.threshold <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "essential probability must be in [0, 1) and threshold positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_kind_from_str() {
        assert_eq!("fast".parse::<DetectorKind>().unwrap(), DetectorKind::Fast);
        assert_eq!("SIFT".parse::<DetectorKind>().unwrap(), DetectorKind::Sift);
        assert_eq!("Orb".parse::<DetectorKind>().unwrap(), DetectorKind::Orb);
        assert_eq!("gftt".parse::<DetectorKind>().unwrap(), DetectorKind::Gftt);
        let err = "SURF".parse::<DetectorKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDetector(name) if name == "SURF"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "min_keypoints": 500, "tracker": { "flow_back": true },
                        "detector": { "kind": "orb" } }"#;
        let config: OdometryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.min_keypoints, 500);
        assert!(config.tracker.flow_back);
        assert_eq!(config.tracker.window_size, LK_WINDOW_SIZE);
        assert_eq!(config.detector.kind, DetectorKind::Orb);
        assert_eq!(config.min_correspondences, MIN_CORRESPONDENCES);
        assert_eq!(config.orthonormalize_every, None);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = OdometryConfig::default();
        config.min_correspondences = 5;
        assert!(config.validate().is_err());

        let mut config = OdometryConfig::default();
        config.orthonormalize_every = Some(0);
        assert!(config.validate().is_err());

        let mut config = OdometryConfig::default();
        config.min_keypoints = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("mono_vo_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "orthonormalize_every": 10 }"#).unwrap();
        let config = OdometryConfig::load(&path).unwrap();
        assert_eq!(config.orthonormalize_every, Some(10));
        std::fs::remove_file(&path).unwrap();
    }
}
