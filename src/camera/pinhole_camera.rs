use std::path::Path;

use anyhow::Context;
use nalgebra::{Matrix3, Vector3};

use crate::error::ConfigError;
use crate::global_types::Keypoint;

use super::CameraTrait;

/// Pinhole intrinsics `K`, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMatrix {
    k: Matrix3<f64>,
    inv_k: Matrix3<f64>,
}

impl CalibrationMatrix {
    pub fn new(k: Matrix3<f64>) -> Result<Self, ConfigError> {
        if k.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidCalibration(
                "non-finite entry".to_string(),
            ));
        }
        if k[(0, 0)] == 0.0 || k[(1, 1)] == 0.0 {
            return Err(ConfigError::InvalidCalibration(
                "zero focal length".to_string(),
            ));
        }
        let inv_k = k.try_inverse().ok_or_else(|| {
            ConfigError::InvalidCalibration("matrix is not invertible".to_string())
        })?;
        Ok(Self { k, inv_k })
    }

    /// Parses 9 comma-separated values, row-major. Values may span several
    /// lines and trailing commas are ignored.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut values = Vec::with_capacity(9);
        for record in reader.records() {
            let record = record.map_err(|e| ConfigError::InvalidCalibration(e.to_string()))?;
            for field in record.iter().filter(|f| !f.is_empty()) {
                let value = field.parse::<f64>().map_err(|_| {
                    ConfigError::InvalidCalibration(format!("`{}` is not a number", field))
                })?;
                values.push(value);
            }
        }
        if values.len() != 9 {
            return Err(ConfigError::InvalidCalibration(format!(
                "expected 9 values, found {}",
                values.len()
            )));
        }
        Self::new(Matrix3::from_row_slice(&values))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read calibration {}", path.display()))?;
        let calibration = Self::parse(&text)
            .with_context(|| format!("failed to parse calibration {}", path.display()))?;
        log::info!("calibration from {}: {}", path.display(), calibration.k);
        Ok(calibration)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.k
    }

    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }
}

impl CameraTrait for CalibrationMatrix {
    /// 像素坐标反投影到归一化平面 `K^-1 [u v 1]^T`
    fn lift_projective(&self, p: &Keypoint) -> Vector3<f64> {
        let ray = self.inv_k * Vector3::new(p.x, p.y, 1.0);
        ray / ray.z
    }

    fn project(&self, p: &Vector3<f64>) -> Keypoint {
        let uv = self.k * (p / p.z);
        Keypoint::new(uv.x, uv.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const KITTI_K: &str = "718.856,0.0,607.1928,\n0.0,718.856,185.2157,\n0.0,0.0,1.0,\n";

    #[test]
    fn test_parse_multiline() {
        let k = CalibrationMatrix::parse(KITTI_K).unwrap();
        assert_eq!(k.fx(), 718.856);
        assert_eq!(k.fy(), 718.856);
        assert_eq!(k.cx(), 607.1928);
        assert_eq!(k.cy(), 185.2157);
        assert_eq!(k.matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn test_parse_single_line() {
        let k = CalibrationMatrix::parse("500, 0, 320, 0, 500, 240, 0, 0, 1").unwrap();
        assert_eq!(k.cx(), 320.0);
        assert_eq!(k.matrix()[(1, 0)], 0.0);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(CalibrationMatrix::parse("1,2,3").is_err());
        assert!(CalibrationMatrix::parse("500,0,320,0,500,240,0,0,x").is_err());
        assert!(CalibrationMatrix::parse("0,0,320,0,500,240,0,0,1").is_err());
        assert!(CalibrationMatrix::parse("500 0 320 0 500 240 0 0 1").is_err());
    }

    #[test]
    fn test_lift_and_project() {
        let k = CalibrationMatrix::parse(KITTI_K).unwrap();
        let p = Keypoint::new(700.0, 100.0);
        let ray = k.lift_projective(&p);
        assert_eq!(ray.z, 1.0);
        let back = k.project(&(ray * 3.0));
        assert_relative_eq!(back, p, epsilon = 1e-9);
    }
}
