//! 全局类型转换
//!
//! OpenCV `Mat`/`Vector` <-> nalgebra and keypoint conversions used by the
//! OpenCV backends.

use std::fmt::Display;

use nalgebra::{Matrix3, Point2, Vector3};
use opencv::core::{Mat, Point2f, Vector, CV_64F};
use opencv::prelude::*;

use crate::global_types::Keypoints;

/// 实现 Display trait 用于打印
pub struct MatPrinter<'a>(pub &'a Mat);

impl Display for MatPrinter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.0.rows();
        let cols = self.0.cols();
        writeln!(f)?;
        for i in 0..rows {
            for j in 0..cols {
                match self.0.at_2d::<f64>(i, j) {
                    Ok(v) => write!(f, "{}, ", v)?,
                    Err(_) => write!(f, "?, ")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matrix3d(pub Matrix3<f64>);

/// 将 [Mat] 转换为 [Matrix3]
impl TryFrom<&Mat> for Matrix3d {
    type Error = opencv::Error;

    fn try_from(mat: &Mat) -> Result<Self, Self::Error> {
        if mat.rows() != 3 || mat.cols() != 3 {
            return Err(opencv::Error::new(
                opencv::core::StsBadSize,
                format!("expected 3x3 matrix, got {}x{}", mat.rows(), mat.cols()),
            ));
        }
        let mut matrix = Matrix3::<f64>::zeros();
        for i in 0..3 {
            for j in 0..3 {
                matrix[(i, j)] = *mat.at_2d::<f64>(i as i32, j as i32)?;
            }
        }
        Ok(Matrix3d(matrix))
    }
}

/// 将 [Matrix3] 转换为 [Mat]
impl TryFrom<&Matrix3d> for Mat {
    type Error = opencv::Error;

    fn try_from(matrix: &Matrix3d) -> Result<Self, Self::Error> {
        let mut mat = Mat::zeros_nd(&[3, 3], CV_64F)?.to_mat()?;
        for i in 0..3 {
            for j in 0..3 {
                *mat.at_2d_mut::<f64>(i as i32, j as i32)? = matrix.0[(i, j)];
            }
        }
        Ok(mat)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Vector3d(pub Vector3<f64>);

impl TryFrom<&Mat> for Vector3d {
    type Error = opencv::Error;

    fn try_from(mat: &Mat) -> Result<Self, Self::Error> {
        if mat.total() != 3 {
            return Err(opencv::Error::new(
                opencv::core::StsBadSize,
                format!("expected 3 elements, got {}", mat.total()),
            ));
        }
        let mut vector = Vector3::<f64>::zeros();
        for i in 0..3 {
            vector[i] = *mat.at::<f64>(i as i32)?;
        }
        Ok(Vector3d(vector))
    }
}

/// [Keypoints] 转换为 OpenCV 点集
pub fn keypoints_to_cv(points: &Keypoints) -> Vector<Point2f> {
    points
        .iter()
        .map(|p| Point2f::new(p.x as f32, p.y as f32))
        .collect()
}

/// OpenCV 点集转换为 [Keypoints]
pub fn keypoints_from_cv(points: &Vector<Point2f>) -> Keypoints {
    points
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mat_to_matrix() {
        let mat = Mat::from_slice_2d(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]).unwrap();
        let matrix = Matrix3d::try_from(&mat).unwrap();
        assert_eq!(matrix.0[(1, 2)], 6.0);

        let back = Mat::try_from(&matrix).unwrap();
        assert_eq!(*back.at_2d::<f64>(2, 0).unwrap(), 7.0);
        println!("mat: {}", MatPrinter(&back));
    }

    #[test]
    fn test_mat_to_vector() {
        let mat = Mat::from_slice_2d(&[[1.0], [0.5], [-2.0]]).unwrap();
        let vector = Vector3d::try_from(&mat).unwrap();
        assert_eq!(vector.0, Vector3::new(1.0, 0.5, -2.0));
        assert!(Matrix3d::try_from(&mat).is_err());
    }

    #[test]
    fn test_keypoints_round_trip_precision() {
        let points = vec![Point2::new(10.5, 20.25), Point2::new(0.0, 479.0)];
        let cv = keypoints_to_cv(&points);
        assert_eq!(cv.len(), 2);
        assert_eq!(keypoints_from_cv(&cv), points);
    }
}
