//! Essential matrix from the normalized 8-point algorithm, decomposed into
//! the four `(R, t)` candidates and disambiguated by point depths.
//!
//! No RANSAC: the correspondences are assumed outlier-free. Use the OpenCV
//! estimator on real tracks.

use nalgebra::{Matrix2, Matrix3, SMatrix, SVector, SymmetricEigen, Vector2, Vector3};

use super::{EstimateError, RelativePoseEstimator};
use crate::camera::{CalibrationMatrix, CameraTrait};
use crate::config::{MIN_CORRESPONDENCES, MIN_PARALLAX};
use crate::error::GeometryError;
use crate::global_types::{Keypoints, RelativePose};

#[derive(Debug, Clone)]
pub struct EightPointEstimator {
    /// Mean rotation-compensated parallax in pixels below which the motion
    /// is taken as a pure rotation.
    min_parallax: f64,
}

impl Default for EightPointEstimator {
    fn default() -> Self {
        Self {
            min_parallax: MIN_PARALLAX,
        }
    }
}

impl EightPointEstimator {
    pub fn new(min_parallax: f64) -> Self {
        Self { min_parallax }
    }
}

impl RelativePoseEstimator for EightPointEstimator {
    fn estimate(
        &mut self,
        points_a: &Keypoints,
        points_b: &Keypoints,
        calibration: &CalibrationMatrix,
    ) -> Result<RelativePose, EstimateError> {
        if points_a.len() != points_b.len() {
            return Err(GeometryError::Degenerate(format!(
                "{} points against {}",
                points_a.len(),
                points_b.len()
            ))
            .into());
        }
        if points_a.len() < MIN_CORRESPONDENCES {
            return Err(GeometryError::TooFewCorrespondences {
                found: points_a.len(),
                required: MIN_CORRESPONDENCES,
            }
            .into());
        }

        let rays_a: Vec<Vector3<f64>> = points_a
            .iter()
            .map(|p| calibration.lift_projective(p))
            .collect();
        let rays_b: Vec<Vector3<f64>> = points_b
            .iter()
            .map(|p| calibration.lift_projective(p))
            .collect();

        let rotation = procrustes(&rays_a, &rays_b)?;
        let parallax = mean_parallax(&rotation, &rays_a, &rays_b) * calibration.fx().abs();
        if parallax < self.min_parallax {
            // translation direction is unobservable
            log::debug!("rotation-only motion, parallax {:.3} px", parallax);
            return Ok(RelativePose {
                rotation,
                translation: Vector3::z(),
            });
        }

        let essential = eight_point(&rays_a, &rays_b)?;
        Ok(recover_pose(&essential, &rays_a, &rays_b)?)
    }
}

/// Rotation `R` minimizing `sum |b - R a|^2` over the unit rays.
fn procrustes(
    rays_a: &[Vector3<f64>],
    rays_b: &[Vector3<f64>],
) -> Result<Matrix3<f64>, GeometryError> {
    let h = rays_a
        .iter()
        .zip(rays_b.iter())
        .fold(Matrix3::zeros(), |acc, (a, b)| {
            acc + a.normalize() * b.normalize().transpose()
        });
    let svd = h.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(GeometryError::NoSolution("procrustes svd failed".to_string())),
    };
    let v = v_t.transpose();
    let mut d = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        d[(svd.singular_values.imin(), svd.singular_values.imin())] = -1.0;
    }
    Ok(v * d * u.transpose())
}

/// Mean distance on the normalized plane between `b` and the rotated `a`.
fn mean_parallax(rotation: &Matrix3<f64>, rays_a: &[Vector3<f64>], rays_b: &[Vector3<f64>]) -> f64 {
    let sum: f64 = rays_a
        .iter()
        .zip(rays_b.iter())
        .map(|(a, b)| {
            let q = rotation * a;
            if q.z <= f64::EPSILON {
                f64::INFINITY
            } else {
                (q.xy() / q.z - b.xy()).norm()
            }
        })
        .sum();
    sum / rays_a.len() as f64
}

/// Isotropic (Hartley) conditioning on the normalized plane.
fn hartley_transform(rays: &[Vector3<f64>]) -> Result<Matrix3<f64>, GeometryError> {
    let n = rays.len() as f64;
    let centroid = rays.iter().fold(Vector2::zeros(), |acc, r| acc + r.xy()) / n;
    let mean_dist = rays.iter().map(|r| (r.xy() - centroid).norm()).sum::<f64>() / n;
    if mean_dist <= f64::EPSILON {
        return Err(GeometryError::Degenerate(
            "all points coincide".to_string(),
        ));
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Ok(Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}

/// Least-squares essential matrix with `b^T E a = 0`, projected to rank 2.
fn eight_point(
    rays_a: &[Vector3<f64>],
    rays_b: &[Vector3<f64>],
) -> Result<Matrix3<f64>, GeometryError> {
    let t_a = hartley_transform(rays_a)?;
    let t_b = hartley_transform(rays_b)?;

    let mut normal = SMatrix::<f64, 9, 9>::zeros();
    for (a, b) in rays_a.iter().zip(rays_b.iter()) {
        let a = t_a * a;
        let b = t_b * b;
        let row = SVector::<f64, 9>::from_column_slice(&[
            b.x * a.x,
            b.x * a.y,
            b.x * a.z,
            b.y * a.x,
            b.y * a.y,
            b.y * a.z,
            b.z * a.x,
            b.z * a.y,
            b.z * a.z,
        ]);
        normal += row * row.transpose();
    }

    let eigen = SymmetricEigen::new(normal);
    let e = eigen.eigenvectors.column(eigen.eigenvalues.imin()).into_owned();
    let e_cond = Matrix3::from_row_slice(e.as_slice());
    let essential = t_b.transpose() * e_cond * t_a;

    let (u, _, v) = sorted_svd(&essential)?;
    Ok(u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0)) * v.transpose())
}

/// SVD with singular values in descending order, `m = U diag(s) V^T`.
fn sorted_svd(
    m: &Matrix3<f64>,
) -> Result<(Matrix3<f64>, Vector3<f64>, Matrix3<f64>), GeometryError> {
    let svd = m.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(GeometryError::NoSolution("essential svd failed".to_string())),
    };
    let s = svd.singular_values;
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));

    let v = v_t.transpose();
    let mut u_sorted = Matrix3::zeros();
    let mut v_sorted = Matrix3::zeros();
    let mut s_sorted = Vector3::zeros();
    for (k, &i) in order.iter().enumerate() {
        u_sorted.set_column(k, &u.column(i));
        v_sorted.set_column(k, &v.column(i));
        s_sorted[k] = s[i];
    }
    Ok((u_sorted, s_sorted, v_sorted))
}

/// Picks the decomposition of `E` that puts the points in front of both
/// cameras.
fn recover_pose(
    essential: &Matrix3<f64>,
    rays_a: &[Vector3<f64>],
    rays_b: &[Vector3<f64>],
) -> Result<RelativePose, GeometryError> {
    let (mut u, s, mut v) = sorted_svd(essential)?;
    if s[1] <= f64::EPSILON {
        return Err(GeometryError::Degenerate(
            "essential matrix has rank below 2".to_string(),
        ));
    }
    // E is unchanged: the third singular value is zero
    if u.determinant() < 0.0 {
        let c = -u.column(2);
        u.set_column(2, &c);
    }
    if v.determinant() < 0.0 {
        let c = -v.column(2);
        v.set_column(2, &c);
    }

    let w = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
    let r1 = u * w * v.transpose();
    let r2 = u * w.transpose() * v.transpose();
    let t: Vector3<f64> = u.column(2).normalize();

    let candidates = [(r1, t), (r1, -t), (r2, t), (r2, -t)];
    let (best, in_front) = candidates
        .iter()
        .map(|(r, t)| ((*r, *t), count_in_front(r, t, rays_a, rays_b)))
        .max_by_key(|(_, count)| *count)
        .ok_or_else(|| GeometryError::NoSolution("no pose candidates".to_string()))?;

    if in_front * 2 <= rays_a.len() {
        return Err(GeometryError::NoSolution(format!(
            "only {} of {} points in front of both cameras",
            in_front,
            rays_a.len()
        )));
    }
    Ok(RelativePose {
        rotation: best.0,
        translation: best.1,
    })
}

/// Points with positive depth in both views, depths from
/// `d_b * b = d_a * R a + t` in the least-squares sense.
fn count_in_front(
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
    rays_a: &[Vector3<f64>],
    rays_b: &[Vector3<f64>],
) -> usize {
    rays_a
        .iter()
        .zip(rays_b.iter())
        .filter(|(a, b)| {
            let m1 = rotation * *a;
            let m2 = -*b;
            let lhs = Matrix2::new(m1.dot(&m1), m1.dot(&m2), m1.dot(&m2), m2.dot(&m2));
            let rhs = Vector2::new(-m1.dot(translation), -m2.dot(translation));
            match lhs.try_inverse() {
                Some(inv) => {
                    let depth = inv * rhs;
                    depth.x > 0.0 && depth.y > 0.0
                }
                None => false,
            }
        })
        .count()
}
