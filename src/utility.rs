use nalgebra::{Matrix3, Vector3};

pub struct Utility {}

impl Utility {
    /// Closest rotation matrix in the Frobenius sense, `U * V^T` of the SVD.
    pub fn orthonormalize(m: &Matrix3<f64>) -> Matrix3<f64> {
        let svd = m.svd(true, true);
        match (svd.u, svd.v_t) {
            (Some(mut u), Some(v_t)) => {
                if (u * v_t).determinant() < 0.0 {
                    let weakest = svd.singular_values.imin();
                    let flipped = -u.column(weakest);
                    u.set_column(weakest, &flipped);
                }
                u * v_t
            }
            _ => *m,
        }
    }

    /// Angle in radians of the rotation taking `a` to `b`.
    pub fn rotation_angle(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
        let rel = a.transpose() * b;
        let cos = ((rel.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
        cos.acos()
    }

    /// Cross-product matrix `[v]x`.
    #[inline]
    pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
        Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Utility;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Rotation3, Vector3};

    #[test]
    fn test_orthonormalize_removes_drift() {
        let r = Rotation3::from_euler_angles(0.1, -0.2, 0.3).into_inner();
        let drifted = r + Matrix3::from_element(1e-4);
        let fixed = Utility::orthonormalize(&drifted);
        assert_relative_eq!(fixed * fixed.transpose(), Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(fixed.determinant(), 1.0, epsilon = 1e-12);
        assert!(Utility::rotation_angle(&r, &fixed) < 1e-3);
    }

    #[test]
    fn test_rotation_angle() {
        let a = Rotation3::from_euler_angles(0.0, 0.0, 0.25).into_inner();
        let b = Rotation3::from_euler_angles(0.0, 0.0, 0.75).into_inner();
        assert_relative_eq!(Utility::rotation_angle(&a, &b), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_skew() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(-0.5, 0.25, 2.0);
        assert_relative_eq!(Utility::skew(&a) * b, a.cross(&b), epsilon = 1e-12);
    }
}
