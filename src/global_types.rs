use nalgebra::{Matrix3, Point2, Vector3};

use crate::utility::Utility;

/// Image-plane keypoint, pixel coordinates.
pub type Keypoint = Point2<f64>;
/// Ordered set of trackable keypoints. Replaced wholesale, never merged.
pub type Keypoints = Vec<Keypoint>;

/// Camera timestamp in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub i64);
impl Timestamp {
    pub fn as_sec(&self) -> f64 {
        self.0 as f64 / 1e9
    }
    /// dt
    pub fn duration_since(&self, other: &Timestamp) -> f64 {
        (self.0 - other.0) as f64 / 1e9
    }
}

/// Matched points, `prev[i]` tracked to `cur[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    pub prev: Keypoints,
    pub cur: Keypoints,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.cur.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cur.is_empty()
    }
}

/// Two-view motion: `x_b = rotation * x_a + translation`.
///
/// The translation is unit-norm by convention, its true magnitude is
/// unobservable from a single camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

/// Accumulated pose in the coordinate frame of the first processed frame.
///
/// The rotation is a plain matrix: repeated composition drifts off SO(3)
/// and is only re-orthonormalized on request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for GlobalPose {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl GlobalPose {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Left-composes a relative rotation onto the global one.
    #[inline]
    pub fn compose_rotation(&mut self, rotation: &Matrix3<f64>) {
        self.rotation = rotation * self.rotation;
    }

    /// Projects the rotation back onto SO(3).
    pub fn orthonormalize(&mut self) {
        self.rotation = Utility::orthonormalize(&self.rotation);
    }
}

#[test]
fn test_timestamp() {
    let t1 = Timestamp(1_000_000_000);
    let t2 = Timestamp(2_500_000_000);
    assert_eq!(t2.duration_since(&t1), 1.5);
    assert_eq!(t1.as_sec(), 1.0);
}

#[test]
fn test_compose_rotation_left_multiplies() {
    let yaw = nalgebra::Rotation3::from_euler_angles(0.0, 0.0, 0.3).into_inner();
    let pitch = nalgebra::Rotation3::from_euler_angles(0.0, 0.2, 0.0).into_inner();
    let mut pose = GlobalPose::new(yaw, Vector3::zeros());
    pose.compose_rotation(&pitch);
    assert_eq!(pose.rotation, pitch * yaw);
}
