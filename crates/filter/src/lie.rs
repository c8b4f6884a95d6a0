//! Small helpers for rotations on the SO(3) manifold.
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// The skew-symmetric matrix of `v`, such that `skew(v) * w == v.cross(&w)`.
#[must_use]
pub fn skew(v: &Vector3<f32>) -> Matrix3<f32> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Exponential map from a rotation vector to a rotation matrix.
#[must_use]
pub fn exp(phi: &Vector3<f32>) -> Rotation3<f32> {
    Rotation3::new(*phi)
}

/// Exponential map from a rotation vector to a unit quaternion.
#[must_use]
pub fn exp_quaternion(phi: &Vector3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_scaled_axis(*phi)
}

/// Re-orthonormalises a rotation matrix that accumulated rounding errors.
#[must_use]
pub fn renormalize(rotation: &Rotation3<f32>) -> Rotation3<f32> {
    UnitQuaternion::from_rotation_matrix(rotation).to_rotation_matrix()
}
