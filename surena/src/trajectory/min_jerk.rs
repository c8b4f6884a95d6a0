//! Minimum jerk interpolation.
//!
//! The profile `s(τ) = 10τ³ - 15τ⁴ + 6τ⁵` starts and ends at rest, with zero velocity and
//! acceleration at both ends.
use nalgebra::{Isometry3, Vector3};

/// Normalized position along a minimum jerk profile, `tau` is clamped to `[0, 1]`.
#[must_use]
pub fn min_jerk(tau: f32) -> f32 {
    let tau = tau.clamp(0.0, 1.0);
    tau.powi(3) * (10.0 + tau * (-15.0 + 6.0 * tau))
}

/// Derivative of [`min_jerk`] with respect to `tau`.
#[must_use]
pub fn min_jerk_rate(tau: f32) -> f32 {
    if !(0.0..=1.0).contains(&tau) {
        return 0.0;
    }
    30.0 * tau.powi(2) * (1.0 - tau).powi(2)
}

#[must_use]
pub fn interpolate(start: &Vector3<f32>, end: &Vector3<f32>, tau: f32) -> Vector3<f32> {
    start.lerp(end, min_jerk(tau))
}

/// Velocity along a minimum jerk motion of `duration` seconds.
#[must_use]
pub fn velocity(start: &Vector3<f32>, end: &Vector3<f32>, tau: f32, duration: f32) -> Vector3<f32> {
    (end - start) * (min_jerk_rate(tau) / duration)
}

/// Interpolates translation and rotation of a pose along the same profile.
#[must_use]
pub fn interpolate_pose(start: &Isometry3<f32>, end: &Isometry3<f32>, tau: f32) -> Isometry3<f32> {
    start.lerp_slerp(end, min_jerk(tau))
}
