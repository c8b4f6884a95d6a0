//! Swing foot trajectories.
use nalgebra::{Isometry3, Vector3};

use super::min_jerk;

/// Normalized lift of the swing foot, a smooth bump that peaks at 1 halfway through the swing.
///
/// `64τ³(1-τ)³` has zero velocity and acceleration at lift-off and touchdown.
#[must_use]
pub fn lift_profile(tau: f32) -> f32 {
    let tau = tau.clamp(0.0, 1.0);
    64.0 * (tau * (1.0 - tau)).powi(3)
}

/// Ankle pose of a swing foot moving from `start` to `end`, lifted by up to `step_height`.
#[must_use]
pub fn swing_pose(
    start: &Isometry3<f32>,
    end: &Isometry3<f32>,
    step_height: f32,
    tau: f32,
) -> Isometry3<f32> {
    let mut pose = min_jerk::interpolate_pose(start, end, tau);
    pose.translation.vector += Vector3::z() * (step_height * lift_profile(tau));
    pose
}
