//! Analytic inverse kinematics of a 6-DOF leg.
//!
//! The leg has three intersecting hip axes (yaw, roll, pitch), a knee pitch axis and two
//! intersecting ankle axes (pitch, roll). This makes it possible to solve the ankle joints from
//! the hip position seen from the foot, the knee from the law of cosines, and the hip joints
//! from the remaining rotation.
use std::f32::consts::{FRAC_PI_2, PI};

use nalgebra::{Isometry3, Rotation3, Vector3};

use super::model::KinematicModel;
use crate::types::{LegJoints, Side};

/// Whether the target of an IK query could be reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    #[default]
    Reachable,
    /// The hip to ankle distance was outside of the leg's range, and has been clamped.
    Clamped,
}

/// Result of an IK query, the joints are a best effort solution even if the target was clamped.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct IkSolution {
    pub joints: LegJoints,
    pub reachability: Reachability,
}

impl IkSolution {
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachability == Reachability::Reachable
    }
}

/// Solves the joints of the leg on `side` so that the ankle reaches `ankle`, with the pelvis at
/// `pelvis`. Both poses are expressed in the same frame.
#[must_use]
pub fn solve_leg(
    model: &KinematicModel,
    side: Side,
    pelvis: &Isometry3<f32>,
    ankle: &Isometry3<f32>,
) -> IkSolution {
    let thigh = model.thigh_length(side);
    let shank = model.shank_length(side);

    let pelvis_rotation = pelvis.rotation.to_rotation_matrix();
    let ankle_rotation = ankle.rotation.to_rotation_matrix();
    let hip = pelvis * nalgebra::Point3::from(model.hip_offset(side));

    // hip position seen from the ankle, in the foot frame
    let r = ankle_rotation.inverse() * (hip.coords - ankle.translation.vector);
    let distance = r.norm();

    let min_distance = (thigh - shank).abs().max(f32::EPSILON);
    let max_distance = thigh + shank;
    let reachability = if distance > max_distance || distance < min_distance {
        Reachability::Clamped
    } else {
        Reachability::Reachable
    };
    let distance = distance.clamp(min_distance, max_distance);

    let cos_knee = (distance.powi(2) - thigh.powi(2) - shank.powi(2)) / (2.0 * thigh * shank);
    let knee_pitch = cos_knee.clamp(-1.0, 1.0).acos();

    let ankle_pitch_offset = ((thigh / distance) * (PI - knee_pitch).sin())
        .clamp(-1.0, 1.0)
        .asin();

    let mut ankle_roll = r.y.atan2(r.z);
    if ankle_roll > FRAC_PI_2 {
        ankle_roll -= PI;
    } else if ankle_roll < -FRAC_PI_2 {
        ankle_roll += PI;
    }

    let ankle_pitch = -r.x.atan2(r.z.signum() * r.y.hypot(r.z)) - ankle_pitch_offset;

    let hip_rotation = pelvis_rotation.inverse()
        * ankle_rotation
        * Rotation3::from_axis_angle(&Vector3::x_axis(), -ankle_roll)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), -ankle_pitch - knee_pitch);
    let m = hip_rotation.matrix();

    let hip_yaw = (-m[(0, 1)]).atan2(m[(1, 1)]);
    let (sin_yaw, cos_yaw) = hip_yaw.sin_cos();
    let hip_roll = m[(2, 1)].atan2(-m[(0, 1)] * sin_yaw + m[(1, 1)] * cos_yaw);
    let hip_pitch = (-m[(2, 0)]).atan2(m[(2, 2)]);

    IkSolution {
        joints: LegJoints {
            hip_yaw,
            hip_roll,
            hip_pitch,
            knee_pitch,
            ankle_pitch,
            ankle_roll,
        },
        reachability,
    }
}
