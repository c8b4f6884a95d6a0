//! Forward kinematics of a single leg.
use nalgebra::{Isometry3, Translation3};

use super::model::KinematicModel;
use crate::types::{JointArray, LegJoints, Side};

/// Pose of the ankle joint for the given pelvis pose and leg joints.
#[must_use]
pub fn ankle_pose(
    model: &KinematicModel,
    side: Side,
    pelvis: &Isometry3<f32>,
    joints: &LegJoints,
) -> Isometry3<f32> {
    model.leg_transforms(side, pelvis, joints)[5]
}

/// Pose of the sole center, the ankle pose shifted by the sole offset.
#[must_use]
pub fn sole_pose(
    model: &KinematicModel,
    side: Side,
    pelvis: &Isometry3<f32>,
    joints: &LegJoints,
) -> Isometry3<f32> {
    ankle_pose(model, side, pelvis, joints) * Translation3::from(model.sole_offset(side))
}

/// Ankle poses of both legs relative to the pelvis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegPoses {
    pub left: Isometry3<f32>,
    pub right: Isometry3<f32>,
}

impl LegPoses {
    #[must_use]
    pub fn from_joints(model: &KinematicModel, joints: &JointArray) -> Self {
        let pelvis = Isometry3::identity();
        Self {
            left: ankle_pose(
                model,
                Side::Left,
                &pelvis,
                &LegJoints::from_joint_array(joints, Side::Left),
            ),
            right: ankle_pose(
                model,
                Side::Right,
                &pelvis,
                &LegJoints::from_joint_array(joints, Side::Right),
            ),
        }
    }

    #[must_use]
    pub fn get(&self, side: Side) -> &Isometry3<f32> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}
