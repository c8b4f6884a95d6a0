//! Static geometry and mass distribution of the legs and torso.
//!
//! The base frame is the pelvis: the x-axis points forward, the y-axis points left,
//! and the z-axis points up. Link 0 is the pelvis, links 1-6 form the right leg and links 7-12
//! the left leg, each leg ordered from hip yaw to ankle roll.
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::{LegJoints, Side};

/// Number of links in the model.
pub const LINK_COUNT: usize = 13;

/// Axis a link rotates around, relative to its parent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointAxis {
    #[default]
    Fixed,
    X,
    Y,
    Z,
}

impl JointAxis {
    fn rotation(self, angle: f32) -> UnitQuaternion<f32> {
        match self {
            JointAxis::Fixed => UnitQuaternion::identity(),
            JointAxis::X => UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle),
            JointAxis::Y => UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle),
            JointAxis::Z => UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle),
        }
    }
}

/// A single rigid link of the kinematic chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    pub name: String,
    /// Position of this link's joint in the frame of the parent joint.
    pub parent_offset: Vector3<f32>,
    /// End point of the link in its own joint frame, e.g. the sole center for the ankle roll link.
    pub child_offset: Vector3<f32>,
    /// Center of mass in the joint frame of this link.
    pub com: Vector3<f32>,
    /// Mass in kg.
    pub mass: f32,
    pub axis: JointAxis,
}

/// The kinematic model of the robot, built once from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicModel {
    links: [Link; LINK_COUNT],
    total_mass: f32,
}

impl KinematicModel {
    #[must_use]
    pub fn new(links: [Link; LINK_COUNT]) -> Self {
        let total_mass = links.iter().map(|link| link.mass).sum();
        Self { links, total_mass }
    }

    #[must_use]
    pub fn links(&self) -> &[Link; LINK_COUNT] {
        &self.links
    }

    #[must_use]
    pub fn total_mass(&self) -> f32 {
        self.total_mass
    }

    /// Indices of the six links of a leg, from hip yaw to ankle roll.
    #[must_use]
    pub fn leg_links(side: Side) -> std::ops::Range<usize> {
        let first = 1 + side.joint_offset();
        first..first + 6
    }

    fn leg_link(&self, side: Side, joint: usize) -> &Link {
        &self.links[Self::leg_links(side).start + joint]
    }

    /// Offset from the pelvis to the hip joint center.
    #[must_use]
    pub fn hip_offset(&self, side: Side) -> Vector3<f32> {
        self.leg_link(side, 0).parent_offset
    }

    /// Length of the thigh, hip to knee.
    #[must_use]
    pub fn thigh_length(&self, side: Side) -> f32 {
        self.leg_link(side, 3).parent_offset.norm()
    }

    /// Length of the shank, knee to ankle.
    #[must_use]
    pub fn shank_length(&self, side: Side) -> f32 {
        self.leg_link(side, 4).parent_offset.norm()
    }

    /// Offset from the ankle joint to the sole center, in the foot frame.
    #[must_use]
    pub fn sole_offset(&self, side: Side) -> Vector3<f32> {
        self.leg_link(side, 5).child_offset
    }

    /// Joint frames of a leg, from hip yaw to ankle roll, for the given pelvis pose.
    #[must_use]
    pub fn leg_transforms(
        &self,
        side: Side,
        pelvis: &Isometry3<f32>,
        joints: &LegJoints,
    ) -> [Isometry3<f32>; 6] {
        let angles = joints.to_array();
        let mut frame = *pelvis;

        std::array::from_fn(|joint| {
            let link = self.leg_link(side, joint);
            frame *= Isometry3::from_parts(
                Translation3::from(link.parent_offset),
                link.axis.rotation(angles[joint]),
            );
            frame
        })
    }

    /// Center of mass of a single leg and the mass it carries.
    #[must_use]
    pub fn leg_com(
        &self,
        side: Side,
        pelvis: &Isometry3<f32>,
        joints: &LegJoints,
    ) -> (Point3<f32>, f32) {
        let transforms = self.leg_transforms(side, pelvis, joints);
        let links = &self.links[Self::leg_links(side)];

        let mass: f32 = links.iter().map(|link| link.mass).sum();
        let weighted = transforms
            .iter()
            .zip(links)
            .fold(Vector3::zeros(), |sum, (frame, link)| {
                sum + (frame * Point3::from(link.com)).coords * link.mass
            });

        if mass > 0.0 {
            (Point3::from(weighted / mass), mass)
        } else {
            (Point3::from(pelvis.translation.vector), 0.0)
        }
    }

    /// Mass weighted center of mass of the whole robot.
    #[must_use]
    pub fn center_of_mass(
        &self,
        pelvis: &Isometry3<f32>,
        left: &LegJoints,
        right: &LegJoints,
    ) -> Point3<f32> {
        let pelvis_link = &self.links[0];
        let (left_com, left_mass) = self.leg_com(Side::Left, pelvis, left);
        let (right_com, right_mass) = self.leg_com(Side::Right, pelvis, right);

        let weighted = (pelvis * Point3::from(pelvis_link.com)).coords * pelvis_link.mass
            + left_com.coords * left_mass
            + right_com.coords * right_mass;

        if self.total_mass > 0.0 {
            Point3::from(weighted / self.total_mass)
        } else {
            Point3::from(pelvis.translation.vector)
        }
    }
}
