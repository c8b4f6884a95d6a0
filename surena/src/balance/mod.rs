//! Per-cycle corrections of the reference pose.
//!
//! The stages run in a fixed order every cycle: force distribution, ZMP admittance (with DCM
//! and center of mass tracking), foot orientation, bump orientation, early contact and foot
//! length.
pub mod admittance;
pub mod contact;
pub mod distribution;
pub mod foot_length;
pub mod orientation;
pub mod pid;

use nalgebra::{Isometry3, UnitQuaternion, Vector2, Vector3};

pub use admittance::ZmpAdmittance;
pub use contact::EarlyContact;
pub use distribution::{
    DistributionPolicy, EvenPolicy, InverseDistancePolicy, create_policy, distribute_bump,
    distribute_wrench,
};
pub use foot_length::FootLength;
pub use orientation::{BumpOrientation, FootOrientation};
pub use pid::Pid;

use crate::{
    config::BalanceConfig,
    estimation::RobotState,
    trajectory::Waypoint,
    types::{Feet, ForceTorque, Side},
};

/// Reference poses handed to the inverse kinematics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveReference {
    pub pelvis: Isometry3<f32>,
    pub ankles: Feet<Isometry3<f32>>,
}

impl LiveReference {
    #[must_use]
    pub fn from_waypoint(waypoint: &Waypoint) -> Self {
        Self {
            pelvis: waypoint.pelvis(),
            ankles: waypoint.ankles,
        }
    }

    /// Moves the pelvis horizontally by `offset`, in the world frame.
    pub fn shift_pelvis(&mut self, offset: &Vector2<f32>) -> &mut Self {
        self.pelvis.translation.vector += Vector3::new(offset.x, offset.y, 0.0);

        self
    }

    /// Rotates the ankle of `side` by `roll` and `pitch` around its own axes.
    pub fn tilt_ankle(&mut self, side: Side, roll: f32, pitch: f32) -> &mut Self {
        let ankle = self.ankles.get_mut(side);
        ankle.rotation *= UnitQuaternion::from_euler_angles(roll, pitch, 0.0);

        self
    }

    /// Raises the ankle of `side` by `height`.
    pub fn raise_ankle(&mut self, side: Side, height: f32) -> &mut Self {
        self.ankles.get_mut(side).translation.z += height;

        self
    }
}

/// Bounds `value` to `[-limit, limit]`.
pub(crate) fn bound(value: f32, limit: f32) -> f32 {
    value.max(-limit).min(limit)
}

/// One step of `ẋ = rate - x / time_constant`, bounded to `±limit`.
pub(crate) fn leaky_integrate(
    value: f32,
    rate: f32,
    time_constant: f32,
    limit: f32,
    dt: f32,
) -> f32 {
    bound(value + (rate - value / time_constant) * dt, limit)
}

/// All balance controllers, run once per cycle on gait segments.
pub struct BalanceControllers {
    dt: f32,
    /// Weight of the robot, in N.
    weight: f32,
    policy: Box<dyn DistributionPolicy>,
    admittance: ZmpAdmittance,
    foot_orientation: FootOrientation,
    bump_orientation: BumpOrientation,
    early_contact: EarlyContact,
    foot_length: FootLength,
    desired_zmp: Vector3<f32>,
}

impl BalanceControllers {
    #[must_use]
    pub fn new(config: &BalanceConfig, mass: f32, gravity: f32, dt: f32) -> Self {
        Self {
            dt,
            weight: mass * gravity,
            policy: create_policy(config.distribution),
            admittance: ZmpAdmittance::new(&config.dcm, &config.com, &config.zmp),
            foot_orientation: FootOrientation::new(&config.foot_orientation),
            bump_orientation: BumpOrientation::new(&config.bump_orientation),
            early_contact: EarlyContact::new(&config.early_contact),
            foot_length: FootLength::new(&config.foot_length),
            desired_zmp: Vector3::zeros(),
        }
    }

    /// Replaces the rule that splits the load between the feet.
    pub fn set_policy(&mut self, policy: Box<dyn DistributionPolicy>) {
        self.policy = policy;
    }

    /// The desired ZMP of the last cycle, after the DCM correction.
    #[must_use]
    pub fn desired_zmp(&self) -> Vector3<f32> {
        self.desired_zmp
    }

    /// Clears the state of every controller.
    pub fn reset(&mut self) {
        self.admittance.reset();
        self.foot_orientation.reset();
        self.bump_orientation.reset();
        self.early_contact.reset();
        self.foot_length.reset();
    }

    /// Load share of each foot in this waypoint.
    #[must_use]
    pub fn load_shares(&self, waypoint: &Waypoint) -> Feet<f32> {
        match waypoint.phase.swing_side() {
            Some(Side::Left) => Feet::new(0.0, 1.0),
            Some(Side::Right) => Feet::new(1.0, 0.0),
            None => self.policy.weights(
                &waypoint.zmp.xy(),
                &waypoint.ankles.map(|_, ankle| ankle.translation.vector.xy()),
            ),
        }
    }

    /// Corrects the reference of `waypoint` with the estimated `state`.
    pub fn run(&mut self, waypoint: &Waypoint, state: &RobotState) -> LiveReference {
        let mut reference = LiveReference::from_waypoint(waypoint);

        let shares = self.load_shares(waypoint);
        let desired = distribute_wrench(&ForceTorque::new(self.weight, 0.0, 0.0), &shares);
        let expected_bumps = distribute_bump(self.bump_orientation.full_contact_sum(), &shares);

        self.desired_zmp = self.admittance.desired_zmp(waypoint, state, self.dt);
        let pelvis_offset = self.admittance.update(&self.desired_zmp, state, self.dt);
        let com_correction = self.admittance.com_correction(waypoint, state, self.dt);
        reference.shift_pelvis(&(pelvis_offset + com_correction));

        let torque_tilt = self.foot_orientation.update(state, &desired, self.dt);
        let bump_tilt = self.bump_orientation.update(state, &expected_bumps, self.dt);
        for side in [Side::Left, Side::Right] {
            let (torque, bump) = (torque_tilt.get(side), bump_tilt.get(side));
            reference
                .tilt_ankle(side, torque.x, torque.y)
                .tilt_ankle(side, bump.x, bump.y);
        }

        let held = self.early_contact.update(waypoint, state, self.dt);
        let length = self.foot_length.update(waypoint, state, &desired, self.dt);
        for side in [Side::Left, Side::Right] {
            reference.raise_ankle(side, held.get(side) + length.get(side));
        }

        reference
    }
}
