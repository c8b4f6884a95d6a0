//! Plain data types shared by all parts of the locomotion core.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Number of actuated leg joints.
pub const JOINT_COUNT: usize = 12;

/// Joint values of both legs, right leg first.
///
/// Per leg the order is hip yaw, hip roll, hip pitch, knee pitch, ankle pitch, ankle roll.
pub type JointArray = [f32; JOINT_COUNT];

/// A side of the robot.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Offset of this side's slot in a [`JointArray`].
    #[must_use]
    pub fn joint_offset(self) -> usize {
        match self {
            Side::Right => 0,
            Side::Left => 6,
        }
    }

    /// `1.0` for the left side and `-1.0` for the right side, the sign of the lateral axis.
    #[must_use]
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

/// A value for each foot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feet<T> {
    pub left: T,
    pub right: T,
}

impl<T> Feet<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Side, T) -> U) -> Feet<U> {
        Feet {
            left: f(Side::Left, self.left),
            right: f(Side::Right, self.right),
        }
    }
}

impl<T: Clone> Feet<T> {
    pub fn both(value: T) -> Self {
        Self {
            left: value.clone(),
            right: value,
        }
    }
}

/// The six joints of a single leg.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegJoints {
    pub hip_yaw: f32,
    pub hip_roll: f32,
    pub hip_pitch: f32,
    pub knee_pitch: f32,
    pub ankle_pitch: f32,
    pub ankle_roll: f32,
}

impl LegJoints {
    #[must_use]
    pub fn from_array(values: [f32; 6]) -> Self {
        let [hip_yaw, hip_roll, hip_pitch, knee_pitch, ankle_pitch, ankle_roll] = values;
        Self {
            hip_yaw,
            hip_roll,
            hip_pitch,
            knee_pitch,
            ankle_pitch,
            ankle_roll,
        }
    }

    #[must_use]
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.hip_yaw,
            self.hip_roll,
            self.hip_pitch,
            self.knee_pitch,
            self.ankle_pitch,
            self.ankle_roll,
        ]
    }

    /// Reads the joints of `side` from a full joint array.
    #[must_use]
    pub fn from_joint_array(joints: &JointArray, side: Side) -> Self {
        let offset = side.joint_offset();
        let mut values = [0.0; 6];
        values.copy_from_slice(&joints[offset..offset + 6]);
        Self::from_array(values)
    }

    /// Writes the joints into the slot of `side` in a full joint array.
    pub fn write_to(&self, joints: &mut JointArray, side: Side) {
        let offset = side.joint_offset();
        joints[offset..offset + 6].copy_from_slice(&self.to_array());
    }
}

/// Reading of a foot force/torque sensor, expressed in the sole frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceTorque {
    /// Vertical force in N, positive when the foot is loaded.
    pub force_z: f32,
    /// Moment around the sole x-axis in Nm.
    pub torque_x: f32,
    /// Moment around the sole y-axis in Nm.
    pub torque_y: f32,
}

impl ForceTorque {
    #[must_use]
    pub fn new(force_z: f32, torque_x: f32, torque_y: f32) -> Self {
        Self {
            force_z,
            torque_x,
            torque_y,
        }
    }

    #[must_use]
    pub fn scaled(&self, weight: f32) -> Self {
        Self::new(
            self.force_z * weight,
            self.torque_x * weight,
            self.torque_y * weight,
        )
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.force_z.is_finite() && self.torque_x.is_finite() && self.torque_y.is_finite()
    }
}

impl std::ops::Add for ForceTorque {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.force_z + rhs.force_z,
            self.torque_x + rhs.torque_x,
            self.torque_y + rhs.torque_y,
        )
    }
}

/// Readings of the four contact (bump) sensors under the corners of a sole.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BumpReadings {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

impl BumpReadings {
    #[must_use]
    pub fn new(front_left: f32, front_right: f32, rear_left: f32, rear_right: f32) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    #[must_use]
    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    #[must_use]
    pub fn to_array(&self) -> [f32; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }

    #[must_use]
    pub fn from_array([front_left, front_right, rear_left, rear_right]: [f32; 4]) -> Self {
        Self::new(front_left, front_right, rear_left, rear_right)
    }

    #[must_use]
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self::from_array(self.to_array().map(f))
    }

    #[must_use]
    pub fn zip_with(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let [a, b, c, d] = self.to_array();
        let [e, g, h, i] = other.to_array();
        Self::new(f(a, e), f(b, g), f(c, h), f(d, i))
    }

    #[must_use]
    pub fn sum(&self) -> f32 {
        self.to_array().iter().sum()
    }

    #[must_use]
    pub fn front(&self) -> f32 {
        self.front_left + self.front_right
    }

    #[must_use]
    pub fn rear(&self) -> f32 {
        self.rear_left + self.rear_right
    }

    #[must_use]
    pub fn left(&self) -> f32 {
        self.front_left + self.rear_left
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.front_right + self.rear_right
    }
}

/// Raw sensor readings of a single control cycle.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Cycle counter of the caller, only used for logging.
    pub iteration: u64,
    pub joint_positions: JointArray,
    pub joint_velocities: JointArray,
    pub force_torque: Feet<ForceTorque>,
    pub bumps: Feet<BumpReadings>,
    /// Angular velocity in rad/s, in the base frame.
    pub gyroscope: Vector3<f32>,
    /// Specific force in m/s², in the base frame.
    pub accelerometer: Vector3<f32>,
}

impl SensorFrame {
    /// A frame of a robot standing still with its weight spread evenly over both feet.
    #[must_use]
    pub fn standing(joint_positions: JointArray, weight: f32, gravity: f32) -> Self {
        Self {
            joint_positions,
            force_torque: Feet::both(ForceTorque::new(weight / 2.0, 0.0, 0.0)),
            bumps: Feet::both(BumpReadings::uniform(1.0)),
            accelerometer: Vector3::new(0.0, 0.0, gravity),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leg_joints_use_their_slot() {
        let mut joints = [0.0; JOINT_COUNT];
        let left = LegJoints::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        left.write_to(&mut joints, Side::Left);

        assert_eq!(joints[..6], [0.0; 6]);
        assert_eq!(joints[6..], [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(LegJoints::from_joint_array(&joints, Side::Left), left);
    }

    #[test]
    fn bump_groups() {
        let bumps = BumpReadings::new(1.0, 2.0, 3.0, 4.0);

        assert_eq!(bumps.front(), 3.0);
        assert_eq!(bumps.rear(), 7.0);
        assert_eq!(bumps.left(), 4.0);
        assert_eq!(bumps.right(), 6.0);
        assert_eq!(bumps.sum(), 10.0);
    }
}
