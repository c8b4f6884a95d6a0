//! Plausibility checks of the raw sensor inputs.
//!
//! A reading that is not finite or out of its physical range is replaced by the last valid
//! reading of the same input, and flagged as a fault for this cycle.
use nalgebra::Vector3;

use crate::{
    config::LimitsConfig,
    types::{BumpReadings, Feet, ForceTorque, JOINT_COUNT, SensorFrame, Side},
};

/// Margin around the joint limits within which an encoder reading is still plausible, in rad.
const JOINT_MARGIN: f32 = 0.2;

/// Inputs that were replaced by their last valid value in a cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SensorFaults {
    pub joint_positions: bool,
    pub joint_velocities: bool,
    pub force_torque: Feet<bool>,
    pub bumps: Feet<bool>,
    pub gyroscope: bool,
    pub accelerometer: bool,
}

impl SensorFaults {
    #[must_use]
    pub fn any(&self) -> bool {
        self.joint_positions
            || self.joint_velocities
            || self.force_torque.left
            || self.force_torque.right
            || self.bumps.left
            || self.bumps.right
            || self.gyroscope
            || self.accelerometer
    }
}

#[derive(Debug, Clone)]
pub struct SensorGuard {
    limits: LimitsConfig,
    last_valid: SensorFrame,
}

impl SensorGuard {
    /// Creates a guard that falls back to a robot standing still in its zero pose.
    #[must_use]
    pub fn new(limits: &LimitsConfig, gravity: f32) -> Self {
        let mut last_valid = SensorFrame::standing([0.0; JOINT_COUNT], 0.0, gravity);
        last_valid.bumps = Feet::default();

        for (value, (lower, upper)) in last_valid
            .joint_positions
            .iter_mut()
            .zip(limits.joint_lower.iter().zip(&limits.joint_upper))
        {
            *value = value.clamp(*lower, *upper);
        }

        Self {
            limits: limits.clone(),
            last_valid,
        }
    }

    /// Returns `frame` with every implausible input replaced by its last valid value.
    pub fn check(&mut self, frame: &SensorFrame) -> (SensorFrame, SensorFaults) {
        let limits = &self.limits;
        let last = &mut self.last_valid;
        let mut faults = SensorFaults::default();

        for index in 0..JOINT_COUNT {
            let (lower, upper) = (limits.joint_lower[index], limits.joint_upper[index]);
            faults.joint_positions |= hold(
                frame.joint_positions[index],
                &mut last.joint_positions[index],
                |value| value >= lower - JOINT_MARGIN && value <= upper + JOINT_MARGIN,
            );
            faults.joint_velocities |= hold(
                frame.joint_velocities[index],
                &mut last.joint_velocities[index],
                |value| value.abs() <= limits.max_joint_velocity,
            );
        }

        for side in [Side::Left, Side::Right] {
            *faults.force_torque.get_mut(side) = hold(
                *frame.force_torque.get(side),
                last.force_torque.get_mut(side),
                |wrench: ForceTorque| {
                    wrench.is_finite()
                        && wrench.force_z.abs() <= limits.max_force
                        && wrench.torque_x.abs() <= limits.max_torque
                        && wrench.torque_y.abs() <= limits.max_torque
                },
            );
            *faults.bumps.get_mut(side) = hold(
                *frame.bumps.get(side),
                last.bumps.get_mut(side),
                |bumps: BumpReadings| {
                    bumps
                        .to_array()
                        .iter()
                        .all(|value| value.is_finite() && (0.0..=limits.max_bump).contains(value))
                },
            );
        }

        faults.gyroscope = hold(frame.gyroscope, &mut last.gyroscope, |rate| {
            finite(&rate) && rate.norm() <= limits.max_gyro
        });
        faults.accelerometer = hold(frame.accelerometer, &mut last.accelerometer, |force| {
            finite(&force) && force.norm() <= limits.max_acceleration
        });
        last.iteration = frame.iteration;

        (last.clone(), faults)
    }
}

fn finite(vector: &Vector3<f32>) -> bool {
    vector.iter().all(|value| value.is_finite())
}

/// Stores `value` in `last` if it is plausible, returns whether it was rejected.
fn hold<T: Copy>(value: T, last: &mut T, plausible: impl Fn(T) -> bool) -> bool {
    if plausible(value) {
        *last = value;
        false
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurenaConfig;

    fn guard() -> SensorGuard {
        let config = SurenaConfig::bundled().unwrap();
        SensorGuard::new(&config.limits, config.control.gravity)
    }

    #[test]
    fn plausible_frame_passes() {
        let mut guard = guard();
        let mut joints = [0.0; JOINT_COUNT];
        joints[3] = 0.5;
        let frame = SensorFrame::standing(joints, 500.0, 9.81);

        let (checked, faults) = guard.check(&frame);

        assert!(!faults.any());
        assert_eq!(checked, frame);
    }

    #[test]
    fn faulty_inputs_hold_the_last_valid_value() {
        let mut guard = guard();
        let frame = SensorFrame::standing([0.1; JOINT_COUNT], 500.0, 9.81);
        guard.check(&frame);

        let mut broken = frame.clone();
        broken.joint_positions[2] = f32::NAN;
        broken.gyroscope = Vector3::new(0.0, f32::INFINITY, 0.0);
        broken.force_torque.left.force_z = 1e6;
        broken.bumps.right.rear_left = -1.0;

        let (checked, faults) = guard.check(&broken);

        assert!(faults.joint_positions && faults.gyroscope);
        assert!(faults.force_torque.left && !faults.force_torque.right);
        assert!(faults.bumps.right && !faults.bumps.left);
        assert!(!faults.accelerometer && !faults.joint_velocities);
        assert_eq!(checked.joint_positions[2], 0.1);
        assert_eq!(checked.gyroscope, Vector3::zeros());
        assert_eq!(*checked.force_torque.get(Side::Left), frame.force_torque.left);
        assert_eq!(checked.bumps.right, frame.bumps.right);
    }

    #[test]
    fn joint_outside_of_the_limits_is_rejected() {
        let mut guard = guard();
        let mut joints = [0.0; JOINT_COUNT];
        // knee bent backwards
        joints[3] = -0.5;

        let (checked, faults) = guard.check(&SensorFrame::standing(joints, 500.0, 9.81));

        assert!(faults.joint_positions);
        assert_eq!(checked.joint_positions[3], 0.0);
    }
}
