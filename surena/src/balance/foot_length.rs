//! Leg length adaptation in double support.
use super::leaky_integrate;
use crate::{
    config::FootLengthConfig,
    estimation::RobotState,
    trajectory::Waypoint,
    types::{Feet, ForceTorque},
};

/// Shortens the overloaded leg in double support until the vertical forces match their desired
/// split.
///
/// The controller engages once both feet exceed the force threshold, and disengages when either
/// foot drops below half of it or the double support ends.
#[derive(Debug, Clone)]
pub struct FootLength {
    config: FootLengthConfig,
    engaged: bool,
    /// Height of the left ankle above the right one, relative to the plan.
    difference: f32,
}

impl FootLength {
    #[must_use]
    pub fn new(config: &FootLengthConfig) -> Self {
        Self {
            config: config.clone(),
            engaged: false,
            difference: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.engaged = false;
        self.difference = 0.0;
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Ankle height offsets for this cycle.
    pub fn update(
        &mut self,
        waypoint: &Waypoint,
        state: &RobotState,
        desired: &Feet<ForceTorque>,
        dt: f32,
    ) -> Feet<f32> {
        if !self.config.enabled {
            self.reset();
            return Feet::both(0.0);
        }

        let force = state.force_torque.map(|_, wrench| wrench.force_z);
        let threshold = self.config.force_threshold;
        self.engaged = waypoint.phase.is_double_support()
            && if self.engaged {
                force.left > threshold / 2.0 && force.right > threshold / 2.0
            } else {
                force.left > threshold && force.right > threshold
            };

        let rate = if self.engaged {
            let error =
                (force.left - force.right) - (desired.left.force_z - desired.right.force_z);
            self.config.gain * error
        } else {
            0.0
        };
        self.difference = leaky_integrate(
            self.difference,
            rate,
            self.config.time_constant,
            self.config.limit,
            dt,
        );

        Feet::new(self.difference / 2.0, -self.difference / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{SupportPhase, gait};

    fn controller() -> FootLength {
        FootLength::new(&FootLengthConfig {
            enabled: true,
            gain: 0.00005,
            time_constant: 0.5,
            limit: 0.03,
            force_threshold: 60.0,
        })
    }

    fn waypoint(phase: SupportPhase) -> Waypoint {
        let mut waypoint = gait::generate(&gait::tests::walk(1), None, 9.81).unwrap().waypoints[0];
        waypoint.phase = phase;
        waypoint
    }

    #[test]
    fn overloaded_left_leg_is_shortened() {
        let mut controller = controller();
        let mut state = RobotState::default();
        state.force_torque = Feet::new(ForceTorque::new(300.0, 0.0, 0.0), ForceTorque::new(200.0, 0.0, 0.0));
        let desired = Feet::both(ForceTorque::new(250.0, 0.0, 0.0));

        let offsets = controller.update(&waypoint(SupportPhase::DoubleSupport), &state, &desired, 0.005);

        assert!(controller.is_engaged());
        assert!(offsets.left > 0.0);
        assert!((offsets.left + offsets.right).abs() < 1e-9);
    }

    #[test]
    fn engagement_is_latched() {
        let mut controller = controller();
        let mut state = RobotState::default();
        let desired = Feet::both(ForceTorque::new(250.0, 0.0, 0.0));
        let double = waypoint(SupportPhase::DoubleSupport);

        state.force_torque = Feet::both(ForceTorque::new(50.0, 0.0, 0.0));
        controller.update(&double, &state, &desired, 0.005);
        assert!(!controller.is_engaged());

        state.force_torque = Feet::both(ForceTorque::new(70.0, 0.0, 0.0));
        controller.update(&double, &state, &desired, 0.005);
        assert!(controller.is_engaged());

        // below the threshold, but above the release level
        state.force_torque = Feet::both(ForceTorque::new(50.0, 0.0, 0.0));
        controller.update(&double, &state, &desired, 0.005);
        assert!(controller.is_engaged());

        controller.update(&waypoint(SupportPhase::LeftSupport), &state, &desired, 0.005);
        assert!(!controller.is_engaged());
    }
}
