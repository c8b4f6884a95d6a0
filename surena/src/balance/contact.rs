//! Early touchdown of the swing foot.
use crate::{
    config::EarlyContactConfig,
    estimation::RobotState,
    trajectory::Waypoint,
    types::{Feet, Side},
};

/// Holds the swing ankle at its height of touchdown when the ground is hit before the planned
/// landing, and releases the difference to the plan once the foot supports again.
#[derive(Debug, Clone)]
pub struct EarlyContact {
    config: EarlyContactConfig,
    /// Commanded ankle height at touchdown.
    held: Feet<Option<f32>>,
    /// Planned ankle height of the previous cycle.
    previous: Feet<Option<f32>>,
    /// Height added to the planned ankle height.
    offset: Feet<f32>,
}

impl EarlyContact {
    #[must_use]
    pub fn new(config: &EarlyContactConfig) -> Self {
        Self {
            config: config.clone(),
            held: Feet::default(),
            previous: Feet::default(),
            offset: Feet::default(),
        }
    }

    pub fn reset(&mut self) {
        self.held = Feet::default();
        self.previous = Feet::default();
        self.offset = Feet::default();
    }

    #[must_use]
    pub fn is_holding(&self, side: Side) -> bool {
        self.held.get(side).is_some()
    }

    /// Ankle height offsets for this cycle.
    pub fn update(&mut self, waypoint: &Waypoint, state: &RobotState, dt: f32) -> Feet<f32> {
        if !self.config.enabled {
            self.reset();
            return self.offset;
        }

        let release = (-dt / self.config.release_time_constant).exp();

        for side in [Side::Left, Side::Right] {
            let planned = waypoint.ankles.get(side).translation.z;
            let descending = self
                .previous
                .get(side)
                .is_some_and(|previous| planned < previous);
            *self.previous.get_mut(side) = Some(planned);

            let swinging = waypoint.phase.is_swing(side);
            let touched = state.force_torque.get(side).force_z > self.config.force_threshold
                || state.bumps.get(side).sum() > self.config.bump_threshold;

            let offset = self.offset.get_mut(side);
            let held = self.held.get_mut(side);

            if swinging && (held.is_some() || (descending && touched)) {
                let height = *held.get_or_insert(planned + *offset);
                *offset = (height - planned).max(0.0);
            } else {
                *held = None;
                *offset *= release;
            }
        }

        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        trajectory::{SupportPhase, gait},
        types::ForceTorque,
    };

    fn controller() -> EarlyContact {
        EarlyContact::new(&EarlyContactConfig {
            enabled: true,
            force_threshold: 60.0,
            bump_threshold: 1.0,
            release_time_constant: 0.2,
        })
    }

    #[test]
    fn touchdown_during_descent_holds_the_foot() {
        let plan = gait::generate(&gait::tests::walk(2), None, 9.81).unwrap();
        // the right foot swings in the first step, take its descending half
        let descent: Vec<_> = plan
            .waypoints
            .iter()
            .filter(|waypoint| waypoint.phase == SupportPhase::LeftSupport)
            .skip(45)
            .collect();
        assert!(descent.len() > 20);

        let mut controller = controller();
        let mut state = RobotState::default();
        controller.update(descent[0], &state, 0.01);
        state.force_torque.right = ForceTorque::new(100.0, 0.0, 0.0);

        let touchdown = descent[1].ankles.right.translation.z;
        let mut offset = 0.0;
        for waypoint in &descent[1..] {
            offset = controller.update(waypoint, &state, 0.01).right;
            let commanded = waypoint.ankles.right.translation.z + offset;
            assert!((commanded - touchdown).abs() < 1e-5);
        }
        assert!(controller.is_holding(Side::Right));
        assert!(offset > 0.0);

        let after = plan
            .waypoints
            .iter()
            .find(|waypoint| waypoint.phase == SupportPhase::DoubleSupport)
            .unwrap();
        let released = controller.update(after, &state, 0.01).right;
        assert!(!controller.is_holding(Side::Right));
        assert!(released < offset && released > 0.0);
    }

    #[test]
    fn no_contact_follows_the_plan() {
        let plan = gait::generate(&gait::tests::walk(2), None, 9.81).unwrap();
        let mut controller = controller();
        let state = RobotState::default();

        for waypoint in &plan.waypoints {
            assert_eq!(controller.update(waypoint, &state, 0.01), Feet::both(0.0));
        }
    }
}
