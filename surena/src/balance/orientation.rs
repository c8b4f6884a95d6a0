//! Ankle orientation corrections that keep the soles flat on the ground.
use nalgebra::Vector2;

use super::leaky_integrate;
use crate::{
    config::{BumpOrientationConfig, FootOrientationConfig},
    estimation::RobotState,
    types::{Feet, ForceTorque, Side},
};

/// Expected values below which a foot is treated as unloaded.
const MIN_EXPECTED: f32 = 1e-3;

/// Roll and pitch corrections of both ankles, in rad.
pub type AnkleTilt = Feet<Vector2<f32>>;

/// Rotates the stance ankles to null the difference between measured and desired sole torque.
#[derive(Debug, Clone)]
pub struct FootOrientation {
    config: FootOrientationConfig,
    tilt: AnkleTilt,
}

impl FootOrientation {
    #[must_use]
    pub fn new(config: &FootOrientationConfig) -> Self {
        Self {
            config: config.clone(),
            tilt: Feet::both(Vector2::zeros()),
        }
    }

    pub fn reset(&mut self) {
        self.tilt = Feet::both(Vector2::zeros());
    }

    pub fn update(
        &mut self,
        state: &RobotState,
        desired: &Feet<ForceTorque>,
        dt: f32,
    ) -> AnkleTilt {
        if !self.config.enabled {
            self.reset();
            return self.tilt;
        }

        for side in [Side::Left, Side::Right] {
            let stance = !*state.swing.get(side) && *state.contact.get(side);
            let rate = if stance {
                let measured = state.force_torque.get(side);
                let desired = desired.get(side);
                Vector2::new(
                    measured.torque_x - desired.torque_x,
                    measured.torque_y - desired.torque_y,
                ) * self.config.gain
            } else {
                Vector2::zeros()
            };

            let config = &self.config;
            let tilt = self.tilt.get_mut(side);
            *tilt = tilt.zip_map(&rate, |angle, rate| {
                leaky_integrate(angle, rate, config.time_constant, config.limit, dt)
            });
        }

        self.tilt
    }
}

/// Tilts the stance ankles toward full sole contact, from the four contact sensors per foot.
#[derive(Debug, Clone)]
pub struct BumpOrientation {
    config: BumpOrientationConfig,
    tilt: AnkleTilt,
}

impl BumpOrientation {
    #[must_use]
    pub fn new(config: &BumpOrientationConfig) -> Self {
        Self {
            config: config.clone(),
            tilt: Feet::both(Vector2::zeros()),
        }
    }

    pub fn reset(&mut self) {
        self.tilt = Feet::both(Vector2::zeros());
    }

    /// Summed contact value of a foot carrying the whole robot.
    #[must_use]
    pub fn full_contact_sum(&self) -> f32 {
        self.config.full_contact * 4.0
    }

    /// `expected` is the summed contact value each foot should read for its share of the load.
    pub fn update(&mut self, state: &RobotState, expected: &Feet<f32>, dt: f32) -> AnkleTilt {
        if !self.config.enabled {
            self.reset();
            return self.tilt;
        }

        for side in [Side::Left, Side::Right] {
            let bumps = state.bumps.get(side);
            let expected = *expected.get(side);
            let touching = bumps.sum() > self.config.contact_threshold;

            let rate = if !*state.swing.get(side) && touching && expected > MIN_EXPECTED {
                // a loaded front pitches the toes up, a loaded left edge rolls it up
                Vector2::new(bumps.left() - bumps.right(), bumps.rear() - bumps.front())
                    * (self.config.gain / expected)
            } else {
                Vector2::zeros()
            };

            let config = &self.config;
            let tilt = self.tilt.get_mut(side);
            *tilt = tilt.zip_map(&rate, |angle, rate| {
                leaky_integrate(angle, rate, config.time_constant, config.limit, dt)
            });
        }

        self.tilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BumpReadings;

    fn stance_state() -> RobotState {
        RobotState {
            contact: Feet::both(true),
            ..Default::default()
        }
    }

    #[test]
    fn torque_error_tilts_the_stance_ankle() {
        let mut controller = FootOrientation::new(&FootOrientationConfig {
            enabled: true,
            gain: 0.02,
            time_constant: 0.3,
            limit: 0.15,
        });
        let mut state = stance_state();
        state.force_torque.left = ForceTorque::new(300.0, 0.0, 5.0);
        state.swing.right = true;
        state.force_torque.right = ForceTorque::new(0.0, 5.0, 5.0);

        let tilt = controller.update(&state, &Feet::default(), 0.005);

        assert!(tilt.left.y > 0.0 && tilt.left.x == 0.0);
        assert_eq!(tilt.right, Vector2::zeros());
    }

    #[test]
    fn disabled_controller_is_neutral() {
        let mut controller = FootOrientation::new(&FootOrientationConfig {
            enabled: false,
            gain: 0.02,
            time_constant: 0.3,
            limit: 0.15,
        });
        let mut state = stance_state();
        state.force_torque.left = ForceTorque::new(300.0, 4.0, 5.0);

        assert_eq!(
            controller.update(&state, &Feet::default(), 0.005),
            Feet::both(Vector2::zeros())
        );
    }

    #[test]
    fn toe_contact_pitches_the_sole_up() {
        let mut controller = BumpOrientation::new(&BumpOrientationConfig {
            enabled: true,
            gain: 0.5,
            time_constant: 0.3,
            limit: 0.1,
            contact_threshold: 0.5,
            full_contact: 1.0,
        });
        let mut state = stance_state();
        state.bumps.left = BumpReadings::new(1.0, 1.0, 0.0, 0.0);
        state.bumps.right = BumpReadings::new(0.0, 1.0, 0.0, 1.0);

        let tilt = controller.update(&state, &Feet::both(2.0), 0.005);

        assert!(tilt.left.y < 0.0 && tilt.left.x.abs() < 1e-9);
        // only the right edge touches, so the left edge comes down
        assert!(tilt.right.x < 0.0 && tilt.right.y.abs() < 1e-9);
    }

    #[test]
    fn lifted_foot_relaxes() {
        let mut controller = BumpOrientation::new(&BumpOrientationConfig {
            enabled: true,
            gain: 0.5,
            time_constant: 0.3,
            limit: 0.1,
            contact_threshold: 0.5,
            full_contact: 1.0,
        });
        let mut state = stance_state();
        state.bumps.left = BumpReadings::new(1.0, 1.0, 0.0, 0.0);
        let tilted = controller.update(&state, &Feet::both(2.0), 0.005).left.y;

        state.bumps.left = BumpReadings::default();
        let relaxed = controller.update(&state, &Feet::both(2.0), 0.005).left.y;

        assert!(relaxed.abs() < tilted.abs());
    }
}
