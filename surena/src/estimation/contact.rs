//! Contact sensor bias calibration.
use tracing::{debug, info};

use crate::types::{BumpReadings, Feet};

/// Averages the contact sensor readings while the robot stands still, and removes the
/// resulting bias from every later reading.
#[derive(Debug, Clone)]
pub struct BumpCalibration {
    samples: u32,
    collected: u32,
    sum: Feet<BumpReadings>,
    bias: Feet<BumpReadings>,
    calibrating: bool,
}

impl BumpCalibration {
    #[must_use]
    pub fn new(samples: u32) -> Self {
        Self {
            samples,
            collected: 0,
            sum: Feet::default(),
            bias: Feet::default(),
            calibrating: true,
        }
    }

    #[must_use]
    pub fn bias(&self) -> &Feet<BumpReadings> {
        &self.bias
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        !self.calibrating
    }

    /// Restarts the averaging, the current bias stays in use until it completes.
    pub fn request_recalibration(&mut self) {
        debug!("contact sensor recalibration requested");
        self.calibrating = true;
        self.collected = 0;
        self.sum = Feet::default();
    }

    /// Adds a sample if the robot is `stationary` and returns the bias corrected readings.
    pub fn update(&mut self, raw: &Feet<BumpReadings>, stationary: bool) -> Feet<BumpReadings> {
        if self.calibrating && stationary {
            self.collected += 1;
            self.sum = Feet::new(
                self.sum.left.zip_with(&raw.left, |sum, value| sum + value),
                self.sum.right.zip_with(&raw.right, |sum, value| sum + value),
            );

            if self.collected >= self.samples {
                let count = self.collected as f32;
                self.bias = self.sum.map(|_, sum| sum.map(|value| value / count));
                self.calibrating = false;
                info!(
                    left = self.bias.left.sum(),
                    right = self.bias.right.sum(),
                    "contact sensors calibrated"
                );
            }
        }

        Feet::new(
            raw.left
                .zip_with(&self.bias.left, |value, bias| (value - bias).max(0.0)),
            raw.right
                .zip_with(&self.bias.right, |value, bias| (value - bias).max(0.0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_is_the_stationary_average() {
        let mut calibration = BumpCalibration::new(4);
        let readings = [0.1, 0.3, 0.2, 0.2].map(|value| Feet::both(BumpReadings::uniform(value)));

        for raw in &readings {
            calibration.update(raw, true);
        }

        assert!(calibration.is_calibrated());
        assert!((calibration.bias().left.front_left - 0.2).abs() < 1e-6);

        let corrected = calibration.update(&Feet::both(BumpReadings::new(1.2, 0.1, 0.2, 0.5)), true);
        let expected = [1.0, 0.0, 0.0, 0.3];
        for (value, expected) in corrected.right.to_array().iter().zip(expected) {
            assert!((value - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn moving_samples_are_ignored() {
        let mut calibration = BumpCalibration::new(2);
        calibration.update(&Feet::both(BumpReadings::uniform(5.0)), false);
        calibration.update(&Feet::both(BumpReadings::uniform(1.0)), true);

        assert!(!calibration.is_calibrated());
        calibration.update(&Feet::both(BumpReadings::uniform(1.0)), true);
        assert_eq!(calibration.bias().left, BumpReadings::uniform(1.0));
    }

    #[test]
    fn recalibration_keeps_the_old_bias_until_done() {
        let mut calibration = BumpCalibration::new(1);
        calibration.update(&Feet::both(BumpReadings::uniform(1.0)), true);
        calibration.request_recalibration();

        assert!(!calibration.is_calibrated());
        assert_eq!(calibration.bias().right, BumpReadings::uniform(1.0));

        calibration.update(&Feet::both(BumpReadings::uniform(2.0)), true);
        assert_eq!(calibration.bias().right, BumpReadings::uniform(2.0));
    }
}
