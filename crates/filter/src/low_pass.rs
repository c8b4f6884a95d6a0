use std::f32::consts::PI;

use nalgebra::SVector;

/// First-order Butterworth low-pass filter, discretised with the bilinear transform.
///
/// Each of the `N` channels is filtered independently.
#[derive(Copy, Clone, Debug)]
pub struct ButterworthLpf<const N: usize> {
    input_gain: f32,
    feedback_gain: f32,
    previous_input: SVector<f32, N>,
    output: SVector<f32, N>,
}

impl<const N: usize> ButterworthLpf<N> {
    /// Creates a filter from the prewarped cut-off `omega = tan(π f_c Δt)`.
    #[must_use]
    pub fn new(omega: f32) -> Self {
        Self {
            input_gain: omega / (1.0 + omega),
            feedback_gain: (1.0 - omega) / (1.0 + omega),
            previous_input: SVector::zeros(),
            output: SVector::zeros(),
        }
    }

    /// Creates a filter with cut-off frequency `freq` in Hz, sampled every `dt` seconds.
    #[must_use]
    pub fn with_cutoff_freq(freq: f32, dt: f32) -> Self {
        Self::new((PI * freq * dt).tan())
    }

    pub fn update(&mut self, input: SVector<f32, N>) -> SVector<f32, N> {
        self.output =
            self.input_gain * (input + self.previous_input) + self.feedback_gain * self.output;
        self.previous_input = input;

        self.output
    }

    /// Sets the filter to a steady state at `value`.
    pub fn reset(&mut self, value: SVector<f32, N>) {
        self.previous_input = value;
        self.output = value;
    }

    #[must_use]
    pub fn state(&self) -> SVector<f32, N> {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector1;

    #[test]
    fn butterworth_converges_to_constant_input() {
        let mut filter = ButterworthLpf::<1>::with_cutoff_freq(5.0, 0.005);

        for _ in 0..500 {
            filter.update(Vector1::new(2.0));
        }

        assert!((filter.state().x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn reset_holds_steady_state() {
        let mut filter = ButterworthLpf::<1>::with_cutoff_freq(5.0, 0.005);
        filter.reset(Vector1::new(3.0));

        assert!((filter.update(Vector1::new(3.0)).x - 3.0).abs() < 1e-6);
    }
}
