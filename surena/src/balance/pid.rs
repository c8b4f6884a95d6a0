use nalgebra::Vector2;

/// Planar PID controller with a bounded integral term.
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    integral_limit: f32,
    integral: Vector2<f32>,
    previous_error: Option<Vector2<f32>>,
}

impl Pid {
    #[must_use]
    pub fn new(kp: f32, ki: f32, kd: f32, integral_limit: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit,
            integral: Vector2::zeros(),
            previous_error: None,
        }
    }

    pub fn update(&mut self, error: Vector2<f32>, dt: f32) -> Vector2<f32> {
        self.integral =
            (self.integral + error * dt).map(|value| super::bound(value, self.integral_limit));

        // no derivative kick on the first sample
        let derivative = self
            .previous_error
            .map_or_else(Vector2::zeros, |previous| (error - previous) / dt);
        self.previous_error = Some(error);

        error * self.kp + self.integral * self.ki + derivative * self.kd
    }

    pub fn reset(&mut self) {
        self.integral = Vector2::zeros();
        self.previous_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_only() {
        let mut pid = Pid::new(2.0, 0.0, 0.0, 1.0);

        assert_eq!(pid.update(Vector2::new(0.5, -1.0), 0.01), Vector2::new(1.0, -2.0));
    }

    #[test]
    fn integral_is_bounded() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 0.05);
        let mut output = Vector2::zeros();
        for _ in 0..1000 {
            output = pid.update(Vector2::new(1.0, -1.0), 0.01);
        }

        assert!((output - Vector2::new(0.05, -0.05)).norm() < 1e-6);

        pid.reset();
        assert_eq!(pid.update(Vector2::zeros(), 0.01), Vector2::zeros());
    }

    #[test]
    fn derivative_follows_the_error_change() {
        let mut pid = Pid::new(0.0, 0.0, 1.0, 1.0);

        assert_eq!(pid.update(Vector2::new(1.0, 0.0), 0.5), Vector2::zeros());
        assert!((pid.update(Vector2::new(2.0, 0.0), 0.5) - Vector2::new(2.0, 0.0)).norm() < 1e-6);
    }
}
