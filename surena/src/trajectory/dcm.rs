//! Divergent component of motion (DCM) planning for a piecewise linear ZMP reference.
//!
//! For the linear inverted pendulum with natural frequency `ω = sqrt(g / h)` the DCM
//! `ξ = c + ċ / ω` obeys `ξ̇ = ω (ξ - p)`. With the ZMP `p` moving linearly with velocity `v`
//! between two knots, the solution that ends in `ξ₁` at the later knot is
//!
//! `ξ(t) = p(t) + v / ω + exp(ω (t - t₁)) (ξ₁ - p₁ - v / ω)`
//!
//! which is evaluated backward from the final knot, where the robot comes to rest.
use itertools::Itertools;
use nalgebra::Vector3;

/// Segments shorter than this are treated as instantaneous ZMP jumps.
const MIN_SEGMENT: f32 = 1e-6;

/// Natural frequency of the linear inverted pendulum.
#[must_use]
pub fn natural_frequency(gravity: f32, com_height: f32) -> f32 {
    (gravity / com_height).sqrt()
}

/// A corner of the piecewise linear ZMP reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZmpKnot {
    pub time: f32,
    pub position: Vector3<f32>,
}

/// DCM reference for a piecewise linear ZMP reference that ends at rest.
#[derive(Debug, Clone, PartialEq)]
pub struct DcmPlan {
    omega: f32,
    knots: Vec<ZmpKnot>,
    /// DCM at every knot.
    dcm: Vec<Vector3<f32>>,
}

impl DcmPlan {
    /// Solves the DCM at every knot, `knots` must be sorted by time and not be empty.
    #[must_use]
    pub fn new(knots: Vec<ZmpKnot>, omega: f32) -> Self {
        let mut dcm = vec![Vector3::zeros(); knots.len()];

        if let Some(last) = knots.last() {
            dcm[knots.len() - 1] = last.position;
        }

        for index in (0..knots.len().saturating_sub(1)).rev() {
            let (start, end) = (&knots[index], &knots[index + 1]);
            dcm[index] = match Self::drift(start, end, omega) {
                Some(drift) => {
                    let decay = (-omega * (end.time - start.time)).exp();
                    start.position + drift + (dcm[index + 1] - end.position - drift) * decay
                }
                None => dcm[index + 1],
            };
        }

        Self { omega, knots, dcm }
    }

    #[must_use]
    pub fn omega(&self) -> f32 {
        self.omega
    }

    #[must_use]
    pub fn duration(&self) -> f32 {
        self.knots.last().map_or(0.0, |knot| knot.time)
    }

    /// `v / ω` of the segment between two knots, `None` for instantaneous segments.
    fn drift(start: &ZmpKnot, end: &ZmpKnot, omega: f32) -> Option<Vector3<f32>> {
        let duration = end.time - start.time;
        (duration > MIN_SEGMENT).then(|| (end.position - start.position) / (duration * omega))
    }

    /// Index of the knot that ends the segment containing `time`.
    fn segment_end(&self, time: f32) -> Option<usize> {
        self.knots
            .iter()
            .tuple_windows()
            .position(|(start, end)| time < end.time && end.time - start.time > MIN_SEGMENT)
            .map(|index| index + 1)
    }

    /// ZMP reference at `time`.
    #[must_use]
    pub fn zmp(&self, time: f32) -> Vector3<f32> {
        match self.segment_end(time) {
            Some(end) => {
                let (start, end) = (&self.knots[end - 1], &self.knots[end]);
                let ratio = ((time - start.time) / (end.time - start.time)).clamp(0.0, 1.0);
                start.position.lerp(&end.position, ratio)
            }
            None => self.final_zmp(),
        }
    }

    /// DCM reference at `time`.
    #[must_use]
    pub fn dcm(&self, time: f32) -> Vector3<f32> {
        let Some(end_index) = self.segment_end(time) else {
            return self.final_zmp();
        };

        let (start, end) = (&self.knots[end_index - 1], &self.knots[end_index]);
        let drift = Self::drift(start, end, self.omega).unwrap_or_else(Vector3::zeros);
        let zmp = self.zmp(time);
        let decay = (self.omega * (time.max(start.time) - end.time)).exp();

        zmp + drift + (self.dcm[end_index] - end.position - drift) * decay
    }

    fn final_zmp(&self) -> Vector3<f32> {
        self.knots
            .last()
            .map_or_else(Vector3::zeros, |knot| knot.position)
    }
}

/// Integrates the center of mass over one sample of `dt`, with the DCM held constant.
///
/// `ċ = ω (ξ - c)` is solved exactly: `c(t + dt) = ξ + (c - ξ) exp(-ω dt)`.
#[must_use]
pub fn integrate_com(com: &Vector3<f32>, dcm: &Vector3<f32>, omega: f32, dt: f32) -> Vector3<f32> {
    dcm + (com - dcm) * (-omega * dt).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knot(time: f32, x: f32) -> ZmpKnot {
        ZmpKnot {
            time,
            position: Vector3::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn dcm_ends_on_final_zmp() {
        let plan = DcmPlan::new(vec![knot(0.0, 0.0), knot(0.5, 0.1), knot(1.0, 0.1)], 3.8);

        assert!((plan.dcm(1.0) - Vector3::new(0.1, 0.0, 0.0)).norm() < 1e-6);
        assert!((plan.dcm(2.0) - Vector3::new(0.1, 0.0, 0.0)).norm() < 1e-6);
        assert!((plan.duration() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dcm_satisfies_pendulum_dynamics() {
        let omega = 3.5;
        let plan = DcmPlan::new(
            vec![knot(0.0, 0.0), knot(0.3, 0.05), knot(0.9, 0.05), knot(1.2, 0.0)],
            omega,
        );

        let h = 1e-3;
        for time in [0.1, 0.5, 0.8, 1.0] {
            let derivative = (plan.dcm(time + h) - plan.dcm(time - h)) / (2.0 * h);
            let expected = (plan.dcm(time) - plan.zmp(time)) * omega;
            assert!((derivative - expected).norm() < 1e-3, "at {time}");
        }
    }

    #[test]
    fn dcm_leads_the_zmp() {
        let plan = DcmPlan::new(
            vec![knot(0.0, 0.0), knot(0.2, 0.0), knot(0.4, 0.1), knot(1.0, 0.1)],
            3.5,
        );

        // the DCM starts moving toward the next foothold before the ZMP does
        assert!(plan.dcm(0.1).x > plan.zmp(0.1).x);
        assert!(plan.dcm(0.1).x < 0.1);
    }

    #[test]
    fn instantaneous_zmp_jump() {
        let plan = DcmPlan::new(
            vec![knot(0.0, 0.0), knot(0.5, 0.0), knot(0.5, 0.1), knot(1.0, 0.1)],
            3.5,
        );

        assert!((plan.zmp(0.25).x).abs() < 1e-6);
        assert!((plan.zmp(0.75).x - 0.1).abs() < 1e-6);
        assert!(plan.dcm(0.4).x > 0.0);
    }

    #[test]
    fn com_converges_to_constant_dcm() {
        let dcm = Vector3::new(0.1, 0.0, 0.0);
        let mut com = Vector3::zeros();
        for _ in 0..1000 {
            com = integrate_com(&com, &dcm, 3.5, 0.005);
        }

        assert!((com - dcm).norm() < 1e-4);
    }
}
