//! The contract shared by the base attitude/velocity filters.
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use super::{manifold::ManifoldEkf, quaternion::QuaternionEkf};
use crate::config::{FilterKind, NoiseConfig};

/// Estimated pose and velocity of the base (pelvis) frame in the world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseEstimate {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    /// Rotation from the base frame to the world frame.
    pub orientation: UnitQuaternion<f32>,
    pub gyro_bias: Vector3<f32>,
}

impl Default for BaseEstimate {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            gyro_bias: Vector3::zeros(),
        }
    }
}

impl BaseEstimate {
    #[must_use]
    pub fn pose(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }
}

/// An error-state Kalman filter over the base position, velocity, orientation and gyroscope
/// bias, driven by the inertial sensors.
///
/// Error states are ordered `[δp, δv, δθ, δb]`, three components each.
pub trait AttitudeFilter: Send + Sync {
    /// Integrates the angular velocity and specific force, both in the base frame.
    fn predict(&mut self, gyroscope: &Vector3<f32>, accelerometer: &Vector3<f32>, dt: f32);

    /// Corrects the tilt with the specific force, assuming it only measures gravity.
    fn correct_gravity(&mut self, accelerometer: &Vector3<f32>) -> filter::Result<()>;

    /// Corrects the pose with a foot that stands still at `anchor` in the world frame, seen at
    /// `measured` in the base frame through the leg kinematics.
    fn correct_odometry(
        &mut self,
        anchor: &Vector3<f32>,
        measured: &Vector3<f32>,
    ) -> filter::Result<()>;

    fn estimate(&self) -> BaseEstimate;

    /// Restarts the filter from `estimate`, with the initial uncertainty.
    fn reset(&mut self, estimate: &BaseEstimate);
}

/// Creates the filter selected in the configuration.
#[must_use]
pub fn create_filter(kind: FilterKind, noise: &NoiseConfig, gravity: f32) -> Box<dyn AttitudeFilter> {
    match kind {
        FilterKind::Quaternion => Box::new(QuaternionEkf::new(noise, gravity)),
        FilterKind::Manifold => Box::new(ManifoldEkf::new(noise, gravity)),
    }
}

/// Standard deviations of the initial error state.
pub(super) const INITIAL_POSITION_STD: f32 = 0.01;
pub(super) const INITIAL_VELOCITY_STD: f32 = 0.1;
pub(super) const INITIAL_ATTITUDE_STD: f32 = 0.1;
pub(super) const INITIAL_BIAS_STD: f32 = 0.01;

/// Initial covariance of the 12 dimensional error state.
pub(super) fn initial_covariance() -> filter::CovMat<12> {
    let mut covariance = filter::CovMat::<12>::zeros();
    for (block, std) in [
        INITIAL_POSITION_STD,
        INITIAL_VELOCITY_STD,
        INITIAL_ATTITUDE_STD,
        INITIAL_BIAS_STD,
    ]
    .into_iter()
    .enumerate()
    {
        covariance
            .fixed_view_mut::<3, 3>(block * 3, block * 3)
            .fill_diagonal(std * std);
    }

    covariance
}

/// Discrete process noise for one prediction step of `dt`.
pub(super) fn process_noise(noise: &NoiseConfig, dt: f32) -> filter::CovMat<12> {
    let mut covariance = filter::CovMat::<12>::zeros();
    for (block, variance) in [
        noise.position * noise.position * dt,
        noise.accelerometer * noise.accelerometer * dt * dt,
        noise.gyro * noise.gyro * dt * dt,
        noise.gyro_bias * noise.gyro_bias * dt,
    ]
    .into_iter()
    .enumerate()
    {
        covariance
            .fixed_view_mut::<3, 3>(block * 3, block * 3)
            .fill_diagonal(variance);
    }

    covariance
}

/// Isotropic measurement noise of a three dimensional measurement.
pub(super) fn measurement_noise(std: f32) -> filter::CovMat<3> {
    filter::CovMat::<3>::identity() * (std * std)
}

/// Gravity free acceleration in the world frame.
pub(super) fn world_acceleration(
    orientation: &UnitQuaternion<f32>,
    accelerometer: &Vector3<f32>,
    gravity: f32,
) -> Vector3<f32> {
    orientation * accelerometer - Vector3::z() * gravity
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;

    pub(crate) fn noise() -> NoiseConfig {
        NoiseConfig {
            gyro: 0.01,
            accelerometer: 0.1,
            gyro_bias: 0.0005,
            position: 0.0001,
            odometry: 0.005,
            gravity: 0.05,
        }
    }

    fn tilt(estimate: &BaseEstimate) -> f32 {
        (estimate.orientation * Vector3::z()).z
    }

    /// Tilted start, standing upright with the right foot planted below the hip.
    fn standing_convergence(filter: &mut dyn AttitudeFilter) {
        let gravity = 9.81;
        let accelerometer = Vector3::new(0.0, 0.0, gravity);
        let anchor = Vector3::new(0.0, -0.1, -0.8);

        filter.reset(&BaseEstimate {
            orientation: UnitQuaternion::from_euler_angles(0.1, -0.05, 0.0),
            ..Default::default()
        });
        let initial_tilt = tilt(&filter.estimate());

        for _ in 0..400 {
            filter.predict(&Vector3::zeros(), &accelerometer, 0.005);
            filter.correct_gravity(&accelerometer).unwrap();
            filter.correct_odometry(&anchor, &anchor).unwrap();
        }

        let estimate = filter.estimate();
        assert!(tilt(&estimate) > initial_tilt);
        assert!(1.0 - tilt(&estimate) < 0.5 * (1.0 - initial_tilt));

        // the planted foot is seen where the kinematics put it
        let predicted = estimate.orientation.inverse() * (anchor - estimate.position);
        assert!((predicted - anchor).norm() < 5e-3);
        assert!(estimate.velocity.norm() < 0.05);
    }

    #[test]
    fn quaternion_filter_converges_when_standing() {
        standing_convergence(create_filter(FilterKind::Quaternion, &noise(), 9.81).as_mut());
    }

    #[test]
    fn manifold_filter_converges_when_standing() {
        standing_convergence(create_filter(FilterKind::Manifold, &noise(), 9.81).as_mut());
    }

    #[test]
    fn stationary_prediction_keeps_still() {
        for kind in [FilterKind::Quaternion, FilterKind::Manifold] {
            let mut filter = create_filter(kind, &noise(), 9.81);
            for _ in 0..100 {
                filter.predict(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 9.81), 0.005);
            }

            let estimate = filter.estimate();
            assert!(estimate.position.norm() < 1e-5, "{kind:?}");
            assert!(estimate.velocity.norm() < 1e-5, "{kind:?}");
            assert!(estimate.orientation.angle() < 1e-6, "{kind:?}");
        }
    }

    #[test]
    fn rotation_is_integrated() {
        for kind in [FilterKind::Quaternion, FilterKind::Manifold] {
            let mut filter = create_filter(kind, &noise(), 9.81);
            // half a second at 1 rad/s around z
            for _ in 0..100 {
                filter.predict(&Vector3::new(0.0, 0.0, 1.0), &Vector3::new(0.0, 0.0, 9.81), 0.005);
            }

            let yaw = crate::trajectory::heading(&filter.estimate().orientation);
            assert!((yaw - 0.5).abs() < 1e-4, "{kind:?}");
        }
    }
}
