//! Error-state EKF with the attitude stored as a unit quaternion.
//!
//! The attitude error is a rotation vector applied on the right, `q = q̂ ⊗ exp(δθ)`, so it is
//! expressed in the base frame.
use filter::{CovMat, CrossCovMat, StateVec, lie};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use super::attitude::{
    AttitudeFilter, BaseEstimate, initial_covariance, measurement_noise, process_noise,
    world_acceleration,
};
use crate::config::NoiseConfig;

#[derive(Debug, Clone)]
pub struct QuaternionEkf {
    noise: NoiseConfig,
    gravity: f32,
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    orientation: UnitQuaternion<f32>,
    gyro_bias: Vector3<f32>,
    covariance: CovMat<12>,
}

impl QuaternionEkf {
    #[must_use]
    pub fn new(noise: &NoiseConfig, gravity: f32) -> Self {
        Self {
            noise: noise.clone(),
            gravity,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            gyro_bias: Vector3::zeros(),
            covariance: initial_covariance(),
        }
    }

    fn apply(
        &mut self,
        jacobian: &CrossCovMat<3, 12>,
        noise: f32,
        innovation: &StateVec<3>,
    ) -> filter::Result<()> {
        let correction = filter::correct(
            &self.covariance,
            jacobian,
            &measurement_noise(noise),
            innovation,
        )?;
        let error = correction.error;

        self.position += error.fixed_rows::<3>(0);
        self.velocity += error.fixed_rows::<3>(3);
        self.orientation *= lie::exp_quaternion(&error.fixed_rows::<3>(6).into_owned());
        self.gyro_bias += error.fixed_rows::<3>(9);
        self.covariance = correction.covariance;

        Ok(())
    }
}

impl AttitudeFilter for QuaternionEkf {
    fn predict(&mut self, gyroscope: &Vector3<f32>, accelerometer: &Vector3<f32>, dt: f32) {
        let rate = gyroscope - self.gyro_bias;
        let rotation = self.orientation.to_rotation_matrix().into_inner();
        let acceleration = world_acceleration(&self.orientation, accelerometer, self.gravity);

        let mut transition = CovMat::<12>::identity();
        transition
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(Matrix3::identity() * dt));
        transition
            .fixed_view_mut::<3, 3>(3, 6)
            .copy_from(&(-rotation * lie::skew(accelerometer) * dt));
        transition
            .fixed_view_mut::<3, 3>(6, 6)
            .copy_from(&(Matrix3::identity() - lie::skew(&rate) * dt));
        transition
            .fixed_view_mut::<3, 3>(6, 9)
            .copy_from(&(-Matrix3::identity() * dt));

        self.position += self.velocity * dt + acceleration * (0.5 * dt * dt);
        self.velocity += acceleration * dt;
        self.orientation *= lie::exp_quaternion(&(rate * dt));
        self.covariance = filter::propagate_covariance(
            &self.covariance,
            &transition,
            &process_noise(&self.noise, dt),
        );
    }

    fn correct_gravity(&mut self, accelerometer: &Vector3<f32>) -> filter::Result<()> {
        let Some(measured) = accelerometer.try_normalize(f32::EPSILON) else {
            return Err(filter::Error::NonFinite);
        };
        let predicted = self.orientation.inverse() * Vector3::z();

        let mut jacobian = CrossCovMat::<3, 12>::zeros();
        jacobian
            .fixed_view_mut::<3, 3>(0, 6)
            .copy_from(&lie::skew(&predicted));

        self.apply(&jacobian, self.noise.gravity, &(measured - predicted))
    }

    fn correct_odometry(
        &mut self,
        anchor: &Vector3<f32>,
        measured: &Vector3<f32>,
    ) -> filter::Result<()> {
        let inverse = self.orientation.inverse();
        let predicted = inverse * (anchor - self.position);

        let mut jacobian = CrossCovMat::<3, 12>::zeros();
        jacobian
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(-inverse.to_rotation_matrix().into_inner()));
        jacobian
            .fixed_view_mut::<3, 3>(0, 6)
            .copy_from(&lie::skew(&predicted));

        self.apply(&jacobian, self.noise.odometry, &(measured - predicted))
    }

    fn estimate(&self) -> BaseEstimate {
        BaseEstimate {
            position: self.position,
            velocity: self.velocity,
            orientation: self.orientation,
            gyro_bias: self.gyro_bias,
        }
    }

    fn reset(&mut self, estimate: &BaseEstimate) {
        self.position = estimate.position;
        self.velocity = estimate.velocity;
        self.orientation = estimate.orientation;
        self.gyro_bias = estimate.gyro_bias;
        self.covariance = initial_covariance();
    }
}
