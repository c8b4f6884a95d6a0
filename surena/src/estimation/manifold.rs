//! Error-state EKF on the rotation manifold.
//!
//! The attitude is stored as a rotation matrix and its error is applied on the left,
//! `R = exp(δθ) R̂`, which keeps the error dynamics independent of the angular velocity.
use filter::{CovMat, CrossCovMat, StateVec, lie};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use super::attitude::{
    AttitudeFilter, BaseEstimate, initial_covariance, measurement_noise, process_noise,
};
use crate::config::NoiseConfig;

#[derive(Debug, Clone)]
pub struct ManifoldEkf {
    noise: NoiseConfig,
    gravity: f32,
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    rotation: Rotation3<f32>,
    gyro_bias: Vector3<f32>,
    covariance: CovMat<12>,
}

impl ManifoldEkf {
    #[must_use]
    pub fn new(noise: &NoiseConfig, gravity: f32) -> Self {
        Self {
            noise: noise.clone(),
            gravity,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            rotation: Rotation3::identity(),
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
        self.rotation = lie::renormalize(
            &(lie::exp(&error.fixed_rows::<3>(6).into_owned()) * self.rotation),
        );
        self.gyro_bias += error.fixed_rows::<3>(9);
        self.covariance = correction.covariance;

        Ok(())
    }
}

impl AttitudeFilter for ManifoldEkf {
    fn predict(&mut self, gyroscope: &Vector3<f32>, accelerometer: &Vector3<f32>, dt: f32) {
        let rate = gyroscope - self.gyro_bias;
        let rotation = self.rotation.into_inner();
        let specific_force = self.rotation * accelerometer;
        let acceleration = specific_force - Vector3::z() * self.gravity;

        let mut transition = CovMat::<12>::identity();
        transition
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(Matrix3::identity() * dt));
        transition
            .fixed_view_mut::<3, 3>(3, 6)
            .copy_from(&(-lie::skew(&specific_force) * dt));
        transition
            .fixed_view_mut::<3, 3>(6, 9)
            .copy_from(&(-rotation * dt));

        self.position += self.velocity * dt + acceleration * (0.5 * dt * dt);
        self.velocity += acceleration * dt;
        self.rotation = lie::renormalize(&(self.rotation * lie::exp(&(rate * dt))));
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
        let transpose = self.rotation.inverse();
        let predicted = transpose * Vector3::z();

        let mut jacobian = CrossCovMat::<3, 12>::zeros();
        jacobian
            .fixed_view_mut::<3, 3>(0, 6)
            .copy_from(&(transpose.into_inner() * lie::skew(&Vector3::z())));

        self.apply(&jacobian, self.noise.gravity, &(measured - predicted))
    }

    fn correct_odometry(
        &mut self,
        anchor: &Vector3<f32>,
        measured: &Vector3<f32>,
    ) -> filter::Result<()> {
        let transpose = self.rotation.inverse().into_inner();
        let offset = anchor - self.position;
        let predicted = transpose * offset;

        let mut jacobian = CrossCovMat::<3, 12>::zeros();
        jacobian.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-transpose));
        jacobian
            .fixed_view_mut::<3, 3>(0, 6)
            .copy_from(&(transpose * lie::skew(&offset)));

        self.apply(&jacobian, self.noise.odometry, &(measured - predicted))
    }

    fn estimate(&self) -> BaseEstimate {
        BaseEstimate {
            position: self.position,
            velocity: self.velocity,
            orientation: UnitQuaternion::from_rotation_matrix(&self.rotation),
            gyro_bias: self.gyro_bias,
        }
    }

    fn reset(&mut self, estimate: &BaseEstimate) {
        self.position = estimate.position;
        self.velocity = estimate.velocity;
        self.rotation = estimate.orientation.to_rotation_matrix();
        self.gyro_bias = estimate.gyro_bias;
        self.covariance = initial_covariance();
    }
}
