//! ZMP admittance with DCM and center of mass tracking.
use nalgebra::{Vector2, Vector3};

use super::{bound, leaky_integrate, pid::Pid};
use crate::{
    config::{ComTrackingConfig, DcmTrackingConfig, ZmpAdmittanceConfig},
    estimation::RobotState,
    trajectory::Waypoint,
};

/// Shifts the desired ZMP with a PID on the DCM error, and moves the pelvis reference with the
/// remaining ZMP error and a PID on the center of mass error.
#[derive(Debug, Clone)]
pub struct ZmpAdmittance {
    dcm: DcmTrackingConfig,
    com: ComTrackingConfig,
    zmp: ZmpAdmittanceConfig,
    dcm_pid: Pid,
    com_pid: Pid,
    offset: Vector2<f32>,
}

impl ZmpAdmittance {
    #[must_use]
    pub fn new(
        dcm: &DcmTrackingConfig,
        com: &ComTrackingConfig,
        zmp: &ZmpAdmittanceConfig,
    ) -> Self {
        Self {
            dcm: dcm.clone(),
            com: com.clone(),
            zmp: zmp.clone(),
            dcm_pid: Pid::new(dcm.kp, dcm.ki, dcm.kd, dcm.integral_limit),
            com_pid: Pid::new(com.kp, com.ki, com.kd, com.integral_limit),
            offset: Vector2::zeros(),
        }
    }

    pub fn reset(&mut self) {
        self.dcm_pid.reset();
        self.com_pid.reset();
        self.offset = Vector2::zeros();
    }

    /// The desired ZMP after the DCM correction.
    pub fn desired_zmp(&mut self, waypoint: &Waypoint, state: &RobotState, dt: f32) -> Vector3<f32> {
        if !self.dcm.enabled {
            return waypoint.zmp;
        }

        let error = state.dcm.xy() - waypoint.dcm.xy();
        let shift = self.dcm_pid.update(error, dt);

        waypoint.zmp + Vector3::new(shift.x, shift.y, 0.0)
    }

    /// Pelvis offset for the ZMP error against `desired_zmp`.
    pub fn update(&mut self, desired_zmp: &Vector3<f32>, state: &RobotState, dt: f32) -> Vector2<f32> {
        if !self.zmp.enabled {
            self.offset = Vector2::zeros();
            return self.offset;
        }

        let error = state.zmp.xy() - desired_zmp.xy();
        let config = &self.zmp;
        self.offset = self.offset.zip_map(&error, |offset, error| {
            leaky_integrate(offset, config.gain * error, config.time_constant, config.limit, dt)
        });

        self.offset
    }

    /// Pelvis correction moving the estimated center of mass towards the reference.
    pub fn com_correction(
        &mut self,
        waypoint: &Waypoint,
        state: &RobotState,
        dt: f32,
    ) -> Vector2<f32> {
        if !self.com.enabled {
            return Vector2::zeros();
        }

        let error = state.com.xy() - waypoint.com_position.xy();
        let limit = self.com.limit;

        (-self.com_pid.update(error, dt)).map(|value| bound(value, limit))
    }
}
