//! State estimation from the raw sensors of a single cycle.
//!
//! The base pose comes from an [`AttitudeFilter`] fed by the inertial sensors and the leg
//! odometry of the feet in contact. The center of mass follows from the forward kinematics, and
//! the measured ZMP from the foot force/torque sensors.
pub mod attitude;
pub mod contact;
pub mod guard;
pub mod manifold;
pub mod quaternion;
pub mod zmp;

use filter::ButterworthLpf;
use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use tracing::{debug, trace, warn};

pub use attitude::{AttitudeFilter, BaseEstimate, create_filter};
pub use contact::BumpCalibration;
pub use guard::{SensorFaults, SensorGuard};
pub use manifold::ManifoldEkf;
pub use quaternion::QuaternionEkf;

use crate::{
    config::{EstimatorConfig, SurenaConfig},
    kinematics::{KinematicModel, forward},
    trajectory::{dcm::natural_frequency, heading},
    types::{BumpReadings, Feet, ForceTorque, JOINT_COUNT, JointArray, LegJoints, SensorFrame, Side},
};

/// Lowest center of mass height used for the measured DCM, in m.
const MIN_PENDULUM_HEIGHT: f32 = 0.05;

/// Estimated state of the robot, updated once per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    pub joint_positions: JointArray,
    pub joint_velocities: JointArray,
    pub base: BaseEstimate,
    pub com: Vector3<f32>,
    pub com_velocity: Vector3<f32>,
    /// Measured divergent component of motion, `c + ċ / ω`.
    pub dcm: Vector3<f32>,
    /// Measured ZMP of the whole robot.
    pub zmp: Vector3<f32>,
    pub foot_zmp: Feet<Vector3<f32>>,
    /// Sole center poses in the world frame.
    pub soles: Feet<Isometry3<f32>>,
    /// Whether the reference swings each foot in this cycle.
    pub swing: Feet<bool>,
    /// Whether each foot carries more than the contact force.
    pub contact: Feet<bool>,
    pub bump_bias: Feet<BumpReadings>,
    pub force_torque: Feet<ForceTorque>,
    /// Bias corrected contact sensor readings.
    pub bumps: Feet<BumpReadings>,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            joint_positions: [0.0; JOINT_COUNT],
            joint_velocities: [0.0; JOINT_COUNT],
            base: BaseEstimate::default(),
            com: Vector3::zeros(),
            com_velocity: Vector3::zeros(),
            dcm: Vector3::zeros(),
            zmp: Vector3::zeros(),
            foot_zmp: Feet::both(Vector3::zeros()),
            soles: Feet::both(Isometry3::identity()),
            swing: Feet::both(false),
            contact: Feet::both(false),
            bump_bias: Feet::default(),
            force_torque: Feet::default(),
            bumps: Feet::default(),
        }
    }
}

impl RobotState {
    #[must_use]
    pub fn leg_joints(&self, side: Side) -> LegJoints {
        LegJoints::from_joint_array(&self.joint_positions, side)
    }

    #[must_use]
    pub fn in_double_support(&self) -> bool {
        !self.swing.left && !self.swing.right
    }
}

/// Conditions of a single estimator update.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EstimatorStatus {
    pub faults: SensorFaults,
    /// A filter correction was rejected in this cycle.
    pub filter_failed: bool,
}

pub struct StateEstimator {
    model: KinematicModel,
    config: EstimatorConfig,
    gravity: f32,
    dt: f32,
    guard: SensorGuard,
    calibration: BumpCalibration,
    filter: Box<dyn AttitudeFilter>,
    com_velocity: ButterworthLpf<3>,
    previous_com: Option<Vector3<f32>>,
    /// Center of mass in the base frame, from the last update.
    com_in_base: Vector3<f32>,
    /// World position of each planted sole, fixed at touchdown.
    anchors: Feet<Option<Vector3<f32>>>,
    filter_failed: bool,
    state: RobotState,
}

impl StateEstimator {
    #[must_use]
    pub fn new(config: &SurenaConfig, model: KinematicModel) -> Self {
        let estimator = &config.estimator;
        let gravity = config.control.gravity;
        let dt = config.period();

        Self {
            model,
            config: estimator.clone(),
            gravity,
            dt,
            guard: SensorGuard::new(&config.limits, gravity),
            calibration: BumpCalibration::new(estimator.bump_calibration_samples),
            filter: create_filter(estimator.filter, &estimator.noise, gravity),
            com_velocity: ButterworthLpf::with_cutoff_freq(estimator.com_velocity_cutoff, dt),
            previous_com: None,
            com_in_base: Vector3::zeros(),
            anchors: Feet::default(),
            filter_failed: false,
            state: RobotState::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &RobotState {
        &self.state
    }

    #[must_use]
    pub fn model(&self) -> &KinematicModel {
        &self.model
    }

    pub fn request_bump_recalibration(&mut self) {
        self.calibration.request_recalibration();
    }

    /// Moves the estimated world frame such that the center of mass is at `com` with the base
    /// heading `yaw`, keeping the estimated tilt.
    pub fn align(&mut self, com: &Vector3<f32>, yaw: f32) {
        let estimate = self.filter.estimate();
        let correction = UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            yaw - heading(&estimate.orientation),
        );
        let orientation = correction * estimate.orientation;

        self.filter.reset(&BaseEstimate {
            position: com - orientation * self.com_in_base,
            velocity: Vector3::zeros(),
            orientation,
            gyro_bias: estimate.gyro_bias,
        });
        self.anchors = Feet::default();
        self.previous_com = None;
        self.state.zmp = Vector3::new(com.x, com.y, self.state.zmp.z);
    }

    /// Updates the state from the sensors, `swing` are the planned swing flags of this cycle.
    pub fn update(&mut self, frame: &SensorFrame, swing: Feet<bool>) -> EstimatorStatus {
        let (sensors, faults) = self.guard.check(frame);
        if faults.any() {
            debug!(iteration = frame.iteration, ?faults, "holding implausible sensor readings");
        }

        let joints = Feet::both(()).map(|side, ()| {
            LegJoints::from_joint_array(&sensors.joint_positions, side)
        });

        let base_frame = Isometry3::identity();
        let base_soles =
            joints.map(|side, leg| forward::sole_pose(&self.model, side, &base_frame, &leg));
        let contact = sensors
            .force_torque
            .map(|_, wrench| wrench.force_z > self.config.contact_force);

        self.filter.predict(&sensors.gyroscope, &sensors.accelerometer, self.dt);
        let mut filter_failed = false;

        for side in [Side::Left, Side::Right] {
            let planted = *contact.get(side) && !*swing.get(side);
            if !planted {
                *self.anchors.get_mut(side) = None;
                continue;
            }

            let measured = base_soles.get(side).translation.vector;
            let anchor = *self.anchors.get_mut(side).get_or_insert_with(|| {
                let estimate = self.filter.estimate();
                estimate.position + estimate.orientation * measured
            });
            filter_failed |= self.filter.correct_odometry(&anchor, &measured).is_err();
        }

        let specific_force = sensors.accelerometer.norm();
        let unaccelerated = (specific_force - self.gravity).abs() < self.config.gravity_tolerance;
        if unaccelerated {
            filter_failed |= self.filter.correct_gravity(&sensors.accelerometer).is_err();
        }

        if filter_failed && !self.filter_failed {
            warn!(iteration = frame.iteration, "estimator correction rejected");
        }
        self.filter_failed = filter_failed;

        let base = self.filter.estimate();
        let pose = base.pose();
        let soles = base_soles.map(|_, sole| pose * sole);

        self.com_in_base = self
            .model
            .center_of_mass(&base_frame, &joints.left, &joints.right)
            .coords;
        let com = (pose * Point3::from(self.com_in_base)).coords;
        let com_velocity = match self.previous_com {
            Some(previous) => self.com_velocity.update((com - previous) / self.dt),
            None => {
                self.com_velocity.reset(Vector3::zeros());
                Vector3::zeros()
            }
        };
        self.previous_com = Some(com);

        let stationary = sensors.gyroscope.norm() < self.config.stationary_gyro
            && unaccelerated
            && contact.left
            && contact.right
            && !swing.left
            && !swing.right;
        let bumps = self.calibration.update(&sensors.bumps, stationary);

        let foot_zmp = Feet::new(
            zmp::foot_zmp(&soles.left, &sensors.force_torque.left),
            zmp::foot_zmp(&soles.right, &sensors.force_torque.right),
        );
        let zmp = zmp::combined_zmp(&foot_zmp, &sensors.force_torque).unwrap_or(self.state.zmp);

        let ground = soles.left.translation.z.min(soles.right.translation.z);
        let omega = natural_frequency(self.gravity, (com.z - ground).max(MIN_PENDULUM_HEIGHT));

        self.state = RobotState {
            joint_positions: sensors.joint_positions,
            joint_velocities: sensors.joint_velocities,
            base,
            com,
            com_velocity,
            dcm: com + com_velocity / omega,
            zmp,
            foot_zmp,
            soles,
            swing,
            contact,
            bump_bias: *self.calibration.bias(),
            force_torque: sensors.force_torque,
            bumps,
        };
        trace!(com = ?self.state.com, zmp = ?self.state.zmp, "estimated state");

        EstimatorStatus {
            faults,
            filter_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> (StateEstimator, SurenaConfig) {
        let config = SurenaConfig::bundled().unwrap();
        let model = config.model().unwrap();
        (StateEstimator::new(&config, model), config)
    }

    fn standing(config: &SurenaConfig, model: &KinematicModel) -> SensorFrame {
        SensorFrame::standing(
            [0.0; JOINT_COUNT],
            model.total_mass() * config.control.gravity,
            config.control.gravity,
        )
    }

    #[test]
    fn standing_robot_is_balanced_between_its_feet() {
        let (mut estimator, config) = estimator();
        let frame = standing(&config, estimator.model());

        for _ in 0..50 {
            let status = estimator.update(&frame, Feet::both(false));
            assert!(!status.faults.any() && !status.filter_failed);
        }

        let state = estimator.state();
        let middle = (state.soles.left.translation.vector + state.soles.right.translation.vector) / 2.0;
        assert!(state.contact.left && state.contact.right);
        assert!((state.zmp - middle).norm() < 1e-3);
        assert!((state.com.xy() - middle.xy()).norm() < 0.02);
        assert!(state.com.z > middle.z + 0.5);
        assert!(state.com_velocity.norm() < 1e-2);
        assert!((state.dcm - state.com).norm() < 1e-2);
    }

    #[test]
    fn contact_sensors_are_calibrated_while_standing() {
        let (mut estimator, config) = estimator();
        let frame = standing(&config, estimator.model());

        for _ in 0..config.estimator.bump_calibration_samples {
            estimator.update(&frame, Feet::both(false));
        }

        let state = estimator.state();
        assert_eq!(state.bump_bias.left, BumpReadings::uniform(1.0));
        assert!(state.bumps.right.sum().abs() < 1e-6);
    }

    #[test]
    fn swinging_foot_is_not_used_for_calibration() {
        let (mut estimator, config) = estimator();
        let frame = standing(&config, estimator.model());

        for _ in 0..config.estimator.bump_calibration_samples {
            estimator.update(&frame, Feet::new(false, true));
        }

        assert_eq!(estimator.state().bump_bias.left, BumpReadings::default());
        assert!(estimator.state().swing.right);
    }

    #[test]
    fn alignment_moves_the_center_of_mass() {
        let (mut estimator, config) = estimator();
        let frame = standing(&config, estimator.model());
        for _ in 0..10 {
            estimator.update(&frame, Feet::both(false));
        }

        let target = Vector3::new(0.3, -0.1, 0.68);
        estimator.align(&target, 0.5);
        estimator.update(&frame, Feet::both(false));

        let state = estimator.state();
        assert!((state.com - target).norm() < 1e-3);
        assert!((heading(&state.base.orientation) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn unloaded_feet_keep_the_last_zmp() {
        let (mut estimator, config) = estimator();
        let frame = standing(&config, estimator.model());
        estimator.update(&frame, Feet::both(false));
        let zmp = estimator.state().zmp;

        let mut airborne = frame.clone();
        airborne.force_torque = Feet::default();
        estimator.update(&airborne, Feet::both(false));

        let state = estimator.state();
        assert!(!state.contact.left && !state.contact.right);
        assert!((state.zmp - zmp).norm() < 1e-6);
    }
}
