//! Startup configuration of the locomotion core.
//!
//! The configuration is read from `surena.toml`, optionally with a per-robot overlay.
//! Any missing or malformed field, or a value that fails validation, is fatal.
use std::{path::Path, time::Duration};

use miette::Diagnostic;
use odal::Config;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use thiserror::Error;

use crate::{
    kinematics::{JointAxis, KinematicModel, LINK_COUNT, Link},
    trajectory::MAX_SAMPLES,
    types::{JOINT_COUNT, JointArray, Side},
};

/// Default configuration of a Surena robot.
const BUNDLED: &str = include_str!("../config/surena.toml");

/// Axes of a leg from hip yaw to ankle roll.
const LEG_AXES: [JointAxis; 6] = [
    JointAxis::Z,
    JointAxis::X,
    JointAxis::Y,
    JointAxis::Y,
    JointAxis::Y,
    JointAxis::X,
];

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] odal::Error),

    #[error("expected {expected} links, found {0}", expected = LINK_COUNT)]
    #[diagnostic(help("the model needs a pelvis link followed by six links per leg, right first"))]
    LinkCount(usize),

    #[error("link `{name}` has invalid mass {mass}")]
    InvalidMass { name: String, mass: f32 },

    #[error("leg link `{name}` is invalid: {reason}")]
    #[diagnostic(help(
        "hip and ankle axes must intersect, and the thigh and shank must point along -z"
    ))]
    InvalidLegGeometry { name: String, reason: &'static str },

    #[error("joint {index} has lower limit {lower} not below upper limit {upper}")]
    JointLimits { index: usize, lower: f32, upper: f32 },

    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    #[error("the control period must be positive")]
    Period,

    #[error("`{field}` is {value} Hz, at or above the Nyquist frequency {nyquist} Hz")]
    #[diagnostic(help("lower the cut-off or shorten the control period"))]
    AboveNyquist {
        field: &'static str,
        value: f32,
        nyquist: f32,
    },

    #[error("`limits.max_trajectory_samples` must be in 1..={max}, got {0}", max = MAX_SAMPLES)]
    TrajectorySamples(usize),
}

/// Top level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurenaConfig {
    pub robot: RobotConfig,
    pub control: ControlConfig,
    pub limits: LimitsConfig,
    pub estimator: EstimatorConfig,
    pub balance: BalanceConfig,
    pub telemetry: TelemetryConfig,
}

impl Config for SurenaConfig {
    const PATH: &'static str = "surena.toml";
}

impl SurenaConfig {
    /// Loads and validates the configuration in `root`, with the overlay in `overlay` applied.
    pub fn from_dir(
        root: impl AsRef<Path>,
        overlay: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let config = match overlay {
            Some(overlay) => Self::load_with_overlay(root, overlay)?,
            None => Self::load(root)?,
        };
        config.validate()?;

        Ok(config)
    }

    /// The configuration that ships with the crate.
    pub fn bundled() -> Result<Self, ConfigError> {
        let config = Self::from_toml_str(BUNDLED)?;
        config.validate()?;

        Ok(config)
    }

    /// Control period in seconds.
    #[must_use]
    pub fn period(&self) -> f32 {
        self.control.period.as_secs_f32()
    }

    /// Builds the kinematic model from the link table.
    pub fn model(&self) -> Result<KinematicModel, ConfigError> {
        let links: [Link; LINK_COUNT] = self
            .robot
            .links
            .clone()
            .try_into()
            .map_err(|links: Vec<Link>| ConfigError::LinkCount(links.len()))?;

        Ok(KinematicModel::new(links))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let model = self.model()?;

        for link in model.links() {
            if !link.mass.is_finite() || link.mass < 0.0 {
                return Err(ConfigError::InvalidMass {
                    name: link.name.clone(),
                    mass: link.mass,
                });
            }
        }
        if model.total_mass() <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "robot.links.mass",
                value: model.total_mass(),
            });
        }

        for side in [Side::Right, Side::Left] {
            validate_leg(&model.links()[KinematicModel::leg_links(side)])?;
        }

        for index in 0..JOINT_COUNT {
            let (lower, upper) = (self.limits.joint_lower[index], self.limits.joint_upper[index]);
            if lower.partial_cmp(&upper) != Some(std::cmp::Ordering::Less) {
                return Err(ConfigError::JointLimits {
                    index,
                    lower,
                    upper,
                });
            }
        }

        if self.control.period.is_zero() {
            return Err(ConfigError::Period);
        }

        let sole = &self.robot.sole;
        let estimator = &self.estimator;
        for (field, value) in [
            ("control.gravity", self.control.gravity),
            ("robot.sole.front", sole.front),
            ("robot.sole.back", sole.back),
            ("robot.sole.half_width", sole.half_width),
            ("limits.max_force", self.limits.max_force),
            ("limits.max_torque", self.limits.max_torque),
            ("limits.max_gyro", self.limits.max_gyro),
            ("limits.max_acceleration", self.limits.max_acceleration),
            ("limits.max_bump", self.limits.max_bump),
            ("limits.max_joint_velocity", self.limits.max_joint_velocity),
            ("estimator.contact_force", estimator.contact_force),
            ("estimator.stationary_gyro", estimator.stationary_gyro),
            ("estimator.gravity_tolerance", estimator.gravity_tolerance),
            ("estimator.com_velocity_cutoff", estimator.com_velocity_cutoff),
            ("estimator.noise.gyro", estimator.noise.gyro),
            ("estimator.noise.accelerometer", estimator.noise.accelerometer),
            ("estimator.noise.gyro_bias", estimator.noise.gyro_bias),
            ("estimator.noise.odometry", estimator.noise.odometry),
            ("estimator.noise.gravity", estimator.noise.gravity),
            ("balance.zmp.time_constant", self.balance.zmp.time_constant),
            (
                "balance.foot_orientation.time_constant",
                self.balance.foot_orientation.time_constant,
            ),
            (
                "balance.bump_orientation.time_constant",
                self.balance.bump_orientation.time_constant,
            ),
            (
                "balance.early_contact.release_time_constant",
                self.balance.early_contact.release_time_constant,
            ),
            (
                "balance.foot_length.time_constant",
                self.balance.foot_length.time_constant,
            ),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        let nyquist = 0.5 / self.period();
        if estimator.com_velocity_cutoff >= nyquist {
            return Err(ConfigError::AboveNyquist {
                field: "estimator.com_velocity_cutoff",
                value: estimator.com_velocity_cutoff,
                nyquist,
            });
        }

        if !(1..=MAX_SAMPLES).contains(&self.limits.max_trajectory_samples) {
            return Err(ConfigError::TrajectorySamples(self.limits.max_trajectory_samples));
        }

        if estimator.bump_calibration_samples == 0 {
            return Err(ConfigError::NotPositive {
                field: "estimator.bump_calibration_samples",
                value: 0.0,
            });
        }

        Ok(())
    }
}

fn validate_leg(links: &[Link]) -> Result<(), ConfigError> {
    let invalid = |link: &Link, reason| ConfigError::InvalidLegGeometry {
        name: link.name.clone(),
        reason,
    };

    for (link, axis) in links.iter().zip(LEG_AXES) {
        if link.axis != axis {
            return Err(invalid(link, "unexpected joint axis"));
        }
    }

    // hip roll, hip pitch and ankle roll share the joint center of their parent
    for joint in [1, 2, 5] {
        if links[joint].parent_offset.norm() > f32::EPSILON {
            return Err(invalid(&links[joint], "joint axes do not intersect"));
        }
    }

    for joint in [3, 4] {
        let offset = links[joint].parent_offset;
        if offset.xy().norm() > f32::EPSILON || offset.z >= 0.0 {
            return Err(invalid(&links[joint], "segment does not point along -z"));
        }
    }

    Ok(())
}

/// Geometry and mass distribution of the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotConfig {
    /// The pelvis, followed by the right leg and the left leg from hip yaw to ankle roll.
    pub links: Vec<Link>,
    pub sole: SoleConfig,
    /// Minimum distance between the two sole outlines in a planned trajectory, in meters.
    pub min_sole_distance: f32,
}

/// Rectangular outline of a sole, relative to the sole center below the ankle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoleConfig {
    pub front: f32,
    pub back: f32,
    pub half_width: f32,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Period of the control loop.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub period: Duration,
    /// Gravitational acceleration in m/s².
    pub gravity: f32,
}

/// Physical limits of the joints and plausibility ranges of the sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    pub joint_lower: JointArray,
    pub joint_upper: JointArray,
    /// Largest plausible vertical foot force, in N.
    pub max_force: f32,
    /// Largest plausible foot torque, in Nm.
    pub max_torque: f32,
    /// Largest plausible angular velocity, in rad/s.
    pub max_gyro: f32,
    /// Largest plausible specific force, in m/s².
    pub max_acceleration: f32,
    /// Largest plausible contact sensor value.
    pub max_bump: f32,
    /// Largest plausible joint velocity, in rad/s.
    pub max_joint_velocity: f32,
    /// Largest number of waypoints a single generation request may produce.
    pub max_trajectory_samples: usize,
}

/// Which attitude filter the estimator runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    Quaternion,
    Manifold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimatorConfig {
    pub filter: FilterKind,
    pub noise: NoiseConfig,
    /// Vertical force above which a foot is considered in contact, in N.
    pub contact_force: f32,
    /// Angular velocity below which the robot may be stationary, in rad/s.
    pub stationary_gyro: f32,
    /// Allowed deviation of the specific force norm from gravity, in m/s².
    ///
    /// Used both for the stationarity check and for gating the gravity correction.
    pub gravity_tolerance: f32,
    /// Number of stationary samples averaged into the contact sensor bias.
    pub bump_calibration_samples: u32,
    /// Cut-off frequency of the center of mass velocity filter, in Hz.
    pub com_velocity_cutoff: f32,
}

/// Standard deviations of the filter noise models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseConfig {
    pub gyro: f32,
    pub accelerometer: f32,
    pub gyro_bias: f32,
    pub position: f32,
    pub odometry: f32,
    pub gravity: f32,
}

/// Which rule splits the desired wrench between the feet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    #[default]
    InverseDistance,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceConfig {
    pub distribution: DistributionKind,
    pub dcm: DcmTrackingConfig,
    pub com: ComTrackingConfig,
    pub zmp: ZmpAdmittanceConfig,
    pub foot_orientation: FootOrientationConfig,
    pub bump_orientation: BumpOrientationConfig,
    pub early_contact: EarlyContactConfig,
    pub foot_length: FootLengthConfig,
}

/// PID on the DCM error, shifting the desired ZMP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DcmTrackingConfig {
    pub enabled: bool,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Bound of the integral term, in m·s.
    pub integral_limit: f32,
}

/// PID on the center of mass error, moving the pelvis reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComTrackingConfig {
    pub enabled: bool,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Bound of the integral term, in m·s.
    pub integral_limit: f32,
    /// Largest pelvis correction, in m.
    pub limit: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZmpAdmittanceConfig {
    pub enabled: bool,
    /// Rate of the pelvis offset per meter of ZMP error, in 1/s.
    pub gain: f32,
    /// Time constant pulling the offset back to zero, in s.
    pub time_constant: f32,
    /// Largest pelvis offset, in m.
    pub limit: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FootOrientationConfig {
    pub enabled: bool,
    /// Ankle rotation rate per Nm of torque error, in rad/(Nm·s).
    pub gain: f32,
    pub time_constant: f32,
    /// Largest ankle correction, in rad.
    pub limit: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BumpOrientationConfig {
    pub enabled: bool,
    /// Ankle rotation rate per unit of normalized contact imbalance, in rad/s.
    pub gain: f32,
    pub time_constant: f32,
    pub limit: f32,
    /// Summed contact value above which a foot counts as touching the ground.
    pub contact_threshold: f32,
    /// Value of a single contact sensor with the whole robot standing on it.
    pub full_contact: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EarlyContactConfig {
    pub enabled: bool,
    /// Vertical force on a swing foot that counts as touchdown, in N.
    pub force_threshold: f32,
    /// Summed contact value on a swing foot that counts as touchdown.
    pub bump_threshold: f32,
    /// Time constant releasing the held foot height after touchdown, in s.
    pub release_time_constant: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FootLengthConfig {
    pub enabled: bool,
    /// Leg length rate per N of force difference error, in m/(N·s).
    pub gain: f32,
    pub time_constant: f32,
    /// Largest leg length difference, in m.
    pub limit: f32,
    /// Vertical force both feet must exceed before the controller engages, in N.
    pub force_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Publish telemetry every n-th cycle, 0 disables publication.
    pub decimation: u32,
}
