//! Point-to-point motions outside of a gait, such as crouching before walking.
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::{
    GenerationError, MAX_SAMPLES, Plan, SegmentKind, SupportPhase, Waypoint,
    dcm::natural_frequency, min_jerk,
};
use crate::types::{Feet, Side};

/// Lowest center of mass height used for the DCM of a general motion.
const MIN_PENDULUM_HEIGHT: f32 = 0.05;

/// Largest deviation of an orientation's norm from one.
const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// A position and an orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Pose {
    #[must_use]
    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }
}

impl From<Isometry3<f32>> for Pose {
    fn from(isometry: Isometry3<f32>) -> Self {
        Self {
            position: isometry.translation.vector,
            orientation: isometry.rotation,
        }
    }
}

/// Start and end pose of a moving body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseTransition {
    pub initial: Pose,
    pub target: Pose,
}

/// Parameters of a general motion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneralMotionParameters {
    /// Duration of the motion, in s.
    pub duration: f32,
    /// Duration of a control cycle, in s.
    pub sample_period: f32,
    pub com: PoseTransition,
    pub left_ankle: PoseTransition,
    pub right_ankle: PoseTransition,
}

impl GeneralMotionParameters {
    /// Number of waypoints of the motion, `None` if it does not fit a `usize`.
    #[must_use]
    pub fn sample_count(&self) -> Option<usize> {
        let count = (self.duration / self.sample_period).round();
        // `as` saturates at the upper end
        (count < usize::MAX as f32).then_some(count as usize)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if !self.duration.is_finite() {
            return Err(GenerationError::NonFinite("duration"));
        }
        if !self.sample_period.is_finite() {
            return Err(GenerationError::NonFinite("sample_period"));
        }
        for (name, transition) in [
            ("com", &self.com),
            ("left_ankle", &self.left_ankle),
            ("right_ankle", &self.right_ankle),
        ] {
            let finite = [transition.initial, transition.target].iter().all(|pose| {
                pose.position.iter().all(|v| v.is_finite())
                    && pose.orientation.coords.iter().all(|v| v.is_finite())
            });
            if !finite {
                return Err(GenerationError::NonFinite(name));
            }

            let unit = [transition.initial, transition.target].iter().all(|pose| {
                (pose.orientation.quaternion().norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
            });
            if !unit {
                return Err(GenerationError::Orientation(name));
            }
        }

        if self.duration <= 0.0 {
            return Err(GenerationError::Duration(self.duration));
        }
        if self.sample_period <= 0.0 || self.sample_count() == Some(0) {
            return Err(GenerationError::SamplePeriod(self.sample_period));
        }
        if self.sample_count().is_none_or(|count| count > MAX_SAMPLES) {
            return Err(GenerationError::TooLong(MAX_SAMPLES));
        }

        Ok(())
    }
}

/// Generates a minimum jerk motion of the center of mass and both ankles.
///
/// The ZMP and DCM references are derived from the center of mass, they are only used for
/// monitoring since general motions run without balance feedback.
pub fn generate(
    params: &GeneralMotionParameters,
    sole_offsets: &Feet<Vector3<f32>>,
    gravity: f32,
) -> Result<Plan, GenerationError> {
    params.validate()?;

    let count = params.sample_count().unwrap_or_default();
    let com_start = params.com.initial.to_isometry();
    let com_end = params.com.target.to_isometry();
    let left = (
        params.left_ankle.initial.to_isometry(),
        params.left_ankle.target.to_isometry(),
    );
    let right = (
        params.right_ankle.initial.to_isometry(),
        params.right_ankle.target.to_isometry(),
    );

    let waypoints = (1..=count)
        .map(|sample| {
            let tau = sample as f32 / count as f32;
            let com = min_jerk::interpolate_pose(&com_start, &com_end, tau);
            let com_velocity = min_jerk::velocity(
                &com_start.translation.vector,
                &com_end.translation.vector,
                tau,
                params.duration,
            );

            let ankles = Feet::new(
                min_jerk::interpolate_pose(&left.0, &left.1, tau),
                min_jerk::interpolate_pose(&right.0, &right.1, tau),
            );
            let sole_height =
                |side: Side| (ankles.get(side) * Point3::from(*sole_offsets.get(side))).z;
            let ground = sole_height(Side::Left).min(sole_height(Side::Right));

            let position = com.translation.vector;
            let height = (position.z - ground).max(MIN_PENDULUM_HEIGHT);
            let omega = natural_frequency(gravity, height);

            Waypoint {
                com_position: position,
                com_rotation: com.rotation,
                zmp: Vector3::new(position.x, position.y, ground),
                dcm: position + com_velocity / omega,
                com_velocity,
                ankles,
                phase: SupportPhase::DoubleSupport,
                step: 0,
            }
        })
        .collect();

    Ok(Plan {
        kind: SegmentKind::GeneralMotion,
        waypoints,
        footsteps: Vec::new(),
    })
}
