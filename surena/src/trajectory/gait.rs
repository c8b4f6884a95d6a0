//! DCM based gait generation.
//!
//! Every step takes `samples_per_step` control cycles and is split into three phases: half of
//! the double support time, the single support time in which the swing foot moves, and the other
//! half of the double support time. The ZMP rests on the support foot during single support and
//! moves linearly to the next support foot during double support.
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::{
    GenerationError, MAX_SAMPLES, Plan, SegmentKind, Stance, SupportPhase, Waypoint, ankle,
    dcm::{DcmPlan, ZmpKnot, integrate_com, natural_frequency},
    footsteps::{self, StepShape},
    Footstep, heading, mean_heading,
};
use crate::types::{Feet, Side};

/// Parameters of a gait request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaitParameters {
    pub step_count: u32,
    /// Duration of a single step, in s.
    pub step_duration: f32,
    /// Fraction of a step spent in double support.
    pub double_support_ratio: f32,
    /// Height of the center of mass above the ground, in m.
    pub com_height: f32,
    pub step_length: f32,
    /// Lateral distance between the feet, in m.
    pub step_width: f32,
    /// Change of heading per step, in rad.
    pub turn_angle: f32,
    /// Apex of the swing foot above the straight line between the footholds, in m.
    pub step_height: f32,
    /// Height of the ankle joint above the sole, in m.
    pub ankle_height: f32,
    /// Inclination of the ground along the initial walking direction, in rad.
    pub slope: f32,
    /// Duration of a control cycle, in s.
    pub sample_period: f32,
}

impl GaitParameters {
    /// Number of waypoints of a single step.
    #[must_use]
    pub fn samples_per_step(&self) -> usize {
        (self.step_duration / self.sample_period).round() as usize
    }

    /// Total number of waypoints of the gait, `None` if it does not fit a `usize`.
    #[must_use]
    pub fn sample_count(&self) -> Option<usize> {
        (self.step_count as usize).checked_mul(self.samples_per_step())
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        for (name, value) in [
            ("step_duration", self.step_duration),
            ("double_support_ratio", self.double_support_ratio),
            ("com_height", self.com_height),
            ("step_length", self.step_length),
            ("step_width", self.step_width),
            ("turn_angle", self.turn_angle),
            ("step_height", self.step_height),
            ("ankle_height", self.ankle_height),
            ("slope", self.slope),
            ("sample_period", self.sample_period),
        ] {
            if !value.is_finite() {
                return Err(GenerationError::NonFinite(name));
            }
        }

        if self.step_count == 0 {
            return Err(GenerationError::StepCount);
        }
        if self.step_duration <= 0.0 {
            return Err(GenerationError::StepDuration(self.step_duration));
        }
        if self.sample_period <= 0.0 || self.samples_per_step() == 0 {
            return Err(GenerationError::SamplePeriod(self.sample_period));
        }
        if self.sample_count().is_none_or(|count| count > MAX_SAMPLES) {
            return Err(GenerationError::TooLong(MAX_SAMPLES));
        }
        if !(0.0..1.0).contains(&self.double_support_ratio) {
            return Err(GenerationError::DoubleSupportRatio(self.double_support_ratio));
        }
        if self.ankle_height < 0.0 {
            return Err(GenerationError::AnkleHeight(self.ankle_height));
        }
        if self.com_height <= self.ankle_height {
            return Err(GenerationError::ComHeight {
                com_height: self.com_height,
                ankle_height: self.ankle_height,
            });
        }
        if self.slope.abs() >= std::f32::consts::FRAC_PI_2 {
            return Err(GenerationError::Slope(self.slope));
        }

        Ok(())
    }
}

/// Pose of the ground frame below a stance: between the soles, facing their mean heading.
fn ground_frame(soles: &Feet<Isometry3<f32>>) -> Isometry3<f32> {
    let center = (soles.left.translation.vector + soles.right.translation.vector) / 2.0;
    let yaw = mean_heading(heading(&soles.left.rotation), heading(&soles.right.rotation));

    Isometry3::from_parts(
        Translation3::from(center),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
    )
}

/// Generates the waypoints of a gait.
pub fn generate(
    params: &GaitParameters,
    start: Option<&Stance>,
    gravity: f32,
) -> Result<Plan, GenerationError> {
    params.validate()?;

    let ankle_to_sole = Translation3::new(0.0, 0.0, -params.ankle_height);
    let sole_to_ankle = ankle_to_sole.inverse();

    let start = start.copied().unwrap_or_else(|| nominal_stance(params));
    let start_soles = start.ankles.map(|_, ankle| ankle * ankle_to_sole);
    let frame = ground_frame(&start_soles);

    let steps = footsteps::plan(&StepShape {
        count: params.step_count as usize,
        length: params.step_length,
        width: params.step_width,
        turn: params.turn_angle,
        slope: params.slope,
    });

    let samples_per_step = params.samples_per_step();
    let dt = params.sample_period;
    let step_time = samples_per_step as f32 * dt;
    let half_double_support = params.double_support_ratio * step_time / 2.0;
    let single_support = step_time - 2.0 * half_double_support;

    // sole poses of both feet before every step, and the matching ZMP knots
    let mut soles = start_soles;
    let mut knots = vec![ZmpKnot {
        time: 0.0,
        position: midpoint(&soles),
    }];
    let mut footholds = Vec::with_capacity(steps.len());
    let mut before_step = Vec::with_capacity(steps.len());

    for (index, step) in steps.iter().enumerate() {
        let support = soles.get(step.swing.opposite()).translation.vector;
        let start_time = index as f32 * step_time;
        knots.push(ZmpKnot {
            time: start_time + half_double_support,
            position: support,
        });
        knots.push(ZmpKnot {
            time: start_time + step_time - half_double_support,
            position: support,
        });

        before_step.push(soles);
        let landing = frame * step.landing;
        *soles.get_mut(step.swing) = landing;
        footholds.push(Footstep {
            side: step.swing,
            sole: landing,
            step: index,
        });
    }
    knots.push(ZmpKnot {
        time: steps.len() as f32 * step_time,
        position: midpoint(&soles),
    });

    let omega = natural_frequency(gravity, params.com_height);
    let dcm_plan = DcmPlan::new(knots, omega);

    let mut com = start.com;
    let mut previous_height = com.z;
    let mut waypoints = Vec::with_capacity(steps.len() * samples_per_step);

    for (index, step) in steps.iter().enumerate() {
        let soles_before = before_step[index];
        let landing = footholds[index].sole;

        for sample in 0..samples_per_step {
            let local_time = (sample + 1) as f32 * dt;
            let time = index as f32 * step_time + local_time;

            let phase = phase_at(
                local_time,
                half_double_support,
                step_time,
                index,
                steps.len(),
                step.swing,
            );

            let swing_progress = if single_support > 0.0 {
                (local_time - half_double_support) / single_support
            } else {
                1.0
            };
            let ankles = soles_before.map(|side, sole| {
                if side == step.swing {
                    ankle::swing_pose(
                        &(sole * sole_to_ankle),
                        &(landing * sole_to_ankle),
                        params.step_height,
                        swing_progress,
                    )
                } else {
                    sole * sole_to_ankle
                }
            });

            let zmp = dcm_plan.zmp(time);
            let mut dcm = dcm_plan.dcm(time);
            com = integrate_com(&com, &dcm, omega, dt);

            let height = zmp.z + params.com_height;
            com.z = height;
            dcm.z = height;
            let mut com_velocity = (dcm - com) * omega;
            com_velocity.z = (height - previous_height) / dt;
            previous_height = height;

            let yaw = mean_heading(
                heading(&ankles.left.rotation),
                heading(&ankles.right.rotation),
            );

            waypoints.push(Waypoint {
                com_position: com,
                com_rotation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
                zmp,
                dcm,
                com_velocity,
                ankles,
                phase,
                step: index,
            });
        }
    }

    Ok(Plan {
        kind: SegmentKind::Gait,
        waypoints,
        footsteps: footholds,
    })
}

/// Support phase at `local_time` into step `index` of `count`.
fn phase_at(
    local_time: f32,
    half_double_support: f32,
    step_time: f32,
    index: usize,
    count: usize,
    swing: Side,
) -> SupportPhase {
    if local_time <= half_double_support {
        if index == 0 {
            SupportPhase::DoubleSupportBefore
        } else {
            SupportPhase::DoubleSupport
        }
    } else if local_time < step_time - half_double_support {
        SupportPhase::single_support(swing.opposite())
    } else if index + 1 == count {
        SupportPhase::DoubleSupportAfter
    } else {
        SupportPhase::DoubleSupport
    }
}

/// Standing pose of a robot that has not moved yet, centered at the origin.
fn nominal_stance(params: &GaitParameters) -> Stance {
    let ankle = |side: Side| {
        Isometry3::translation(0.0, side.sign() * params.step_width / 2.0, params.ankle_height)
    };

    Stance {
        com: Vector3::new(0.0, 0.0, params.com_height),
        com_rotation: UnitQuaternion::identity(),
        ankles: Feet::new(ankle(Side::Left), ankle(Side::Right)),
    }
}

fn midpoint(soles: &Feet<Isometry3<f32>>) -> Vector3<f32> {
    (soles.left.translation.vector + soles.right.translation.vector) / 2.0
}
