//! Precomputed reference trajectories.
//!
//! A [`Trajectory`] is a flat list of [`Waypoint`]s, one per control cycle, split into
//! [`Segment`]s. A segment is either a DCM based gait, or a general point-to-point motion.
//! Waypoints are never modified once a segment has been added.
pub mod ankle;
pub mod collision;
pub mod dcm;
pub mod footsteps;
pub mod gait;
pub mod general;
pub mod min_jerk;

use std::ops::Range;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

pub use gait::GaitParameters;
pub use general::{GeneralMotionParameters, Pose, PoseTransition};

use crate::{
    config::{RobotConfig, SoleConfig},
    types::{Feet, Side},
};

/// Reasons for rejecting a trajectory generation request.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GenerationError {
    #[error("the step count must be positive")]
    StepCount,
    #[error("the step duration must be positive, got {0}")]
    StepDuration(f32),
    #[error("the motion duration must be positive, got {0}")]
    Duration(f32),
    #[error("the sample period must be positive and fit the duration, got {0}")]
    SamplePeriod(f32),
    #[error("the double support ratio must be in [0, 1), got {0}")]
    DoubleSupportRatio(f32),
    #[error("the com height {com_height} must exceed the ankle height {ankle_height}")]
    ComHeight { com_height: f32, ankle_height: f32 },
    #[error("the ankle height must not be negative, got {0}")]
    AnkleHeight(f32),
    #[error("the slope must be within (-90°, 90°), got {0} rad")]
    Slope(f32),
    #[error("parameter `{0}` is not finite")]
    NonFinite(&'static str),
    #[error("the soles come within {distance:.3} m of each other at sample {index}")]
    FootCollision { index: usize, distance: f32 },
    #[error("the trajectory needs more than {0} samples")]
    TooLong(usize),
    #[error("the `{0}` orientation is not a unit quaternion")]
    Orientation(&'static str),
}

/// Largest number of waypoints a single request can produce, about a day at 5 ms.
pub const MAX_SAMPLES: usize = 1 << 24;

/// Support phase of a waypoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SupportPhase {
    /// Double support at the start of a gait.
    DoubleSupportBefore,
    /// The left foot supports, the right foot swings.
    LeftSupport,
    /// Double support between two steps.
    #[default]
    DoubleSupport,
    /// The right foot supports, the left foot swings.
    RightSupport,
    /// Double support at the end of a gait.
    DoubleSupportAfter,
}

impl SupportPhase {
    /// The side of the swinging foot, if any.
    #[must_use]
    pub fn swing_side(self) -> Option<Side> {
        match self {
            SupportPhase::LeftSupport => Some(Side::Right),
            SupportPhase::RightSupport => Some(Side::Left),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_swing(self, side: Side) -> bool {
        self.swing_side() == Some(side)
    }

    #[must_use]
    pub fn is_double_support(self) -> bool {
        self.swing_side().is_none()
    }

    /// The single support phase in which `side` supports the robot.
    #[must_use]
    pub fn single_support(side: Side) -> Self {
        match side {
            Side::Left => SupportPhase::LeftSupport,
            Side::Right => SupportPhase::RightSupport,
        }
    }
}

/// Reference state of the robot for a single control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub com_position: Vector3<f32>,
    pub com_rotation: UnitQuaternion<f32>,
    pub zmp: Vector3<f32>,
    pub dcm: Vector3<f32>,
    pub com_velocity: Vector3<f32>,
    /// Poses of the ankle joints.
    pub ankles: Feet<Isometry3<f32>>,
    pub phase: SupportPhase,
    /// Index of the step this waypoint belongs to, within its segment.
    pub step: usize,
}

impl Waypoint {
    /// The pelvis follows the center of mass reference.
    #[must_use]
    pub fn pelvis(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.com_position), self.com_rotation)
    }

    /// The robot's pose at this waypoint, used as the start of a following segment.
    #[must_use]
    pub fn stance(&self) -> Stance {
        Stance {
            com: self.com_position,
            com_rotation: self.com_rotation,
            ankles: self.ankles,
        }
    }
}

/// Pose of the robot at the boundary between two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stance {
    pub com: Vector3<f32>,
    pub com_rotation: UnitQuaternion<f32>,
    pub ankles: Feet<Isometry3<f32>>,
}

/// A planned foothold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footstep {
    pub side: Side,
    /// Pose of the sole center when the foot has landed.
    pub sole: Isometry3<f32>,
    pub step: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SegmentKind {
    /// Stepping, the balance controllers are active.
    Gait,
    /// Point-to-point motion, played without feedback.
    GeneralMotion,
}

/// A contiguous range of waypoints produced by a single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub range: Range<usize>,
    pub footsteps: Vec<Footstep>,
}

/// Output of a generation request, not yet part of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub kind: SegmentKind,
    pub waypoints: Vec<Waypoint>,
    pub footsteps: Vec<Footstep>,
}

/// The full reference trajectory, indexed by control cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Trajectory {
    waypoints: Vec<Waypoint>,
    segments: Vec<Segment>,
}

impl Trajectory {
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    #[must_use]
    pub fn last(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The segment containing the waypoint at `index`.
    #[must_use]
    pub fn segment_at(&self, index: usize) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.range.contains(&index))
    }

    /// Footholds of all segments, in order.
    pub fn footsteps(&self) -> impl Iterator<Item = &Footstep> {
        self.segments
            .iter()
            .flat_map(|segment| segment.footsteps.iter())
    }

    /// Appends a plan after the last segment.
    pub fn append(&mut self, plan: Plan) {
        let start = self.waypoints.len();
        self.waypoints.extend(plan.waypoints);
        self.segments.push(Segment {
            kind: plan.kind,
            range: start..self.waypoints.len(),
            footsteps: plan.footsteps,
        });
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.segments.clear();
    }
}

/// A trajectory together with its playhead.
///
/// The playhead only moves forward, and stays within the trajectory while it is not finished.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrajectoryPlayer {
    trajectory: Trajectory,
    index: usize,
}

impl TrajectoryPlayer {
    #[must_use]
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The waypoint under the playhead.
    #[must_use]
    pub fn current(&self) -> Option<&Waypoint> {
        self.trajectory.get(self.index)
    }

    /// The segment under the playhead.
    #[must_use]
    pub fn current_segment(&self) -> Option<&Segment> {
        self.trajectory.segment_at(self.index)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.index >= self.trajectory.len()
    }

    /// Moves the playhead to the next waypoint, returns `true` once it has passed the last one.
    pub fn advance(&mut self) -> bool {
        if !self.is_finished() {
            self.index += 1;
        }

        self.is_finished()
    }

    pub fn append(&mut self, plan: Plan) {
        self.trajectory.append(plan);
    }

    /// Drops the trajectory and rewinds the playhead.
    pub fn clear(&mut self) {
        self.trajectory.clear();
        self.index = 0;
    }
}

/// Produces gait and general motion plans for a robot.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryGenerator {
    gravity: f32,
    sole: SoleConfig,
    sole_offsets: Feet<Vector3<f32>>,
    min_sole_distance: f32,
    max_samples: usize,
}

impl TrajectoryGenerator {
    #[must_use]
    pub fn new(
        robot: &RobotConfig,
        sole_offsets: Feet<Vector3<f32>>,
        gravity: f32,
        max_samples: usize,
    ) -> Self {
        Self {
            gravity,
            sole: robot.sole,
            sole_offsets,
            min_sole_distance: robot.min_sole_distance,
            max_samples: max_samples.min(MAX_SAMPLES),
        }
    }

    /// Plans a gait starting from `start`, or from a nominal stance when there is none.
    pub fn gait(
        &self,
        params: &GaitParameters,
        start: Option<&Stance>,
    ) -> Result<Plan, GenerationError> {
        params.validate()?;
        self.check_length(params.sample_count())?;
        let plan = gait::generate(params, start, self.gravity)?;
        self.check_collision(&plan)?;

        Ok(plan)
    }

    /// Plans a point-to-point motion.
    pub fn general_motion(
        &self,
        params: &GeneralMotionParameters,
    ) -> Result<Plan, GenerationError> {
        params.validate()?;
        self.check_length(params.sample_count())?;
        let plan = general::generate(params, &self.sole_offsets, self.gravity)?;
        self.check_collision(&plan)?;

        Ok(plan)
    }

    fn check_length(&self, samples: Option<usize>) -> Result<(), GenerationError> {
        match samples {
            Some(samples) if samples <= self.max_samples => Ok(()),
            _ => Err(GenerationError::TooLong(self.max_samples)),
        }
    }

    fn check_collision(&self, plan: &Plan) -> Result<(), GenerationError> {
        collision::check(
            &plan.waypoints,
            &self.sole_offsets,
            &self.sole,
            self.min_sole_distance,
        )
    }
}

/// Yaw of a rotation, the heading of its x-axis projected onto the ground.
#[must_use]
pub fn heading(rotation: &UnitQuaternion<f32>) -> f32 {
    let forward = rotation * Vector3::x();
    forward.y.atan2(forward.x)
}

/// Yaw halfway between two headings, taking the shorter way around.
#[must_use]
pub fn mean_heading(a: f32, b: f32) -> f32 {
    let difference = (b - a).sin().atan2((b - a).cos());
    a + difference / 2.0
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn waypoint(phase: SupportPhase) -> Waypoint {
        Waypoint {
            com_position: Vector3::zeros(),
            com_rotation: UnitQuaternion::identity(),
            zmp: Vector3::zeros(),
            dcm: Vector3::zeros(),
            com_velocity: Vector3::zeros(),
            ankles: Feet::both(Isometry3::identity()),
            phase,
            step: 0,
        }
    }

    #[test]
    fn swing_flags_follow_phase() {
        assert!(SupportPhase::LeftSupport.is_swing(Side::Right));
        assert!(!SupportPhase::LeftSupport.is_swing(Side::Left));
        assert!(SupportPhase::RightSupport.is_swing(Side::Left));
        for phase in [
            SupportPhase::DoubleSupportBefore,
            SupportPhase::DoubleSupport,
            SupportPhase::DoubleSupportAfter,
        ] {
            assert!(!phase.is_swing(Side::Left) && !phase.is_swing(Side::Right));
        }
    }

    #[test]
    fn segments_are_appended() {
        let mut trajectory = Trajectory::default();
        trajectory.append(Plan {
            kind: SegmentKind::Gait,
            waypoints: vec![waypoint(SupportPhase::DoubleSupportBefore); 3],
            footsteps: Vec::new(),
        });
        trajectory.append(Plan {
            kind: SegmentKind::GeneralMotion,
            waypoints: vec![waypoint(SupportPhase::DoubleSupport); 2],
            footsteps: Vec::new(),
        });

        assert_eq!(trajectory.len(), 5);
        assert_eq!(trajectory.segment_at(2).map(|s| s.kind), Some(SegmentKind::Gait));
        assert_eq!(
            trajectory.segment_at(3).map(|s| s.kind),
            Some(SegmentKind::GeneralMotion)
        );
        assert!(trajectory.segment_at(5).is_none());

        trajectory.clear();
        assert!(trajectory.is_empty());
        assert!(trajectory.segments().is_empty());
    }

    #[test]
    fn player_finishes_after_the_last_waypoint() {
        let mut player = TrajectoryPlayer::default();
        assert!(player.is_finished() && player.current().is_none());

        player.append(Plan {
            kind: SegmentKind::Gait,
            waypoints: vec![waypoint(SupportPhase::DoubleSupport); 3],
            footsteps: Vec::new(),
        });

        assert!(!player.advance());
        assert!(!player.advance());
        assert_eq!(player.index(), 2);
        assert!(player.current().is_some());
        assert!(player.advance());
        assert!(player.advance());
        assert_eq!(player.index(), 3);

        player.clear();
        assert_eq!(player.index(), 0);
        assert!(player.trajectory().is_empty());
    }

    #[test]
    fn mean_heading_wraps() {
        assert!((mean_heading(0.2, 0.4) - 0.3).abs() < 1e-6);

        let mean = mean_heading(PI - 0.1, -PI + 0.1);
        assert!((mean.sin()).abs() < 1e-5 && mean.cos() < 0.0);
    }
}
