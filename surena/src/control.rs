//! The control cycle and its {Idle, Walk} state machine.
//!
//! Every cycle updates the state estimate from the raw sensors first. While walking, the
//! waypoint under the playhead is then corrected by the balance controllers, solved for both
//! legs and emitted, after which the playhead advances. Per-cycle conditions are reported in the
//! [`CycleOutput`] and never abort the cycle.
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{info, trace_span, warn};

use crate::{
    balance::{BalanceControllers, LiveReference},
    config::{ConfigError, LimitsConfig, SurenaConfig},
    estimation::{RobotState, SensorFaults, StateEstimator},
    kinematics::solve_leg,
    telemetry::{Decimation, Telemetry},
    trajectory::{
        GaitParameters, GeneralMotionParameters, GenerationError, Plan, SegmentKind,
        TrajectoryGenerator, TrajectoryPlayer, heading,
    },
    types::{Feet, JOINT_COUNT, JointArray, SensorFrame, Side},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum ControlState {
    /// No trajectory is played, no joints are commanded.
    #[default]
    Idle,
    /// A trajectory is played, one waypoint per cycle.
    Walk,
}

/// Progress reported by a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// There is no active trajectory, no joints were commanded.
    NotReady,
    InProgress,
    /// The last waypoint of the trajectory was commanded in this cycle.
    Complete,
}

/// Conditions that reduced the accuracy of a cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Degradation {
    /// The ankle target of the leg was out of reach and has been clamped.
    pub unreachable: Feet<bool>,
    /// At least one joint command was clamped to its limits.
    pub joint_limits: bool,
    /// Sensor inputs that were replaced by their last valid value.
    pub sensor_faults: SensorFaults,
    /// The estimator rejected a filter correction.
    pub estimator: bool,
}

impl Degradation {
    #[must_use]
    pub fn any(&self) -> bool {
        self.unreachable.left
            || self.unreachable.right
            || self.joint_limits
            || self.sensor_faults.any()
            || self.estimator
    }
}

/// Output of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutput {
    pub status: CycleStatus,
    /// Joint commands, right leg first, if any were computed.
    pub joints: Option<JointArray>,
    pub degradation: Degradation,
}

/// Owns all mutable state of the locomotion core.
///
/// The caller runs [`ControlLoop::cycle`] once per control period, strictly sequentially.
/// Trajectory requests take effect at the next cycle.
pub struct ControlLoop {
    limits: LimitsConfig,
    estimator: StateEstimator,
    balance: BalanceControllers,
    generator: TrajectoryGenerator,
    player: TrajectoryPlayer,
    state: ControlState,
    /// Start of the segment the balance controllers were last run on.
    active_segment: Option<usize>,
    degradation: Degradation,
    decimation: Decimation,
}

impl ControlLoop {
    pub fn new(config: &SurenaConfig) -> Result<Self, ConfigError> {
        let model = config.model()?;
        let gravity = config.control.gravity;
        let sole_offsets = Feet::both(()).map(|side, ()| model.sole_offset(side));

        Ok(Self {
            limits: config.limits.clone(),
            balance: BalanceControllers::new(
                &config.balance,
                model.total_mass(),
                gravity,
                config.period(),
            ),
            generator: TrajectoryGenerator::new(
                &config.robot,
                sole_offsets,
                gravity,
                config.limits.max_trajectory_samples,
            ),
            estimator: StateEstimator::new(config, model),
            player: TrajectoryPlayer::default(),
            state: ControlState::Idle,
            active_segment: None,
            degradation: Degradation::default(),
            decimation: Decimation::new(config.telemetry.decimation),
        })
    }

    #[must_use]
    pub fn state(&self) -> ControlState {
        self.state
    }

    #[must_use]
    pub fn player(&self) -> &TrajectoryPlayer {
        &self.player
    }

    #[must_use]
    pub fn robot_state(&self) -> &RobotState {
        self.estimator.state()
    }

    /// Mutable access to the balance controllers, e.g. to swap the distribution policy.
    pub fn balance_mut(&mut self) -> &mut BalanceControllers {
        &mut self.balance
    }

    /// Plans a gait. While walking, it continues from the end of the current trajectory.
    ///
    /// A rejected request leaves the trajectory and the state untouched.
    pub fn generate_gait(&mut self, params: &GaitParameters) -> Result<(), GenerationError> {
        let start = match self.state {
            ControlState::Walk => self.player.trajectory().last().map(|waypoint| waypoint.stance()),
            ControlState::Idle => None,
        };

        let plan = self
            .generator
            .gait(params, start.as_ref())
            .inspect_err(|error| warn!(%error, "rejected gait request"))?;
        info!(
            steps = params.step_count,
            samples = plan.waypoints.len(),
            "generated gait"
        );
        self.start(plan);

        Ok(())
    }

    /// Plans a point-to-point motion, appended to the current trajectory while walking.
    pub fn generate_general_motion(
        &mut self,
        params: &GeneralMotionParameters,
    ) -> Result<(), GenerationError> {
        let plan = self
            .generator
            .general_motion(params)
            .inspect_err(|error| warn!(%error, "rejected general motion request"))?;
        info!(samples = plan.waypoints.len(), "generated general motion");
        self.start(plan);

        Ok(())
    }

    /// Drops the trajectory and returns to idle, from any state.
    pub fn reset_trajectory(&mut self) {
        self.player.clear();
        self.balance.reset();
        self.active_segment = None;
        if self.state != ControlState::Idle {
            info!("trajectory reset");
        }
        self.state = ControlState::Idle;
    }

    pub fn request_bump_recalibration(&mut self) {
        self.estimator.request_bump_recalibration();
    }

    /// Snapshot for monitoring.
    #[must_use]
    pub fn telemetry(&self) -> Telemetry {
        let state = self.estimator.state();

        Telemetry {
            com_position: state.com,
            com_orientation: state.base.orientation,
            measured_zmp: state.zmp,
            desired_zmp: self.balance.desired_zmp(),
            footsteps: self.player.trajectory().footsteps().copied().collect(),
        }
    }

    fn start(&mut self, plan: Plan) {
        if self.state == ControlState::Idle {
            if let Some(first) = plan.waypoints.first() {
                self.estimator
                    .align(&first.com_position, heading(&first.com_rotation));
            }
            self.player.clear();
            self.balance.reset();
            self.active_segment = None;
            info!(from = %self.state, to = %ControlState::Walk, "state transition");
        }

        self.player.append(plan);
        self.state = ControlState::Walk;
    }

    /// Runs one control cycle.
    pub fn cycle(&mut self, frame: &SensorFrame) -> CycleOutput {
        let span = trace_span!("cycle", iteration = frame.iteration);
        let _entered = span.enter();

        let waypoint = match self.state {
            ControlState::Walk => self.player.current().copied(),
            ControlState::Idle => None,
        };
        let swing = waypoint.map_or(Feet::both(false), |waypoint| {
            Feet::both(()).map(|side, ()| waypoint.phase.is_swing(side))
        });

        let estimate = self.estimator.update(frame, swing);
        let mut degradation = Degradation {
            sensor_faults: estimate.faults,
            estimator: estimate.filter_failed,
            ..Default::default()
        };

        let Some(waypoint) = waypoint else {
            self.report(frame.iteration, degradation);
            return CycleOutput {
                status: CycleStatus::NotReady,
                joints: None,
                degradation,
            };
        };

        let segment = self
            .player
            .current_segment()
            .map(|segment| (segment.range.start, segment.kind));
        if segment.map(|(start, _)| start) != self.active_segment {
            self.balance.reset();
            self.active_segment = segment.map(|(start, _)| start);
        }

        let reference = match segment {
            Some((_, SegmentKind::Gait)) => self.balance.run(&waypoint, self.estimator.state()),
            _ => LiveReference::from_waypoint(&waypoint),
        };

        let mut joints = [0.0; JOINT_COUNT];
        for side in [Side::Left, Side::Right] {
            let solution = solve_leg(
                self.estimator.model(),
                side,
                &reference.pelvis,
                reference.ankles.get(side),
            );
            *degradation.unreachable.get_mut(side) = !solution.is_reachable();
            solution.joints.write_to(&mut joints, side);
        }
        degradation.joint_limits = clamp_to_limits(&mut joints, &self.limits);

        let status = if self.player.advance() {
            info!(
                samples = self.player.index(),
                from = %self.state,
                to = %ControlState::Idle,
                "trajectory complete"
            );
            self.player.clear();
            self.active_segment = None;
            self.state = ControlState::Idle;
            CycleStatus::Complete
        } else {
            CycleStatus::InProgress
        };

        self.report(frame.iteration, degradation);

        CycleOutput {
            status,
            joints: Some(joints),
            degradation,
        }
    }

    /// Logs degradations when they appear.
    fn report(&mut self, iteration: u64, degradation: Degradation) {
        let previous = self.degradation;

        for side in [Side::Left, Side::Right] {
            if *degradation.unreachable.get(side) && !*previous.unreachable.get(side) {
                warn!(iteration, %side, "ankle target out of reach, clamped");
            }
        }
        if degradation.joint_limits && !previous.joint_limits {
            warn!(iteration, "joint commands clamped to their limits");
        }
        if degradation.sensor_faults.any() && !previous.sensor_faults.any() {
            warn!(iteration, faults = ?degradation.sensor_faults, "holding faulty sensor inputs");
        }

        if self.decimation.tick() {
            self.telemetry().publish(iteration);
        }

        self.degradation = degradation;
    }
}

/// Clamps every joint to its limits, returns whether any joint was out of range.
fn clamp_to_limits(joints: &mut JointArray, limits: &LimitsConfig) -> bool {
    let mut clamped = false;

    for (index, joint) in joints.iter_mut().enumerate() {
        let (lower, upper) = (limits.joint_lower[index], limits.joint_upper[index]);
        let bounded = joint.max(lower).min(upper);
        if bounded != *joint {
            clamped = true;
            *joint = bounded;
        }
    }

    clamped
}
