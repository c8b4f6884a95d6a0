use nalgebra::{UnitQuaternion, Vector3};
use surena::{
    config::FilterKind,
    prelude::*,
    trajectory::{GeneralMotionParameters, Pose, PoseTransition, SegmentKind},
    types::JOINT_COUNT,
};

fn walk(step_count: u32) -> GaitParameters {
    GaitParameters {
        step_count,
        step_duration: 1.0,
        double_support_ratio: 0.2,
        com_height: 0.68,
        step_length: 0.15,
        step_width: 0.23,
        turn_angle: 0.0,
        step_height: 0.04,
        ankle_height: 0.112,
        slope: 0.0,
        sample_period: 0.01,
    }
}

fn pose(x: f32, y: f32, z: f32) -> Pose {
    Pose {
        position: Vector3::new(x, y, z),
        orientation: UnitQuaternion::identity(),
    }
}

fn crouch() -> GeneralMotionParameters {
    GeneralMotionParameters {
        duration: 1.0,
        sample_period: 0.01,
        com: PoseTransition {
            initial: pose(0.0, 0.0, 0.7),
            target: pose(0.0, 0.0, 0.62),
        },
        left_ankle: PoseTransition {
            initial: pose(0.0, 0.115, 0.112),
            target: pose(0.0, 0.115, 0.112),
        },
        right_ankle: PoseTransition {
            initial: pose(0.0, -0.115, 0.112),
            target: pose(0.0, -0.115, 0.112),
        },
    }
}

/// A robot that follows its joint commands exactly, standing on both feet.
struct Robot {
    control: ControlLoop,
    sensors: SensorFrame,
}

impl Robot {
    fn new(config: &SurenaConfig) -> Self {
        let mass = config.model().unwrap().total_mass();
        Self {
            control: ControlLoop::new(config).unwrap(),
            sensors: SensorFrame::standing(
                [0.0; JOINT_COUNT],
                mass * config.control.gravity,
                config.control.gravity,
            ),
        }
    }

    fn bundled() -> Self {
        Self::new(&SurenaConfig::bundled().unwrap())
    }

    fn cycle(&mut self) -> CycleOutput {
        self.sensors.iteration += 1;
        let output = self.control.cycle(&self.sensors);
        if let Some(joints) = output.joints {
            self.sensors.joint_positions = joints;
        }
        output
    }
}

fn completes_exactly_at_the_last_waypoint(robot: &mut Robot) {
    robot.control.generate_gait(&walk(4)).unwrap();
    assert_eq!(robot.control.player().trajectory().len(), 400);

    for call in 1..=400 {
        let output = robot.cycle();
        let joints = output.joints.unwrap();
        assert!(joints.iter().all(|joint| joint.is_finite()));

        if call < 400 {
            assert_eq!(output.status, CycleStatus::InProgress, "call {call}");
            assert_eq!(robot.control.state(), ControlState::Walk);
            assert_eq!(robot.control.player().index(), call);
        } else {
            assert_eq!(output.status, CycleStatus::Complete);
        }
    }

    assert_eq!(robot.control.state(), ControlState::Idle);
    assert_eq!(robot.control.player().index(), 0);
    assert!(robot.control.player().trajectory().is_empty());

    let output = robot.cycle();
    assert_eq!(output.status, CycleStatus::NotReady);
    assert!(output.joints.is_none());
}

#[test]
fn four_steps_complete_at_the_400th_call() {
    completes_exactly_at_the_last_waypoint(&mut Robot::bundled());
}

#[test]
fn manifold_filter_walks_the_same_trajectory() {
    let mut config = SurenaConfig::bundled().unwrap();
    config.estimator.filter = FilterKind::Manifold;

    completes_exactly_at_the_last_waypoint(&mut Robot::new(&config));
}

#[test]
fn swing_flags_follow_the_support_phase() {
    let mut robot = Robot::bundled();
    robot.control.generate_gait(&walk(2)).unwrap();
    let trajectory = robot.control.player().trajectory().clone();

    for index in 0..trajectory.len() {
        robot.cycle();
        let swing = robot.control.robot_state().swing;
        let phase = trajectory.get(index).unwrap().phase;

        match phase.swing_side() {
            Some(side) => {
                assert!(*swing.get(side));
                assert!(!*swing.get(side.opposite()));
            }
            None => assert!(!swing.left && !swing.right),
        }
    }
}

#[test]
fn reset_returns_to_idle_from_any_state() {
    let mut robot = Robot::bundled();

    robot.control.reset_trajectory();
    assert_eq!(robot.control.state(), ControlState::Idle);

    robot.control.generate_gait(&walk(2)).unwrap();
    for _ in 0..120 {
        robot.cycle();
    }
    robot.control.reset_trajectory();

    assert_eq!(robot.control.state(), ControlState::Idle);
    assert_eq!(robot.control.player().index(), 0);
    assert_eq!(robot.control.player().trajectory().len(), 0);
    assert_eq!(robot.cycle().status, CycleStatus::NotReady);

    robot.control.reset_trajectory();
    assert_eq!(robot.control.player().trajectory().len(), 0);
}

#[test]
fn general_motion_plays_open_loop() {
    let mut robot = Robot::bundled();
    robot.control.generate_general_motion(&crouch()).unwrap();

    let segments = robot.control.player().trajectory().segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].kind, SegmentKind::GeneralMotion);

    let statuses: Vec<_> = (0..100).map(|_| robot.cycle().status).collect();
    assert!(statuses[..99].iter().all(|status| *status == CycleStatus::InProgress));
    assert_eq!(statuses[99], CycleStatus::Complete);
}

#[test]
fn gait_after_general_motion_is_one_trajectory() {
    let mut robot = Robot::bundled();
    robot.control.generate_general_motion(&crouch()).unwrap();
    robot.control.generate_gait(&walk(1)).unwrap();

    let trajectory = robot.control.player().trajectory();
    assert_eq!(trajectory.len(), 200);
    let kinds: Vec<_> = trajectory.segments().iter().map(|segment| segment.kind).collect();
    assert_eq!(kinds, [SegmentKind::GeneralMotion, SegmentKind::Gait]);

    let statuses: Vec<_> = (0..200).map(|_| robot.cycle().status).collect();
    assert_eq!(
        statuses.iter().filter(|status| **status == CycleStatus::Complete).count(),
        1
    );
    assert_eq!(statuses[199], CycleStatus::Complete);
}
