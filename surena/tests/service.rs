use nalgebra::Vector3;
use surena::{prelude::*, trajectory::GenerationError, types::JOINT_COUNT};

fn gait_request(step_count: u32) -> GenerateGaitRequest {
    GenerateGaitRequest {
        step_count,
        step_duration: 0.8,
        double_support_ratio: 0.25,
        com_height: 0.7,
        step_length: 0.1,
        step_width: 0.23,
        turn_angle: 0.05,
        step_height: 0.03,
        ankle_height: 0.112,
        slope: 0.0,
        sample_period: 0.005,
    }
}

fn service() -> (ControlLoop, SensorFrame) {
    let config = SurenaConfig::bundled().unwrap();
    let weight = config.model().unwrap().total_mass() * config.control.gravity;
    let frame = SensorFrame::standing([0.0; JOINT_COUNT], weight, config.control.gravity);

    (ControlLoop::new(&config).unwrap(), frame)
}

#[test]
fn joint_angles_are_not_ready_without_a_trajectory() {
    let (mut service, frame) = service();
    let response = service.get_joint_angles(&frame);

    assert_eq!(response.status, CycleStatus::NotReady);
    assert!(response.joints.is_none());
}

#[test]
fn generated_gait_is_played_to_completion() {
    let (mut service, mut frame) = service();
    let response = LocomotionService::generate_gait(&mut service, &gait_request(3));
    assert!(response.success, "{:?}", response.reason);

    // 3 steps of 160 samples
    let mut calls = 0;
    loop {
        calls += 1;
        let response = service.get_joint_angles(&frame);
        frame.joint_positions = response.joints.unwrap();
        if response.status == CycleStatus::Complete {
            break;
        }
        assert_eq!(response.status, CycleStatus::InProgress);
        assert!(calls < 480);
    }
    assert_eq!(calls, 480);
}

#[test]
fn rejected_requests_report_why_and_keep_the_trajectory() {
    let (mut service, frame) = service();
    assert!(LocomotionService::generate_gait(&mut service, &gait_request(2)).success);
    service.get_joint_angles(&frame);

    let invalid = GenerateGaitRequest {
        double_support_ratio: 1.5,
        ..gait_request(2)
    };
    let response = LocomotionService::generate_gait(&mut service, &invalid);
    assert!(!response.success);
    assert!(response.reason.unwrap().contains("double support ratio"));

    assert_eq!(service.state(), ControlState::Walk);
    assert_eq!(service.player().index(), 1);
    assert_eq!(service.player().trajectory().len(), 320);
}

#[test]
fn reset_always_succeeds() {
    let (mut service, frame) = service();
    assert!(LocomotionService::reset_trajectory(&mut service).success);

    assert!(LocomotionService::generate_gait(&mut service, &gait_request(1)).success);
    service.get_joint_angles(&frame);
    assert!(LocomotionService::reset_trajectory(&mut service).success);

    assert_eq!(service.state(), ControlState::Idle);
    assert_eq!(
        service.get_joint_angles(&frame).status,
        CycleStatus::NotReady
    );
}

#[test]
fn oversized_requests_are_rejected() {
    let (mut service, frame) = service();

    let endless = GenerateGaitRequest {
        step_duration: 1e30,
        sample_period: 1e-10,
        ..gait_request(1)
    };
    let response = LocomotionService::generate_gait(&mut service, &endless);
    assert!(!response.success);
    assert!(response.reason.unwrap().contains("samples"));

    let countless = GenerateGaitRequest {
        step_count: u32::MAX,
        ..gait_request(1)
    };
    assert!(!LocomotionService::generate_gait(&mut service, &countless).success);

    assert_eq!(service.state(), ControlState::Idle);
    assert_eq!(
        service.get_joint_angles(&frame).status,
        CycleStatus::NotReady
    );
}

#[test]
fn configured_sample_limit_bounds_requests() {
    let mut config = SurenaConfig::bundled().unwrap();
    config.limits.max_trajectory_samples = 200;
    let mut control = ControlLoop::new(&config).unwrap();

    // 160 samples per step
    assert_eq!(
        control.generate_gait(&gait_request(2)),
        Err(GenerationError::TooLong(200))
    );
    assert!(control.generate_gait(&gait_request(1)).is_ok());
}

#[test]
fn colliding_feet_are_rejected_and_keep_the_trajectory() {
    let (mut service, frame) = service();

    let narrow = GenerateGaitRequest {
        step_width: 0.12,
        ..gait_request(2)
    };
    assert!(matches!(
        service.generate_gait(&narrow),
        Err(GenerationError::FootCollision { .. })
    ));
    assert_eq!(service.state(), ControlState::Idle);
    assert!(service.player().trajectory().is_empty());

    service.generate_gait(&gait_request(2)).unwrap();
    service.get_joint_angles(&frame);

    let response = LocomotionService::generate_gait(&mut service, &narrow);
    assert!(!response.success);
    assert!(response.reason.unwrap().contains("soles"));

    assert_eq!(service.state(), ControlState::Walk);
    assert_eq!(service.player().index(), 1);
    assert_eq!(service.player().trajectory().len(), 320);
}

#[test]
fn unreachable_targets_are_reported_as_degraded() {
    let (mut service, frame) = service();

    // the legs are 0.73 m long, the ankles stay 0.79 m below the pelvis
    let tall = GenerateGaitRequest {
        com_height: 0.9,
        ..gait_request(1)
    };
    service.generate_gait(&tall).unwrap();

    let output = service.cycle(&frame);
    assert_eq!(output.status, CycleStatus::InProgress);
    assert!(output.degradation.unreachable.left);
    assert!(output.degradation.unreachable.right);
    assert!(output.joints.unwrap().iter().all(|joint| joint.is_finite()));

    let response = service.get_joint_angles(&frame);
    assert!(response.degraded);
    assert!(response.joints.is_some());
}

#[test]
fn sensor_faults_are_reported_as_degraded() {
    let (mut service, frame) = service();
    service.generate_gait(&gait_request(1)).unwrap();
    service.cycle(&frame);

    let faulty = SensorFrame {
        gyroscope: Vector3::new(f32::NAN, 0.0, 0.0),
        ..frame.clone()
    };
    let output = service.cycle(&faulty);
    assert_eq!(output.status, CycleStatus::InProgress);
    assert!(output.degradation.sensor_faults.gyroscope);
    assert!(output.degradation.any());
    assert!(output.joints.unwrap().iter().all(|joint| joint.is_finite()));

    assert!(service.get_joint_angles(&faulty).degraded);
    assert!(!service.cycle(&frame).degradation.sensor_faults.any());
}
