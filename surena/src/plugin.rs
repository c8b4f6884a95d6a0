//! Scheduler integration.
//!
//! The [`LocomotionPlugin`] runs exactly one control cycle per `Update`, so the app's update rate
//! is the control rate. Trajectory requests are sent as [`LocomotionRequest`] events and take
//! effect before the cycle of the same update.
use bevy::prelude::*;
use tracing::error;

use crate::{
    config::SurenaConfig,
    control::{ControlLoop, CycleOutput},
    services::{GenerationResponse, LocomotionService},
    trajectory::{GaitParameters, GeneralMotionParameters},
    types::SensorFrame,
};

/// Plugin that owns the control loop and runs it once per update.
///
/// Requires a [`LocomotionConfig`] resource when the app starts. An invalid configuration
/// requests an [`AppExit::error`] at startup, the control loop never runs.
pub struct LocomotionPlugin;

impl Plugin for LocomotionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SensorInput>()
            .init_resource::<LocomotionOutput>()
            .add_event::<LocomotionRequest>()
            .add_event::<LocomotionResponse>()
            .add_systems(Startup, init_locomotion)
            .add_systems(
                Update,
                (handle_requests, run_cycle)
                    .chain()
                    .run_if(resource_exists::<Locomotion>),
            );
    }
}

#[derive(Resource, Debug, Clone, Deref)]
pub struct LocomotionConfig(pub SurenaConfig);

/// The control loop, available once the app has started.
#[derive(Resource, Deref, DerefMut)]
pub struct Locomotion(pub ControlLoop);

/// Sensor readings for the next cycle, written by the hardware interface.
#[derive(Resource, Debug, Default, Clone, Deref, DerefMut)]
pub struct SensorInput(pub SensorFrame);

/// Output of the last cycle.
#[derive(Resource, Debug, Default, Clone, Copy, Deref)]
pub struct LocomotionOutput(pub Option<CycleOutput>);

#[derive(Event, Debug, Clone)]
pub enum LocomotionRequest {
    Gait(GaitParameters),
    GeneralMotion(GeneralMotionParameters),
    Reset,
    RecalibrateBumps,
}

/// Answer to the [`LocomotionRequest`] that generated or reset a trajectory.
#[derive(Event, Debug, Clone)]
pub struct LocomotionResponse(pub GenerationResponse);

fn init_locomotion(
    mut commands: Commands,
    config: Res<LocomotionConfig>,
    mut exit: EventWriter<AppExit>,
) {
    match ControlLoop::new(&config) {
        Ok(control) => commands.insert_resource(Locomotion(control)),
        Err(error) => {
            error!(%error, "failed to create the control loop");
            exit.write(AppExit::error());
        }
    }
}

fn handle_requests(
    mut locomotion: ResMut<Locomotion>,
    mut requests: EventReader<LocomotionRequest>,
    mut responses: EventWriter<LocomotionResponse>,
) {
    for request in requests.read() {
        let response: GenerationResponse = match request {
            LocomotionRequest::Gait(params) => locomotion.generate_gait(params).into(),
            LocomotionRequest::GeneralMotion(params) => {
                locomotion.generate_general_motion(params).into()
            }
            LocomotionRequest::Reset => LocomotionService::reset_trajectory(&mut locomotion.0),
            LocomotionRequest::RecalibrateBumps => {
                locomotion.request_bump_recalibration();
                continue;
            }
        };

        responses.write(LocomotionResponse(response));
    }
}

fn run_cycle(
    mut locomotion: ResMut<Locomotion>,
    sensors: Res<SensorInput>,
    mut output: ResMut<LocomotionOutput>,
) {
    output.0 = Some(locomotion.cycle(&sensors));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        control::{ControlState, CycleStatus},
        trajectory::gait,
        types::JOINT_COUNT,
    };

    fn app() -> App {
        let config = SurenaConfig::bundled().unwrap();
        let weight = config.model().unwrap().total_mass() * config.control.gravity;
        let gravity = config.control.gravity;

        let mut app = App::new();
        app.add_plugins(LocomotionPlugin)
            .insert_resource(LocomotionConfig(config))
            .insert_resource(SensorInput(SensorFrame::standing(
                [0.0; JOINT_COUNT],
                weight,
                gravity,
            )));
        app
    }

    fn responses(app: &mut App) -> Vec<LocomotionResponse> {
        app.world_mut()
            .resource_mut::<Events<LocomotionResponse>>()
            .drain()
            .collect()
    }

    #[test]
    fn one_cycle_per_update() {
        let mut app = app();
        app.update();

        let output = app.world().resource::<LocomotionOutput>().0.unwrap();
        assert_eq!(output.status, CycleStatus::NotReady);

        app.world_mut()
            .send_event(LocomotionRequest::Gait(gait::tests::walk(1)));
        app.update();

        let responses = responses(&mut app);
        assert_eq!(responses.len(), 1);
        assert!(responses[0].0.success);

        let output = app.world().resource::<LocomotionOutput>().0.unwrap();
        assert_eq!(output.status, CycleStatus::InProgress);
        assert!(output.joints.is_some());
        assert_eq!(app.world().resource::<Locomotion>().player().index(), 1);
    }

    #[test]
    fn invalid_config_exits_the_app() {
        let mut config = SurenaConfig::bundled().unwrap();
        config.robot.links.pop();

        let mut app = App::new();
        app.add_plugins(LocomotionPlugin)
            .insert_resource(LocomotionConfig(config));
        app.update();

        assert_eq!(app.should_exit(), Some(AppExit::error()));
        assert!(!app.world().contains_resource::<Locomotion>());
        assert!(app.world().resource::<LocomotionOutput>().0.is_none());
    }

    #[test]
    fn rejected_requests_are_answered() {
        let mut app = app();
        app.update();

        let invalid = GaitParameters {
            step_count: 0,
            ..gait::tests::walk(1)
        };
        app.world_mut().send_event(LocomotionRequest::Gait(invalid));
        app.world_mut().send_event(LocomotionRequest::Reset);
        app.update();

        let responses = responses(&mut app);
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].0.success);
        assert!(responses[1].0.success);
        assert_eq!(
            app.world().resource::<Locomotion>().state(),
            ControlState::Idle
        );
    }
}
