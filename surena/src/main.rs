use bevy::prelude::*;
use miette::{Result, miette};
use surena::{
    plugin::{LocomotionConfig, LocomotionOutput, LocomotionRequest, SensorInput},
    prelude::*,
    types::JOINT_COUNT,
};
use tracing_subscriber::EnvFilter;

/// Walks a few steps on an ideal robot that follows its joint commands exactly.
///
/// Usage: `surena [config dir] [overlay dir]`, without a config dir the bundled one is used.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    miette::set_panic_hook();

    let mut args = std::env::args().skip(1);
    let config = match (args.next(), args.next()) {
        (Some(root), overlay) => {
            SurenaConfig::from_dir(root, overlay.as_deref().map(std::path::Path::new))?
        }
        (None, _) => SurenaConfig::bundled()?,
    };

    let model = config.model()?;
    let weight = model.total_mass() * config.control.gravity;
    let period = config.period();
    let sensors = SensorFrame::standing([0.0; JOINT_COUNT], weight, config.control.gravity);
    let gait = GaitParameters {
        step_count: 4,
        step_duration: 1.0,
        double_support_ratio: 0.2,
        com_height: 0.68,
        step_length: 0.15,
        step_width: 0.23,
        turn_angle: 0.0,
        step_height: 0.04,
        ankle_height: model.sole_offset(Side::Left).z.abs(),
        slope: 0.0,
        sample_period: period,
    };

    let mut app = App::new();
    app.add_plugins(LocomotionPlugin)
        .insert_resource(LocomotionConfig(config))
        .insert_resource(SensorInput(sensors));
    app.update();
    if app.should_exit().is_some() {
        return Err(miette!("the control loop could not be created"));
    }
    app.world_mut().send_event(LocomotionRequest::Gait(gait));

    let mut iteration = 0;
    loop {
        iteration += 1;
        app.world_mut().resource_mut::<SensorInput>().iteration = iteration;
        app.update();

        let output = app
            .world()
            .resource::<LocomotionOutput>()
            .0
            .ok_or_else(|| miette!("the control loop did not start"))?;
        if let Some(joints) = output.joints {
            app.world_mut()
                .resource_mut::<SensorInput>()
                .joint_positions = joints;
        }

        match output.status {
            CycleStatus::InProgress => {}
            CycleStatus::Complete => break,
            CycleStatus::NotReady => {
                return Err(miette!("the gait request was rejected"));
            }
        }
    }

    tracing::info!(cycles = iteration, "walk complete");

    Ok(())
}
