//! Monitoring snapshots of the control loop.
//!
//! Telemetry is best effort: it is published as structured `tracing` events under the
//! `surena::telemetry` target, and never influences the control.
use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

use crate::trajectory::Footstep;

/// State of the robot as reported to monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub com_position: Vector3<f32>,
    pub com_orientation: UnitQuaternion<f32>,
    pub measured_zmp: Vector3<f32>,
    pub desired_zmp: Vector3<f32>,
    /// Planned footholds of the active trajectory.
    pub footsteps: Vec<Footstep>,
}

impl Telemetry {
    pub fn publish(&self, iteration: u64) {
        let footholds: Vec<_> = self
            .footsteps
            .iter()
            .map(|step| {
                let position = step.sole.translation.vector;
                (step.side, [position.x, position.y, position.z])
            })
            .collect();
        let (roll, pitch, yaw) = self.com_orientation.euler_angles();

        debug!(
            target: "surena::telemetry",
            iteration,
            com = ?[self.com_position.x, self.com_position.y, self.com_position.z],
            com_orientation = ?[roll, pitch, yaw],
            measured_zmp = ?[self.measured_zmp.x, self.measured_zmp.y],
            desired_zmp = ?[self.desired_zmp.x, self.desired_zmp.y],
            ?footholds,
        );
    }
}

/// Decides which cycles publish telemetry.
#[derive(Debug, Clone)]
pub struct Decimation {
    every: u32,
    count: u32,
}

impl Decimation {
    /// Publishes every `every`-th cycle, or never when `every` is zero.
    #[must_use]
    pub fn new(every: u32) -> Self {
        Self { every, count: 0 }
    }

    /// Counts a cycle, returns whether it should publish.
    pub fn tick(&mut self) -> bool {
        if self.every == 0 {
            return false;
        }

        self.count += 1;
        if self.count >= self.every {
            self.count = 0;
            return true;
        }

        false
    }
}
