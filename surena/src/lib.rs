//! Locomotion control core of the Surena bipedal robot.
//!
//! Every control cycle runs the same fixed pipeline:
//! estimate the robot state from the raw sensors, correct the reference pose with the balance
//! controllers, solve the leg inverse kinematics and emit twelve joint commands.
//! The reference poses come from a precomputed [`trajectory::Trajectory`], generated either for a
//! DCM based gait or for a general point-to-point motion.
pub mod balance;
pub mod config;
pub mod control;
pub mod estimation;
pub mod kinematics;
pub mod plugin;
pub mod services;
pub mod telemetry;
pub mod trajectory;
pub mod types;

pub mod prelude {
    pub use crate::config::SurenaConfig;
    pub use crate::control::{ControlLoop, ControlState, CycleOutput, CycleStatus, Degradation};
    pub use crate::plugin::LocomotionPlugin;
    pub use crate::services::{
        GeneralMotionRequest, GenerateGaitRequest, JointAnglesResponse, LocomotionService,
    };
    pub use crate::trajectory::GaitParameters;
    pub use crate::types::{BumpReadings, ForceTorque, JointArray, LegJoints, SensorFrame, Side};
}
