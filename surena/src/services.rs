//! Request and response records of the locomotion services.
//!
//! The transport that exposes these to remote callers lives outside of this crate, it only needs
//! a [`LocomotionService`] and the records below.
use serde::{Deserialize, Serialize};

use crate::{
    control::{ControlLoop, CycleStatus},
    trajectory::{GaitParameters, GeneralMotionParameters, GenerationError},
    types::{JointArray, SensorFrame},
};

/// Sensor readings of the caller's cycle.
pub type JointAnglesRequest = SensorFrame;

pub type GenerateGaitRequest = GaitParameters;

pub type GeneralMotionRequest = GeneralMotionParameters;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAnglesResponse {
    /// Joint commands, right leg first. Absent when the status is not ready.
    pub joints: Option<JointArray>,
    pub status: CycleStatus,
    /// The commands are a best effort, see the log for the reason.
    pub degraded: bool,
}

/// Outcome of a trajectory request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    /// Why the request was rejected.
    pub reason: Option<String>,
}

impl GenerationResponse {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }
}

impl From<Result<(), GenerationError>> for GenerationResponse {
    fn from(result: Result<(), GenerationError>) -> Self {
        match result {
            Ok(()) => Self::accepted(),
            Err(error) => Self {
                success: false,
                reason: Some(error.to_string()),
            },
        }
    }
}

/// The operations exposed to remote callers.
pub trait LocomotionService {
    fn get_joint_angles(&mut self, request: &JointAnglesRequest) -> JointAnglesResponse;

    fn generate_gait(&mut self, request: &GenerateGaitRequest) -> GenerationResponse;

    fn generate_general_trajectory(&mut self, request: &GeneralMotionRequest)
    -> GenerationResponse;

    fn reset_trajectory(&mut self) -> GenerationResponse;
}

impl LocomotionService for ControlLoop {
    fn get_joint_angles(&mut self, request: &JointAnglesRequest) -> JointAnglesResponse {
        let output = self.cycle(request);

        JointAnglesResponse {
            joints: output.joints,
            status: output.status,
            degraded: output.degradation.any(),
        }
    }

    fn generate_gait(&mut self, request: &GenerateGaitRequest) -> GenerationResponse {
        ControlLoop::generate_gait(self, request).into()
    }

    fn generate_general_trajectory(
        &mut self,
        request: &GeneralMotionRequest,
    ) -> GenerationResponse {
        self.generate_general_motion(request).into()
    }

    fn reset_trajectory(&mut self) -> GenerationResponse {
        ControlLoop::reset_trajectory(self);

        GenerationResponse::accepted()
    }
}
