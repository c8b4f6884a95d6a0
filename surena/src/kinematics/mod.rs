//! Kinematic model, forward kinematics and analytic inverse kinematics of the legs.
pub mod forward;
pub mod inverse;
pub mod model;

pub use forward::LegPoses;
pub use inverse::{IkSolution, Reachability, solve_leg};
pub use model::{JointAxis, KinematicModel, LINK_COUNT, Link};
