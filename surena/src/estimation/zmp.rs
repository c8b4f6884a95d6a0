//! Measured zero moment point from the foot force/torque sensors.
use nalgebra::{Isometry3, Point3, Vector3};

use crate::types::{Feet, ForceTorque};

/// Vertical force below which a foot force is treated as zero, in N.
pub const MIN_FORCE: f32 = 1.0;

/// ZMP of a single foot in the world frame.
///
/// The force/torque is measured at the sole center, the local ZMP is `(-τy / fz, τx / fz)`.
/// Without a meaningful vertical force the sole center is returned.
#[must_use]
pub fn foot_zmp(sole: &Isometry3<f32>, wrench: &ForceTorque) -> Vector3<f32> {
    let local = if wrench.force_z > MIN_FORCE {
        Point3::new(
            -wrench.torque_y / wrench.force_z,
            wrench.torque_x / wrench.force_z,
            0.0,
        )
    } else {
        Point3::origin()
    };

    (sole * local).coords
}

/// Force weighted combination of the ZMPs of both feet, `None` if neither foot carries load.
#[must_use]
pub fn combined_zmp(zmp: &Feet<Vector3<f32>>, wrench: &Feet<ForceTorque>) -> Option<Vector3<f32>> {
    let left = wrench.left.force_z.max(0.0);
    let right = wrench.right.force_z.max(0.0);
    let total = left + right;

    (total > MIN_FORCE).then(|| (zmp.left * left + zmp.right * right) / total)
}
