//! Footstep placement for straight and turning gaits.
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector2, Vector3};

use crate::types::Side;

/// Shape of a gait, the distance and heading change between consecutive steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepShape {
    pub count: usize,
    pub length: f32,
    pub width: f32,
    pub turn: f32,
    pub slope: f32,
}

/// A planned step, in the frame of the stance the gait starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedStep {
    pub swing: Side,
    /// Pose of the sole center of the swing foot after landing.
    pub landing: Isometry3<f32>,
}

/// The foot that swings in step `index`, the right foot swings first.
#[must_use]
pub fn swing_side(index: usize) -> Side {
    if index % 2 == 0 {
        Side::Right
    } else {
        Side::Left
    }
}

/// Places the footholds of a gait.
///
/// Every step advances the walking direction by `length` and turns it by `turn`. The last step
/// closes the gait by placing the swing foot next to the support foot.
#[must_use]
pub fn plan(shape: &StepShape) -> Vec<PlannedStep> {
    let last = shape.count.saturating_sub(1);

    (0..shape.count)
        .map(|index| {
            let swing = swing_side(index);
            let target = (index + 1).min(last);
            let heading = target as f32 * shape.turn;

            let center = (0..target).fold(Vector2::zeros(), |center, previous| {
                center + rotate(previous as f32 * shape.turn, &Vector2::new(shape.length, 0.0))
            });
            let lateral = Vector2::new(0.0, swing.sign() * shape.width / 2.0);
            let position = center + rotate(heading, &lateral);

            PlannedStep {
                swing,
                landing: sole_on_slope(position, heading, shape.slope),
            }
        })
        .collect()
}

/// Pose of a sole at `position` on a plane that rises along the x-axis with `slope`.
#[must_use]
pub fn sole_on_slope(position: Vector2<f32>, heading: f32, slope: f32) -> Isometry3<f32> {
    let height = position.x * slope.tan();
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -slope)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading);

    Isometry3::from_parts(Translation3::new(position.x, position.y, height), rotation)
}

fn rotate(angle: f32, v: &Vector2<f32>) -> Vector2<f32> {
    let (sin, cos) = angle.sin_cos();
    Vector2::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(count: usize, length: f32, turn: f32) -> StepShape {
        StepShape {
            count,
            length,
            width: 0.2,
            turn,
            slope: 0.0,
        }
    }

    #[test]
    fn straight_gait_alternates_and_closes() {
        let steps = plan(&shape(4, 0.15, 0.0));
        let x: Vec<f32> = steps.iter().map(|s| s.landing.translation.x).collect();
        let y: Vec<f32> = steps.iter().map(|s| s.landing.translation.y).collect();

        assert_eq!(
            steps.iter().map(|s| s.swing).collect::<Vec<_>>(),
            [Side::Right, Side::Left, Side::Right, Side::Left]
        );
        for (actual, expected) in x.iter().zip([0.15, 0.3, 0.45, 0.45]) {
            assert!((actual - expected).abs() < 1e-6);
        }
        for (actual, expected) in y.iter().zip([-0.1, 0.1, -0.1, 0.1]) {
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn single_step_is_in_place() {
        let steps = plan(&shape(1, 0.2, 0.3));

        assert_eq!(steps.len(), 1);
        let landing = steps[0].landing.translation.vector;
        assert!((landing - Vector3::new(0.0, -0.1, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn turning_gait_rotates_the_feet() {
        let turn = 0.1;
        let steps = plan(&shape(3, 0.0, turn));

        // turning in place keeps the feet centered around the origin
        for (index, step) in steps.iter().enumerate() {
            let expected = (index + 1).min(2) as f32 * turn;
            assert!((crate::trajectory::heading(&step.landing.rotation) - expected).abs() < 1e-5);
            assert!((step.landing.translation.vector.xy().norm() - 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn slope_raises_footholds() {
        let steps = plan(&StepShape {
            slope: 0.1,
            ..shape(2, 0.2, 0.0)
        });

        let landing = steps[0].landing;
        assert!((landing.translation.z - 0.2 * 0.1_f32.tan()).abs() < 1e-6);
        // toes up when walking uphill
        assert!((landing.rotation * Vector3::x()).z > 0.0);
    }
}
