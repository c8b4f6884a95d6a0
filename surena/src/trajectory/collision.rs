//! Self collision check between the two soles of a planned trajectory.
use nalgebra::{Isometry3, Point3, Vector2, Vector3};

use super::{GenerationError, Waypoint};
use crate::{config::SoleConfig, types::Feet};

/// Ground projection of a sole outline, corners in counter-clockwise order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    corners: [Vector2<f32>; 4],
}

impl Footprint {
    /// Outline of the sole of an ankle at `ankle`, with the sole center at `sole_offset`.
    #[must_use]
    pub fn new(ankle: &Isometry3<f32>, sole_offset: &Vector3<f32>, sole: &SoleConfig) -> Self {
        let corners = [
            (sole.front, -sole.half_width),
            (sole.front, sole.half_width),
            (-sole.back, sole.half_width),
            (-sole.back, -sole.half_width),
        ]
        .map(|(x, y)| (ankle * Point3::from(sole_offset + Vector3::new(x, y, 0.0))).xy().coords);

        Self { corners }
    }

    #[must_use]
    pub fn center(&self) -> Vector2<f32> {
        self.corners.iter().sum::<Vector2<f32>>() / 4.0
    }

    fn edges(&self) -> impl Iterator<Item = (Vector2<f32>, Vector2<f32>)> + '_ {
        (0..4).map(|index| (self.corners[index], self.corners[(index + 1) % 4]))
    }

    fn overlaps(&self, other: &Self) -> bool {
        // separating axis theorem, the edge normals of both outlines are the candidate axes
        self.edges().chain(other.edges()).all(|(start, end)| {
            let axis = Vector2::new(start.y - end.y, end.x - start.x);
            let project = |footprint: &Self| {
                footprint
                    .corners
                    .iter()
                    .map(|corner| corner.dot(&axis))
                    .fold((f32::MAX, f32::MIN), |(min, max), value| {
                        (min.min(value), max.max(value))
                    })
            };
            let (min_a, max_a) = project(self);
            let (min_b, max_b) = project(other);
            max_a >= min_b && max_b >= min_a
        })
    }

    /// Distance between the two outlines, zero if they overlap.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        if self.overlaps(other) {
            return 0.0;
        }

        let corner_to_edges = |corners: &[Vector2<f32>; 4], footprint: &Self| {
            corners
                .iter()
                .flat_map(|corner| {
                    footprint
                        .edges()
                        .map(move |(start, end)| point_to_segment(corner, &start, &end))
                })
                .fold(f32::MAX, f32::min)
        };

        corner_to_edges(&self.corners, other).min(corner_to_edges(&other.corners, self))
    }
}

fn point_to_segment(point: &Vector2<f32>, start: &Vector2<f32>, end: &Vector2<f32>) -> f32 {
    let segment = end - start;
    let length_squared = segment.norm_squared();
    let t = if length_squared > 0.0 {
        ((point - start).dot(&segment) / length_squared).clamp(0.0, 1.0)
    } else {
        0.0
    };

    (point - (start + segment * t)).norm()
}

/// Whether the left sole lies on the left side of the right sole.
fn feet_uncrossed(left: &Footprint, right_ankle: &Isometry3<f32>, right: &Footprint) -> bool {
    let lateral = (right_ankle.rotation * Vector3::y()).xy();
    (left.center() - right.center()).dot(&lateral) > 0.0
}

/// Rejects a trajectory in which the soles overlap, cross, or come closer than `min_distance`.
pub fn check(
    waypoints: &[Waypoint],
    sole_offsets: &Feet<Vector3<f32>>,
    sole: &SoleConfig,
    min_distance: f32,
) -> Result<(), GenerationError> {
    for (index, waypoint) in waypoints.iter().enumerate() {
        let left = Footprint::new(&waypoint.ankles.left, &sole_offsets.left, sole);
        let right = Footprint::new(&waypoint.ankles.right, &sole_offsets.right, sole);

        let distance = if feet_uncrossed(&left, &waypoint.ankles.right, &right) {
            left.distance(&right)
        } else {
            0.0
        };

        if distance < min_distance {
            return Err(GenerationError::FootCollision { index, distance });
        }
    }

    Ok(())
}
