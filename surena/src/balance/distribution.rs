//! Splitting the desired load between the feet in double support.
use nalgebra::Vector2;

use crate::{
    config::DistributionKind,
    types::{Feet, ForceTorque},
};

/// Distances below which both feet count as coinciding with the ZMP, in m.
const DEGENERATE_DISTANCE: f32 = 1e-6;

/// Decides which share of the load each foot carries.
pub trait DistributionPolicy: Send + Sync {
    /// Load share of each foot for the desired ZMP, the shares sum to one.
    fn weights(&self, zmp: &Vector2<f32>, soles: &Feet<Vector2<f32>>) -> Feet<f32>;
}

/// The foot closer to the desired ZMP carries more load, in inverse proportion to its distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct InverseDistancePolicy;

impl DistributionPolicy for InverseDistancePolicy {
    fn weights(&self, zmp: &Vector2<f32>, soles: &Feet<Vector2<f32>>) -> Feet<f32> {
        let left = (soles.left - zmp).norm();
        let right = (soles.right - zmp).norm();
        let total = left + right;

        if !total.is_finite() || total < DEGENERATE_DISTANCE {
            return Feet::both(0.5);
        }

        Feet::new(right / total, left / total)
    }
}

/// Both feet always carry half of the load.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvenPolicy;

impl DistributionPolicy for EvenPolicy {
    fn weights(&self, _zmp: &Vector2<f32>, _soles: &Feet<Vector2<f32>>) -> Feet<f32> {
        Feet::both(0.5)
    }
}

#[must_use]
pub fn create_policy(kind: DistributionKind) -> Box<dyn DistributionPolicy> {
    match kind {
        DistributionKind::InverseDistance => Box::new(InverseDistancePolicy),
        DistributionKind::Even => Box::new(EvenPolicy),
    }
}

/// Splits a desired total wrench according to `weights`.
#[must_use]
pub fn distribute_wrench(total: &ForceTorque, weights: &Feet<f32>) -> Feet<ForceTorque> {
    Feet::new(total.scaled(weights.left), total.scaled(weights.right))
}

/// Splits the expected summed contact sensor value according to `weights`.
#[must_use]
pub fn distribute_bump(total: f32, weights: &Feet<f32>) -> Feet<f32> {
    Feet::new(total * weights.left, total * weights.right)
}
