//! Allocation-free filter building blocks shared by the estimators.
//!
//! Everything in here works on statically sized [`nalgebra`] matrices, so the dimensions of a
//! filter are checked at compile time and no heap allocation happens in the control loop.
mod ekf;
pub mod lie;
mod low_pass;

use nalgebra::{SMatrix, SVector};
use thiserror::Error;

pub use ekf::{Correction, correct, propagate_covariance, symmetrize};
pub use low_pass::ButterworthLpf;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Innovation covariance is not invertible")]
    Inversion,
    #[error("Filter produced a non-finite value")]
    NonFinite,
}

pub type Result<T> = std::result::Result<T, Error>;

pub type StateVec<const D: usize> = SVector<f32, D>;
pub type CovMat<const D: usize> = SMatrix<f32, D, D>;
pub type CrossCovMat<const D1: usize, const D2: usize> = SMatrix<f32, D1, D2>;
