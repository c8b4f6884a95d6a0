use crate::{CovMat, CrossCovMat, Error, Result, StateVec};

/// Outcome of an error-state Kalman correction.
///
/// The `error` still has to be injected into the nominal state by the caller, since only the
/// caller knows how its state is parameterised (additive, quaternion, rotation matrix...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction<const D: usize> {
    pub error: StateVec<D>,
    pub covariance: CovMat<D>,
}

/// Forces a covariance matrix to be symmetric.
#[must_use]
pub fn symmetrize<const D: usize>(covariance: &CovMat<D>) -> CovMat<D> {
    (covariance + covariance.transpose()) * 0.5
}

/// Propagates a covariance through a linearised transition: `F * P * F^T + Q`.
#[must_use]
pub fn propagate_covariance<const D: usize>(
    covariance: &CovMat<D>,
    transition: &CovMat<D>,
    process_noise: &CovMat<D>,
) -> CovMat<D> {
    symmetrize(&(transition * covariance * transition.transpose() + process_noise))
}

/// Computes the Kalman correction for a linearised measurement.
///
/// `jacobian` maps the error state onto the measurement space, `innovation` is
/// `measured - predicted`. The covariance is updated in Joseph form.
pub fn correct<const D: usize, const M: usize>(
    covariance: &CovMat<D>,
    jacobian: &CrossCovMat<M, D>,
    measurement_noise: &CovMat<M>,
    innovation: &StateVec<M>,
) -> Result<Correction<D>> {
    let innovation_covariance = jacobian * covariance * jacobian.transpose() + measurement_noise;
    let inverse = innovation_covariance
        .try_inverse()
        .ok_or(Error::Inversion)?;

    let gain: CrossCovMat<D, M> = covariance * jacobian.transpose() * inverse;
    let error = gain * innovation;

    let identity_minus_kh = CovMat::<D>::identity() - gain * jacobian;
    let updated = identity_minus_kh * covariance * identity_minus_kh.transpose()
        + gain * measurement_noise * gain.transpose();

    if error.iter().chain(updated.iter()).any(|value| !value.is_finite()) {
        return Err(Error::NonFinite);
    }

    Ok(Correction {
        error,
        covariance: symmetrize(&updated),
    })
}
