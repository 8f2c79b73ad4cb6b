//! Prediction quality metrics.
use linfa::Float;
use ndarray::{ArrayBase, Data, Ix1, Zip};

/// Euclidean norm of the difference between `reference` and `prediction` values
///
/// # Panics
///
/// When arrays lengths differ.
pub fn error_norm<F: Float>(
    reference: &ArrayBase<impl Data<Elem = F>, Ix1>,
    prediction: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> F {
    Zip::from(reference)
        .and(prediction)
        .fold(F::zero(), |acc, &r, &p| acc + (r - p) * (r - p))
        .sqrt()
}
