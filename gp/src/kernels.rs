//! Covariance kernels used to build the covariance tiles.
//!
//! Only the squared exponential kernel is implemented:
//!
//! `k(x, x') = v * exp(-0.5 * ||x - x'||² / l²)`
//!
//! with `l` the lengthscale and `v` the vertical lengthscale.

use crate::parameters::KernelParams;
use linfa::Float;
use ndarray::{ArrayBase, Data, Ix1, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A trait for covariance functions `k(x, x')` parameterized by [KernelParams]
pub trait CovarianceKernel<F: Float>:
    Clone + Copy + Default + fmt::Display + Send + Sync + 'static
{
    /// Covariance between `x` and `y`
    fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        params: &KernelParams<F>,
    ) -> F;

    /// Derivatives of the covariance between `x` and `y` with respect to
    /// the lengthscale and the vertical lengthscale
    fn gradient(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        params: &KernelParams<F>,
    ) -> (F, F);
}

/// Squared exponential covariance kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct SquaredExponentialKernel();

impl From<SquaredExponentialKernel> for String {
    fn from(_item: SquaredExponentialKernel) -> String {
        "SquaredExponential".to_string()
    }
}

impl TryFrom<String> for SquaredExponentialKernel {
    type Error = &'static str;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "SquaredExponential" {
            Ok(Self::default())
        } else {
            Err("Bad string value for SquaredExponentialKernel, should be \'SquaredExponential\'")
        }
    }
}

fn squared_distance<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> F {
    Zip::from(x).and(y).fold(F::zero(), |acc, &a, &b| {
        let d = a - b;
        acc + d * d
    })
}

impl<F: Float> CovarianceKernel<F> for SquaredExponentialKernel {
    fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        params: &KernelParams<F>,
    ) -> F {
        let l = params.lengthscale;
        params.vertical_lengthscale * F::exp(F::cast(-0.5) * squared_distance(x, y) / (l * l))
    }

    /// `∂k/∂l = k * d² / l³` and `∂k/∂v = exp(-0.5 * d² / l²)`
    fn gradient(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        params: &KernelParams<F>,
    ) -> (F, F) {
        let l = params.lengthscale;
        let d2 = squared_distance(x, y);
        let r = F::exp(F::cast(-0.5) * d2 / (l * l));
        (params.vertical_lengthscale * r * d2 / (l * l * l), r)
    }
}

impl fmt::Display for SquaredExponentialKernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SquaredExponential")
    }
}
