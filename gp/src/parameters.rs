use crate::errors::{GpError, Result};
use linfa::{Float, ParamGuard};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trainable hyperparameters of the covariance kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Hyperparameter {
    /// Lengthscale `l`
    Lengthscale,
    /// Vertical lengthscale (signal variance) `v`
    VerticalLengthscale,
    /// Noise variance `n` added on the diagonal of the training covariance
    NoiseVariance,
}

impl Hyperparameter {
    /// All hyperparameters, ordered by index
    pub const ALL: [Hyperparameter; 3] = [
        Hyperparameter::Lengthscale,
        Hyperparameter::VerticalLengthscale,
        Hyperparameter::NoiseVariance,
    ];

    /// Slot of the hyperparameter in gradients and Adam moment vectors
    pub fn index(&self) -> usize {
        match self {
            Hyperparameter::Lengthscale => 0,
            Hyperparameter::VerticalLengthscale => 1,
            Hyperparameter::NoiseVariance => 2,
        }
    }
}

impl fmt::Display for Hyperparameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Hyperparameter::Lengthscale => "lengthscale",
            Hyperparameter::VerticalLengthscale => "vertical_lengthscale",
            Hyperparameter::NoiseVariance => "noise_variance",
        };
        write!(f, "{name}")
    }
}

/// Squared exponential kernel hyperparameters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct KernelParams<F: Float> {
    /// Lengthscale, strictly positive
    pub lengthscale: F,
    /// Vertical lengthscale, strictly positive
    pub vertical_lengthscale: F,
    /// Noise variance, positive or zero
    pub noise_variance: F,
}

impl<F: Float> Default for KernelParams<F> {
    fn default() -> Self {
        KernelParams {
            lengthscale: F::one(),
            vertical_lengthscale: F::one(),
            noise_variance: F::cast(0.1),
        }
    }
}

impl<F: Float> From<[F; 3]> for KernelParams<F> {
    fn from(values: [F; 3]) -> Self {
        KernelParams::new(values[0], values[1], values[2])
    }
}

impl<F: Float> KernelParams<F> {
    /// Constructor
    pub fn new(lengthscale: F, vertical_lengthscale: F, noise_variance: F) -> Self {
        KernelParams {
            lengthscale,
            vertical_lengthscale,
            noise_variance,
        }
    }

    /// Value of the given hyperparameter
    pub fn get(&self, hyperparameter: Hyperparameter) -> F {
        match hyperparameter {
            Hyperparameter::Lengthscale => self.lengthscale,
            Hyperparameter::VerticalLengthscale => self.vertical_lengthscale,
            Hyperparameter::NoiseVariance => self.noise_variance,
        }
    }

    /// Set the given hyperparameter
    pub fn set(&mut self, hyperparameter: Hyperparameter, value: F) {
        match hyperparameter {
            Hyperparameter::Lengthscale => self.lengthscale = value,
            Hyperparameter::VerticalLengthscale => self.vertical_lengthscale = value,
            Hyperparameter::NoiseVariance => self.noise_variance = value,
        }
    }

    /// Check `lengthscale > 0`, `vertical_lengthscale > 0` and `noise_variance >= 0`
    pub fn check(&self) -> Result<()> {
        if !(self.lengthscale.is_finite() && self.lengthscale > F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "lengthscale should be strictly positive, got {}",
                self.lengthscale
            )));
        }
        if !(self.vertical_lengthscale.is_finite() && self.vertical_lengthscale > F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "vertical_lengthscale should be strictly positive, got {}",
                self.vertical_lengthscale
            )));
        }
        if !(self.noise_variance.is_finite() && self.noise_variance >= F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "noise_variance should be positive or zero, got {}",
                self.noise_variance
            )));
        }
        Ok(())
    }
}

/// Selects which hyperparameters are updated during optimization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct TrainableParams {
    /// Whether lengthscale is optimized
    pub lengthscale: bool,
    /// Whether vertical lengthscale is optimized
    pub vertical_lengthscale: bool,
    /// Whether noise variance is optimized
    pub noise_variance: bool,
}

impl Default for TrainableParams {
    fn default() -> Self {
        TrainableParams {
            lengthscale: true,
            vertical_lengthscale: true,
            noise_variance: true,
        }
    }
}

impl From<[bool; 3]> for TrainableParams {
    fn from(mask: [bool; 3]) -> Self {
        TrainableParams {
            lengthscale: mask[0],
            vertical_lengthscale: mask[1],
            noise_variance: mask[2],
        }
    }
}

impl TrainableParams {
    /// Whether `hyperparameter` is optimized
    pub fn is_trainable(&self, hyperparameter: Hyperparameter) -> bool {
        match hyperparameter {
            Hyperparameter::Lengthscale => self.lengthscale,
            Hyperparameter::VerticalLengthscale => self.vertical_lengthscale,
            Hyperparameter::NoiseVariance => self.noise_variance,
        }
    }

    /// Trainable hyperparameters
    pub fn iter(&self) -> impl Iterator<Item = Hyperparameter> + '_ {
        Hyperparameter::ALL
            .into_iter()
            .filter(|h| self.is_trainable(*h))
    }
}

/// A set of validated Adam optimizer parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct AdamValidParams<F: Float> {
    pub(crate) learning_rate: F,
    pub(crate) beta1: F,
    pub(crate) beta2: F,
    pub(crate) epsilon: F,
    pub(crate) opt_iter: usize,
    /// First moment estimates, one slot per [Hyperparameter]
    pub(crate) m_t: [F; 3],
    /// Second moment estimates, one slot per [Hyperparameter]
    pub(crate) v_t: [F; 3],
}

impl<F: Float> Default for AdamValidParams<F> {
    fn default() -> AdamValidParams<F> {
        AdamValidParams {
            learning_rate: F::cast(0.001),
            beta1: F::cast(0.9),
            beta2: F::cast(0.999),
            epsilon: F::cast(1e-8),
            opt_iter: 0,
            m_t: [F::zero(); 3],
            v_t: [F::zero(); 3],
        }
    }
}

impl<F: Float> AdamValidParams<F> {
    /// Get step size
    pub fn learning_rate(&self) -> F {
        self.learning_rate
    }

    /// Get exponential decay rate of the first moment estimates
    pub fn beta1(&self) -> F {
        self.beta1
    }

    /// Get exponential decay rate of the second moment estimates
    pub fn beta2(&self) -> F {
        self.beta2
    }

    /// Get the constant avoiding division by zero
    pub fn epsilon(&self) -> F {
        self.epsilon
    }

    /// Get the number of iterations run by [`TiledGp::optimize`](crate::TiledGp::optimize)
    pub fn opt_iter(&self) -> usize {
        self.opt_iter
    }

    /// Get first moment estimates
    pub fn m_t(&self) -> &[F; 3] {
        &self.m_t
    }

    /// Get second moment estimates
    pub fn v_t(&self) -> &[F; 3] {
        &self.v_t
    }
}

impl<F: Float> fmt::Display for AdamValidParams<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "AdamParams: [learning_rate={}, beta1={}, beta2={}, epsilon={}, opt_iter={}, m_t={:?}, v_t={:?}]",
            self.learning_rate, self.beta1, self.beta2, self.epsilon, self.opt_iter, self.m_t, self.v_t
        )
    }
}

#[derive(Clone, Debug, Default)]
/// The set of parameters of the Adam optimizer used to tune
/// the [TiledGp](crate::TiledGp) hyperparameters.
pub struct AdamParams<F: Float>(AdamValidParams<F>);

impl<F: Float> AdamParams<F> {
    /// A constructor for Adam parameters with default values
    pub fn new() -> AdamParams<F> {
        Self(AdamValidParams::default())
    }

    /// Set step size.
    pub fn learning_rate(mut self, learning_rate: F) -> Self {
        self.0.learning_rate = learning_rate;
        self
    }

    /// Set exponential decay rate of the first moment estimates, in `[0, 1)`.
    pub fn beta1(mut self, beta1: F) -> Self {
        self.0.beta1 = beta1;
        self
    }

    /// Set exponential decay rate of the second moment estimates, in `[0, 1)`.
    pub fn beta2(mut self, beta2: F) -> Self {
        self.0.beta2 = beta2;
        self
    }

    /// Set the constant avoiding division by zero.
    pub fn epsilon(mut self, epsilon: F) -> Self {
        self.0.epsilon = epsilon;
        self
    }

    /// Set the number of iterations.
    pub fn opt_iter(mut self, opt_iter: usize) -> Self {
        self.0.opt_iter = opt_iter;
        self
    }

    /// Set initial first moment estimates.
    pub fn m_t(mut self, m_t: [F; 3]) -> Self {
        self.0.m_t = m_t;
        self
    }

    /// Set initial second moment estimates.
    pub fn v_t(mut self, v_t: [F; 3]) -> Self {
        self.0.v_t = v_t;
        self
    }
}

impl<F: Float> From<AdamValidParams<F>> for AdamParams<F> {
    fn from(valid: AdamValidParams<F>) -> Self {
        AdamParams(valid)
    }
}

impl<F: Float> ParamGuard for AdamParams<F> {
    type Checked = AdamValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if !(p.learning_rate.is_finite() && p.learning_rate > F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "`learning_rate` should be strictly positive, got {}",
                p.learning_rate
            )));
        }
        for (name, beta) in [("beta1", p.beta1), ("beta2", p.beta2)] {
            if !(beta >= F::zero() && beta < F::one()) {
                return Err(GpError::InvalidValueError(format!(
                    "`{name}` should be in [0, 1), got {beta}"
                )));
            }
        }
        if !(p.epsilon.is_finite() && p.epsilon > F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "`epsilon` should be strictly positive, got {}",
                p.epsilon
            )));
        }
        if p.m_t.iter().any(|m| !m.is_finite())
            || p.v_t.iter().any(|v| !v.is_finite() || *v < F::zero())
        {
            return Err(GpError::InvalidValueError(
                "moment estimates should be finite, second moments positive".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_params() {
        let mut params = KernelParams::<f64>::default();
        assert_eq!(params, KernelParams::from([1., 1., 0.1]));
        params.set(Hyperparameter::NoiseVariance, 0.);
        assert_eq!(params.get(Hyperparameter::NoiseVariance), 0.);
        assert!(params.check().is_ok());
        assert!(KernelParams::new(0., 1., 0.1).check().is_err());
        assert!(KernelParams::new(1., -1., 0.1).check().is_err());
        assert!(KernelParams::new(1., 1., -0.1).check().is_err());
        assert!(KernelParams::new(f64::NAN, 1., 0.1).check().is_err());
    }

    #[test]
    fn test_trainable_params() {
        let trainable = TrainableParams::from([true, false, true]);
        assert_eq!(
            trainable.iter().collect::<Vec<_>>(),
            vec![Hyperparameter::Lengthscale, Hyperparameter::NoiseVariance]
        );
        assert_eq!(TrainableParams::default().iter().count(), 3);
        assert_eq!(Hyperparameter::NoiseVariance.index(), 2);
    }

    #[test]
    fn test_adam_params() {
        let adam = AdamParams::<f64>::new().opt_iter(10).check().unwrap();
        assert_eq!(adam.learning_rate(), 0.001);
        assert_eq!(adam.beta1(), 0.9);
        assert_eq!(adam.beta2(), 0.999);
        assert_eq!(adam.epsilon(), 1e-8);
        assert_eq!(adam.opt_iter(), 10);
        assert_eq!(adam.m_t(), &[0.; 3]);
        assert_eq!(adam.v_t(), &[0.; 3]);

        assert!(AdamParams::<f64>::new().learning_rate(0.).check().is_err());
        assert!(AdamParams::<f64>::new().beta1(1.).check().is_err());
        assert!(AdamParams::<f64>::new().beta2(-0.1).check().is_err());
        assert!(AdamParams::<f64>::new().epsilon(0.).check().is_err());
        assert!(AdamParams::<f64>::new().v_t([0., -1., 0.]).check().is_err());
    }
}
