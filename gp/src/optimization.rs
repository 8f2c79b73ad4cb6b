//! Adam update of the kernel hyperparameters.
//!
//! Hyperparameters are updated in an unconstrained space through the softplus
//! transformation `p = ln(1 + exp(θ))`, the gradient with respect to `p` being
//! chained through `∂p/∂θ = sigmoid(θ)`. Updated values thus stay strictly positive.
use crate::errors::{GpError, Result};
use crate::parameters::{AdamValidParams, KernelParams, TrainableParams};
use linfa::Float;
use log::warn;

const SOFTPLUS_LINEAR_THRESHOLD: f64 = 20.;

/// `ln(1 + exp(x))`
pub(crate) fn softplus<F: Float>(x: F) -> F {
    if x > F::cast(SOFTPLUS_LINEAR_THRESHOLD) {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// Inverse of [softplus], `p` being strictly positive
pub(crate) fn inverse_softplus<F: Float>(p: F) -> F {
    if p > F::cast(SOFTPLUS_LINEAR_THRESHOLD) {
        p
    } else {
        // ln(exp(p) - 1) = p + ln(1 - exp(-p))
        p + (-(-p).exp_m1()).ln()
    }
}

/// Derivative of [softplus]
pub(crate) fn sigmoid<F: Float>(x: F) -> F {
    F::one() / (F::one() + (-x).exp())
}

/// Check that trainable hyperparameters can be moved to the unconstrained space
pub(crate) fn check_trainable_positive<F: Float>(
    params: &KernelParams<F>,
    trainable: &TrainableParams,
) -> Result<()> {
    for hyperparameter in trainable.iter() {
        let value = params.get(hyperparameter);
        if !(value > F::zero()) {
            warn!(
                "Trainable {} should be strictly positive to be optimized, got {}",
                hyperparameter, value
            );
            return Err(GpError::InvalidValueError(format!(
                "trainable {hyperparameter} should be strictly positive, got {value}"
            )));
        }
    }
    Ok(())
}

/// Apply one Adam step to the trainable hyperparameters of `params` given the
/// loss `gradient`, updating the moment estimates stored in `adam`.
/// `iteration` is zero based.
pub(crate) fn adam_step<F: Float>(
    params: &mut KernelParams<F>,
    gradient: &[F; 3],
    trainable: &TrainableParams,
    adam: &mut AdamValidParams<F>,
    iteration: usize,
) {
    let t = F::cast(iteration + 1);
    let (beta1, beta2) = (adam.beta1, adam.beta2);
    for hyperparameter in trainable.iter() {
        let idx = hyperparameter.index();
        let theta = inverse_softplus(params.get(hyperparameter));
        let g = gradient[idx] * sigmoid(theta);

        adam.m_t[idx] = beta1 * adam.m_t[idx] + (F::one() - beta1) * g;
        adam.v_t[idx] = beta2 * adam.v_t[idx] + (F::one() - beta2) * g * g;
        let m_hat = adam.m_t[idx] / (F::one() - beta1.powf(t));
        let v_hat = adam.v_t[idx] / (F::one() - beta2.powf(t));

        let theta = theta - adam.learning_rate * m_hat / (v_hat.sqrt() + adam.epsilon);
        params.set(hyperparameter, softplus(theta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{AdamParams, Hyperparameter};
    use approx::assert_abs_diff_eq;
    use linfa::ParamGuard;

    #[test]
    fn test_softplus() {
        for p in [1e-3f64, 0.1, 1., 5., 30.] {
            assert_abs_diff_eq!(softplus(inverse_softplus(p)), p, epsilon = 1e-12 * p.max(1.));
        }
        assert_abs_diff_eq!(softplus(0.), 2f64.ln(), epsilon = 1e-15);
        assert_abs_diff_eq!(sigmoid(0.), 0.5, epsilon = 1e-15);
        assert!(softplus(-50.) > 0.);
    }

    #[test]
    fn test_first_adam_step() {
        // with zero moments the first bias corrected step is lr * sign(g)
        let mut params = KernelParams::new(1., 2., 0.5);
        let mut adam = AdamParams::new().learning_rate(0.1).check().unwrap();
        let trainable = TrainableParams::default();
        adam_step(&mut params, &[2., -3., 0.], &trainable, &mut adam, 0);

        let expected_l = softplus(inverse_softplus(1.) - 0.1);
        let expected_v = softplus(inverse_softplus(2.) + 0.1);
        assert_abs_diff_eq!(params.lengthscale, expected_l, epsilon = 1e-6);
        assert_abs_diff_eq!(params.vertical_lengthscale, expected_v, epsilon = 1e-6);
        assert_abs_diff_eq!(params.noise_variance, 0.5, epsilon = 1e-15);

        let g = 2. * sigmoid(inverse_softplus(1.));
        assert_abs_diff_eq!(adam.m_t()[0], 0.1 * g, epsilon = 1e-12);
        assert_abs_diff_eq!(adam.v_t()[0], 0.001 * g * g, epsilon = 1e-12);
    }

    #[test]
    fn test_non_trainable_untouched() {
        let mut params = KernelParams::new(1.3, 0.7, 0.1);
        let mut adam = AdamParams::new().check().unwrap();
        let trainable = TrainableParams::from([true, false, false]);
        for iteration in 0..5 {
            adam_step(&mut params, &[1., 1., 1.], &trainable, &mut adam, iteration);
        }
        assert!(params.lengthscale < 1.3);
        assert_eq!(params.vertical_lengthscale, 0.7);
        assert_eq!(params.noise_variance, 0.1);
        assert_eq!(adam.m_t()[1], 0.);
        assert_eq!(adam.v_t()[2], 0.);
    }

    #[test]
    fn test_check_trainable_positive() {
        let params = KernelParams::new(1., 1., 0.);
        assert!(check_trainable_positive(&params, &TrainableParams::default()).is_err());
        let trainable = TrainableParams::from([true, true, false]);
        assert!(check_trainable_positive(&params, &trainable).is_ok());
        assert_eq!(Hyperparameter::NoiseVariance.index(), 2);
    }
}
