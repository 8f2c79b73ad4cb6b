//! Negative log marginal likelihood and its gradient computed with tiles.
//!
//! `loss = 0.5 * (yᵀ K⁻¹ y + log|K| + n log(2π))`
//!
//! `∂loss/∂θ = 0.5 * (tr(K⁻¹ ∂K/∂θ) - αᵀ ∂K/∂θ α)` with `α = K⁻¹ y`
//!
//! The trace is obtained without forming `K⁻¹`: with `W = L⁻¹` and `X = L⁻¹ ∂K/∂θ`,
//! `tr(K⁻¹ ∂K/∂θ) = tr(Wᵀ X) = Σ_ij <W_ij, X_ij>`.
use crate::generation::{
    identity_tile, schedule_covariance, schedule_output, schedule_zeros, zero_matrix_tile,
    TileGenerator, TiledSamples,
};
use crate::kernels::CovarianceKernel;
use crate::parameters::{Hyperparameter, TrainableParams};
use crate::Result;
use linfa::Float;
use log::debug;
use ndarray::ArrayView1;
use std::time::Instant;
use tilegp_tiles::blas::Transpose;
use tilegp_tiles::cholesky::schedule_cholesky;
use tilegp_tiles::products::{
    schedule_dot, schedule_frobenius_inner, schedule_log_det, schedule_matrix_vector,
};
use tilegp_tiles::triangular::{schedule_backward_substitution, schedule_forward_substitution};
use tilegp_tiles::{TaskGraph, TiledMatrix, TiledScalar, TiledVector};

fn loss_value<F: Float>(quadratic: F, log_det: F, n_samples: usize) -> F {
    let log_2pi = F::cast(2. * std::f64::consts::PI).ln();
    F::cast(0.5) * (quadratic + log_det + F::cast(n_samples) * log_2pi)
}

/// Tiles of the loss graph
struct LossTiles<F: Float> {
    k: TiledMatrix<F>,
    alpha: TiledVector<F>,
    quadratic: TiledScalar<F>,
    log_det: TiledScalar<F>,
}

impl<F: Float> LossTiles<F> {
    fn new(n_tiles: usize) -> Self {
        LossTiles {
            k: TiledMatrix::empty(n_tiles, n_tiles),
            alpha: TiledVector::empty(n_tiles),
            quadratic: TiledScalar::scalar(F::zero()),
            log_det: TiledScalar::scalar(F::zero()),
        }
    }

    /// Submit the factorization `K = L Lᵀ` and the loss terms, `alpha` holding
    /// `z = L⁻¹ y` when done
    fn schedule_loss<'a, K: CovarianceKernel<F> + 'a>(
        &'a self,
        graph: &mut TaskGraph<'a>,
        generator: TileGenerator<F, K>,
        train: TiledSamples<'a, F>,
        output: ArrayView1<'a, F>,
    ) {
        schedule_covariance(graph, generator, train, &self.k);
        schedule_output(graph, output, train.tile_size, &self.alpha);
        schedule_cholesky(graph, &self.k);
        schedule_forward_substitution(graph, &self.k, &self.alpha);
        // yᵀ K⁻¹ y = zᵀ z
        schedule_dot(graph, &self.alpha, &self.alpha, &self.quadratic);
        schedule_log_det(graph, &self.k, &self.log_det);
    }

    fn loss(self, n_samples: usize) -> F {
        loss_value(
            self.quadratic.into_scalar(),
            self.log_det.into_scalar(),
            n_samples,
        )
    }
}

/// Tiles of the gradient terms of one hyperparameter
struct GradientTiles<F: Float> {
    hyperparameter: Hyperparameter,
    /// `∂K/∂θ` then `X = L⁻¹ ∂K/∂θ`
    dk: TiledMatrix<F>,
    dk_alpha: TiledVector<F>,
    trace: TiledScalar<F>,
    quadratic: TiledScalar<F>,
}

impl<F: Float> GradientTiles<F> {
    fn new(hyperparameter: Hyperparameter, n_tiles: usize) -> Self {
        GradientTiles {
            hyperparameter,
            dk: TiledMatrix::empty(n_tiles, n_tiles),
            dk_alpha: TiledVector::empty(n_tiles),
            trace: TiledScalar::scalar(F::zero()),
            quadratic: TiledScalar::scalar(F::zero()),
        }
    }

    fn gradient(self) -> F {
        F::cast(0.5) * (self.trace.into_scalar() - self.quadratic.into_scalar())
    }
}

/// Negative log marginal likelihood of the training data
pub(crate) fn loss<F: Float, K: CovarianceKernel<F>>(
    generator: TileGenerator<F, K>,
    train: TiledSamples<F>,
    output: ArrayView1<F>,
) -> Result<F> {
    let (train, output) = (train.reborrow(), output.view());
    let n_samples = output.len();
    let tiles = LossTiles::new(train.n_tiles);
    let mut graph = TaskGraph::new();
    tiles.schedule_loss(&mut graph, generator, train, output);
    graph.run()?;
    Ok(tiles.loss(n_samples))
}

/// Negative log marginal likelihood and its gradient with respect to the
/// hyperparameters, indexed by [Hyperparameter::index]. Entries of non trainable
/// hyperparameters are not computed and left to zero.
pub(crate) fn loss_and_gradient<F: Float, K: CovarianceKernel<F>>(
    generator: TileGenerator<F, K>,
    train: TiledSamples<F>,
    output: ArrayView1<F>,
    trainable: &TrainableParams,
) -> Result<(F, [F; 3])> {
    let now = Instant::now();
    let (train, output) = (train.reborrow(), output.view());
    let n_samples = output.len();
    let n = train.n_tiles;
    let tiles = LossTiles::new(n);
    let w = TiledMatrix::empty(n, n);
    let derivatives: Vec<GradientTiles<F>> = trainable
        .iter()
        .filter(|h| *h != Hyperparameter::NoiseVariance)
        .map(|h| GradientTiles::new(h, n))
        .collect();
    let noise = trainable
        .is_trainable(Hyperparameter::NoiseVariance)
        .then(|| GradientTiles::new(Hyperparameter::NoiseVariance, 0));

    let mut graph = TaskGraph::new();
    tiles.schedule_loss(&mut graph, generator, train, output);
    let (k, alpha) = (&tiles.k, &tiles.alpha);
    schedule_backward_substitution(&mut graph, k, alpha);

    if derivatives.is_empty() && noise.is_none() {
        graph.run()?;
        return Ok((tiles.loss(n_samples), [F::zero(); 3]));
    }

    // W = L⁻¹
    let w_ref = &w;
    for i in 0..n {
        for j in 0..n {
            let size = train.tile_size;
            graph.submit("gen_identity", &[], &[w.key(i, j)], move || {
                *w_ref.write(i, j) = if i == j {
                    identity_tile(size)
                } else {
                    zero_matrix_tile(size, size)
                };
                Ok(())
            });
        }
    }
    schedule_forward_substitution(&mut graph, k, &w);

    for derivative in derivatives.iter() {
        let (dk, hyperparameter) = (&derivative.dk, derivative.hyperparameter);
        for i in 0..n {
            for j in 0..n {
                graph.submit("gen_covariance_gradient", &[], &[dk.key(i, j)], move || {
                    *dk.write(i, j) = generator.covariance_gradient_tile(
                        i,
                        j,
                        train.tile_size,
                        &train.input,
                        hyperparameter,
                    );
                    Ok(())
                });
            }
        }
        // αᵀ ∂K/∂θ α, reading ∂K/∂θ before it is overwritten by X
        schedule_zeros(&mut graph, train.tile_size, &derivative.dk_alpha);
        schedule_matrix_vector(&mut graph, dk, Transpose::NoTrans, alpha, &derivative.dk_alpha);
        schedule_dot(&mut graph, alpha, &derivative.dk_alpha, &derivative.quadratic);
        // tr(K⁻¹ ∂K/∂θ) = <W, L⁻¹ ∂K/∂θ>
        schedule_forward_substitution(&mut graph, k, dk);
        schedule_frobenius_inner(&mut graph, &w, dk, &derivative.trace);
    }
    if let Some(noise) = noise.as_ref() {
        // ∂K/∂θ = I
        schedule_frobenius_inner(&mut graph, &w, &w, &noise.trace);
        schedule_dot(&mut graph, alpha, alpha, &noise.quadratic);
    }

    debug!("Loss and gradient graph: {} tasks", graph.len());
    graph.run()?;

    let mut gradient = [F::zero(); 3];
    for derivative in derivatives.into_iter().chain(noise) {
        let index = derivative.hyperparameter.index();
        gradient[index] = derivative.gradient();
    }
    let loss = tiles.loss(n_samples);
    debug!(
        "loss = {}, gradient = {:?} computed in {:?}",
        loss,
        gradient,
        now.elapsed()
    );
    Ok((loss, gradient))
}
