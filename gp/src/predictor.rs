//! Posterior mean, variance and covariance computed with tiles.
//!
//! With `K` the training covariance (noise included), `L` its Cholesky factor,
//! `K*` the test/training cross covariance and `K**` the noise-free test covariance:
//! * mean: `K* α` with `α = K⁻¹ y`,
//! * covariance: `K** - Vᵀ V` with `V = L⁻¹ K*ᵀ`, variance being its diagonal.
use crate::generation::{
    schedule_covariance, schedule_cross_covariance, schedule_output, schedule_zeros,
    transpose_tile, TileGenerator, TiledSamples,
};
use crate::kernels::CovarianceKernel;
use crate::Result;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView1};
use tilegp_tiles::blas::Transpose;
use tilegp_tiles::cholesky::schedule_cholesky;
use tilegp_tiles::products::{schedule_gram, schedule_gram_diagonal, schedule_matrix_vector};
use tilegp_tiles::triangular::{schedule_backward_substitution, schedule_forward_substitution};
use tilegp_tiles::{TaskGraph, TiledMatrix, TiledVector};

/// Tiles shared by every prediction graph
struct PosteriorTiles<F: Float> {
    k: TiledMatrix<F>,
    alpha: TiledVector<F>,
    cross: TiledMatrix<F>,
    mean: TiledVector<F>,
}

impl<F: Float> PosteriorTiles<F> {
    fn new(n_tiles: usize, m_tiles: usize) -> Self {
        PosteriorTiles {
            k: TiledMatrix::empty(n_tiles, n_tiles),
            alpha: TiledVector::empty(n_tiles),
            cross: TiledMatrix::empty(m_tiles, n_tiles),
            mean: TiledVector::empty(m_tiles),
        }
    }

    /// Submit the factorization of `K`, the solve of `α` and the mean product
    fn schedule_mean<'a, K: CovarianceKernel<F> + 'a>(
        &'a self,
        graph: &mut TaskGraph<'a>,
        generator: TileGenerator<F, K>,
        train: TiledSamples<'a, F>,
        output: ArrayView1<'a, F>,
        test: TiledSamples<'a, F>,
    ) {
        schedule_covariance(graph, generator, train, &self.k);
        schedule_output(graph, output, train.tile_size, &self.alpha);
        schedule_cholesky(graph, &self.k);
        schedule_forward_substitution(graph, &self.k, &self.alpha);
        schedule_backward_substitution(graph, &self.k, &self.alpha);

        schedule_cross_covariance(graph, generator, test, train, &self.cross);
        schedule_zeros(graph, test.tile_size, &self.mean);
        schedule_matrix_vector(graph, &self.cross, Transpose::NoTrans, &self.alpha, &self.mean);
    }

    /// Submit the computation of `V = L⁻¹ K*ᵀ` in place of `v` tiles,
    /// once the factorization is scheduled
    fn schedule_v<'a>(&'a self, graph: &mut TaskGraph<'a>, v: &'a TiledMatrix<F>) {
        let cross = &self.cross;
        for i in 0..cross.n_rows() {
            for j in 0..cross.n_cols() {
                graph.submit("transpose", &[cross.key(i, j)], &[v.key(j, i)], move || {
                    let tile = cross.read(i, j);
                    *v.write(j, i) = transpose_tile(tile.nrows(), tile.ncols(), &*tile);
                    Ok(())
                });
            }
        }
        schedule_forward_substitution(graph, &self.k, v);
    }
}

/// Posterior mean at `test` samples
pub(crate) fn predict<F: Float, K: CovarianceKernel<F>>(
    generator: TileGenerator<F, K>,
    train: TiledSamples<F>,
    output: ArrayView1<F>,
    test: TiledSamples<F>,
) -> Result<Array1<F>> {
    let (train, output, test) = (train.reborrow(), output.view(), test.reborrow());
    let tiles = PosteriorTiles::new(train.n_tiles, test.n_tiles);
    let mut graph = TaskGraph::new();
    tiles.schedule_mean(&mut graph, generator, train, output, test);
    graph.run()?;
    Ok(tiles.mean.into_vector())
}

/// Posterior mean and variance at `test` samples
pub(crate) fn predict_with_uncertainty<F: Float, K: CovarianceKernel<F>>(
    generator: TileGenerator<F, K>,
    train: TiledSamples<F>,
    output: ArrayView1<F>,
    test: TiledSamples<F>,
) -> Result<(Array1<F>, Array1<F>)> {
    let (train, output, test) = (train.reborrow(), output.view(), test.reborrow());
    let tiles = PosteriorTiles::new(train.n_tiles, test.n_tiles);
    let v = TiledMatrix::empty(train.n_tiles, test.n_tiles);
    let variance = TiledVector::empty(test.n_tiles);
    let mut graph = TaskGraph::new();
    tiles.schedule_mean(&mut graph, generator, train, output, test);
    tiles.schedule_v(&mut graph, &v);

    let variance_ref = &variance;
    for i in 0..test.n_tiles {
        graph.submit("gen_prior_variance", &[], &[variance.key(i, 0)], move || {
            *variance_ref.write(i, 0) =
                generator.prior_variance_tile(i, test.tile_size, &test.input);
            Ok(())
        });
    }
    schedule_gram_diagonal(&mut graph, &v, &variance);
    for i in 0..test.n_tiles {
        graph.submit("clamp_variance", &[], &[variance.key(i, 0)], move || {
            // Variance might be slightly negative depending on machine precision:
            // set to zero in that case
            variance_ref
                .write(i, 0)
                .mapv_inplace(|var| if var < F::zero() { F::zero() } else { var });
            Ok(())
        });
    }
    graph.run()?;
    Ok((tiles.mean.into_vector(), variance.into_vector()))
}

/// Posterior mean and full covariance at `test` samples
pub(crate) fn predict_with_full_cov<F: Float, K: CovarianceKernel<F>>(
    generator: TileGenerator<F, K>,
    train: TiledSamples<F>,
    output: ArrayView1<F>,
    test: TiledSamples<F>,
) -> Result<(Array1<F>, Array2<F>)> {
    let (train, output, test) = (train.reborrow(), output.view(), test.reborrow());
    let tiles = PosteriorTiles::new(train.n_tiles, test.n_tiles);
    let v = TiledMatrix::empty(train.n_tiles, test.n_tiles);
    let cov = TiledMatrix::empty(test.n_tiles, test.n_tiles);
    let mut graph = TaskGraph::new();
    tiles.schedule_mean(&mut graph, generator, train, output, test);
    tiles.schedule_v(&mut graph, &v);

    let cov_ref = &cov;
    for i in 0..test.n_tiles {
        for j in 0..test.n_tiles {
            graph.submit("gen_full_prior_covariance", &[], &[cov.key(i, j)], move || {
                *cov_ref.write(i, j) =
                    generator.full_prior_covariance_tile(i, j, test.tile_size, &test.input);
                Ok(())
            });
        }
    }
    schedule_gram(&mut graph, &v, &cov);
    for i in 0..test.n_tiles {
        graph.submit("clamp_variance", &[], &[cov.key(i, i)], move || {
            let mut tile = cov_ref.write(i, i);
            tile.diag_mut()
                .mapv_inplace(|var| if var < F::zero() { F::zero() } else { var });
            Ok(())
        });
    }
    graph.run()?;
    Ok((tiles.mean.into_vector(), cov.into_dense()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::SquaredExponentialKernel;
    use crate::parameters::KernelParams;
    use approx::assert_abs_diff_eq;
    use linfa_linalg::{cholesky::*, triangular::*};
    use ndarray::{Array, Axis};

    fn dense_covariance(
        generator: &TileGenerator<f64, SquaredExponentialKernel>,
        x: &Array2<f64>,
        y: &Array2<f64>,
    ) -> Array2<f64> {
        generator.cross_covariance_tile(0, 0, x.nrows(), y.nrows(), &x.view(), &y.view())
    }

    #[test]
    fn test_posterior_matches_dense_computation() {
        let xt = Array::linspace(0., 4., 8).insert_axis(Axis(1));
        let yt = xt.column(0).mapv(|x: f64| x.sin());
        let xs = Array::linspace(-0.5, 4.5, 6).insert_axis(Axis(1));
        let generator =
            TileGenerator::new(SquaredExponentialKernel(), KernelParams::new(0.8, 1.2, 0.05));

        let train = TiledSamples {
            input: xt.view(),
            n_tiles: 4,
            tile_size: 2,
        };
        let test = TiledSamples {
            input: xs.view(),
            n_tiles: 2,
            tile_size: 3,
        };
        let (mean, cov) = predict_with_full_cov(generator, train, yt.view(), test).unwrap();
        let (mean2, var) = predict_with_uncertainty(generator, train, yt.view(), test).unwrap();
        let mean3 = predict(generator, train, yt.view(), test).unwrap();

        let k = dense_covariance(&generator, &xt, &xt) + Array2::<f64>::eye(8) * 0.05;
        let ks = dense_covariance(&generator, &xs, &xt);
        let kss = dense_covariance(&generator, &xs, &xs);
        let l = k.cholesky().unwrap();
        let z = l
            .solve_triangular(&yt.clone().insert_axis(Axis(1)), UPLO::Lower)
            .unwrap();
        let alpha = l.t().solve_triangular(&z, UPLO::Upper).unwrap();
        let alpha = alpha.column(0);
        let v = l.solve_triangular(&ks.t().to_owned(), UPLO::Lower).unwrap();
        let expected_cov = &kss - &v.t().dot(&v);

        assert_abs_diff_eq!(mean, ks.dot(&alpha), epsilon = 1e-10);
        assert_abs_diff_eq!(mean2, mean, epsilon = 1e-12);
        assert_abs_diff_eq!(mean3, mean, epsilon = 1e-12);
        assert_abs_diff_eq!(cov, expected_cov, epsilon = 1e-10);
        assert_abs_diff_eq!(var, cov.diag(), epsilon = 1e-12);
        assert!(var.iter().all(|v| *v >= 0.));
    }
}
