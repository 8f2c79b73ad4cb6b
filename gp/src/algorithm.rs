use crate::errors::{GpError, Result};
use crate::generation::{schedule_covariance, TileGenerator, TiledSamples};
use crate::kernels::{CovarianceKernel, SquaredExponentialKernel};
use crate::likelihood::{loss, loss_and_gradient};
use crate::optimization::{adam_step, check_trainable_positive};
use crate::parameters::{AdamValidParams, KernelParams, TrainableParams};
use crate::predictor::{predict, predict_with_full_cov, predict_with_uncertainty};
use crate::tiling::check_geometry;
use linfa::Float;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use std::fmt;
use std::time::Instant;
use tilegp_tiles::cholesky::schedule_cholesky;
use tilegp_tiles::{TaskGraph, TiledMatrix};

/// Gaussian process regression model computed with tiled covariance matrices.
///
/// Training samples are split in `n_tiles` contiguous tiles of `n_tile_size` samples.
/// Every operation builds a graph of tile tasks which is run on the rayon thread pool,
/// the factorization of the training covariance is recomputed at each call.
#[derive(Clone, Debug)]
pub struct TiledGp<F: Float, K: CovarianceKernel<F> = SquaredExponentialKernel> {
    /// Training inputs, one sample per row
    training_input: Array2<F>,
    /// Training outputs
    training_output: Array1<F>,
    n_tiles: usize,
    n_tile_size: usize,
    /// Kernel hyperparameters, updated by the optimization
    params: KernelParams<F>,
    trainable: TrainableParams,
    kernel: K,
}

impl<F: Float> TiledGp<F, SquaredExponentialKernel> {
    /// Constructor of a squared exponential kernel GP.
    ///
    /// Returns an error when `n_tiles * n_tile_size` does not match the number of
    /// training samples or when hyperparameters are out of their domain.
    pub fn new(
        training_input: Array2<F>,
        training_output: Array1<F>,
        n_tiles: usize,
        n_tile_size: usize,
        params: KernelParams<F>,
        trainable: TrainableParams,
    ) -> Result<Self> {
        Self::with_kernel(
            SquaredExponentialKernel::default(),
            training_input,
            training_output,
            n_tiles,
            n_tile_size,
            params,
            trainable,
        )
    }
}

impl<F: Float, K: CovarianceKernel<F>> TiledGp<F, K> {
    /// Constructor with a given covariance kernel
    pub fn with_kernel(
        kernel: K,
        training_input: Array2<F>,
        training_output: Array1<F>,
        n_tiles: usize,
        n_tile_size: usize,
        params: KernelParams<F>,
        trainable: TrainableParams,
    ) -> Result<Self> {
        if training_input.nrows() != training_output.len() {
            return Err(GpError::InvalidValueError(format!(
                "training input ({} samples) and output ({} values) sizes mismatch",
                training_input.nrows(),
                training_output.len()
            )));
        }
        if training_input.ncols() == 0 {
            return Err(GpError::InvalidValueError(
                "training input should have at least one regressor".to_string(),
            ));
        }
        check_geometry(training_input.nrows(), n_tiles, n_tile_size, "training")?;
        params.check()?;
        Ok(TiledGp {
            training_input,
            training_output,
            n_tiles,
            n_tile_size,
            params,
            trainable,
            kernel,
        })
    }

    /// Training inputs
    pub fn training_input(&self) -> &Array2<F> {
        &self.training_input
    }

    /// Training outputs
    pub fn training_output(&self) -> &Array1<F> {
        &self.training_output
    }

    /// Number of training tiles
    pub fn n_tiles(&self) -> usize {
        self.n_tiles
    }

    /// Number of samples per training tile
    pub fn n_tile_size(&self) -> usize {
        self.n_tile_size
    }

    /// Dimension of the input samples
    pub fn n_regressors(&self) -> usize {
        self.training_input.ncols()
    }

    /// Current kernel hyperparameters
    pub fn params(&self) -> &KernelParams<F> {
        &self.params
    }

    /// Hyperparameters updated by the optimization
    pub fn trainable(&self) -> &TrainableParams {
        &self.trainable
    }

    /// Covariance kernel
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    fn generator(&self) -> TileGenerator<F, K> {
        TileGenerator::new(self.kernel, self.params)
    }

    fn train(&self) -> TiledSamples<F> {
        TiledSamples {
            input: self.training_input.view(),
            n_tiles: self.n_tiles,
            tile_size: self.n_tile_size,
        }
    }

    fn test<'a>(
        &self,
        test_input: &'a ArrayBase<impl Data<Elem = F>, Ix2>,
        m_tiles: usize,
        m_tile_size: usize,
    ) -> Result<TiledSamples<'a, F>> {
        if test_input.ncols() != self.n_regressors() {
            return Err(GpError::InvalidValueError(format!(
                "test input should have {} regressors, got {}",
                self.n_regressors(),
                test_input.ncols()
            )));
        }
        check_geometry(test_input.nrows(), m_tiles, m_tile_size, "test")?;
        Ok(TiledSamples {
            input: test_input.view(),
            n_tiles: m_tiles,
            tile_size: m_tile_size,
        })
    }

    /// Predict the posterior mean at `test_input` samples split in `m_tiles` tiles
    /// of `m_tile_size` samples
    pub fn predict(
        &self,
        test_input: &ArrayBase<impl Data<Elem = F>, Ix2>,
        m_tiles: usize,
        m_tile_size: usize,
    ) -> Result<Array1<F>> {
        let test = self.test(test_input, m_tiles, m_tile_size)?;
        let now = Instant::now();
        let mean = predict(self.generator(), self.train(), self.training_output.view(), test)?;
        debug!("Prediction of {} samples in {:?}", mean.len(), now.elapsed());
        Ok(mean)
    }

    /// Predict the posterior mean and variance at `test_input` samples
    ///
    /// Variance might be slightly negative depending on machine precision,
    /// it is set to zero in that case.
    pub fn predict_with_uncertainty(
        &self,
        test_input: &ArrayBase<impl Data<Elem = F>, Ix2>,
        m_tiles: usize,
        m_tile_size: usize,
    ) -> Result<(Array1<F>, Array1<F>)> {
        let test = self.test(test_input, m_tiles, m_tile_size)?;
        let now = Instant::now();
        let res = predict_with_uncertainty(
            self.generator(),
            self.train(),
            self.training_output.view(),
            test,
        )?;
        debug!(
            "Prediction with uncertainty of {} samples in {:?}",
            res.0.len(),
            now.elapsed()
        );
        Ok(res)
    }

    /// Predict the posterior mean and full covariance matrix at `test_input` samples
    pub fn predict_with_full_cov(
        &self,
        test_input: &ArrayBase<impl Data<Elem = F>, Ix2>,
        m_tiles: usize,
        m_tile_size: usize,
    ) -> Result<(Array1<F>, Array2<F>)> {
        let test = self.test(test_input, m_tiles, m_tile_size)?;
        let now = Instant::now();
        let res = predict_with_full_cov(
            self.generator(),
            self.train(),
            self.training_output.view(),
            test,
        )?;
        debug!(
            "Prediction with full covariance of {} samples in {:?}",
            res.0.len(),
            now.elapsed()
        );
        Ok(res)
    }

    /// Negative log marginal likelihood of the training data
    pub fn calculate_loss(&self) -> Result<F> {
        loss(self.generator(), self.train(), self.training_output.view())
    }

    /// Negative log marginal likelihood and its gradient indexed by
    /// [Hyperparameter::index](crate::Hyperparameter::index), zero for non trainable
    /// hyperparameters
    pub fn calculate_loss_and_gradient(&self) -> Result<(F, [F; 3])> {
        loss_and_gradient(
            self.generator(),
            self.train(),
            self.training_output.view(),
            &self.trainable,
        )
    }

    /// Lower triangular Cholesky factor of the training covariance matrix
    pub fn cholesky(&self) -> Result<Array2<F>> {
        let k = TiledMatrix::empty(self.n_tiles, self.n_tiles);
        let mut graph = TaskGraph::new();
        schedule_covariance(&mut graph, self.generator(), self.train(), &k);
        schedule_cholesky(&mut graph, &k);
        graph.run()?;
        Ok(k.into_dense_lower())
    }

    /// Optimize the trainable hyperparameters with `adam.opt_iter()` Adam iterations
    /// starting from the moment estimates of `adam`.
    ///
    /// Returns the loss computed before each iteration. When an iteration fails the
    /// hyperparameters are left to their values before the optimization.
    pub fn optimize(&mut self, adam: &AdamValidParams<F>) -> Result<Vec<F>> {
        check_trainable_positive(&self.params, &self.trainable)?;
        let now = Instant::now();
        let initial = self.params;
        let mut state = adam.clone();
        let losses = match (0..adam.opt_iter())
            .map(|iteration| self.optimize_step(&mut state, iteration))
            .collect::<Result<Vec<F>>>()
        {
            Ok(losses) => losses,
            Err(err) => {
                warn!("Optimization failed ({}), hyperparameters restored", err);
                self.params = initial;
                return Err(err);
            }
        };
        info!(
            "Optimization of {} iterations in {:?}: {}, loss {} -> {}",
            losses.len(),
            now.elapsed(),
            self,
            losses.first().map_or(F::nan(), |l| *l),
            losses.last().map_or(F::nan(), |l| *l),
        );
        Ok(losses)
    }

    /// Run one Adam iteration, `iteration` being zero based, updating the moment
    /// estimates stored in `adam`.
    ///
    /// Returns the loss computed before the update.
    pub fn optimize_step(&mut self, adam: &mut AdamValidParams<F>, iteration: usize) -> Result<F> {
        check_trainable_positive(&self.params, &self.trainable)?;
        let (loss, gradient) = self.calculate_loss_and_gradient()?;
        adam_step(&mut self.params, &gradient, &self.trainable, adam, iteration);
        debug!(
            "Adam iteration {}: loss = {}, gradient = {:?}, params = {:?}",
            iteration, loss, gradient, self.params
        );
        Ok(loss)
    }
}

impl<F: Float, K: CovarianceKernel<F>> fmt::Display for TiledGp<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flag = |b: bool| u8::from(b);
        write!(
            f,
            "Kernel_Params: [lengthscale={:.12}, vertical_lengthscale={:.12}, noise_variance={:.12}, n_regressors={}, trainable_params l={}, trainable_params v={}, trainable_params n={}]",
            self.params.lengthscale,
            self.params.vertical_lengthscale,
            self.params.noise_variance,
            self.n_regressors(),
            flag(self.trainable.lengthscale),
            flag(self.trainable.vertical_lengthscale),
            flag(self.trainable.noise_variance),
        )
    }
}
