//! Generation of the covariance and output tiles.
//!
//! `row` and `col` arguments are tile indices: entry `(i, j)` of tile `(row, col)` with
//! tile size `n` relates the samples of global indices `n * row + i` and `n * col + j`.
//! Tile indices are not checked, geometry is validated by [TiledGp](crate::TiledGp)
//! before any tile is generated.
use crate::kernels::CovarianceKernel;
use crate::parameters::{Hyperparameter, KernelParams};
use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use tilegp_tiles::{TaskGraph, TiledMatrix, TiledVector};

/// Input samples (one per row) split in `n_tiles` tiles of `tile_size` samples
#[derive(Clone, Copy, Debug)]
pub(crate) struct TiledSamples<'a, F: Float> {
    pub input: ArrayView2<'a, F>,
    pub n_tiles: usize,
    pub tile_size: usize,
}

impl<'a, F: Float> TiledSamples<'a, F> {
    /// Same samples viewed for the lifetime of `self`
    pub fn reborrow(&self) -> TiledSamples<'_, F> {
        TiledSamples {
            input: self.input.view(),
            n_tiles: self.n_tiles,
            tile_size: self.tile_size,
        }
    }
}

/// Builds covariance tiles for a kernel and its hyperparameters
#[derive(Clone, Copy, Debug)]
pub struct TileGenerator<F: Float, K: CovarianceKernel<F>> {
    kernel: K,
    params: KernelParams<F>,
}

impl<F: Float, K: CovarianceKernel<F>> TileGenerator<F, K> {
    /// Constructor
    pub fn new(kernel: K, params: KernelParams<F>) -> Self {
        TileGenerator { kernel, params }
    }

    /// Kernel hyperparameters
    pub fn params(&self) -> &KernelParams<F> {
        &self.params
    }

    /// Prior covariance tile of the training samples, noise variance added
    /// where the global row and column indices are equal
    pub fn prior_covariance_tile(
        &self,
        row: usize,
        col: usize,
        n: usize,
        input: &ArrayView2<F>,
    ) -> Array2<F> {
        Array2::from_shape_fn((n, n), |(i, j)| {
            let (ig, jg) = (n * row + i, n * col + j);
            let k = self
                .kernel
                .value(&input.row(ig), &input.row(jg), &self.params);
            if ig == jg {
                k + self.params.noise_variance
            } else {
                k
            }
        })
    }

    /// Prior covariance tile without noise
    pub fn full_prior_covariance_tile(
        &self,
        row: usize,
        col: usize,
        n: usize,
        input: &ArrayView2<F>,
    ) -> Array2<F> {
        self.cross_covariance_tile(row, col, n, n, input, input)
    }

    /// Diagonal of the noise-free prior covariance of the samples of tile `row`
    pub fn prior_variance_tile(&self, row: usize, n: usize, input: &ArrayView2<F>) -> Array1<F> {
        Array1::from_shape_fn(n, |i| {
            let x = input.row(n * row + i);
            self.kernel.value(&x, &x, &self.params)
        })
    }

    /// Covariance tile between the `n_row` samples of tile `row` of `row_input`
    /// and the `n_col` samples of tile `col` of `col_input`
    pub fn cross_covariance_tile(
        &self,
        row: usize,
        col: usize,
        n_row: usize,
        n_col: usize,
        row_input: &ArrayView2<F>,
        col_input: &ArrayView2<F>,
    ) -> Array2<F> {
        Array2::from_shape_fn((n_row, n_col), |(i, j)| {
            self.kernel.value(
                &row_input.row(n_row * row + i),
                &col_input.row(n_col * col + j),
                &self.params,
            )
        })
    }

    /// Derivative of the prior covariance tile with respect to `hyperparameter`
    pub fn covariance_gradient_tile(
        &self,
        row: usize,
        col: usize,
        n: usize,
        input: &ArrayView2<F>,
        hyperparameter: Hyperparameter,
    ) -> Array2<F> {
        match hyperparameter {
            Hyperparameter::NoiseVariance => {
                if row == col {
                    identity_tile(n)
                } else {
                    zero_matrix_tile(n, n)
                }
            }
            _ => Array2::from_shape_fn((n, n), |(i, j)| {
                let (dl, dv) = self.kernel.gradient(
                    &input.row(n * row + i),
                    &input.row(n * col + j),
                    &self.params,
                );
                if hyperparameter == Hyperparameter::Lengthscale {
                    dl
                } else {
                    dv
                }
            }),
        }
    }
}

/// Transpose of a `n_row x n_col` tile
pub fn transpose_tile<F: Float>(n_row: usize, n_col: usize, tile: &Array2<F>) -> Array2<F> {
    debug_assert_eq!(tile.dim(), (n_row, n_col));
    tilegp_tiles::blas::transpose(tile)
}

/// Outputs of tile `row`
pub fn output_tile<F: Float>(row: usize, n: usize, output: &ArrayView1<F>) -> Array1<F> {
    output.slice(s![n * row..n * (row + 1)]).to_owned()
}

/// Zero vector tile
pub fn zero_tile<F: Float>(n: usize) -> Array1<F> {
    Array1::zeros(n)
}

/// Zero matrix tile
pub fn zero_matrix_tile<F: Float>(n_row: usize, n_col: usize) -> Array2<F> {
    Array2::zeros((n_row, n_col))
}

/// Identity matrix tile
pub fn identity_tile<F: Float>(n: usize) -> Array2<F> {
    Array2::eye(n)
}

/// Submit the generation of the lower tiles (`col <= row`) of the training covariance
pub(crate) fn schedule_covariance<'a, F: Float, K: CovarianceKernel<F> + 'a>(
    graph: &mut TaskGraph<'a>,
    generator: TileGenerator<F, K>,
    train: TiledSamples<'a, F>,
    k: &'a TiledMatrix<F>,
) {
    let TiledSamples {
        input, tile_size, ..
    } = train;
    for row in 0..k.n_rows() {
        for col in 0..=row {
            graph.submit("gen_covariance", &[], &[k.key(row, col)], move || {
                *k.write(row, col) = generator.prior_covariance_tile(row, col, tile_size, &input);
                Ok(())
            });
        }
    }
}

/// Submit the generation of the cross covariance tiles between `rows` and `cols` samples
pub(crate) fn schedule_cross_covariance<'a, F: Float, K: CovarianceKernel<F> + 'a>(
    graph: &mut TaskGraph<'a>,
    generator: TileGenerator<F, K>,
    rows: TiledSamples<'a, F>,
    cols: TiledSamples<'a, F>,
    cross: &'a TiledMatrix<F>,
) {
    for row in 0..rows.n_tiles {
        for col in 0..cols.n_tiles {
            graph.submit("gen_cross_covariance", &[], &[cross.key(row, col)], move || {
                *cross.write(row, col) = generator.cross_covariance_tile(
                    row,
                    col,
                    rows.tile_size,
                    cols.tile_size,
                    &rows.input,
                    &cols.input,
                );
                Ok(())
            });
        }
    }
}

/// Submit the generation of the output tiles
pub(crate) fn schedule_output<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    output: ArrayView1<'a, F>,
    n: usize,
    y: &'a TiledVector<F>,
) {
    for row in 0..y.n_rows() {
        graph.submit("gen_output", &[], &[y.key(row, 0)], move || {
            *y.write(row, 0) = output_tile(row, n, &output);
            Ok(())
        });
    }
}

/// Submit the generation of zero vector tiles
pub(crate) fn schedule_zeros<'a, F: Float>(graph: &mut TaskGraph<'a>, n: usize, y: &'a TiledVector<F>) {
    for row in 0..y.n_rows() {
        graph.submit("gen_zeros", &[], &[y.key(row, 0)], move || {
            *y.write(row, 0) = zero_tile(n);
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::SquaredExponentialKernel;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    fn generator() -> TileGenerator<f64, SquaredExponentialKernel> {
        TileGenerator::new(
            SquaredExponentialKernel::default(),
            KernelParams::new(1., 1., 0.1),
        )
    }

    #[test]
    fn test_prior_covariance_tile() {
        let input = array![[0.], [1.], [2.], [3.]];
        let gen = generator();
        let diag = gen.prior_covariance_tile(1, 1, 2, &input.view());
        assert_abs_diff_eq!(
            diag,
            array![[1.1, (-0.5f64).exp()], [(-0.5f64).exp(), 1.1]],
            epsilon = 1e-15
        );
        let off = gen.prior_covariance_tile(1, 0, 2, &input.view());
        // no noise off the global diagonal
        assert_abs_diff_eq!(off[[0, 0]], (-2f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(off[[1, 1]], (-2f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(off[[1, 0]], (-4.5f64).exp(), epsilon = 1e-15);
        assert_eq!(
            gen.full_prior_covariance_tile(1, 1, 2, &input.view())[[0, 0]],
            1.
        );
        assert_eq!(gen.prior_variance_tile(0, 2, &input.view()), array![1., 1.]);
    }

    #[test]
    fn test_cross_covariance_tile() {
        let train = Array::linspace(0., 5., 6).insert_axis(ndarray::Axis(1));
        let test = array![[0.5], [1.5], [2.5], [3.5]];
        let gen = generator();
        let cross = gen.cross_covariance_tile(1, 1, 2, 3, &test.view(), &train.view());
        assert_eq!(cross.dim(), (2, 3));
        // test sample 2 (2.5) against training sample 5 (5.)
        assert_abs_diff_eq!(cross[[0, 2]], (-0.5 * 2.5f64 * 2.5).exp(), epsilon = 1e-15);
        let cross_t = transpose_tile(2, 3, &cross);
        assert_eq!(cross_t.dim(), (3, 2));
        assert_eq!(cross_t[[2, 0]], cross[[0, 2]]);
    }

    #[test]
    fn test_covariance_gradient_tile() {
        let input = array![[0.], [1.], [2.], [3.]];
        let gen = generator();
        assert_eq!(
            gen.covariance_gradient_tile(0, 0, 2, &input.view(), Hyperparameter::NoiseVariance),
            Array2::<f64>::eye(2)
        );
        assert_eq!(
            gen.covariance_gradient_tile(1, 0, 2, &input.view(), Hyperparameter::NoiseVariance),
            Array2::<f64>::zeros((2, 2))
        );
        let dv =
            gen.covariance_gradient_tile(1, 0, 2, &input.view(), Hyperparameter::VerticalLengthscale);
        let k = gen.full_prior_covariance_tile(1, 0, 2, &input.view());
        // v = 1, hence dk/dv = k
        assert_abs_diff_eq!(dv, k, epsilon = 1e-15);
        let dl = gen.covariance_gradient_tile(1, 0, 2, &input.view(), Hyperparameter::Lengthscale);
        // d² = 4 for entry (0, 0)
        assert_abs_diff_eq!(dl[[0, 0]], 4. * (-2f64).exp(), epsilon = 1e-15);
    }

    #[test]
    fn test_output_tile() {
        let output = array![0., 1., 0., -1.];
        assert_eq!(output_tile(1, 2, &output.view()), array![0., -1.]);
        assert_eq!(zero_tile::<f64>(3), array![0., 0., 0.]);
        assert_eq!(identity_tile::<f64>(2), array![[1., 0.], [0., 1.]]);
    }
}
