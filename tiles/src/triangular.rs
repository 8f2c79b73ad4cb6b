//! Forward and backward substitution with a tiled lower triangular factor.
//!
//! The right-hand side is a grid of tiles with as many tile rows as the factor: a
//! [crate::TiledVector] or a [crate::TiledMatrix] with any number of tile columns. Each
//! column of tiles is an independent chain of tasks.
use crate::blas::{self, Side, Transpose};
use crate::errors::Result;
use crate::graph::TaskGraph;
use crate::storage::{TiledMatrix, Tiles};
use linfa::Float;
use ndarray::{Array1, Array2};

/// A right-hand side tile of a triangular solve
pub trait RhsTile<F: Float>: Send + Sync {
    /// `self ← op(L)⁻¹ self` where `l` is a lower triangular diagonal tile
    fn solve(&mut self, l: &Array2<F>, transpose: Transpose) -> Result<()>;
    /// `self ← self - op(a) x`
    fn update(&mut self, a: &Array2<F>, transpose: Transpose, x: &Self);
}

impl<F: Float> RhsTile<F> for Array1<F> {
    fn solve(&mut self, l: &Array2<F>, transpose: Transpose) -> Result<()> {
        blas::trsv(l, self, transpose)
    }

    fn update(&mut self, a: &Array2<F>, transpose: Transpose, x: &Self) {
        blas::gemv(self, a, transpose, x, -F::one())
    }
}

impl<F: Float> RhsTile<F> for Array2<F> {
    fn solve(&mut self, l: &Array2<F>, transpose: Transpose) -> Result<()> {
        blas::trsm(l, self, Side::Left, transpose)
    }

    fn update(&mut self, a: &Array2<F>, transpose: Transpose, x: &Self) {
        blas::gemm(self, a, transpose, x, Transpose::NoTrans, -F::one())
    }
}

/// Submit the tasks solving `L X = B` in place of `b`
pub fn schedule_forward_substitution<'a, F: Float, T: RhsTile<F> + 'a>(
    graph: &mut TaskGraph<'a>,
    l: &'a TiledMatrix<F>,
    b: &'a Tiles<T>,
) {
    let n = l.n_rows();
    for c in 0..b.n_cols() {
        for k in 0..n {
            graph.submit("trsm", &[l.key(k, k)], &[b.key(k, c)], move || {
                let lkk = l.read(k, k);
                b.write(k, c).solve(&lkk, Transpose::NoTrans)
            });
            for i in k + 1..n {
                graph.submit(
                    "gemm",
                    &[l.key(i, k), b.key(k, c)],
                    &[b.key(i, c)],
                    move || {
                        let (lik, bk) = (l.read(i, k), b.read(k, c));
                        b.write(i, c).update(&lik, Transpose::NoTrans, &bk);
                        Ok(())
                    },
                );
            }
        }
    }
}

/// Submit the tasks solving `Lᵀ X = B` in place of `b`
pub fn schedule_backward_substitution<'a, F: Float, T: RhsTile<F> + 'a>(
    graph: &mut TaskGraph<'a>,
    l: &'a TiledMatrix<F>,
    b: &'a Tiles<T>,
) {
    let n = l.n_rows();
    for c in 0..b.n_cols() {
        for k in (0..n).rev() {
            graph.submit("trsm", &[l.key(k, k)], &[b.key(k, c)], move || {
                let lkk = l.read(k, k);
                b.write(k, c).solve(&lkk, Transpose::Trans)
            });
            for i in 0..k {
                graph.submit(
                    "gemm",
                    &[l.key(k, i), b.key(k, c)],
                    &[b.key(i, c)],
                    move || {
                        let (lki, bk) = (l.read(k, i), b.read(k, c));
                        b.write(i, c).update(&lki, Transpose::Trans, &bk);
                        Ok(())
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cholesky::schedule_cholesky;
    use crate::TiledVector;
    use approx::assert_abs_diff_eq;
    use linfa_linalg::cholesky::Cholesky;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::Xoshiro256Plus;

    fn problem(n: usize) -> (Array2<f64>, Array1<f64>, Array2<f64>) {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let m = Array2::random_using((n, n), Uniform::new(-1., 1.), &mut rng);
        let a = m.dot(&m.t()) + Array2::<f64>::eye(n) * n as f64;
        let y = Array1::random_using(n, Uniform::new(-1., 1.), &mut rng);
        let z = Array2::random_using((n, 2 * n), Uniform::new(-1., 1.), &mut rng);
        (a, y, z)
    }

    #[test]
    fn test_solve_vector() {
        let (a, y, _) = problem(9);
        let l = TiledMatrix::from_dense(&a, 3);
        let x = TiledVector::from_array(&y, 3);
        let mut graph = TaskGraph::new();
        schedule_cholesky(&mut graph, &l);
        schedule_forward_substitution(&mut graph, &l, &x);
        schedule_backward_substitution(&mut graph, &l, &x);
        graph.run().unwrap();
        assert_abs_diff_eq!(a.dot(&x.into_vector()), y, epsilon = 1e-10);
    }

    #[test]
    fn test_forward_matrix() {
        let (a, _, z) = problem(8);
        let l = TiledMatrix::from_dense(&a, 4);
        let x = TiledMatrix::from_dense(&z, 4);
        let mut graph = TaskGraph::new();
        schedule_cholesky(&mut graph, &l);
        schedule_forward_substitution(&mut graph, &l, &x);
        graph.run().unwrap();
        let dense_l = a.cholesky().unwrap();
        assert_abs_diff_eq!(dense_l.dot(&x.into_dense()), z, epsilon = 1e-10);
    }

    #[test]
    fn test_backward_matrix() {
        let (a, _, z) = problem(6);
        let l = TiledMatrix::from_dense(&a, 2);
        let x = TiledMatrix::from_dense(&z, 2);
        let mut graph = TaskGraph::new();
        schedule_cholesky(&mut graph, &l);
        schedule_backward_substitution(&mut graph, &l, &x);
        graph.run().unwrap();
        let dense_l = a.cholesky().unwrap();
        assert_abs_diff_eq!(dense_l.t().dot(&x.into_dense()), z, epsilon = 1e-10);
    }
}
