//! Tiled products and reductions.
//!
//! Reductions accumulate into a [TiledScalar] slot: all the contributions write the same
//! slot, hence are serialized by the task graph while their inputs are produced
//! concurrently.
use crate::blas::{self, Transpose};
use crate::graph::TaskGraph;
use crate::storage::{TiledMatrix, TiledScalar, TiledVector};
use linfa::Float;

/// Submit the tasks computing `y ← y + op(A) x`.
///
/// `y` tiles must already be sized (typically zero tiles).
pub fn schedule_matrix_vector<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    a: &'a TiledMatrix<F>,
    ta: Transpose,
    x: &'a TiledVector<F>,
    y: &'a TiledVector<F>,
) {
    let (n_rows, n_cols) = match ta {
        Transpose::NoTrans => (a.n_rows(), a.n_cols()),
        Transpose::Trans => (a.n_cols(), a.n_rows()),
    };
    for i in 0..n_rows {
        for j in 0..n_cols {
            let (r, c) = match ta {
                Transpose::NoTrans => (i, j),
                Transpose::Trans => (j, i),
            };
            graph.submit("gemv", &[a.key(r, c), x.key(j, 0)], &[y.key(i, 0)], move || {
                let (aij, xj) = (a.read(r, c), x.read(j, 0));
                blas::gemv(&mut *y.write(i, 0), &*aij, ta, &*xj, F::one());
                Ok(())
            });
        }
    }
}

/// Submit the tasks computing `acc ← acc + aᵀb`
pub fn schedule_dot<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    a: &'a TiledVector<F>,
    b: &'a TiledVector<F>,
    acc: &'a TiledScalar<F>,
) {
    for i in 0..a.n_rows() {
        graph.submit("dot", &[a.key(i, 0), b.key(i, 0)], &[acc.key(0, 0)], move || {
            let contribution = if std::ptr::eq(a, b) {
                let ai = a.read(i, 0);
                blas::dot(&*ai, &*ai)
            } else {
                blas::dot(&*a.read(i, 0), &*b.read(i, 0))
            };
            *acc.write(0, 0) += contribution;
            Ok(())
        });
    }
}

/// Submit the tasks computing `d_j ← d_j - diag(VᵀV)_j` for each tile column `j` of `v`
pub fn schedule_gram_diagonal<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    v: &'a TiledMatrix<F>,
    d: &'a TiledVector<F>,
) {
    for j in 0..v.n_cols() {
        for i in 0..v.n_rows() {
            graph.submit("gram_diagonal", &[v.key(i, j)], &[d.key(j, 0)], move || {
                let gram = blas::gram_diagonal(&*v.read(i, j));
                *d.write(j, 0) -= &gram;
                Ok(())
            });
        }
    }
}

/// Submit the tasks computing `C ← C - VᵀV`
pub fn schedule_gram<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    v: &'a TiledMatrix<F>,
    c: &'a TiledMatrix<F>,
) {
    for i in 0..v.n_cols() {
        for j in 0..v.n_cols() {
            for k in 0..v.n_rows() {
                graph.submit("gemm", &[v.key(k, i), v.key(k, j)], &[c.key(i, j)], move || {
                    let mut cij = c.write(i, j);
                    if i == j {
                        let vki = v.read(k, i);
                        blas::gemm(
                            &mut *cij,
                            &*vki,
                            Transpose::Trans,
                            &*vki,
                            Transpose::NoTrans,
                            -F::one(),
                        );
                    } else {
                        let (vki, vkj) = (v.read(k, i), v.read(k, j));
                        blas::gemm(
                            &mut *cij,
                            &*vki,
                            Transpose::Trans,
                            &*vkj,
                            Transpose::NoTrans,
                            -F::one(),
                        );
                    }
                    Ok(())
                });
            }
        }
    }
}

/// Submit the tasks computing `acc ← acc + Σ_ij <A_ij, B_ij>` over all tiles
pub fn schedule_frobenius_inner<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    a: &'a TiledMatrix<F>,
    b: &'a TiledMatrix<F>,
    acc: &'a TiledScalar<F>,
) {
    for i in 0..a.n_rows() {
        for j in 0..a.n_cols() {
            graph.submit(
                "frobenius",
                &[a.key(i, j), b.key(i, j)],
                &[acc.key(0, 0)],
                move || {
                    let contribution = if std::ptr::eq(a, b) {
                        let aij = a.read(i, j);
                        blas::frobenius_inner(&*aij, &*aij)
                    } else {
                        blas::frobenius_inner(&*a.read(i, j), &*b.read(i, j))
                    };
                    *acc.write(0, 0) += contribution;
                    Ok(())
                },
            );
        }
    }
}

/// Submit the tasks computing `acc ← acc + log|L Lᵀ|`, i.e. twice the sum of the
/// logarithms of the diagonal of the factor `l`
pub fn schedule_log_det<'a, F: Float>(
    graph: &mut TaskGraph<'a>,
    l: &'a TiledMatrix<F>,
    acc: &'a TiledScalar<F>,
) {
    for k in 0..l.n_rows() {
        graph.submit("log_det", &[l.key(k, k)], &[acc.key(0, 0)], move || {
            let sum = l.read(k, k).diag().fold(F::zero(), |s, &d| s + d.ln());
            *acc.write(0, 0) += F::cast(2.) * sum;
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cholesky::schedule_cholesky;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn test_matrix_vector() {
        let a = Array2::from_shape_fn((4, 6), |(i, j)| (i * 6 + j) as f64);
        let x = Array1::from_shape_fn(6, |i| 1. - i as f64);
        let xt = Array1::from_shape_fn(4, |i| i as f64);
        let ta = TiledMatrix::from_dense(&a, 2);
        let tx = TiledVector::from_array(&x, 2);
        let txt = TiledVector::from_array(&xt, 2);
        let y = TiledVector::from_array(&Array1::<f64>::ones(4), 2);
        let yt = TiledVector::from_array(&Array1::<f64>::zeros(6), 2);
        let mut graph = TaskGraph::new();
        schedule_matrix_vector(&mut graph, &ta, Transpose::NoTrans, &tx, &y);
        schedule_matrix_vector(&mut graph, &ta, Transpose::Trans, &txt, &yt);
        graph.run().unwrap();
        assert_abs_diff_eq!(y.into_vector(), a.dot(&x) + 1., epsilon = 1e-12);
        assert_abs_diff_eq!(yt.into_vector(), a.t().dot(&xt), epsilon = 1e-12);
    }

    #[test]
    fn test_reductions() {
        let x = array![1., 2., 3., 4.];
        let y = array![0., 1., -1., 2.];
        let a = Array2::from_shape_fn((4, 4), |(i, j)| (i + 2 * j) as f64);
        let b = Array2::from_shape_fn((4, 4), |(i, j)| i as f64 - j as f64);
        let (tx, ty) = (TiledVector::from_array(&x, 2), TiledVector::from_array(&y, 2));
        let (ta, tb) = (TiledMatrix::from_dense(&a, 2), TiledMatrix::from_dense(&b, 2));
        let (xy, xx, ab, aa) = (
            TiledScalar::scalar(0.),
            TiledScalar::scalar(0.),
            TiledScalar::scalar(1.),
            TiledScalar::scalar(0.),
        );
        let mut graph = TaskGraph::new();
        schedule_dot(&mut graph, &tx, &ty, &xy);
        schedule_dot(&mut graph, &tx, &tx, &xx);
        schedule_frobenius_inner(&mut graph, &ta, &tb, &ab);
        schedule_frobenius_inner(&mut graph, &ta, &ta, &aa);
        graph.run().unwrap();
        assert_eq!(xy.into_scalar(), 7.);
        assert_eq!(xx.into_scalar(), 30.);
        assert_eq!(ab.into_scalar(), 1. + (&a * &b).sum());
        assert_eq!(aa.into_scalar(), (&a * &a).sum());
    }

    #[test]
    fn test_gram() {
        let v = Array2::from_shape_fn((4, 6), |(i, j)| ((i + 1) * (j + 2)) as f64 / 10.);
        let tv = TiledMatrix::from_dense(&v, 2);
        let d = TiledVector::from_array(&Array1::<f64>::from_elem(6, 5.), 2);
        let c = TiledMatrix::from_dense(&Array2::<f64>::eye(6), 2);
        let mut graph = TaskGraph::new();
        schedule_gram_diagonal(&mut graph, &tv, &d);
        schedule_gram(&mut graph, &tv, &c);
        graph.run().unwrap();
        let vtv = v.t().dot(&v);
        let c = c.into_dense();
        assert_abs_diff_eq!(c, Array2::<f64>::eye(6) - &vtv, epsilon = 1e-12);
        assert_abs_diff_eq!(d.into_vector(), 5. - &vtv.diag(), epsilon = 1e-12);
    }

    #[test]
    fn test_log_det() {
        let a = array![
            [4., 1., 0., 0.],
            [1., 3., 0., 0.],
            [0., 0., 2., 0.5],
            [0., 0., 0.5, 1.]
        ];
        let l = TiledMatrix::from_dense(&a, 2);
        let acc = TiledScalar::scalar(0.);
        let mut graph = TaskGraph::new();
        schedule_cholesky(&mut graph, &l);
        schedule_log_det(&mut graph, &l, &acc);
        graph.run().unwrap();
        let det: f64 = 11. * 1.75;
        assert_abs_diff_eq!(acc.into_scalar(), det.ln(), epsilon = 1e-12);
    }
}
