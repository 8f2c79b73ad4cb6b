//! Block right-looking Cholesky factorization of a tiled symmetric positive definite
//! matrix.
//!
//! Only the tiles on and below the diagonal are read and written: on success they hold
//! the lower triangular factor `L` such that `A = L Lᵀ`, tiles above the diagonal are
//! left untouched.
use crate::blas::{self, Side, Transpose};
use crate::errors::{Result, TileError};
use crate::graph::TaskGraph;
use crate::storage::TiledMatrix;
use linfa::Float;
use log::debug;

/// Submit the tasks factorizing `a` in place to `graph`.
///
/// For each step `k`: factorize the diagonal tile `(k, k)`, solve the tiles `(i, k)`
/// below it, then update the trailing tiles `(i, j)`, `k < j <= i`. The edges of the
/// resulting graph come from the tiles each task reads and writes, so that the updates
/// of different tiles run concurrently while the updates of one tile are serialized.
pub fn schedule_cholesky<'a, F: Float>(graph: &mut TaskGraph<'a>, a: &'a TiledMatrix<F>) {
    let n = a.n_rows();
    for k in 0..n {
        graph.submit("potrf", &[], &[a.key(k, k)], move || {
            blas::potrf(&mut *a.write(k, k)).map_err(|err| {
                debug!("Cholesky step {} failed: {}", k, err);
                TileError::NotPositiveDefinite { iteration: k }
            })
        });
        for i in k + 1..n {
            graph.submit("trsm", &[a.key(k, k)], &[a.key(i, k)], move || {
                let l = a.read(k, k);
                blas::trsm(&*l, &mut *a.write(i, k), Side::Right, Transpose::Trans)
            });
        }
        for i in k + 1..n {
            graph.submit("syrk", &[a.key(i, k)], &[a.key(i, i)], move || {
                let aik = a.read(i, k);
                blas::syrk(&mut *a.write(i, i), &*aik);
                Ok(())
            });
            for j in k + 1..i {
                graph.submit(
                    "gemm",
                    &[a.key(i, k), a.key(j, k)],
                    &[a.key(i, j)],
                    move || {
                        let (aik, ajk) = (a.read(i, k), a.read(j, k));
                        blas::gemm(
                            &mut *a.write(i, j),
                            &*aik,
                            Transpose::NoTrans,
                            &*ajk,
                            Transpose::Trans,
                            -F::one(),
                        );
                        Ok(())
                    },
                );
            }
        }
    }
}

/// Factorize `a` in place and block until done
pub fn cholesky<F: Float>(a: &TiledMatrix<F>) -> Result<()> {
    let mut graph = TaskGraph::new();
    schedule_cholesky(&mut graph, a);
    graph.run()
}
