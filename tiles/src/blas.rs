//! Per-tile dense kernels.
//!
//! These are the BLAS/LAPACK-like building blocks composed by the tiled algorithms.
//! They work on a single tile (or a few tiles) at a time and hold no state, hence can be
//! called from any task of a [crate::TaskGraph].
//!
//! Triangular factors are lower triangular: `op(L)` is either `L` or `Lᵀ`
//! depending on a [Transpose] flag.
use crate::errors::{Result, TileError};
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::linalg::{general_mat_mul, general_mat_vec_mul};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, DataMut, Ix1, Ix2, Zip};

/// Side of the triangular factor in [trsm]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Solve `op(L) X = B`
    Left,
    /// Solve `X op(L) = B`
    Right,
}

/// Whether an operand is used as is or transposed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transpose {
    /// `op(A) = A`
    NoTrans,
    /// `op(A) = Aᵀ`
    Trans,
}

fn op<'a, F>(a: ArrayView2<'a, F>, transpose: Transpose) -> ArrayView2<'a, F> {
    match transpose {
        Transpose::NoTrans => a,
        Transpose::Trans => a.reversed_axes(),
    }
}

/// In-place Cholesky factorization `A = L Lᵀ` of a symmetric positive definite tile.
///
/// On success `a` holds `L` with a zeroed upper triangle. A tile which is not numerically
/// positive definite gives a [TileError::NotPositiveDefinite] error with `iteration = 0`,
/// the caller being in charge of reporting the block step.
pub fn potrf<F: Float>(a: &mut Array2<F>) -> Result<()> {
    a.cholesky_inplace()
        .map_err(|_| TileError::NotPositiveDefinite { iteration: 0 })?;
    for ((i, j), v) in a.indexed_iter_mut() {
        if j > i {
            *v = F::zero();
        }
    }
    if a.diag().iter().all(|d| d.is_finite() && *d > F::zero()) {
        Ok(())
    } else {
        Err(TileError::NotPositiveDefinite { iteration: 0 })
    }
}

/// Triangular solve with several right-hand sides:
/// `b ← op(L)⁻¹ b` for [Side::Left], `b ← b op(L)⁻¹` for [Side::Right]
pub fn trsm<F: Float>(
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &mut ArrayBase<impl DataMut<Elem = F>, Ix2>,
    side: Side,
    transpose: Transpose,
) -> Result<()> {
    match side {
        Side::Left => {
            solve_lower(l, b, transpose)?;
        }
        Side::Right => {
            // X op(L) = B  <=>  op(L)ᵀ Xᵀ = Bᵀ
            let flipped = match transpose {
                Transpose::NoTrans => Transpose::Trans,
                Transpose::Trans => Transpose::NoTrans,
            };
            let mut bt = b.t().to_owned();
            solve_lower(l, &mut bt, flipped)?;
            b.assign(&bt.t());
        }
    }
    Ok(())
}

fn solve_lower<F: Float>(
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &mut ArrayBase<impl DataMut<Elem = F>, Ix2>,
    transpose: Transpose,
) -> Result<()> {
    match transpose {
        Transpose::NoTrans => {
            l.solve_triangular_inplace(b, UPLO::Lower)?;
        }
        Transpose::Trans => {
            l.t().solve_triangular_inplace(b, UPLO::Upper)?;
        }
    }
    Ok(())
}

/// Symmetric rank-k update `c ← c - a aᵀ`
pub fn syrk<F: Float>(
    c: &mut ArrayBase<impl DataMut<Elem = F>, Ix2>,
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
) {
    general_mat_mul(-F::one(), a, &a.t(), F::one(), c);
}

/// General matrix multiply-accumulate `c ← c + alpha op(a) op(b)`
pub fn gemm<F: Float>(
    c: &mut ArrayBase<impl DataMut<Elem = F>, Ix2>,
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ta: Transpose,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    tb: Transpose,
    alpha: F,
) {
    general_mat_mul(alpha, &op(a.view(), ta), &op(b.view(), tb), F::one(), c);
}

/// Triangular vector solve `x ← op(L)⁻¹ x`
pub fn trsv<F: Float>(
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
    x: &mut ArrayBase<impl DataMut<Elem = F>, Ix1>,
    transpose: Transpose,
) -> Result<()> {
    let mut col = x.view_mut().insert_axis(Axis(1));
    solve_lower(l, &mut col, transpose)
}

/// Matrix-vector multiply-accumulate `y ← y + alpha op(a) x`
pub fn gemv<F: Float>(
    y: &mut ArrayBase<impl DataMut<Elem = F>, Ix1>,
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ta: Transpose,
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    alpha: F,
) {
    general_mat_vec_mul(alpha, &op(a.view(), ta), x, F::one(), y);
}

/// Dot product `aᵀb`
pub fn dot<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix1>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> F {
    a.dot(b)
}

/// Diagonal of `aᵀa`, i.e. the squared norms of the columns of `a`
pub fn gram_diagonal<F: Float>(a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
    a.mapv(|v| v * v).sum_axis(Axis(0))
}

/// Frobenius inner product `Σ a_ij b_ij`
pub fn frobenius_inner<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> F {
    Zip::from(a)
        .and(b)
        .fold(F::zero(), |acc, &x, &y| acc + x * y)
}

/// Transposed copy of a tile
pub fn transpose<F: Float>(a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
    a.t().as_standard_layout().into_owned()
}
