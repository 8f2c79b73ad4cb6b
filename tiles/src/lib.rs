//! This library implements tiled dense linear algebra for symmetric positive definite
//! matrices: a matrix is stored as a grid of independent tiles and every tile operation
//! (factorization, triangular solve, update, product) is submitted as a task of a
//! dataflow [TaskGraph].
//!
//! Dependencies between tasks are not written by hand: each task declares the tiles it
//! reads and the tiles it writes, and the graph orders it after the previous writers
//! (and, for writes, after the previous readers) of those tiles. Independent branches,
//! for instance the trailing updates of a block Cholesky step, then run concurrently on
//! the [rayon](https://github.com/rayon-rs/rayon) thread pool.
//!
//! The building blocks are:
//! * [Tiles] storage (tiled matrices, vectors and scalar accumulators),
//! * per-tile kernels in [blas] (`potrf`, `trsm`, `syrk`, `gemm`, `trsv`, `gemv`, ...),
//! * the block right-looking Cholesky factorization in [cholesky],
//! * forward and backward substitution in [triangular],
//! * tiled products and reductions in [products].
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use tilegp_tiles::{cholesky, TiledMatrix};
//!
//! let a = array![[4., 2., 0., 0.], [2., 5., 1., 0.], [0., 1., 3., 1.], [0., 0., 1., 2.]];
//! let tiles = TiledMatrix::from_dense(&a, 2);
//! cholesky::cholesky(&tiles).expect("SPD matrix");
//! let l = tiles.into_dense_lower();
//! approx::assert_abs_diff_eq!(l.dot(&l.t()), a, epsilon = 1e-12);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod blas;
pub mod cholesky;
mod errors;
mod graph;
pub mod products;
mod storage;
pub mod triangular;

pub use errors::*;
pub use graph::*;
pub use storage::*;
