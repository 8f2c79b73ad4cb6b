//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! regression on top of tiled linear algebra.
//!
//! The `n x n` training covariance matrix is never stored as a whole: it is split in
//! `n_tiles x n_tiles` tiles of `n_tile_size x n_tile_size` entries which are generated,
//! factorized and solved by fine grained tasks of a dataflow graph executed on the rayon
//! thread pool (see the `tilegp-tiles` crate).
//!
//! GP methods are implemented by [TiledGp], hyperparameters being
//! [KernelParams] and optimized with the Adam algorithm configured by [AdamParams].
//!
//! ```
//! use tilegp_gp::{KernelParams, TiledGp, TrainableParams};
//! use ndarray::{array, Array, Axis};
//!
//! let xt = Array::linspace(0., 4., 8).insert_axis(Axis(1));
//! let yt = xt.column(0).mapv(f64::sin);
//! let gp = TiledGp::new(xt, yt, 2, 4, KernelParams::default(), TrainableParams::default())
//!     .expect("GP built");
//! let xtest = array![[0.5], [1.5]];
//! let (mean, variance) = gp.predict_with_uncertainty(&xtest, 1, 2).expect("GP prediction");
//! assert_eq!(mean.len(), 2);
//! assert!(variance.iter().all(|v| *v >= 0.));
//! ```
#![warn(missing_docs)]
mod algorithm;
mod data;
mod errors;
pub mod generation;
pub mod kernels;
mod likelihood;
pub mod metrics;
mod optimization;
mod parameters;
mod predictor;
pub mod tiling;

pub use algorithm::*;
pub use data::*;
pub use errors::*;
pub use kernels::{CovarianceKernel, SquaredExponentialKernel};
pub use parameters::*;
