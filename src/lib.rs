//! Tiled Gaussian process regression.
//!
//! This crate gathers the two crates of the workspace:
//! * [tiles]: tiled storage of dense matrices and vectors, dataflow [TaskGraph](tiles::TaskGraph)
//!   and tiled Cholesky factorization, triangular solves and products,
//! * [gp]: Gaussian process regression computed with those tiles, hyperparameters
//!   optimized with Adam.
//!
//! The main entry point is [TiledGp]:
//!
//! ```
//! use tilegp::{AdamParams, KernelParams, TiledGp, TrainableParams};
//! use linfa::ParamGuard;
//! use ndarray::{array, Array, Axis};
//!
//! let xt = Array::linspace(0., 3., 4).insert_axis(Axis(1));
//! let yt = array![0., 1., 0., -1.];
//! let mut gp = TiledGp::new(xt, yt, 2, 2, KernelParams::new(1., 1., 0.1), TrainableParams::default())
//!     .expect("GP built");
//!
//! let adam = AdamParams::new().learning_rate(0.1).opt_iter(10).check().expect("Adam settings");
//! let losses = gp.optimize(&adam).expect("GP optimization");
//! assert_eq!(losses.len(), 10);
//!
//! let mean = gp.predict(&array![[0.5], [1.5]], 1, 2).expect("GP prediction");
//! assert_eq!(mean.len(), 2);
//! ```
//!
//! Computations log through the `log` facade, [init_logger] installs `env_logger`
//! configured from the `TILEGP_LOG` environment variable (`info` level by default).
pub use tilegp_gp as gp;
pub use tilegp_tiles as tiles;

pub use tilegp_gp::{
    AdamParams, AdamValidParams, ErrorKind, GpData, GpError, Hyperparameter, KernelParams,
    Result, SquaredExponentialKernel, TiledGp, TrainableParams,
};

use env_logger::{Builder, Env};

/// Environment variable used to set the log level, ex: `TILEGP_LOG=debug`
pub const TILEGP_LOG: &str = "TILEGP_LOG";

/// Install a stdout logger whose level is read from [TILEGP_LOG] (default `info`).
///
/// Does nothing when a logger is already installed.
pub fn init_logger() {
    let env = Env::new().filter_or(TILEGP_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();
}

/// Configure the global rayon thread pool running the tile tasks with `n_threads` threads.
///
/// Must be called before any computation, the global pool being built once.
pub fn init_thread_pool(n_threads: usize) -> std::result::Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()?;
    log::info!("Tile tasks run on {} threads", rayon::current_num_threads());
    Ok(())
}
