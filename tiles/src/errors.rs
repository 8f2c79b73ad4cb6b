use thiserror::Error;

/// A result type for tiled linear algebra
pub type Result<T> = std::result::Result<T, TileError>;

/// An error raised by a tile operation
#[derive(Error, Debug)]
pub enum TileError {
    /// When a diagonal tile is not numerically positive definite
    #[error("Cholesky decomposition failed: diagonal tile {iteration} is not positive definite")]
    NotPositiveDefinite {
        /// Index of the block Cholesky step (i.e. of the diagonal tile) which failed
        iteration: usize,
    },
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
}
