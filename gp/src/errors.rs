use thiserror::Error;
use tilegp_tiles::TileError;

/// A result type for tiled GP regression
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using a [`TiledGp`](crate::TiledGp) or loading [`GpData`](crate::GpData)
#[derive(Error, Debug)]
pub enum GpError {
    /// When a value (geometry, hyperparameter, optimizer setting) is invalid
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When a tiled computation fails, typically a non positive definite covariance
    #[error(transparent)]
    TileError(#[from] TileError),
    /// When error during loading
    #[error("Load IO error")]
    LoadIoError(#[from] std::io::Error),
    /// When error during loading
    #[error("Load error: {0}")]
    LoadError(String),
}

/// Cause category of a [GpError]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad tile geometry, hyperparameters or settings: fix the call
    Configuration,
    /// Ill-conditioned computation: adjust the hyperparameters
    Numerical,
    /// Unreadable or malformed input data
    Io,
}

impl GpError {
    /// Category of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GpError::InvalidValueError(_) => ErrorKind::Configuration,
            GpError::TileError(_) => ErrorKind::Numerical,
            GpError::LoadIoError(_) | GpError::LoadError(_) => ErrorKind::Io,
        }
    }
}
