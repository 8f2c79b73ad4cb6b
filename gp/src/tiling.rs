//! Tile geometry helpers.
//!
//! A set of `n` samples is split in `n_tiles` tiles of `n_tile_size` samples, without
//! padding: `n_tiles * n_tile_size == n` is required.
use crate::errors::{GpError, Result};

fn check_divides(n_samples: usize, divisor: usize, name: &str) -> Result<usize> {
    if n_samples == 0 {
        return Err(GpError::InvalidValueError(
            "number of samples should be strictly positive".to_string(),
        ));
    }
    if divisor == 0 {
        return Err(GpError::InvalidValueError(format!(
            "{name} should be strictly positive"
        )));
    }
    if n_samples % divisor != 0 {
        return Err(GpError::InvalidValueError(format!(
            "{name} ({divisor}) should divide the number of samples ({n_samples})"
        )));
    }
    Ok(n_samples / divisor)
}

/// Number of training tiles given their size
pub fn compute_train_tiles(n_samples: usize, n_tile_size: usize) -> Result<usize> {
    check_divides(n_samples, n_tile_size, "tile size")
}

/// Size of the training tiles given their number
pub fn compute_train_tile_size(n_samples: usize, n_tiles: usize) -> Result<usize> {
    check_divides(n_samples, n_tiles, "number of tiles")
}

/// Test tile geometry `(m_tiles, m_tile_size)` for `n_test` samples: the training tile
/// size is reused when it divides `n_test`, otherwise the training number of tiles
pub fn compute_test_tiles(n_test: usize, n_tiles: usize, n_tile_size: usize) -> Result<(usize, usize)> {
    if n_test == 0 || n_tiles == 0 || n_tile_size == 0 {
        return Err(GpError::InvalidValueError(
            "test samples and training tile geometry should be strictly positive".to_string(),
        ));
    }
    if n_test % n_tile_size == 0 {
        Ok((n_test / n_tile_size, n_tile_size))
    } else if n_test % n_tiles == 0 {
        Ok((n_tiles, n_test / n_tiles))
    } else {
        Err(GpError::InvalidValueError(format!(
            "cannot tile {n_test} test samples with tile size {n_tile_size} nor in {n_tiles} tiles"
        )))
    }
}

/// Check that `n_tiles` tiles of size `n_tile_size` cover exactly `n_samples` samples
pub(crate) fn check_geometry(
    n_samples: usize,
    n_tiles: usize,
    n_tile_size: usize,
    what: &str,
) -> Result<()> {
    if n_tiles == 0 || n_tile_size == 0 {
        return Err(GpError::InvalidValueError(format!(
            "{what} tile geometry should be strictly positive, got {n_tiles} tiles of size {n_tile_size}"
        )));
    }
    if n_tiles.checked_mul(n_tile_size) != Some(n_samples) {
        return Err(GpError::InvalidValueError(format!(
            "{what} tile geometry mismatch: {n_tiles} tiles of size {n_tile_size} for {n_samples} samples"
        )));
    }
    Ok(())
}
